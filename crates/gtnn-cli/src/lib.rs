// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! End-to-end run: load data, build or restore the index, search, score
//! against the exhaustive oracle, and write the run's result files.

use gtnn_core::{
    Dataset, DatasetShape, GROUP_TESTING_ALGORITHM, GtError, OracleStats, RunMetrics,
    SearchStats,
};
use gtnn_eval::{EvaluationSummary, evaluate};
use gtnn_index::{PrefixIndex, SummationMode};
use gtnn_io::{LoadOptions, ResultLayout, ResultWriter, load_index, load_matrix, read_hit_lists};
use gtnn_search::{BruteForceOracle, GroupTestConfig, GroupTestEngine};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything one run needs. Deserialized from `gtnn run --pipeline` JSON or
/// assembled from `gtnn search` flags.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSpec {
    /// Name used for the result directory.
    pub dataset: String,
    pub data_path: PathBuf,
    pub query_path: PathBuf,
    pub result_root: PathBuf,
    /// Data vectors to read; extra file rows are ignored.
    pub n: usize,
    /// Query vectors to read; extra file rows are ignored.
    pub nq: usize,
    pub dim: usize,
    pub transpose_data: bool,
    pub transpose_queries: bool,
    /// Restore the data prefix index from this file instead of building it.
    pub load_index: Option<PathBuf>,
    /// Persist the data prefix index after building or loading it.
    pub save_index: Option<PathBuf>,
    pub search: GroupTestConfig,
}

impl Default for PipelineSpec {
    fn default() -> Self {
        Self {
            dataset: String::new(),
            data_path: PathBuf::new(),
            query_path: PathBuf::new(),
            result_root: PathBuf::from("results"),
            n: 0,
            nq: 0,
            dim: 0,
            transpose_data: false,
            transpose_queries: false,
            load_index: None,
            save_index: None,
            search: GroupTestConfig::default(),
        }
    }
}

impl PipelineSpec {
    pub fn shape(&self) -> DatasetShape {
        DatasetShape {
            n: self.n,
            nq: self.nq,
            dim: self.dim,
        }
    }

    pub fn validate(&self) -> Result<(), GtError> {
        if self.dataset.trim().is_empty() {
            return Err(GtError::invalid_input("pipeline.dataset is required"));
        }
        if self.dataset.contains(['/', '\\']) {
            return Err(GtError::invalid_input(format!(
                "pipeline.dataset must not contain path separators; got '{}'",
                self.dataset
            )));
        }
        if self.data_path.as_os_str().is_empty() {
            return Err(GtError::invalid_input("pipeline.data_path is required"));
        }
        if self.query_path.as_os_str().is_empty() {
            return Err(GtError::invalid_input("pipeline.query_path is required"));
        }
        self.shape().validate()?;
        self.search.validate()
    }

    fn data_options(&self) -> LoadOptions {
        load_options(self.n, self.dim, self.transpose_data)
    }

    fn query_options(&self) -> LoadOptions {
        load_options(self.nq, self.dim, self.transpose_queries)
    }
}

/// Caps the load at `rows` vectors so larger files can be sampled.
fn load_options(rows: usize, dim: usize, transpose: bool) -> LoadOptions {
    let options = LoadOptions::new(rows, dim).with_max_rows(rows);
    if transpose { options.transposed() } else { options }
}

/// Whether the data prefix index was built in this run or restored from disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexSource {
    Built,
    Loaded,
}

/// Outcome of [`run_pipeline`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_dir: PathBuf,
    pub results_path: PathBuf,
    pub ground_truth_path: PathBuf,
    pub report_path: PathBuf,
    pub index_source: IndexSource,
    pub metrics: RunMetrics,
    pub search: SearchStats,
    pub oracle: OracleStats,
    pub evaluation: EvaluationSummary,
    pub thread_count: Option<usize>,
}

/// Runs search and oracle over one dataset and writes the run's files.
pub fn run_pipeline(spec: &PipelineSpec) -> Result<PipelineReport, GtError> {
    spec.validate()?;

    let layout = ResultLayout::new(
        &spec.result_root,
        GROUP_TESTING_ALGORITHM,
        &spec.dataset,
        spec.search.rho,
    );
    let writer = ResultWriter::create(&layout)?;

    let dataset = Dataset::with_shape(
        spec.shape(),
        load_matrix(&spec.data_path, &spec.data_options())?,
        load_matrix(&spec.query_path, &spec.query_options())?,
    )?;
    tracing::info!(
        dataset = %spec.dataset,
        n = spec.n,
        nq = spec.nq,
        dim = spec.dim,
        rho = spec.search.rho,
        "dataset loaded"
    );

    let (engine, index_source) = match &spec.load_index {
        Some(path) => {
            let index = load_index(path, spec.n, spec.dim)?;
            let engine = GroupTestEngine::with_index(dataset.data(), index, spec.search.clone())?;
            (engine, IndexSource::Loaded)
        }
        None => (
            GroupTestEngine::new(dataset.data(), spec.search.clone())?,
            IndexSource::Built,
        ),
    };
    if let Some(path) = &spec.save_index {
        gtnn_io::save_index(path, engine.index())?;
    }

    let search = engine.search_matrix(dataset.queries())?;
    let oracle = BruteForceOracle::new(spec.search.rho)?
        .exhaustive_search(dataset.data(), dataset.queries())?;
    let evaluation = evaluate(&search.hits, &oracle.hits)?;
    if !evaluation.is_exact() {
        tracing::warn!(
            false_positives = evaluation.false_positives,
            false_negatives = evaluation.false_negatives,
            "search disagrees with exhaustive oracle"
        );
    }

    let metrics = RunMetrics {
        queries: dataset.queries().rows(),
        ntests: search.stats.recursive_calls,
        total_search_latency_us: search.stats.total_latency_us,
        total_oracle_latency_us: oracle.stats.total_latency_us,
        mean_precision: evaluation.mean_precision,
        mean_recall: evaluation.mean_recall,
        ..RunMetrics::default()
    };

    let results_path = writer.write_predicted(&search.hits)?;
    let ground_truth_path = writer.write_ground_truth(&oracle.hits)?;
    let report_path = writer.write_report(&metrics)?;
    tracing::info!(
        run_dir = %writer.dir().display(),
        ntests = metrics.ntests,
        mean_precision = metrics.mean_precision,
        mean_recall = metrics.mean_recall,
        "run finished"
    );

    Ok(PipelineReport {
        run_dir: writer.dir().to_path_buf(),
        results_path,
        ground_truth_path,
        report_path,
        index_source,
        metrics,
        search: search.stats,
        oracle: oracle.stats,
        evaluation,
        thread_count: search.thread_count,
    })
}

/// Parses a JSON pipeline spec and runs it.
pub fn run_pipeline_json(pipeline_json: &str) -> Result<PipelineReport, GtError> {
    let spec: PipelineSpec = serde_json::from_str(pipeline_json)
        .map_err(|err| GtError::invalid_input(format!("invalid pipeline JSON: {err}")))?;
    run_pipeline(&spec)
}

/// Summary of a standalone index build.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexReport {
    pub output: PathBuf,
    pub rows: usize,
    pub dim: usize,
    pub summation: SummationMode,
}

/// Builds the prefix index of a data file and saves it for later runs.
pub fn build_index_file(
    data_path: &Path,
    options: &LoadOptions,
    summation: SummationMode,
    output: &Path,
) -> Result<IndexReport, GtError> {
    let data = load_matrix(data_path, options)?;
    data.ensure_non_negative("data matrix")?;
    let index = PrefixIndex::build_with(&data, summation)?;
    gtnn_io::save_index(output, &index)?;
    Ok(IndexReport {
        output: output.to_path_buf(),
        rows: index.len(),
        dim: index.dim(),
        summation,
    })
}

/// Re-scores a saved `results.txt` against a saved `ground_truth.txt`.
pub fn evaluate_files(
    predictions: &Path,
    ground_truth: &Path,
) -> Result<EvaluationSummary, GtError> {
    let predicted = read_hit_lists(predictions)?;
    let truth = read_hit_lists(ground_truth)?;
    evaluate(&predicted, &truth)
}

#[cfg(test)]
mod tests {
    use super::{
        IndexSource, PipelineSpec, build_index_file, evaluate_files, run_pipeline,
        run_pipeline_json,
    };
    use gtnn_core::GtError;
    use gtnn_index::SummationMode;
    use gtnn_io::{LoadOptions, read_hit_lists};
    use gtnn_search::GroupTestConfig;
    use std::fs;
    use std::path::Path;

    fn write_fixtures(dir: &Path) {
        fs::write(dir.join("data.txt"), "1,0\n0,1\n1,1\n0,0\n9,9\n").expect("data fixture");
        fs::write(dir.join("queries.txt"), "1 , 1\n0,0.5\n").expect("query fixture");
    }

    fn spec(dir: &Path) -> PipelineSpec {
        PipelineSpec {
            dataset: "toy".to_string(),
            data_path: dir.join("data.txt"),
            query_path: dir.join("queries.txt"),
            result_root: dir.join("out"),
            n: 4,
            nq: 2,
            dim: 2,
            search: GroupTestConfig::with_rho(1.0),
            ..PipelineSpec::default()
        }
    }

    #[test]
    fn pipeline_writes_results_matching_oracle() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        write_fixtures(dir.path());

        let report = run_pipeline(&spec(dir.path())).expect("pipeline should run");
        assert!(report.run_dir.ends_with("DoubleGroupTestingSum/toy_rho1.000000"));
        assert_eq!(report.index_source, IndexSource::Built);
        assert!(report.evaluation.is_exact());
        assert_eq!(report.metrics.mean_precision, 1.0);
        assert_eq!(report.metrics.mean_recall, 1.0);
        assert_eq!(report.metrics.queries, 2);

        let truth = read_hit_lists(&report.ground_truth_path).expect("ground truth readable");
        assert_eq!(truth.get(0), Some(&[0, 1, 2][..]));
        assert_eq!(truth.get(1), Some(&[][..]));
        let predicted = read_hit_lists(&report.results_path).expect("results readable");
        assert_eq!(predicted.sorted(), truth);
        assert!(report.report_path.is_file());
    }

    #[test]
    fn transposed_inputs_are_capped_at_n_and_nq_vectors() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        fs::write(dir.path().join("data_t.txt"), "1,0,1,0,9\n0,1,1,0,9\n").expect("data fixture");
        fs::write(dir.path().join("queries_t.txt"), "1,0,7\n1,0.5,7\n").expect("query fixture");

        let report = run_pipeline(&PipelineSpec {
            data_path: dir.path().join("data_t.txt"),
            query_path: dir.path().join("queries_t.txt"),
            transpose_data: true,
            transpose_queries: true,
            ..spec(dir.path())
        })
        .expect("transposed pipeline should run");

        assert_eq!(report.metrics.queries, 2);
        assert!(report.evaluation.is_exact());
        let truth = read_hit_lists(&report.ground_truth_path).expect("ground truth readable");
        assert_eq!(truth.get(0), Some(&[0, 1, 2][..]));
        assert_eq!(truth.get(1), Some(&[][..]));
    }

    #[test]
    fn pipeline_reuses_saved_index() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        write_fixtures(dir.path());
        let index_path = dir.path().join("x_cum.txt");

        let first = run_pipeline(&PipelineSpec {
            save_index: Some(index_path.clone()),
            ..spec(dir.path())
        })
        .expect("first run should succeed");
        let second = run_pipeline(&PipelineSpec {
            load_index: Some(index_path),
            ..spec(dir.path())
        })
        .expect("second run should succeed");

        assert_eq!(second.index_source, IndexSource::Loaded);
        assert_eq!(second.metrics.ntests, first.metrics.ntests);
    }

    #[test]
    fn missing_data_file_aborts_with_io_error() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let err = run_pipeline(&spec(dir.path())).expect_err("missing data should fail");
        assert!(matches!(err, GtError::Io { .. }));
    }

    #[test]
    fn spec_validation_rejects_missing_fields() {
        let err = PipelineSpec::default()
            .validate()
            .expect_err("empty spec should fail");
        assert!(err.to_string().contains("pipeline.dataset is required"));

        let dir = tempfile::tempdir().expect("tempdir should be created");
        let err = PipelineSpec {
            dim: 0,
            ..spec(dir.path())
        }
        .validate()
        .expect_err("zero dim should fail");
        assert!(err.to_string().contains("dim"));
    }

    #[test]
    fn pipeline_json_uses_defaults_for_omitted_fields() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        write_fixtures(dir.path());
        let raw = serde_json::json!({
            "dataset": "toy",
            "data_path": dir.path().join("data.txt"),
            "query_path": dir.path().join("queries.txt"),
            "result_root": dir.path().join("out"),
            "n": 4,
            "nq": 2,
            "dim": 2,
            "search": { "rho": 1.0, "batch_size": 1 }
        })
        .to_string();

        let report = run_pipeline_json(&raw).expect("pipeline JSON should run");
        assert_eq!(report.search.batches, 2);

        let err = run_pipeline_json("{\"unknown\": 1}").expect_err("unknown field should fail");
        assert!(err.to_string().contains("invalid pipeline JSON"));
    }

    #[test]
    fn index_and_eval_helpers_work_on_files() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        write_fixtures(dir.path());
        let output = dir.path().join("x_cum.txt");

        let report = build_index_file(
            &dir.path().join("data.txt"),
            &LoadOptions::new(4, 2).with_max_rows(4),
            SummationMode::Compensated,
            &output,
        )
        .expect("index should build");
        assert_eq!(report.rows, 4);
        assert_eq!(
            fs::read_to_string(&output).expect("index readable"),
            "1,0\n1,1\n2,2\n2,2\n"
        );

        fs::write(dir.path().join("pred.txt"), "2,1\n\n").expect("pred fixture");
        fs::write(dir.path().join("truth.txt"), "1,2,3\n\n").expect("truth fixture");
        let summary = evaluate_files(&dir.path().join("pred.txt"), &dir.path().join("truth.txt"))
            .expect("evaluation should succeed");
        assert_eq!(summary.queries(), 2);
        assert_eq!(summary.per_query[0].recall, 2.0 / 3.0);
        assert_eq!(summary.mean_precision, 1.0);
    }
}
