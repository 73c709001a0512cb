// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use gtnn_core::{GtError, HitLists, RunMetrics};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const RESULTS_FILE: &str = "results.txt";
pub const GROUND_TRUTH_FILE: &str = "ground_truth.txt";
pub const AGG_FILE: &str = "agg.txt";

/// Where one run's outputs live:
/// `<root>/<algorithm>/<dataset>_rho<rho with six decimals>/`.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultLayout {
    pub root: PathBuf,
    pub algorithm: String,
    pub dataset: String,
    pub rho: f64,
}

impl ResultLayout {
    pub fn new(
        root: impl Into<PathBuf>,
        algorithm: impl Into<String>,
        dataset: impl Into<String>,
        rho: f64,
    ) -> Self {
        Self {
            root: root.into(),
            algorithm: algorithm.into(),
            dataset: dataset.into(),
            rho,
        }
    }

    pub fn run_dir(&self) -> PathBuf {
        self.root
            .join(&self.algorithm)
            .join(format!("{}_rho{:.6}", self.dataset, self.rho))
    }
}

/// Writes the hit lists and aggregate report of one run.
#[derive(Clone, Debug)]
pub struct ResultWriter {
    dir: PathBuf,
}

impl ResultWriter {
    /// Creates the run directory and any missing parents.
    pub fn create(layout: &ResultLayout) -> Result<Self, GtError> {
        let dir = layout.run_dir();
        fs::create_dir_all(&dir).map_err(|source| {
            GtError::io(format!("failed to create '{}'", dir.display()), source)
        })?;
        tracing::debug!(dir = %dir.display(), "result directory ready");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write_predicted(&self, hits: &HitLists) -> Result<PathBuf, GtError> {
        let path = self.dir.join(RESULTS_FILE);
        write_hit_lists(&path, hits)?;
        Ok(path)
    }

    pub fn write_ground_truth(&self, hits: &HitLists) -> Result<PathBuf, GtError> {
        let path = self.dir.join(GROUND_TRUTH_FILE);
        write_hit_lists(&path, hits)?;
        Ok(path)
    }

    pub fn write_report(&self, metrics: &RunMetrics) -> Result<PathBuf, GtError> {
        let path = self.dir.join(AGG_FILE);
        write_agg_report(&path, metrics)?;
        Ok(path)
    }
}

/// One line per query: comma-separated data indices, empty when no hits.
pub fn write_hit_lists(path: &Path, hits: &HitLists) -> Result<(), GtError> {
    write_with(path, |writer| {
        for list in hits.iter() {
            let mut values = list.iter();
            if let Some(first) = values.next() {
                write!(writer, "{first}")?;
            }
            for value in values {
                write!(writer, ",{value}")?;
            }
            writeln!(writer)?;
        }
        Ok(())
    })
}

/// Reads a file written by [`write_hit_lists`].
pub fn read_hit_lists(path: &Path) -> Result<HitLists, GtError> {
    let file = File::open(path)
        .map_err(|source| GtError::io(format!("failed to open '{}'", path.display()), source))?;

    let mut per_query = Vec::new();
    for (line_idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| {
            GtError::io(format!("failed to read '{}'", path.display()), source)
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            per_query.push(Vec::new());
            continue;
        }
        let list = trimmed
            .split(',')
            .map(str::trim)
            .enumerate()
            .map(|(col_idx, token)| {
                token.parse::<usize>().map_err(|_| {
                    GtError::parse(format!(
                        "'{}' line {} column {} is not a valid index: '{token}'",
                        path.display(),
                        line_idx + 1,
                        col_idx + 1
                    ))
                })
            })
            .collect::<Result<Vec<_>, GtError>>()?;
        per_query.push(list);
    }
    Ok(HitLists::from_lists(per_query))
}

/// Plain-text `key: value` report of one run.
pub fn write_agg_report(path: &Path, metrics: &RunMetrics) -> Result<(), GtError> {
    write_with(path, |writer| {
        writeln!(writer, "algorithm: {}", metrics.algorithm)?;
        writeln!(writer, "queries: {}", metrics.queries)?;
        writeln!(
            writer,
            "mean_search_latency_us: {}",
            metrics.mean_search_latency_us()
        )?;
        writeln!(
            writer,
            "mean_oracle_latency_us: {}",
            metrics.mean_oracle_latency_us()
        )?;
        writeln!(writer, "mean_precision: {}", metrics.mean_precision)?;
        writeln!(writer, "mean_recall: {}", metrics.mean_recall)?;
        writeln!(writer, "ntests: {}", metrics.ntests)?;
        Ok(())
    })
}

fn write_with<F>(path: &Path, body: F) -> Result<(), GtError>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    let file = File::create(path)
        .map_err(|source| GtError::io(format!("failed to create '{}'", path.display()), source))?;
    let mut writer = BufWriter::new(file);
    body(&mut writer)
        .and_then(|()| writer.flush())
        .map_err(|source| GtError::io(format!("failed to write '{}'", path.display()), source))
}

#[cfg(test)]
mod tests {
    use super::{
        AGG_FILE, GROUND_TRUTH_FILE, RESULTS_FILE, ResultLayout, ResultWriter, read_hit_lists,
        write_hit_lists,
    };
    use gtnn_core::{GROUP_TESTING_ALGORITHM, GtError, HitLists, RunMetrics};
    use std::fs;

    #[test]
    fn run_dir_formats_rho_with_six_decimals() {
        let layout = ResultLayout::new("/tmp/out", GROUP_TESTING_ALGORITHM, "sift", 0.5);
        assert_eq!(
            layout.run_dir(),
            std::path::Path::new("/tmp/out/DoubleGroupTestingSum/sift_rho0.500000")
        );
    }

    #[test]
    fn writer_creates_nested_directories_idempotently() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let layout = ResultLayout::new(dir.path().join("a").join("b"), "algo", "toy", 1.0);

        let first = ResultWriter::create(&layout).expect("first create should succeed");
        let second = ResultWriter::create(&layout).expect("second create should succeed");
        assert_eq!(first.dir(), second.dir());
        assert!(first.dir().is_dir());
    }

    #[test]
    fn hit_lists_round_trip_with_empty_lines() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join(RESULTS_FILE);
        let hits = HitLists::from_lists(vec![vec![2, 1, 0], vec![], vec![7]]);

        write_hit_lists(&path, &hits).expect("write should succeed");
        assert_eq!(
            fs::read_to_string(&path).expect("file readable"),
            "2,1,0\n\n7\n"
        );
        assert_eq!(read_hit_lists(&path).expect("read should succeed"), hits);
    }

    #[test]
    fn malformed_index_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join(GROUND_TRUTH_FILE);
        fs::write(&path, "1,2\n3,-4\n").expect("fixture writes");

        let err = read_hit_lists(&path).expect_err("negative index should fail");
        assert!(matches!(err, GtError::Parse(_)));
        assert!(err.to_string().contains("line 2 column 2"));
    }

    #[test]
    fn run_outputs_land_in_run_directory() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let layout = ResultLayout::new(dir.path(), GROUP_TESTING_ALGORITHM, "toy", 1.0);
        let writer = ResultWriter::create(&layout).expect("create should succeed");

        let hits = HitLists::from_lists(vec![vec![0, 1]]);
        writer.write_predicted(&hits).expect("results write");
        writer.write_ground_truth(&hits).expect("ground truth write");
        let report = writer
            .write_report(&RunMetrics {
                queries: 1,
                ntests: 3,
                total_search_latency_us: 8,
                total_oracle_latency_us: 20,
                mean_precision: 1.0,
                mean_recall: 1.0,
                ..RunMetrics::default()
            })
            .expect("report write");

        let text = fs::read_to_string(report).expect("report readable");
        assert!(text.starts_with("algorithm: DoubleGroupTestingSum\n"));
        assert!(text.contains("mean_search_latency_us: 8\n"));
        assert!(text.contains("mean_oracle_latency_us: 20\n"));
        assert!(text.contains("ntests: 3\n"));
        assert!(writer.dir().join(RESULTS_FILE).is_file());
        assert!(writer.dir().join(GROUND_TRUTH_FILE).is_file());
        assert!(writer.dir().join(AGG_FILE).is_file());
    }
}
