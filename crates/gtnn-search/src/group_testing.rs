// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::QuerySet;
use gtnn_core::{
    DenseMatrix, GtError, HitLists, SearchStats, checked_increment, dot, elapsed_us,
};
use gtnn_index::{Block, BlockSum, PrefixIndex, SummationMode, block_sum};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use std::time::Instant;

/// Default relative slack applied to the pruning threshold.
pub const DEFAULT_PRUNE_SLACK: f64 = 1e-9;

/// Configuration for [`GroupTestEngine`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct GroupTestConfig {
    /// Similarity threshold; a pair is a hit when `x . q >= rho`.
    pub rho: f64,
    /// Queries per top-level invocation. Zero means one batch for all queries.
    pub batch_size: usize,
    /// A block is pruned only when its aggregate is below
    /// `rho - prune_slack * scale`. Zero applies the bare `aggregate < rho` rule.
    pub prune_slack: f64,
    /// Accumulation used for data and query prefix indexes.
    pub summation: SummationMode,
    /// Reject negative or non-finite inputs before searching.
    pub check_non_negative: bool,
    /// Run batches on the rayon pool when the `rayon` feature is enabled.
    pub parallel_batches: bool,
}

impl Default for GroupTestConfig {
    fn default() -> Self {
        Self {
            rho: 1.0,
            batch_size: 0,
            prune_slack: DEFAULT_PRUNE_SLACK,
            summation: SummationMode::Plain,
            check_non_negative: true,
            parallel_batches: false,
        }
    }
}

impl GroupTestConfig {
    pub fn with_rho(rho: f64) -> Self {
        Self {
            rho,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), GtError> {
        if !self.rho.is_finite() {
            return Err(GtError::invalid_input(format!(
                "GroupTestConfig.rho must be finite; got {}",
                self.rho
            )));
        }
        if !self.prune_slack.is_finite() || self.prune_slack < 0.0 {
            return Err(GtError::invalid_input(format!(
                "GroupTestConfig.prune_slack must be finite and >= 0; got {}",
                self.prune_slack
            )));
        }
        Ok(())
    }
}

/// Hits and counters produced by one search call.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchOutcome {
    /// Hits per query, in visiting order.
    pub hits: HitLists,
    pub stats: SearchStats,
    /// Worker threads used, when batches ran in parallel.
    pub thread_count: Option<usize>,
}

/// Exact threshold search that prunes (data x query) blocks by their
/// aggregate similarity.
///
/// Requires every pairwise dot product to be non-negative: a block whose
/// aggregate is below `rho` then cannot contain any single pair at or above
/// `rho`. Search takes `&self`; all per-call state lives in the call.
#[derive(Clone, Debug)]
pub struct GroupTestEngine<'a> {
    data: &'a DenseMatrix,
    index: PrefixIndex,
    config: GroupTestConfig,
}

impl<'a> GroupTestEngine<'a> {
    /// Builds the data prefix index and validates the configuration.
    pub fn new(data: &'a DenseMatrix, config: GroupTestConfig) -> Result<Self, GtError> {
        config.validate()?;
        if config.check_non_negative {
            data.ensure_non_negative("data matrix")?;
        }
        let index = PrefixIndex::build_with(data, config.summation)?;
        warn_if_degenerate(&config);
        Ok(Self {
            data,
            index,
            config,
        })
    }

    /// Reuses a previously built (or restored) data prefix index.
    pub fn with_index(
        data: &'a DenseMatrix,
        index: PrefixIndex,
        config: GroupTestConfig,
    ) -> Result<Self, GtError> {
        config.validate()?;
        if index.len() != data.rows() || index.dim() != data.cols() {
            return Err(GtError::invalid_input(format!(
                "data index shape {}x{} does not match data matrix shape {}x{}",
                index.len(),
                index.dim(),
                data.rows(),
                data.cols()
            )));
        }
        if config.check_non_negative {
            data.ensure_non_negative("data matrix")?;
        }
        warn_if_degenerate(&config);
        Ok(Self {
            data,
            index,
            config,
        })
    }

    pub fn data(&self) -> &DenseMatrix {
        self.data
    }

    pub fn index(&self) -> &PrefixIndex {
        &self.index
    }

    pub fn config(&self) -> &GroupTestConfig {
        &self.config
    }

    pub fn rho(&self) -> f64 {
        self.config.rho
    }

    /// Validates a query matrix and builds its prefix index.
    pub fn prepare_queries<'q>(&self, queries: &'q DenseMatrix) -> Result<QuerySet<'q>, GtError> {
        if queries.cols() != self.data.cols() {
            return Err(GtError::invalid_input(format!(
                "query dim {} does not match data dim {}",
                queries.cols(),
                self.data.cols()
            )));
        }
        if self.config.check_non_negative {
            queries.ensure_non_negative("query matrix")?;
        }
        QuerySet::with_summation(queries, self.config.summation, self.config.check_non_negative)
    }

    /// Searches an externally supplied query matrix, indexing it for this
    /// call only.
    pub fn search_matrix(&self, queries: &DenseMatrix) -> Result<SearchOutcome, GtError> {
        let prepared = self.prepare_queries(queries)?;
        self.search(&prepared)
    }

    /// Searches every query in `queries` using the configured batch size.
    pub fn search(&self, queries: &QuerySet<'_>) -> Result<SearchOutcome, GtError> {
        self.search_with_batch_size(queries, self.config.batch_size)
    }

    /// Searches with an explicit batch size. Zero means a single batch.
    ///
    /// Batch size changes latency bookkeeping only; the hit sets are the same
    /// for every batch size.
    pub fn search_with_batch_size(
        &self,
        queries: &QuerySet<'_>,
        batch_size: usize,
    ) -> Result<SearchOutcome, GtError> {
        if queries.dim() != self.data.cols() {
            return Err(GtError::invalid_input(format!(
                "query dim {} does not match data dim {}",
                queries.dim(),
                self.data.cols()
            )));
        }
        if queries.summation() != self.config.summation {
            return Err(GtError::invalid_input(format!(
                "query index summation {:?} does not match engine summation {:?}",
                queries.summation(),
                self.config.summation
            )));
        }
        if self.config.check_non_negative && !queries.is_non_negative() {
            queries.matrix().ensure_non_negative("query matrix")?;
        }

        let ranges = batch_ranges(queries.len(), batch_size);
        let parallel = can_use_parallel(&self.config, ranges.len());
        tracing::debug!(
            queries = queries.len(),
            batches = ranges.len(),
            parallel,
            rho = self.config.rho,
            "starting group-testing search"
        );

        let batches = if parallel {
            self.run_parallel(queries, &ranges)?
        } else {
            ranges
                .iter()
                .map(|&(start, end)| self.search_batch(queries, start, end))
                .collect::<Result<Vec<_>, GtError>>()?
        };

        let mut hits = HitLists::default();
        let mut stats = SearchStats::default();
        for batch in batches {
            hits.append(batch.hits);
            stats.absorb(batch.stats)?;
        }

        #[cfg(feature = "rayon")]
        let thread_count = parallel.then(rayon::current_num_threads);
        #[cfg(not(feature = "rayon"))]
        let thread_count = None;

        tracing::info!(
            queries = hits.len(),
            hits = stats.hits,
            ntests = stats.recursive_calls,
            blocks_pruned = stats.blocks_pruned,
            pairs_pruned = stats.pairs_pruned,
            latency_us = stats.total_latency_us,
            "group-testing search finished"
        );

        Ok(SearchOutcome {
            hits,
            stats,
            thread_count,
        })
    }

    #[cfg(feature = "rayon")]
    fn run_parallel(
        &self,
        queries: &QuerySet<'_>,
        ranges: &[(usize, usize)],
    ) -> Result<Vec<BatchOutcome>, GtError> {
        ranges
            .par_iter()
            .map(|&(start, end)| self.search_batch(queries, start, end))
            .collect()
    }

    #[cfg(not(feature = "rayon"))]
    fn run_parallel(
        &self,
        queries: &QuerySet<'_>,
        ranges: &[(usize, usize)],
    ) -> Result<Vec<BatchOutcome>, GtError> {
        ranges
            .iter()
            .map(|&(start, end)| self.search_batch(queries, start, end))
            .collect()
    }

    /// One top-level invocation over data `[0, n-1]` x queries `[start, end]`.
    ///
    /// Blocks are visited depth-first from an explicit stack. Children are
    /// pushed in reverse so they pop in the order a recursive descent would
    /// visit them, which keeps hit insertion order identical.
    fn search_batch(
        &self,
        queries: &QuerySet<'_>,
        start: usize,
        end: usize,
    ) -> Result<BatchOutcome, GtError> {
        let started_at = Instant::now();
        let mut hits = HitLists::with_queries(end - start + 1);
        let mut stats = SearchStats {
            batches: 1,
            ..SearchStats::default()
        };

        let mut stack = vec![Block::new(0, self.data.rows() - 1, start, end)];
        while let Some(block) = stack.pop() {
            checked_increment(&mut stats.blocks_evaluated, "blocks_evaluated")?;
            let sum = block_sum(&self.index, queries.index(), block);
            if !sum.value.is_finite() {
                return Err(GtError::numerical_issue(format!(
                    "non-finite aggregate similarity {} for block {block:?}",
                    sum.value
                )));
            }

            if self.is_pruned(sum) {
                checked_increment(&mut stats.blocks_pruned, "blocks_pruned")?;
                stats.pairs_pruned = stats
                    .pairs_pruned
                    .checked_add(block.pair_count())
                    .ok_or_else(|| GtError::resource_limit("pairs_pruned counter overflow"))?;
                continue;
            }

            if block.is_leaf() {
                let similarity = dot(
                    self.data.row(block.data_start),
                    queries.matrix().row(block.query_start),
                );
                if similarity >= self.config.rho {
                    hits.push(block.query_start - start, block.data_start);
                    checked_increment(&mut stats.hits, "hits")?;
                }
                continue;
            }

            checked_increment(&mut stats.recursive_calls, "ntests")?;
            push_children(&mut stack, block);
        }

        let latency_us = elapsed_us(started_at);
        stats.total_latency_us = latency_us;
        stats.batch_latencies_us.push(latency_us);
        tracing::debug!(
            start,
            end,
            hits = stats.hits,
            ntests = stats.recursive_calls,
            latency_us,
            "batch searched"
        );

        Ok(BatchOutcome { hits, stats })
    }

    #[inline]
    fn is_pruned(&self, sum: BlockSum) -> bool {
        sum.value < self.config.rho - self.config.prune_slack * sum.scale
    }
}

fn warn_if_degenerate(config: &GroupTestConfig) {
    if config.rho <= 0.0 && config.check_non_negative {
        tracing::warn!(
            rho = config.rho,
            "rho <= 0 with non-negative inputs: every pair is a hit and nothing prunes"
        );
    }
}

#[derive(Debug)]
struct BatchOutcome {
    hits: HitLists,
    stats: SearchStats,
}

#[cfg(feature = "rayon")]
fn can_use_parallel(config: &GroupTestConfig, batches: usize) -> bool {
    config.parallel_batches && batches > 1
}

#[cfg(not(feature = "rayon"))]
fn can_use_parallel(config: &GroupTestConfig, _batches: usize) -> bool {
    if config.parallel_batches {
        tracing::warn!("parallel_batches requested but the rayon feature is disabled");
    }
    false
}

/// Contiguous inclusive query ranges of at most `batch_size` queries.
pub fn batch_ranges(nq: usize, batch_size: usize) -> Vec<(usize, usize)> {
    if nq == 0 {
        return Vec::new();
    }
    let batch_size = if batch_size == 0 { nq } else { batch_size };
    (0..nq)
        .step_by(batch_size)
        .map(|start| (start, (start + batch_size - 1).min(nq - 1)))
        .collect()
}

/// Upper middle of `[lo, hi]`: an odd-sized range puts the extra element in
/// the upper half.
#[inline]
fn upper_mid(lo: usize, hi: usize) -> usize {
    lo + (hi - lo + 1) / 2
}

/// Pushes the sub-blocks of a non-leaf block so that they pop upper halves
/// first. Exactly one of the three splits applies.
fn push_children(stack: &mut Vec<Block>, block: Block) {
    let Block {
        data_start: a,
        data_end: b,
        query_start: c,
        query_end: d,
    } = block;

    if a == b {
        let mid_q = upper_mid(c, d);
        stack.push(Block::new(a, b, c, mid_q - 1));
        stack.push(Block::new(a, b, mid_q, d));
    } else if c == d {
        let mid_d = upper_mid(a, b);
        stack.push(Block::new(a, mid_d - 1, c, d));
        stack.push(Block::new(mid_d, b, c, d));
    } else {
        let mid_d = upper_mid(a, b);
        let mid_q = upper_mid(c, d);
        stack.push(Block::new(a, mid_d - 1, c, mid_q - 1));
        stack.push(Block::new(mid_d, b, c, mid_q - 1));
        stack.push(Block::new(a, mid_d - 1, mid_q, d));
        stack.push(Block::new(mid_d, b, mid_q, d));
    }
}
