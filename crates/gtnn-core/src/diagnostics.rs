// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::GtError;
use std::borrow::Cow;

/// Name recorded for the group-testing engine in reports and result paths.
pub const GROUP_TESTING_ALGORITHM: &str = "DoubleGroupTestingSum";

/// Counters describing one group-testing search run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Non-leaf blocks that survived pruning and were subdivided (`ntests`).
    pub recursive_calls: usize,
    /// Blocks whose aggregate similarity was tested against the threshold.
    pub blocks_evaluated: usize,
    /// Blocks discarded because their aggregate fell below the threshold.
    pub blocks_pruned: usize,
    /// (data, query) pairs ruled out by pruned blocks without a dot product.
    pub pairs_pruned: usize,
    /// Recorded (data, query) hits.
    pub hits: usize,
    /// Top-level invocations, one per query batch.
    pub batches: usize,
    /// Wall time spent inside batch searches, in microseconds.
    pub total_latency_us: u64,
    /// Wall time per batch, in microseconds, in batch order.
    pub batch_latencies_us: Vec<u64>,
}

impl SearchStats {
    /// Folds the counters of `other` into `self`.
    pub fn absorb(&mut self, other: SearchStats) -> Result<(), GtError> {
        self.recursive_calls = checked_sum(self.recursive_calls, other.recursive_calls, "ntests")?;
        self.blocks_evaluated =
            checked_sum(self.blocks_evaluated, other.blocks_evaluated, "blocks_evaluated")?;
        self.blocks_pruned = checked_sum(self.blocks_pruned, other.blocks_pruned, "blocks_pruned")?;
        self.pairs_pruned = checked_sum(self.pairs_pruned, other.pairs_pruned, "pairs_pruned")?;
        self.hits = checked_sum(self.hits, other.hits, "hits")?;
        self.batches = checked_sum(self.batches, other.batches, "batches")?;
        self.total_latency_us = self.total_latency_us.saturating_add(other.total_latency_us);
        self.batch_latencies_us.extend(other.batch_latencies_us);
        Ok(())
    }
}

/// Counters describing one exhaustive oracle run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OracleStats {
    pub dot_products: usize,
    pub hits: usize,
    pub total_latency_us: u64,
}

/// Aggregate report for one search + oracle + evaluation run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct RunMetrics {
    pub algorithm: Cow<'static, str>,
    pub queries: usize,
    pub ntests: usize,
    pub total_search_latency_us: u64,
    pub total_oracle_latency_us: u64,
    pub mean_precision: f64,
    pub mean_recall: f64,
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self {
            algorithm: Cow::Borrowed(GROUP_TESTING_ALGORITHM),
            queries: 0,
            ntests: 0,
            total_search_latency_us: 0,
            total_oracle_latency_us: 0,
            mean_precision: 0.0,
            mean_recall: 0.0,
        }
    }
}

impl RunMetrics {
    /// Mean pool-search latency per query, in microseconds.
    pub fn mean_search_latency_us(&self) -> f64 {
        per_query(self.total_search_latency_us, self.queries)
    }

    /// Mean exhaustive-search latency per query, in microseconds.
    pub fn mean_oracle_latency_us(&self) -> f64 {
        per_query(self.total_oracle_latency_us, self.queries)
    }
}

fn per_query(total: u64, queries: usize) -> f64 {
    if queries == 0 {
        0.0
    } else {
        total as f64 / queries as f64
    }
}

fn checked_sum(left: usize, right: usize, name: &str) -> Result<usize, GtError> {
    left.checked_add(right)
        .ok_or_else(|| GtError::resource_limit(format!("{name} counter overflow")))
}

/// Microseconds elapsed since `started_at`, saturating at `u64::MAX`.
pub fn elapsed_us(started_at: std::time::Instant) -> u64 {
    u64::try_from(started_at.elapsed().as_micros()).unwrap_or(u64::MAX)
}
