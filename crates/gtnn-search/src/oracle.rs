// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use gtnn_core::{DenseMatrix, GtError, HitLists, OracleStats, checked_increment, dot, elapsed_us};
use std::time::Instant;

/// Exhaustive reference search: one dot product per (data, query) pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BruteForceOracle {
    rho: f64,
}

/// Ground-truth hits and counters from [`BruteForceOracle::exhaustive_search`].
#[derive(Clone, Debug, PartialEq)]
pub struct OracleOutcome {
    /// Hits per query in ascending data index order.
    pub hits: HitLists,
    pub stats: OracleStats,
}

impl BruteForceOracle {
    pub fn new(rho: f64) -> Result<Self, GtError> {
        if !rho.is_finite() {
            return Err(GtError::invalid_input(format!(
                "BruteForceOracle rho must be finite; got {rho}"
            )));
        }
        Ok(Self { rho })
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }

    /// Scans every data row for every query. Latency is measured per query.
    pub fn exhaustive_search(
        &self,
        data: &DenseMatrix,
        queries: &DenseMatrix,
    ) -> Result<OracleOutcome, GtError> {
        if data.cols() != queries.cols() {
            return Err(GtError::invalid_input(format!(
                "query dim {} does not match data dim {}",
                queries.cols(),
                data.cols()
            )));
        }

        let mut hits = HitLists::with_queries(queries.rows());
        let mut stats = OracleStats::default();

        for (q, query) in queries.iter_rows().enumerate() {
            let started_at = Instant::now();
            let mut query_hits = 0usize;
            for (i, row) in data.iter_rows().enumerate() {
                checked_increment(&mut stats.dot_products, "dot_products")?;
                if dot(row, query) >= self.rho {
                    hits.push(q, i);
                    query_hits += 1;
                }
            }
            let latency_us = elapsed_us(started_at);
            stats.total_latency_us = stats.total_latency_us.saturating_add(latency_us);
            stats.hits += query_hits;
            tracing::debug!(query = q, hits = query_hits, latency_us, "oracle query scanned");
        }

        tracing::info!(
            queries = queries.rows(),
            hits = stats.hits,
            latency_us = stats.total_latency_us,
            "oracle search finished"
        );
        Ok(OracleOutcome { hits, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::BruteForceOracle;
    use gtnn_core::{DenseMatrix, GtError};

    #[test]
    fn hits_are_ascending_and_inclusive_at_rho() {
        let data = DenseMatrix::from_rows(&[[2.0, 0.0], [0.5, 0.5], [1.0, 1.0], [0.0, 3.0]])
            .expect("rows valid");
        let queries = DenseMatrix::from_rows(&[[1.0, 1.0], [0.0, 0.0]]).expect("rows valid");
        let oracle = BruteForceOracle::new(2.0).expect("oracle builds");

        let outcome = oracle
            .exhaustive_search(&data, &queries)
            .expect("search should succeed");
        assert_eq!(outcome.hits.get(0), Some(&[0, 2, 3][..]));
        assert_eq!(outcome.hits.get(1), Some(&[][..]));
        assert_eq!(outcome.stats.dot_products, 8);
        assert_eq!(outcome.stats.hits, 3);
    }

    #[test]
    fn negative_values_are_scanned_without_rejection() {
        let data = DenseMatrix::from_rows(&[[-1.0], [2.0]]).expect("rows valid");
        let queries = DenseMatrix::from_rows(&[[-1.0]]).expect("rows valid");
        let outcome = BruteForceOracle::new(0.5)
            .expect("oracle builds")
            .exhaustive_search(&data, &queries)
            .expect("search should succeed");
        assert_eq!(outcome.hits.get(0), Some(&[0][..]));
    }

    #[test]
    fn rejects_non_finite_rho_and_dim_mismatch() {
        let err = BruteForceOracle::new(f64::INFINITY).expect_err("infinite rho should fail");
        assert!(matches!(err, GtError::InvalidInput(_)));

        let data = DenseMatrix::from_rows(&[[1.0, 2.0]]).expect("rows valid");
        let queries = DenseMatrix::from_rows(&[[1.0]]).expect("rows valid");
        let err = BruteForceOracle::new(1.0)
            .expect("oracle builds")
            .exhaustive_search(&data, &queries)
            .expect_err("dim mismatch should fail");
        assert!(err.to_string().contains("query dim 1 does not match data dim 2"));
    }
}
