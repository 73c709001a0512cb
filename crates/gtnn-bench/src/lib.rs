// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Deterministic workloads shared by the benchmarks.

use gtnn_core::{DenseMatrix, GtError};

pub fn lcg_next(state: &mut u64) -> u64 {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    *state
}

/// Uniform value in `[0, 1)` from the top 53 bits of the generator.
pub fn lcg_unit(state: &mut u64) -> f64 {
    (lcg_next(state) >> 11) as f64 / (1u64 << 53) as f64
}

/// Sparse non-negative vectors: each entry is non-zero with probability
/// `density`, so pairwise similarities are mostly small and most blocks prune.
pub fn sparse_matrix(
    rows: usize,
    dim: usize,
    density: f64,
    seed: u64,
) -> Result<DenseMatrix, GtError> {
    let mut state = seed;
    let values = (0..rows * dim)
        .map(|_| {
            if lcg_unit(&mut state) < density {
                lcg_unit(&mut state)
            } else {
                0.0
            }
        })
        .collect::<Vec<_>>();
    DenseMatrix::from_vec(values, rows, dim)
}
