// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Shared types for group-testing threshold similarity search.

pub mod dataset;
pub mod diagnostics;
pub mod error;
pub mod matrix;
pub mod results;

pub use dataset::{Dataset, DatasetShape};
pub use diagnostics::{
    GROUP_TESTING_ALGORITHM, OracleStats, RunMetrics, SearchStats, elapsed_us,
};
pub use error::{GtError, checked_increment};
pub use matrix::{DenseMatrix, dot};
pub use results::HitLists;
