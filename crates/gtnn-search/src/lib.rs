// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Threshold similarity search by group testing, with an exhaustive oracle
//! for ground truth.

pub mod group_testing;
pub mod oracle;
pub mod queries;

pub use group_testing::{
    DEFAULT_PRUNE_SLACK, GroupTestConfig, GroupTestEngine, SearchOutcome, batch_ranges,
};
pub use oracle::{BruteForceOracle, OracleOutcome};
pub use queries::QuerySet;
