// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Delimited-text persistence for matrices, prefix indexes, and run results.

pub mod index_store;
pub mod matrix_store;
pub mod results;

pub use index_store::{load_index, save_index};
pub use matrix_store::{LoadOptions, load_matrix, parse_matrix, save_matrix, write_matrix};
pub use results::{
    AGG_FILE, GROUND_TRUTH_FILE, RESULTS_FILE, ResultLayout, ResultWriter, read_hit_lists,
    write_agg_report, write_hit_lists,
};
