// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Prefix-sum index over matrix rows and O(dim) aggregate similarity of
//! rectangular (data x query) blocks.

pub mod block;
pub mod prefix;

pub use block::{Block, BlockSum, block_sum, corner};
pub use prefix::{PrefixIndex, SummationMode};
