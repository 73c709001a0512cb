// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::PrefixIndex;
use gtnn_core::dot;

/// Inclusive rectangle of the (data index x query index) space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block {
    pub data_start: usize,
    pub data_end: usize,
    pub query_start: usize,
    pub query_end: usize,
}

impl Block {
    pub const fn new(
        data_start: usize,
        data_end: usize,
        query_start: usize,
        query_end: usize,
    ) -> Self {
        Self {
            data_start,
            data_end,
            query_start,
            query_end,
        }
    }

    /// True when the block is a single (data, query) pair.
    pub const fn is_leaf(&self) -> bool {
        self.data_start == self.data_end && self.query_start == self.query_end
    }

    /// Number of (data, query) pairs covered.
    pub const fn pair_count(&self) -> usize {
        (self.data_end - self.data_start + 1) * (self.query_end - self.query_start + 1)
    }
}

/// Aggregate similarity of a block and the magnitude it was derived from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlockSum {
    /// Sum of `x[i] . q[j]` over every pair in the block.
    pub value: f64,
    /// Largest corner product used by inclusion-exclusion. Rounding error in
    /// `value` scales with this magnitude.
    pub scale: f64,
}

/// `S(data_rows, query_rows)`: dot product of the sum of the first
/// `data_rows` data vectors with the sum of the first `query_rows` queries.
/// Either count being zero contributes the zero vector.
#[inline]
pub fn corner(
    data: &PrefixIndex,
    queries: &PrefixIndex,
    data_rows: usize,
    query_rows: usize,
) -> f64 {
    match (data.prefix(data_rows), queries.prefix(query_rows)) {
        (Some(x), Some(q)) => dot(x, q),
        _ => 0.0,
    }
}

/// Aggregate similarity of `block` by 2-D inclusion-exclusion over corners.
///
/// Cost is four O(dim) dot products regardless of block size.
pub fn block_sum(data: &PrefixIndex, queries: &PrefixIndex, block: Block) -> BlockSum {
    debug_assert!(block.data_start <= block.data_end);
    debug_assert!(block.query_start <= block.query_end);

    let data_hi = block.data_end + 1;
    let query_hi = block.query_end + 1;
    let outer = corner(data, queries, data_hi, query_hi);

    let mut value = outer;
    if block.data_start > 0 {
        value -= corner(data, queries, block.data_start, query_hi);
    }
    if block.query_start > 0 {
        value -= corner(data, queries, data_hi, block.query_start);
    }
    if block.data_start > 0 && block.query_start > 0 {
        value += corner(data, queries, block.data_start, block.query_start);
    }

    BlockSum {
        value,
        scale: outer.abs(),
    }
}
