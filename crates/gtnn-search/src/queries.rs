// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use gtnn_core::{DenseMatrix, GtError};
use gtnn_index::{PrefixIndex, SummationMode};

/// A query matrix paired with its prefix index.
///
/// Built per search call by [`GroupTestEngine::prepare_queries`] and passed
/// by reference, so an engine never holds query state between calls.
///
/// [`GroupTestEngine::prepare_queries`]: crate::GroupTestEngine::prepare_queries
#[derive(Clone, Debug)]
pub struct QuerySet<'q> {
    matrix: &'q DenseMatrix,
    index: PrefixIndex,
    summation: SummationMode,
    non_negative: bool,
}

impl<'q> QuerySet<'q> {
    /// `non_negative` records whether the caller already scanned `matrix`.
    pub(crate) fn with_summation(
        matrix: &'q DenseMatrix,
        mode: SummationMode,
        non_negative: bool,
    ) -> Result<Self, GtError> {
        let index = PrefixIndex::build_with(matrix, mode)?;
        Ok(Self {
            matrix,
            index,
            summation: mode,
            non_negative,
        })
    }

    /// Number of queries.
    pub fn len(&self) -> usize {
        self.matrix.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.rows() == 0
    }

    pub fn dim(&self) -> usize {
        self.matrix.cols()
    }

    pub fn matrix(&self) -> &DenseMatrix {
        self.matrix
    }

    pub fn index(&self) -> &PrefixIndex {
        &self.index
    }

    pub fn summation(&self) -> SummationMode {
        self.summation
    }

    /// Whether every query entry was verified finite and non-negative.
    pub fn is_non_negative(&self) -> bool {
        self.non_negative
    }
}
