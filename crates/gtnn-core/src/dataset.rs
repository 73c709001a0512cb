// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::{DenseMatrix, GtError};

/// Declared sizes of a data/query pair.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DatasetShape {
    /// Number of data vectors.
    pub n: usize,
    /// Number of query vectors.
    pub nq: usize,
    /// Shared vector dimension.
    pub dim: usize,
}

impl DatasetShape {
    pub fn validate(&self) -> Result<(), GtError> {
        if self.n == 0 {
            return Err(GtError::invalid_input("DatasetShape.n must be >= 1; got 0"));
        }
        if self.nq == 0 {
            return Err(GtError::invalid_input(
                "DatasetShape.nq must be >= 1; got 0",
            ));
        }
        if self.dim == 0 {
            return Err(GtError::invalid_input(
                "DatasetShape.dim must be >= 1; got 0",
            ));
        }
        Ok(())
    }
}

/// Data matrix `X` (n x dim) together with query matrix `Q` (nq x dim).
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    data: DenseMatrix,
    queries: DenseMatrix,
}

impl Dataset {
    /// Pairs two matrices, requiring at least one row each and a shared dimension.
    pub fn new(data: DenseMatrix, queries: DenseMatrix) -> Result<Self, GtError> {
        let shape = DatasetShape {
            n: data.rows(),
            nq: queries.rows(),
            dim: data.cols(),
        };
        Self::with_shape(shape, data, queries)
    }

    /// Pairs two matrices and checks them against a declared shape.
    pub fn with_shape(
        shape: DatasetShape,
        data: DenseMatrix,
        queries: DenseMatrix,
    ) -> Result<Self, GtError> {
        shape.validate()?;
        if data.rows() != shape.n || data.cols() != shape.dim {
            return Err(GtError::invalid_input(format!(
                "data matrix shape {}x{} does not match declared n={}, dim={}",
                data.rows(),
                data.cols(),
                shape.n,
                shape.dim
            )));
        }
        if queries.rows() != shape.nq || queries.cols() != shape.dim {
            return Err(GtError::invalid_input(format!(
                "query matrix shape {}x{} does not match declared nq={}, dim={}",
                queries.rows(),
                queries.cols(),
                shape.nq,
                shape.dim
            )));
        }
        Ok(Self { data, queries })
    }

    pub fn data(&self) -> &DenseMatrix {
        &self.data
    }

    pub fn queries(&self) -> &DenseMatrix {
        &self.queries
    }

    pub fn shape(&self) -> DatasetShape {
        DatasetShape {
            n: self.data.rows(),
            nq: self.queries.rows(),
            dim: self.data.cols(),
        }
    }

    pub fn into_parts(self) -> (DenseMatrix, DenseMatrix) {
        (self.data, self.queries)
    }
}
