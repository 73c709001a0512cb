// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::GtError;

/// Dense row-major `f64` matrix with a shape fixed at construction.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct DenseMatrix {
    values: Vec<f64>,
    rows: usize,
    cols: usize,
}

fn shape_len(rows: usize, cols: usize) -> Result<usize, GtError> {
    rows.checked_mul(cols).ok_or_else(|| {
        GtError::resource_limit(format!(
            "matrix size overflow for rows={rows}, cols={cols}"
        ))
    })
}

impl DenseMatrix {
    /// Allocates a zero-filled matrix.
    pub fn zeros(rows: usize, cols: usize) -> Result<Self, GtError> {
        let len = shape_len(rows, cols)?;
        Ok(Self {
            values: vec![0.0; len],
            rows,
            cols,
        })
    }

    /// Wraps a row-major buffer, validating its length against the shape.
    pub fn from_vec(values: Vec<f64>, rows: usize, cols: usize) -> Result<Self, GtError> {
        let expected = shape_len(rows, cols)?;
        if values.len() != expected {
            return Err(GtError::invalid_input(format!(
                "value length mismatch: got {}, expected {expected} (rows={rows}, cols={cols})",
                values.len()
            )));
        }
        Ok(Self { values, rows, cols })
    }

    /// Builds a matrix from equally sized rows.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self, GtError> {
        let cols = rows.first().map_or(0, |row| row.as_ref().len());
        let mut values = Vec::with_capacity(shape_len(rows.len(), cols)?);
        for (idx, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(GtError::invalid_input(format!(
                    "row {idx} has {} columns but expected {cols}",
                    row.len()
                )));
            }
            values.extend_from_slice(row);
        }
        Ok(Self {
            values,
            rows: rows.len(),
            cols,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Returns row `i`.
    ///
    /// Panics when `i >= rows`.
    pub fn row(&self, i: usize) -> &[f64] {
        assert!(i < self.rows, "row out of bounds: i={i}, rows={}", self.rows);
        let start = i * self.cols;
        &self.values[start..start + self.cols]
    }

    /// Returns row `i` mutably.
    ///
    /// Panics when `i >= rows`.
    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        assert!(i < self.rows, "row out of bounds: i={i}, rows={}", self.rows);
        let start = i * self.cols;
        &mut self.values[start..start + self.cols]
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.values.get(row * self.cols + col).copied()
    }

    /// Writes one cell, rejecting coordinates outside the fixed shape.
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<(), GtError> {
        if row >= self.rows || col >= self.cols {
            return Err(GtError::invalid_input(format!(
                "cell ({row}, {col}) is outside matrix shape {}x{}",
                self.rows, self.cols
            )));
        }
        self.values[row * self.cols + col] = value;
        Ok(())
    }

    pub fn iter_rows(&self) -> impl ExactSizeIterator<Item = &[f64]> + '_ {
        // A zero-column matrix has an empty buffer, so the chunk size only
        // needs to stay non-zero.
        self.values.chunks_exact(self.cols.max(1))
    }

    /// Returns the first entry that is negative or non-finite, if any.
    pub fn find_negative_or_non_finite(&self) -> Option<(usize, usize, f64)> {
        self.values
            .iter()
            .copied()
            .enumerate()
            .find(|(_, value)| !value.is_finite() || *value < 0.0)
            .map(|(idx, value)| (idx / self.cols, idx % self.cols, value))
    }

    /// Fails unless every entry is finite and non-negative.
    pub fn ensure_non_negative(&self, label: &str) -> Result<(), GtError> {
        match self.find_negative_or_non_finite() {
            None => Ok(()),
            Some((row, col, value)) => Err(GtError::invalid_input(format!(
                "{label} must be finite and non-negative; found {value} at row {row}, column {col}"
            ))),
        }
    }
}

/// Inner product of two equally sized vectors.
#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "dot requires equal lengths");
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
