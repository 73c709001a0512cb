// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use gtnn_core::{DenseMatrix, GtError};

/// Accumulation strategy used while building a [`PrefixIndex`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SummationMode {
    /// `cum[i] = cum[i-1] + x[i]` in plain floating point.
    #[default]
    Plain,
    /// Kahan-compensated running sums per dimension.
    Compensated,
}

/// Row-wise cumulative sums of a dense matrix.
///
/// Row `i` of the index holds the sum of source rows `0..=i`, so the sum of
/// any contiguous row range is recovered with at most one subtraction.
#[derive(Clone, Debug, PartialEq)]
pub struct PrefixIndex {
    cumulative: DenseMatrix,
}

impl PrefixIndex {
    /// Builds the index with plain summation.
    pub fn build(source: &DenseMatrix) -> Result<Self, GtError> {
        Self::build_with(source, SummationMode::Plain)
    }

    pub fn build_with(source: &DenseMatrix, mode: SummationMode) -> Result<Self, GtError> {
        validate_shape(source.rows(), source.cols(), "PrefixIndex source")?;

        let dim = source.cols();
        let mut cumulative = DenseMatrix::zeros(source.rows(), dim)?;
        let mut running = vec![0.0; dim];
        let mut compensation = vec![0.0; dim];

        for (i, row) in source.iter_rows().enumerate() {
            for (col, &value) in row.iter().enumerate() {
                match mode {
                    SummationMode::Plain => running[col] += value,
                    SummationMode::Compensated => {
                        let y = value - compensation[col];
                        let sum = running[col] + y;
                        compensation[col] = (sum - running[col]) - y;
                        running[col] = sum;
                    }
                }
            }
            cumulative.row_mut(i).copy_from_slice(&running);
        }

        tracing::debug!(rows = source.rows(), dim, ?mode, "built prefix index");
        Ok(Self { cumulative })
    }

    /// Wraps an already cumulative matrix, e.g. one restored from disk.
    pub fn from_cumulative(cumulative: DenseMatrix) -> Result<Self, GtError> {
        validate_shape(cumulative.rows(), cumulative.cols(), "PrefixIndex")?;
        if let Some((row, col, value)) = cumulative
            .iter_rows()
            .enumerate()
            .flat_map(|(row, values)| {
                values
                    .iter()
                    .enumerate()
                    .map(move |(col, value)| (row, col, *value))
            })
            .find(|(_, _, value)| !value.is_finite())
        {
            return Err(GtError::numerical_issue(format!(
                "PrefixIndex entries must be finite; found {value} at row {row}, column {col}"
            )));
        }
        Ok(Self { cumulative })
    }

    /// Number of indexed rows.
    pub fn len(&self) -> usize {
        self.cumulative.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.cumulative.rows() == 0
    }

    pub fn dim(&self) -> usize {
        self.cumulative.cols()
    }

    pub fn as_matrix(&self) -> &DenseMatrix {
        &self.cumulative
    }

    /// Sum of source rows `0..end` (exclusive), or `None` for the empty prefix.
    ///
    /// Panics when `end > len()`.
    #[inline]
    pub fn prefix(&self, end: usize) -> Option<&[f64]> {
        assert!(
            end <= self.len(),
            "prefix end out of bounds: end={end}, len={}",
            self.len()
        );
        if end == 0 {
            None
        } else {
            Some(self.cumulative.row(end - 1))
        }
    }

    /// Writes the sum of source rows `start..=end` into `out`.
    ///
    /// Panics when the range is empty, out of bounds, or `out` has the wrong
    /// length.
    pub fn range_sum_into(&self, start: usize, end: usize, out: &mut [f64]) {
        assert!(
            start <= end,
            "range_sum requires start <= end; got start={start}, end={end}"
        );
        assert!(
            end < self.len(),
            "range_sum end out of bounds: end={end}, len={}",
            self.len()
        );
        assert_eq!(out.len(), self.dim(), "range_sum output length mismatch");

        let upper = self.cumulative.row(end);
        if start > 0 {
            let lower = self.cumulative.row(start - 1);
            for ((slot, hi), lo) in out.iter_mut().zip(upper).zip(lower) {
                *slot = hi - lo;
            }
        } else {
            out.copy_from_slice(upper);
        }
    }

    /// Sum of source rows `start..=end`.
    pub fn range_sum(&self, start: usize, end: usize) -> Vec<f64> {
        let mut out = vec![0.0; self.dim()];
        self.range_sum_into(start, end, &mut out);
        out
    }
}

fn validate_shape(rows: usize, cols: usize, label: &str) -> Result<(), GtError> {
    if rows == 0 {
        return Err(GtError::invalid_input(format!(
            "{label} requires at least one row; got 0"
        )));
    }
    if cols == 0 {
        return Err(GtError::invalid_input(format!(
            "{label} requires dim >= 1; got 0"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{PrefixIndex, SummationMode};
    use gtnn_core::{DenseMatrix, GtError};

    fn sample() -> DenseMatrix {
        DenseMatrix::from_rows(&[[1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.0, 0.0]])
            .expect("sample rows should be valid")
    }

    #[test]
    fn rows_hold_inclusive_running_sums() {
        let index = PrefixIndex::build(&sample()).expect("index should build");
        assert_eq!(index.len(), 4);
        assert_eq!(index.dim(), 2);
        assert_eq!(index.as_matrix().row(0), &[1.0, 0.0]);
        assert_eq!(index.as_matrix().row(1), &[1.0, 1.0]);
        assert_eq!(index.as_matrix().row(2), &[2.0, 2.0]);
        assert_eq!(index.as_matrix().row(3), &[2.0, 2.0]);
    }

    #[test]
    fn range_sum_subtracts_only_when_start_is_positive() {
        let index = PrefixIndex::build(&sample()).expect("index should build");
        assert_eq!(index.range_sum(0, 0), vec![1.0, 0.0]);
        assert_eq!(index.range_sum(0, 3), vec![2.0, 2.0]);
        assert_eq!(index.range_sum(1, 2), vec![1.0, 2.0]);
        assert_eq!(index.range_sum(3, 3), vec![0.0, 0.0]);
    }

    #[test]
    fn prefix_of_zero_rows_is_empty() {
        let index = PrefixIndex::build(&sample()).expect("index should build");
        assert!(index.prefix(0).is_none());
        assert_eq!(index.prefix(2), Some(&[1.0, 1.0][..]));
    }

    #[test]
    #[should_panic(expected = "range_sum requires start <= end")]
    fn range_sum_rejects_reversed_range() {
        let index = PrefixIndex::build(&sample()).expect("index should build");
        let _ = index.range_sum(2, 1);
    }

    #[test]
    fn build_rejects_empty_sources() {
        let empty = DenseMatrix::zeros(0, 3).expect("shape should fit");
        let err = PrefixIndex::build(&empty).expect_err("empty source should fail");
        assert!(matches!(err, GtError::InvalidInput(_)));
    }

    #[test]
    fn compensated_mode_stays_close_to_plain() {
        let rows = (0..2_000)
            .map(|i| vec![0.1 + 1.0e-9 * i as f64, (i as f64 * 0.01).sin().abs()])
            .collect::<Vec<_>>();
        let source = DenseMatrix::from_rows(&rows).expect("rows should be valid");
        let plain = PrefixIndex::build_with(&source, SummationMode::Plain)
            .expect("plain index should build");
        let compensated = PrefixIndex::build_with(&source, SummationMode::Compensated)
            .expect("compensated index should build");

        let a = plain.range_sum(100, 1_900);
        let b = compensated.range_sum(100, 1_900);
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() <= 1e-9, "plain={x}, compensated={y}");
        }
    }

    #[test]
    fn from_cumulative_rejects_non_finite_entries() {
        let bad = DenseMatrix::from_rows(&[[1.0, f64::INFINITY]]).expect("rows should be valid");
        let err = PrefixIndex::from_cumulative(bad).expect_err("infinite entry should fail");
        assert!(matches!(err, GtError::NumericalIssue(_)));
        assert!(err.to_string().contains("row 0, column 1"));
    }
}
