// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::matrix_store::{LoadOptions, load_matrix, save_matrix};
use gtnn_core::GtError;
use gtnn_index::PrefixIndex;
use std::path::Path;

/// Persists the cumulative rows of `index` so a later run can skip the build.
pub fn save_index(path: &Path, index: &PrefixIndex) -> Result<(), GtError> {
    save_matrix(path, index.as_matrix())?;
    tracing::info!(
        path = %path.display(),
        rows = index.len(),
        dim = index.dim(),
        "saved prefix index"
    );
    Ok(())
}

/// Restores an index written by [`save_index`], requiring exactly `n` rows of
/// `dim` values.
pub fn load_index(path: &Path, n: usize, dim: usize) -> Result<PrefixIndex, GtError> {
    let cumulative = load_matrix(path, &LoadOptions::new(n, dim))?;
    let index = PrefixIndex::from_cumulative(cumulative)?;
    tracing::info!(path = %path.display(), rows = n, dim, "loaded prefix index");
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::{load_index, save_index};
    use gtnn_core::{DenseMatrix, GtError};
    use gtnn_index::{PrefixIndex, SummationMode};

    fn source() -> DenseMatrix {
        let rows = (0..50)
            .map(|i| vec![0.1 * i as f64, 1.0 / (i as f64 + 3.0), (i as f64).sqrt()])
            .collect::<Vec<_>>();
        DenseMatrix::from_rows(&rows).expect("rows valid")
    }

    #[test]
    fn build_save_load_is_bit_identical() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("x_cum.txt");

        for mode in [SummationMode::Plain, SummationMode::Compensated] {
            let index = PrefixIndex::build_with(&source(), mode).expect("index should build");
            save_index(&path, &index).expect("save should succeed");
            let loaded = load_index(&path, 50, 3).expect("load should succeed");

            for (left, right) in loaded
                .as_matrix()
                .as_slice()
                .iter()
                .zip(index.as_matrix().as_slice())
            {
                assert_eq!(left.to_bits(), right.to_bits());
            }
        }
    }

    #[test]
    fn load_rejects_unexpected_shape() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("x_cum.txt");
        let index = PrefixIndex::build(&source()).expect("index should build");
        save_index(&path, &index).expect("save should succeed");

        let err = load_index(&path, 50, 4).expect_err("wrong dim should fail");
        assert!(matches!(err, GtError::InvalidInput(_)));
        let err = load_index(&path, 60, 3).expect_err("wrong row count should fail");
        assert!(err.to_string().contains("expected 60"));
    }

    #[test]
    fn save_into_missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let index = PrefixIndex::build(&source()).expect("index should build");
        let err = save_index(&dir.path().join("missing").join("x_cum.txt"), &index)
            .expect_err("missing parent should fail");
        assert_eq!(err.code(), "io_error");
    }
}
