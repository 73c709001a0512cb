// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use gtnn_core::{DenseMatrix, GtError};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// How a comma-separated matrix file maps onto the target matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadOptions {
    /// Target matrix rows.
    pub rows: usize,
    /// Target matrix columns.
    pub cols: usize,
    /// File row `r`, column `c` lands at matrix `[c, r]`.
    pub transpose: bool,
    /// Load at most this many vectors (matrix rows): file rows, or file
    /// columns when transposed. Surplus vectors in the file are ignored and
    /// the loaded matrix shrinks to the vectors read.
    pub max_rows: Option<usize>,
}

impl LoadOptions {
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            transpose: false,
            max_rows: None,
        }
    }

    pub const fn transposed(mut self) -> Self {
        self.transpose = true;
        self
    }

    pub const fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    pub fn validate(&self) -> Result<(), GtError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(GtError::invalid_input(format!(
                "LoadOptions shape must be at least 1x1; got {}x{}",
                self.rows, self.cols
            )));
        }
        if self.max_rows == Some(0) {
            return Err(GtError::invalid_input(
                "LoadOptions.max_rows must be >= 1 when set; got 0",
            ));
        }
        Ok(())
    }

    /// Matrix rows to load: `rows`, capped by `max_rows`.
    fn vector_limit(&self) -> usize {
        self.max_rows.map_or(self.rows, |cap| cap.min(self.rows))
    }

    /// (file rows, values per file row) the capped target shape requires.
    fn file_shape(&self) -> (usize, usize) {
        let vectors = self.vector_limit();
        if self.transpose {
            (self.cols, vectors)
        } else {
            (vectors, self.cols)
        }
    }
}

/// Reads a comma-separated matrix file into the shape described by `options`.
pub fn load_matrix(path: &Path, options: &LoadOptions) -> Result<DenseMatrix, GtError> {
    let file = File::open(path)
        .map_err(|source| GtError::io(format!("failed to open '{}'", path.display()), source))?;
    let matrix = parse_matrix(BufReader::new(file), &path.display().to_string(), options)?;
    tracing::debug!(
        path = %path.display(),
        rows = matrix.rows(),
        cols = matrix.cols(),
        transpose = options.transpose,
        "loaded matrix"
    );
    Ok(matrix)
}

/// Parses comma-separated rows from `reader`. `label` names the source in
/// error messages.
///
/// Tokens are trimmed and blank lines skipped. Every file row must carry
/// exactly the number of values the target shape needs, and the file must
/// supply enough rows to fill it. With `max_rows` set, vectors past the cap
/// are not read: trailing file rows, or trailing values of each file row
/// when transposed.
pub fn parse_matrix<R: BufRead>(
    reader: R,
    label: &str,
    options: &LoadOptions,
) -> Result<DenseMatrix, GtError> {
    options.validate()?;
    let (file_rows, file_cols) = options.file_shape();
    let capped = options.max_rows.is_some();
    let mut matrix = DenseMatrix::zeros(options.vector_limit(), options.cols)?;

    let mut read = 0usize;
    for (line_idx, line) in reader.lines().enumerate() {
        let line = line
            .map_err(|source| GtError::io(format!("failed to read '{label}'"), source))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if read == file_rows {
            if capped && !options.transpose {
                break;
            }
            return Err(GtError::invalid_input(format!(
                "'{label}' has more than {file_rows} rows (line {})",
                line_idx + 1
            )));
        }

        let mut count = 0usize;
        for (col_idx, token) in trimmed.split(',').map(str::trim).enumerate() {
            if col_idx >= file_cols {
                if capped && options.transpose {
                    break;
                }
                count = col_idx + 1;
                continue;
            }
            let value = token.parse::<f64>().map_err(|_| {
                GtError::parse(format!(
                    "'{label}' line {} column {} is not a valid number: '{token}'",
                    line_idx + 1,
                    col_idx + 1
                ))
            })?;
            if options.transpose {
                matrix.set(col_idx, read, value)?;
            } else {
                matrix.set(read, col_idx, value)?;
            }
            count = col_idx + 1;
        }
        if count != file_cols {
            return Err(GtError::invalid_input(format!(
                "'{label}' line {} has {count} values but expected {file_cols}",
                line_idx + 1
            )));
        }
        read += 1;
    }

    if read < file_rows {
        return Err(GtError::invalid_input(format!(
            "'{label}' has {read} rows but expected {file_rows}"
        )));
    }
    Ok(matrix)
}

/// Writes `matrix` as comma-separated rows.
pub fn save_matrix(path: &Path, matrix: &DenseMatrix) -> Result<(), GtError> {
    let file = File::create(path)
        .map_err(|source| GtError::io(format!("failed to create '{}'", path.display()), source))?;
    let mut writer = BufWriter::new(file);
    write_matrix(&mut writer, matrix)
        .and_then(|()| writer.flush())
        .map_err(|source| GtError::io(format!("failed to write '{}'", path.display()), source))?;
    tracing::debug!(
        path = %path.display(),
        rows = matrix.rows(),
        cols = matrix.cols(),
        "saved matrix"
    );
    Ok(())
}

/// Shortest round-trip decimal for each value, so a reload is bit-identical.
pub fn write_matrix<W: Write>(writer: &mut W, matrix: &DenseMatrix) -> std::io::Result<()> {
    for row in matrix.iter_rows() {
        let mut values = row.iter();
        if let Some(first) = values.next() {
            write!(writer, "{first}")?;
        }
        for value in values {
            write!(writer, ",{value}")?;
        }
        writeln!(writer)?;
    }
    Ok(())
}
