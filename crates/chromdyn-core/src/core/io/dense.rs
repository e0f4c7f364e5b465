use nalgebra::DMatrix;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DenseError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid value '{value}' on line {line}")]
    Parse { line: usize, value: String },
    #[error("Matrix is not square: row {row} has {found} values, expected {expected}")]
    NotSquare {
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("Matrix file contains no values")]
    Empty,
}

fn parse_value(token: &str, line: usize) -> Result<f64, DenseError> {
    if token.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    token.parse().map_err(|_| DenseError::Parse {
        line,
        value: token.to_string(),
    })
}

/// Reads a whitespace-separated square matrix, one row per non-empty line.
pub fn read_dense_from(reader: impl BufRead) -> Result<DMatrix<f64>, DenseError> {
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        let content = line.trim();
        if content.is_empty() || content.starts_with('#') {
            continue;
        }
        let row = content
            .split_whitespace()
            .map(|t| parse_value(t, line_num + 1))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(row);
    }

    let n = rows.len();
    if n == 0 {
        return Err(DenseError::Empty);
    }
    for (idx, row) in rows.iter().enumerate() {
        if row.len() != n {
            return Err(DenseError::NotSquare {
                row: idx + 1,
                found: row.len(),
                expected: n,
            });
        }
    }
    Ok(DMatrix::from_fn(n, n, |i, j| rows[i][j]))
}

pub fn read_dense(path: &Path) -> Result<DMatrix<f64>, DenseError> {
    read_dense_from(BufReader::new(File::open(path)?))
}

pub fn write_dense(matrix: &DMatrix<f64>, writer: &mut impl Write) -> Result<(), DenseError> {
    for i in 0..matrix.nrows() {
        let row: Vec<String> = (0..matrix.ncols())
            .map(|j| format!("{:.6e}", matrix[(i, j)]))
            .collect();
        writeln!(writer, "{}", row.join(" "))?;
    }
    Ok(())
}

pub fn write_dense_path(matrix: &DMatrix<f64>, path: &Path) -> Result<(), DenseError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_dense(matrix, &mut writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_square_matrix_with_nan_entries() {
        let m = read_dense_from(Cursor::new("1 0.5 NaN\n0.5 1 0.2\nnan 0.2 1\n")).unwrap();
        assert_eq!(m.nrows(), 3);
        assert!(m[(0, 2)].is_nan());
        assert_eq!(m[(1, 2)], 0.2);
    }

    #[test]
    fn non_square_matrix_is_rejected() {
        let result = read_dense_from(Cursor::new("1 2 3\n4 5 6\n"));
        assert!(matches!(result, Err(DenseError::NotSquare { row: 1, .. })));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            read_dense_from(Cursor::new("\n\n")),
            Err(DenseError::Empty)
        ));
    }

    #[test]
    fn written_matrix_reads_back() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 0.125, 0.125, 1.0]);
        let mut buffer = Vec::new();
        write_dense(&m, &mut buffer).unwrap();
        let restored = read_dense_from(Cursor::new(buffer)).unwrap();
        assert_eq!(restored, m);
    }
}
