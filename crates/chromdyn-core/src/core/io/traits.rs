use crate::core::models::sequence::SequenceError;
use crate::core::models::system::{ChromatinSystem, SystemError};
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StructureFileError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: ParseErrorKind },
    #[error("Missing required record: {0}")]
    MissingRecord(String),
    #[error("Inconsistent data: {0}")]
    Inconsistency(String),
    #[error("Unsupported structure file: {0}")]
    UnsupportedFormat(String),
    #[error("Invalid bead sequence: {0}")]
    Sequence(#[from] SequenceError),
    #[error("Invalid system layout: {0}")]
    System(#[from] SystemError),
}

#[derive(Debug, Error)]
pub enum ParseErrorKind {
    #[error("Invalid integer format in {field} (value: '{value}')")]
    InvalidInt { field: String, value: String },
    #[error("Invalid float format in {field} (value: '{value}')")]
    InvalidFloat { field: String, value: String },
    #[error("Line is too short for a {record} record")]
    LineTooShort { record: &'static str },
    #[error("Expected at least {expected} fields, found {found}")]
    MissingFields { expected: usize, found: usize },
}

pub(crate) fn parse_float(
    value: &str,
    field: &str,
    line: usize,
) -> Result<f64, StructureFileError> {
    value.trim().parse().map_err(|_| StructureFileError::Parse {
        line,
        kind: ParseErrorKind::InvalidFloat {
            field: field.to_string(),
            value: value.trim().to_string(),
        },
    })
}

pub(crate) fn parse_int(
    value: &str,
    field: &str,
    line: usize,
) -> Result<usize, StructureFileError> {
    value.trim().parse().map_err(|_| StructureFileError::Parse {
        line,
        kind: ParseErrorKind::InvalidInt {
            field: field.to_string(),
            value: value.trim().to_string(),
        },
    })
}

/// Defines the interface for reading and writing polymer structure files.
///
/// Implementors handle format-specific parsing and serialization of bead coordinates,
/// bead types and, where the format can express it, the chain layout.
pub trait StructureFile {
    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads a chromatin system from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or I/O operations encounter issues.
    fn read_from(reader: &mut impl BufRead) -> Result<ChromatinSystem, Self::Error>;

    /// Writes a chromatin system to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to(system: &ChromatinSystem, writer: &mut impl Write) -> Result<(), Self::Error>;

    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<ChromatinSystem, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    fn write_to_path<P: AsRef<Path>>(system: &ChromatinSystem, path: P) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(system, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
