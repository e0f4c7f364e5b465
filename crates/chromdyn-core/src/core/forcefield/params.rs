use super::potentials;
use crate::core::models::sequence::MICHROM_TYPES;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use thiserror::Error;

/// Published MiChroM type-to-type interaction energies, rows and columns in
/// [`MICHROM_TYPES`] order.
const MICHROM_TYPE_TABLE: [[f64; 7]; 7] = [
    [-0.268028, -0.274604, -0.262513, -0.258880, -0.266760, -0.266760, -0.225646],
    [-0.274604, -0.299261, -0.286952, -0.281154, -0.301320, -0.301320, -0.245080],
    [-0.262513, -0.286952, -0.342020, -0.321726, -0.336630, -0.336630, -0.209919],
    [-0.258880, -0.281154, -0.321726, -0.330443, -0.329350, -0.329350, -0.282536],
    [-0.266760, -0.301320, -0.336630, -0.329350, -0.341230, -0.341230, -0.349490],
    [-0.266760, -0.301320, -0.336630, -0.329350, -0.341230, -0.341230, -0.349490],
    [-0.225646, -0.245080, -0.209919, -0.282536, -0.349490, -0.349490, -0.255994],
];

/// Relative difference allowed between `(i, j)` and `(j, i)` of a pair table.
const SYMMETRY_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Error)]
pub enum ParamLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Invalid table shape in '{path}': {reason}")]
    Shape { path: String, reason: String },
    #[error("Invalid value in '{path}' on line {line}: '{value}'")]
    Parse {
        path: String,
        line: usize,
        value: String,
    },
    #[error("Bead type '{0}' has no entry in the interaction table")]
    UnknownType(String),
    #[error("Interaction tables have different type names")]
    NameMismatch,
}

/// A symmetric matrix of pair interaction energies indexed by name.
///
/// Names are chromatin types for type-to-type tables, or bead labels for
/// bead-resolution tables produced by Adam training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionTable {
    names: Vec<String>,
    values: DMatrix<f64>,
}

impl InteractionTable {
    /// Builds a table from names and a square matrix of matching size.
    pub fn new(names: Vec<String>, values: DMatrix<f64>) -> Result<Self, ParamLoadError> {
        if !values.is_square() || values.nrows() != names.len() {
            return Err(ParamLoadError::Shape {
                path: "<memory>".to_string(),
                reason: format!(
                    "{} names for a {}x{} matrix",
                    names.len(),
                    values.nrows(),
                    values.ncols()
                ),
            });
        }
        check_symmetric(&values, "<memory>")?;
        Ok(Self { names, values })
    }

    pub fn zeros(names: Vec<String>) -> Self {
        let n = names.len();
        Self {
            names,
            values: DMatrix::zeros(n, n),
        }
    }

    /// The published MiChroM type table over `A1 A2 B1 B2 B3 B4 NA`.
    pub fn michrom_default() -> Self {
        let names = MICHROM_TYPES.iter().map(|s| s.to_string()).collect();
        let values = DMatrix::from_fn(7, 7, |i, j| MICHROM_TYPE_TABLE[i][j]);
        Self { names, values }
    }

    /// Loads a table from CSV: a header row of names followed by one row of values per name.
    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let file = File::open(path).map_err(|e| ParamLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_reader(file, &path.to_string_lossy())
    }

    pub fn from_reader(reader: impl Read, source_name: &str) -> Result<Self, ParamLoadError> {
        let csv_err = |e: csv::Error| ParamLoadError::Csv {
            path: source_name.to_string(),
            source: e,
        };
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let names: Vec<String> = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(str::to_string)
            .collect();
        let n = names.len();

        let mut values = Vec::with_capacity(n * n);
        let mut rows = 0;
        for (row_idx, record) in reader.records().enumerate() {
            let record = record.map_err(csv_err)?;
            if record.len() != n {
                return Err(ParamLoadError::Shape {
                    path: source_name.to_string(),
                    reason: format!("row {} has {} columns, expected {}", row_idx + 1, record.len(), n),
                });
            }
            for field in record.iter() {
                let value: f64 = field.parse().map_err(|_| ParamLoadError::Parse {
                    path: source_name.to_string(),
                    line: row_idx + 2,
                    value: field.to_string(),
                })?;
                values.push(value);
            }
            rows += 1;
        }
        if rows != n {
            return Err(ParamLoadError::Shape {
                path: source_name.to_string(),
                reason: format!("{} rows for {} columns", rows, n),
            });
        }

        let values = DMatrix::from_row_slice(n, n, &values);
        check_symmetric(&values, source_name)?;
        Ok(Self { names, values })
    }

    pub fn save(&self, path: &Path) -> Result<(), ParamLoadError> {
        let file = File::create(path).map_err(|e| ParamLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        self.write_to(file, &path.to_string_lossy())
    }

    pub fn write_to(&self, writer: impl Write, source_name: &str) -> Result<(), ParamLoadError> {
        let csv_err = |e: csv::Error| ParamLoadError::Csv {
            path: source_name.to_string(),
            source: e,
        };
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.names).map_err(csv_err)?;
        for i in 0..self.len() {
            let row: Vec<String> = (0..self.len())
                .map(|j| self.values[(i, j)].to_string())
                .collect();
            writer.write_record(&row).map_err(csv_err)?;
        }
        writer.flush().map_err(|e| ParamLoadError::Io {
            path: source_name.to_string(),
            source: e,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut DMatrix<f64> {
        &mut self.values
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        Some(self.values[(self.index_of(a)?, self.index_of(b)?)])
    }

    /// Sets both `(a, b)` and `(b, a)`.
    pub fn set(&mut self, a: &str, b: &str, value: f64) -> Result<(), ParamLoadError> {
        let i = self
            .index_of(a)
            .ok_or_else(|| ParamLoadError::UnknownType(a.to_string()))?;
        let j = self
            .index_of(b)
            .ok_or_else(|| ParamLoadError::UnknownType(b.to_string()))?;
        self.values[(i, j)] = value;
        self.values[(j, i)] = value;
        Ok(())
    }

    /// Element-wise sum of two tables with identical names.
    pub fn add(&self, other: &InteractionTable) -> Result<Self, ParamLoadError> {
        if self.names != other.names {
            return Err(ParamLoadError::NameMismatch);
        }
        Ok(Self {
            names: self.names.clone(),
            values: &self.values + &other.values,
        })
    }
}

/// Pair energies must not depend on which bead of a pair comes first.
fn check_symmetric(values: &DMatrix<f64>, source_name: &str) -> Result<(), ParamLoadError> {
    let n = values.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            let (a, b) = (values[(i, j)], values[(j, i)]);
            if (a - b).abs() > SYMMETRY_TOLERANCE * a.abs().max(b.abs()).max(1.0) {
                return Err(ParamLoadError::Shape {
                    path: source_name.to_string(),
                    reason: format!(
                        "not symmetric: entry ({}, {}) is {} but ({}, {}) is {}",
                        i + 1,
                        j + 1,
                        a,
                        j + 1,
                        i + 1,
                        b
                    ),
                });
            }
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize, Serialize)]
struct IdealChromosomeRecord {
    distance: usize,
    gamma: f64,
}

/// Ideal-chromosome energies indexed by genomic separation, starting at `dinit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdealChromosomeTable {
    dinit: usize,
    values: Vec<f64>,
}

impl IdealChromosomeTable {
    pub fn new(dinit: usize, values: Vec<f64>) -> Self {
        Self { dinit, values }
    }

    /// The analytic MiChroM law evaluated for separations `dinit..dend`.
    pub fn analytic(dinit: usize, dend: usize) -> Self {
        let start = dinit.max(2);
        Self {
            dinit: start,
            values: (start..dend).map(potentials::ideal_chromosome_gamma).collect(),
        }
    }

    pub fn zeros(dinit: usize, dend: usize) -> Self {
        Self {
            dinit,
            values: vec![0.0; dend.saturating_sub(dinit)],
        }
    }

    pub fn dinit(&self) -> usize {
        self.dinit
    }

    /// One past the largest separation with an entry.
    pub fn dend(&self) -> usize {
        self.dinit + self.values.len()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn gamma(&self, distance: usize) -> Option<f64> {
        distance
            .checked_sub(self.dinit)
            .and_then(|k| self.values.get(k))
            .copied()
    }

    pub fn add(&self, other: &IdealChromosomeTable) -> Result<Self, ParamLoadError> {
        if self.dinit != other.dinit || self.values.len() != other.values.len() {
            return Err(ParamLoadError::Shape {
                path: "<memory>".to_string(),
                reason: "ideal chromosome tables cover different separations".to_string(),
            });
        }
        Ok(Self {
            dinit: self.dinit,
            values: self
                .values
                .iter()
                .zip(&other.values)
                .map(|(a, b)| a + b)
                .collect(),
        })
    }

    /// Loads a `distance,gamma` CSV. Distances must be consecutive.
    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let path_str = path.to_string_lossy().to_string();
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| ParamLoadError::Csv {
                path: path_str.clone(),
                source: e,
            })?;

        let mut dinit = None;
        let mut values = Vec::new();
        for record in reader.deserialize::<IdealChromosomeRecord>() {
            let record = record.map_err(|e| ParamLoadError::Csv {
                path: path_str.clone(),
                source: e,
            })?;
            let start = *dinit.get_or_insert(record.distance);
            if record.distance != start + values.len() {
                return Err(ParamLoadError::Shape {
                    path: path_str,
                    reason: format!("distance {} is out of sequence", record.distance),
                });
            }
            values.push(record.gamma);
        }

        let dinit = dinit.ok_or_else(|| ParamLoadError::Shape {
            path: path_str.clone(),
            reason: "table has no rows".to_string(),
        })?;
        Ok(Self { dinit, values })
    }

    pub fn save(&self, path: &Path) -> Result<(), ParamLoadError> {
        let path_str = path.to_string_lossy().to_string();
        let mut writer = csv::Writer::from_path(path).map_err(|e| ParamLoadError::Csv {
            path: path_str.clone(),
            source: e,
        })?;
        for (k, gamma) in self.values.iter().enumerate() {
            writer
                .serialize(IdealChromosomeRecord {
                    distance: self.dinit + k,
                    gamma: *gamma,
                })
                .map_err(|e| ParamLoadError::Csv {
                    path: path_str.clone(),
                    source: e,
                })?;
        }
        writer.flush().map_err(|e| ParamLoadError::Io {
            path: path_str,
            source: e,
        })
    }
}

/// Reads loop anchors: two 1-based bead indices per line, converted to 0-based pairs.
pub fn read_loops(path: &Path) -> Result<Vec<(usize, usize)>, ParamLoadError> {
    let path_str = path.to_string_lossy().to_string();
    let file = File::open(path).map_err(|e| ParamLoadError::Io {
        path: path_str.clone(),
        source: e,
    })?;

    let mut loops = Vec::new();
    for (line_num, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| ParamLoadError::Io {
            path: path_str.clone(),
            source: e,
        })?;
        let content = line.trim();
        if content.is_empty() || content.starts_with('#') {
            continue;
        }
        let parse = |s: &str| -> Result<usize, ParamLoadError> {
            s.parse::<usize>()
                .ok()
                .filter(|&v| v >= 1)
                .ok_or_else(|| ParamLoadError::Parse {
                    path: path_str.clone(),
                    line: line_num + 1,
                    value: s.to_string(),
                })
        };
        let fields: Vec<&str> = content
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .collect();
        if fields.len() < 2 {
            return Err(ParamLoadError::Parse {
                path: path_str.clone(),
                line: line_num + 1,
                value: content.to_string(),
            });
        }
        loops.push((parse(fields[0])? - 1, parse(fields[1])? - 1));
    }
    Ok(loops)
}
