use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// Chromatin subcompartment types of the published MiChroM model, in table order.
pub const MICHROM_TYPES: [&str; 7] = ["A1", "A2", "B1", "B2", "B3", "B4", "NA"];

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Sequence contains no beads")]
    Empty,
    #[error("Invalid sequence record on line {line}: '{content}'")]
    InvalidRecord { line: usize, content: String },
    #[error("Bead index on line {line} is {found}, expected {expected}")]
    NonConsecutive {
        line: usize,
        found: usize,
        expected: usize,
    },
    #[error("Bead type '{0}' is not present in the reference type list")]
    UnknownType(String),
}

/// The chromatin type assigned to every bead of the polymer, in bead order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChromSequence {
    types: Vec<String>,
}

impl ChromSequence {
    pub fn new(types: Vec<String>) -> Result<Self, SequenceError> {
        if types.is_empty() {
            return Err(SequenceError::Empty);
        }
        Ok(Self { types })
    }

    /// A sequence of `n` beads sharing one type.
    pub fn uniform(n: usize, bead_type: &str) -> Self {
        Self {
            types: vec![bead_type.to_string(); n],
        }
    }

    /// Parses a sequence file.
    ///
    /// Each non-empty line is either `<index> <TYPE>` or a bare `<TYPE>`; text after `#`
    /// is ignored. When indices are present they must increase by one from the first value.
    pub fn from_reader(reader: impl BufRead) -> Result<Self, SequenceError> {
        let mut types = Vec::new();
        let mut next_index: Option<usize> = None;

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;
            let content = line.split('#').next().unwrap_or("").trim();
            if content.is_empty() {
                continue;
            }

            let fields: Vec<&str> = content.split_whitespace().collect();
            let bead_type = match fields.as_slice() {
                [bead_type] => *bead_type,
                [index, bead_type] => {
                    let index: usize = index.parse().map_err(|_| SequenceError::InvalidRecord {
                        line: line_num,
                        content: content.to_string(),
                    })?;
                    if let Some(expected) = next_index {
                        if index != expected {
                            return Err(SequenceError::NonConsecutive {
                                line: line_num,
                                found: index,
                                expected,
                            });
                        }
                    }
                    next_index = Some(index + 1);
                    *bead_type
                }
                _ => {
                    return Err(SequenceError::InvalidRecord {
                        line: line_num,
                        content: content.to_string(),
                    });
                }
            };
            types.push(bead_type.to_string());
        }

        Self::new(types)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SequenceError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn bead_type(&self, index: usize) -> Option<&str> {
        self.types.get(index).map(String::as_str)
    }

    /// Distinct bead types, sorted.
    pub fn unique_types(&self) -> Vec<String> {
        self.types
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Maps each type to the sorted indices of the beads carrying it.
    pub fn indices_by_type(&self) -> BTreeMap<String, Vec<usize>> {
        let mut map: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, t) in self.types.iter().enumerate() {
            map.entry(t.clone()).or_default().push(i);
        }
        map
    }

    /// Position of every bead's type inside `reference`.
    pub fn type_indices(&self, reference: &[String]) -> Result<Vec<usize>, SequenceError> {
        self.types
            .iter()
            .map(|t| {
                reference
                    .iter()
                    .position(|r| r == t)
                    .ok_or_else(|| SequenceError::UnknownType(t.clone()))
            })
            .collect()
    }

    /// All unordered pairs of unique types, repetition included.
    ///
    /// For `n` unique types this yields `n(n+1)/2` pairs ordered as `(a, b)` with `a <= b`.
    pub fn type_pairs(&self) -> Vec<(String, String)> {
        let unique = self.unique_types();
        let mut pairs = Vec::with_capacity(unique.len() * (unique.len() + 1) / 2);
        for (i, a) in unique.iter().enumerate() {
            for b in &unique[i..] {
                pairs.push((a.clone(), b.clone()));
            }
        }
        pairs
    }
}
