//! Reading and writing of polymer structures and trajectories.
//!
//! Structure files share the [`traits::StructureFile`] interface and are dispatched by
//! [`StructureFormat`]. Trajectories use the binary [`cndb`] container, and
//! experimental Hi-C maps are plain dense text matrices ([`dense`]).

pub mod blob;
pub mod cndb;
pub mod dense;
pub mod gro;
pub(crate) mod layout;
pub mod ndb;
pub mod pdb;
pub mod traits;
pub mod xyz;

use crate::core::models::system::ChromatinSystem;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use traits::{StructureFile, StructureFileError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructureFormat {
    Ndb,
    Pdb,
    Gro,
    Xyz,
}

impl StructureFormat {
    pub const ALL: [StructureFormat; 4] = [Self::Ndb, Self::Pdb, Self::Gro, Self::Xyz];

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Ndb => "ndb",
            Self::Pdb => "pdb",
            Self::Gro => "gro",
            Self::Xyz => "xyz",
        }
    }

    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        Self::ALL.into_iter().find(|f| f.extension() == ext)
    }

    pub fn read_path(&self, path: &Path) -> Result<ChromatinSystem, StructureFileError> {
        match self {
            Self::Ndb => ndb::NdbFile::read_from_path(path),
            Self::Pdb => pdb::PdbFile::read_from_path(path),
            Self::Gro => gro::GroFile::read_from_path(path),
            Self::Xyz => xyz::XyzFile::read_from_path(path),
        }
    }

    pub fn write_path(
        &self,
        system: &ChromatinSystem,
        path: &Path,
    ) -> Result<(), StructureFileError> {
        match self {
            Self::Ndb => ndb::NdbFile::write_to_path(system, path),
            Self::Pdb => pdb::PdbFile::write_to_path(system, path),
            Self::Gro => gro::GroFile::write_to_path(system, path),
            Self::Xyz => xyz::XyzFile::write_to_path(system, path),
        }
    }
}

impl fmt::Display for StructureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for StructureFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.extension() == lower)
            .ok_or_else(|| format!("Unknown structure format '{}' (expected ndb, pdb, gro or xyz)", s))
    }
}

/// Reads a structure file, picking the format from its extension.
pub fn read_structure(path: &Path) -> Result<ChromatinSystem, StructureFileError> {
    let format = StructureFormat::from_extension(path).ok_or_else(|| {
        StructureFileError::UnsupportedFormat(path.to_string_lossy().to_string())
    })?;
    format.read_path(path)
}
