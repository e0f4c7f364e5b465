use super::config::ConfigError;
use crate::core::forcefield::params::ParamLoadError;
use crate::core::io::cndb::CndbError;
use crate::core::io::traits::StructureFileError;
use crate::core::models::sequence::SequenceError;
use crate::core::models::system::SystemError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No structure loaded; call init_structure or load_structure first")]
    NoStructure,

    #[error("Simulation already created; forces can no longer be added")]
    AlreadyCreated,

    #[error("Simulation not created; call create_simulation first")]
    NotCreated,

    #[error("Simulation became unstable at step {step}")]
    Unstable { step: u64 },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Sequence error: {0}")]
    Sequence(#[from] SequenceError),

    #[error("System error: {0}")]
    System(#[from] SystemError),

    #[error("Parameter file error: {0}")]
    Params(#[from] ParamLoadError),

    #[error("Structure file error: {0}")]
    Structure(#[from] StructureFileError),

    #[error("Trajectory error: {0}")]
    Trajectory(#[from] CndbError),

    #[error("I/O error for '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write report '{path}': {source}")]
    Report { path: PathBuf, source: csv::Error },
}
