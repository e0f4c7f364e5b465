use crate::analysis::error::AnalysisError;
use crate::core::forcefield::params::ParamLoadError;
use crate::core::io::blob::BlobError;
use crate::core::io::dense::DenseError;
use crate::core::models::sequence::SequenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("No frames have been accumulated")]
    NoFrames,

    #[error("Size mismatch: expected {expected} beads, found {found}")]
    SizeMismatch { expected: usize, found: usize },

    #[error("Invalid training parameter: {0}")]
    InvalidParameter(String),

    #[error("Linear algebra failure: {0}")]
    LinearAlgebra(String),

    #[error("Contact map error: {0}")]
    Dense(#[from] DenseError),

    #[error("Parameter table error: {0}")]
    Params(#[from] ParamLoadError),

    #[error("Sequence error: {0}")]
    Sequence(#[from] SequenceError),

    #[error("State file error: {0}")]
    State(#[from] BlobError),

    #[error("Trajectory error: {0}")]
    Trajectory(#[from] AnalysisError),
}
