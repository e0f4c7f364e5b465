use crate::core::io::cndb::CndbError;
use crate::core::models::sequence::SequenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Trajectory error: {0}")]
    Trajectory(#[from] CndbError),

    #[error("Invalid bead types in trajectory: {0}")]
    Sequence(#[from] SequenceError),

    #[error("Selection contains no frames")]
    EmptySelection,

    #[error("Bead {index} is out of range for {n_beads} beads")]
    BeadOutOfRange { index: usize, n_beads: usize },

    #[error("Invalid frame range: {0}")]
    InvalidRange(String),

    #[error("At least {needed} beads are required, found {found}")]
    TooFewBeads { needed: usize, found: usize },

    #[error("Frames have inconsistent bead counts")]
    RaggedFrames,

    #[error("Bead type '{0}' does not occur in the trajectory")]
    UnknownType(String),
}
