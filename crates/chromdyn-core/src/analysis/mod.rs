//! # Analysis Module
//!
//! Post-processing of stored trajectories: loading `.cndb` containers, selecting frames
//! and beads, and computing structural observables over the selected coordinates.
//!
//! Observables take the coordinates returned by [`trajectory::Trajectory::xyz`], one
//! vector of bead positions per frame, and evaluate frames in parallel when the
//! `parallel` feature is enabled.

pub mod error;
pub mod observables;
pub mod trajectory;

pub use error::AnalysisError;
pub use observables::{
    chirality, gyration_tensor_eigenvalues, radial_distribution, radius_of_gyration,
    traj_to_hic,
};
pub use trajectory::{FrameRange, Trajectory};
