//! # Workflows Module
//!
//! High-level procedures that tie the library layers together and serve as the entry
//! points of the command-line front-end.
//!
//! - **Simulation Workflow** ([`simulate`]) - Structure setup, force-field assembly,
//!   Langevin dynamics and output of the final structures.
//! - **Training Workflow** ([`train`]) - Sampling of stored trajectories into the
//!   Newton and Adam trainers.
//!
//! Each workflow reports its phases through a
//! [`ProgressReporter`](crate::engine::progress::ProgressReporter).

pub mod simulate;
pub mod train;
