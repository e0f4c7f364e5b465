//! Data structures describing a chromatin polymer.
//!
//! - [`sequence`] - The per-bead chromatin type sequence and its derived groupings.
//! - [`system`] - Bead coordinates, chain layout and the bonded topology derived from it.

pub mod sequence;
pub mod system;
