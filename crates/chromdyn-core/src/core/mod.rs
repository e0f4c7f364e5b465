//! # Core Module
//!
//! Fundamental building blocks of the chromatin model: the bead sequence and polymer
//! system representation, the MiChroM potentials and force terms, and the file formats
//! used to exchange structures, trajectories and contact maps.
//!
//! - **Polymer Representation** ([`models`]) - Bead type sequences, chains and coordinates
//! - **Energy Calculations** ([`forcefield`]) - Potentials, force terms and parameter tables
//! - **File I/O** ([`io`]) - Structure files, the `.cndb` trajectory container and dense maps
//! - **Geometry** ([`utils`]) - Centroids, gyration and angle helpers shared across layers

pub mod forcefield;
pub mod io;
pub mod models;
pub mod utils;
