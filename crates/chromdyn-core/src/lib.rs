//! # ChromDyn Core Library
//!
//! A library for coarse-grained chromatin polymer dynamics based on the Minimal Chromatin
//! Model (MiChroM): structure initialization, force-field assembly, Langevin integration,
//! trajectory reporting, contact-map analysis and the training of interaction energies
//! against Hi-C contact probabilities.
//!
//! ## Architectural Philosophy
//!
//! The library follows a layered architecture so that each concern can be tested in isolation.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`ChromSequence`, `ChromatinSystem`),
//!   pure potentials and force terms, and file I/O for structures, trajectories and dense maps.
//!
//! - **[`engine`]: The Dynamics Core.** The stateful `Simulation` driver, the Langevin
//!   integrator, neighbour search, reporters and configuration builders.
//!
//! - **[`optimization`]: Parameter Training.** Contact-probability accumulation and the
//!   Newton (type / ideal chromosome) and Adam update rules for interaction energies.
//!
//! - **[`analysis`]: Trajectory Tools.** Loading stored trajectories and computing structural
//!   observables such as the radius of gyration, radial density and chirality.
//!
//! - **[`workflows`]: The Public API.** End-to-end procedures that tie the layers together.

pub mod analysis;
pub mod core;
pub mod engine;
pub mod optimization;
pub mod workflows;
