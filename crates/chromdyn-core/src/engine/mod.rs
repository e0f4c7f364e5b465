//! # Engine Module
//!
//! Stateful molecular dynamics of chromatin polymers: structure initialization, the
//! Langevin integrator, the [`simulation::Simulation`] driver and its reporters.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Simulation parameters, platforms and reporter settings
//! - **Initial structures** ([`init`]) - Spring, line and random-walk generators
//! - **Integration** ([`integrator`]) - BAOAB Langevin dynamics and initial velocities
//! - **Driver** ([`simulation`]) - Force setup, run loop and stability checks
//! - **Output** ([`reporters`]) - Statistics, trajectories and energy components
//! - **Progress Monitoring** ([`progress`]) - Progress reporting for front-ends
//! - **Error Handling** ([`error`]) - Engine-specific error types

pub mod config;
pub mod error;
pub mod init;
pub mod integrator;
pub mod progress;
pub mod reporters;
pub mod simulation;
