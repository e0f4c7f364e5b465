//! # Optimization Module
//!
//! Training of MiChroM interaction energies against experimental Hi-C contact maps.
//!
//! Both trainers consume structures sampled by the simulation engine and compare their
//! contact probabilities `f(r) = ½ (1 + tanh(μ (r_c - r)))` with a normalised map:
//!
//! - [`types::TypeTraining`] performs a Newton step on type-to-type and ideal-chromosome
//!   energies using the covariance of the sampled observables.
//! - [`adam::AdamTraining`] performs Adam updates on bead-resolution pair energies.
//!
//! [`contact`] holds the shared contact-probability helpers and accumulators.

pub mod adam;
pub mod contact;
pub mod error;
pub mod types;
