//! # Force Field Module
//!
//! Energy and force evaluation for coarse-grained chromatin polymers under the MiChroM
//! family of potentials, in reduced units (σ = 1, kT = 1).
//!
//! ## Overview
//!
//! A [`energy::ForceField`] is an ordered collection of [`energy::Force`] terms. Each term
//! owns the topology and parameters it needs, and all terms share one neighbor pair list
//! built per evaluation at the largest non-bonded cutoff. The supported terms are:
//!
//! - **Bonded**: FENE and harmonic bonds, bending angles ([`bonded`])
//! - **Non-bonded**: soft-core repulsion, type-to-type and per-bead attraction, ideal
//!   chromosome, loop contacts ([`nonbonded`])
//! - **External**: flat-bottom harmonic restraint and spherical confinement ([`external`])
//!
//! Parameter tables live in [`params`], scalar potentials in [`potentials`], and the
//! per-term energy report in [`term`].

pub mod bonded;
pub mod energy;
pub mod external;
pub mod nonbonded;
pub mod params;
pub mod potentials;
pub mod term;
