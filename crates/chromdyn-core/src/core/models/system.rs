use super::sequence::ChromSequence;
use crate::core::utils::geometry;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SystemError {
    #[error("Number of positions ({positions}) does not match sequence length ({sequence})")]
    LengthMismatch { positions: usize, sequence: usize },
    #[error("Chains must cover beads 0..{n_beads} contiguously without gaps: {reason}")]
    InvalidChains { n_beads: usize, reason: String },
}

/// A contiguous, half-open range of beads forming one polymer chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    pub start: usize,
    pub end: usize,
    pub is_ring: bool,
}

impl Chain {
    pub fn new(start: usize, end: usize, is_ring: bool) -> Self {
        Self {
            start,
            end,
            is_ring,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, bead: usize) -> bool {
        bead >= self.start && bead < self.end
    }
}

/// Chain layout of a polymer and the bonded connectivity derived from it.
///
/// Consecutive beads of a chain are bonded, and ring chains additionally bond their last
/// bead to their first. Force terms keep their own copy to resolve exclusions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    chains: Vec<Chain>,
    /// Chain index of every bead.
    chain_of: Vec<usize>,
}

impl Topology {
    /// Validates that `chains` partition `0..n_beads` in order.
    pub fn new(chains: Vec<Chain>, n_beads: usize) -> Result<Self, SystemError> {
        let invalid = |reason: String| SystemError::InvalidChains { n_beads, reason };
        let mut expected_start = 0;
        let mut chain_of = Vec::with_capacity(n_beads);
        for (idx, chain) in chains.iter().enumerate() {
            if chain.start != expected_start {
                return Err(invalid(format!(
                    "chain {} starts at {} instead of {}",
                    idx, chain.start, expected_start
                )));
            }
            if chain.is_empty() {
                return Err(invalid(format!("chain {} is empty", idx)));
            }
            chain_of.extend(std::iter::repeat_n(idx, chain.len()));
            expected_start = chain.end;
        }
        if expected_start != n_beads {
            return Err(invalid(format!("chains end at bead {}", expected_start)));
        }
        Ok(Self { chains, chain_of })
    }

    pub fn n_beads(&self) -> usize {
        self.chain_of.len()
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn chain_index_of(&self, bead: usize) -> Option<usize> {
        self.chain_of.get(bead).copied()
    }

    pub fn same_chain(&self, i: usize, j: usize) -> bool {
        match (self.chain_of.get(i), self.chain_of.get(j)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Whether `i` and `j` are directly bonded along their chain.
    pub fn is_bonded(&self, i: usize, j: usize) -> bool {
        if !self.same_chain(i, j) {
            return false;
        }
        let (lo, hi) = if i < j { (i, j) } else { (j, i) };
        if hi - lo == 1 {
            return true;
        }
        let chain = &self.chains[self.chain_of[lo]];
        chain.is_ring && chain.len() > 2 && lo == chain.start && hi == chain.end - 1
    }

    /// Bonded bead pairs in chain order.
    pub fn bonds(&self) -> Vec<(usize, usize)> {
        let mut bonds = Vec::with_capacity(self.n_beads());
        for chain in &self.chains {
            for i in chain.start..chain.end.saturating_sub(1) {
                bonds.push((i, i + 1));
            }
            if chain.is_ring && chain.len() > 2 {
                bonds.push((chain.end - 1, chain.start));
            }
        }
        bonds
    }

    /// Consecutive bead triples `(i-1, i, i+1)`; ring chains wrap around.
    pub fn angles(&self) -> Vec<(usize, usize, usize)> {
        let mut angles = Vec::with_capacity(self.n_beads());
        for chain in &self.chains {
            let n = chain.len();
            if chain.is_ring && n > 2 {
                for k in 0..n {
                    let a = chain.start + (k + n - 1) % n;
                    let b = chain.start + k;
                    let c = chain.start + (k + 1) % n;
                    angles.push((a, b, c));
                }
            } else if n > 2 {
                for b in chain.start + 1..chain.end - 1 {
                    angles.push((b - 1, b, b + 1));
                }
            }
        }
        angles
    }
}

/// Coordinates, bead types and chain layout of a chromatin polymer system.
#[derive(Debug, Clone, PartialEq)]
pub struct ChromatinSystem {
    positions: Vec<Point3<f64>>,
    sequence: ChromSequence,
    topology: Topology,
}

impl ChromatinSystem {
    pub fn new(
        positions: Vec<Point3<f64>>,
        sequence: ChromSequence,
        chains: Vec<Chain>,
    ) -> Result<Self, SystemError> {
        if positions.len() != sequence.len() {
            return Err(SystemError::LengthMismatch {
                positions: positions.len(),
                sequence: sequence.len(),
            });
        }
        let topology = Topology::new(chains, positions.len())?;
        Ok(Self {
            positions,
            sequence,
            topology,
        })
    }

    /// A system made of one linear chain spanning all beads.
    pub fn single_chain(
        positions: Vec<Point3<f64>>,
        sequence: ChromSequence,
    ) -> Result<Self, SystemError> {
        let n = positions.len();
        Self::new(positions, sequence, vec![Chain::new(0, n, false)])
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut [Point3<f64>] {
        &mut self.positions
    }

    pub fn set_positions(&mut self, positions: Vec<Point3<f64>>) -> Result<(), SystemError> {
        if positions.len() != self.positions.len() {
            return Err(SystemError::LengthMismatch {
                positions: positions.len(),
                sequence: self.sequence.len(),
            });
        }
        self.positions = positions;
        Ok(())
    }

    pub fn sequence(&self) -> &ChromSequence {
        &self.sequence
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn chains(&self) -> &[Chain] {
        self.topology.chains()
    }

    pub fn is_bonded(&self, i: usize, j: usize) -> bool {
        self.topology.is_bonded(i, j)
    }

    pub fn bonds(&self) -> Vec<(usize, usize)> {
        self.topology.bonds()
    }

    pub fn angles(&self) -> Vec<(usize, usize, usize)> {
        self.topology.angles()
    }

    pub fn center_of_mass(&self) -> Point3<f64> {
        geometry::centroid(&self.positions)
    }

    /// Translates the system so its center of mass sits at the origin.
    pub fn recenter(&mut self) {
        let shift: Vector3<f64> = self.center_of_mass().coords;
        for p in &mut self.positions {
            *p -= shift;
        }
    }

    pub fn radius_of_gyration(&self) -> f64 {
        geometry::radius_of_gyration(&self.positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> Vec<Point3<f64>> {
        (0..n).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect()
    }

    #[test]
    fn new_rejects_length_mismatch() {
        let result = ChromatinSystem::single_chain(line(3), ChromSequence::uniform(4, "A1"));
        assert_eq!(
            result.unwrap_err(),
            SystemError::LengthMismatch {
                positions: 3,
                sequence: 4
            }
        );
    }

    #[test]
    fn new_rejects_chain_gaps() {
        let result = ChromatinSystem::new(
            line(5),
            ChromSequence::uniform(5, "A1"),
            vec![Chain::new(0, 2, false), Chain::new(3, 5, false)],
        );
        assert!(matches!(result, Err(SystemError::InvalidChains { .. })));
    }

    #[test]
    fn new_rejects_chains_not_covering_all_beads() {
        let result = ChromatinSystem::new(
            line(5),
            ChromSequence::uniform(5, "A1"),
            vec![Chain::new(0, 4, false)],
        );
        assert!(matches!(result, Err(SystemError::InvalidChains { .. })));
    }

    #[test]
    fn linear_chain_bonds_and_angles() {
        let system =
            ChromatinSystem::single_chain(line(4), ChromSequence::uniform(4, "A1")).unwrap();
        assert_eq!(system.bonds(), vec![(0, 1), (1, 2), (2, 3)]);
        assert_eq!(system.angles(), vec![(0, 1, 2), (1, 2, 3)]);
        assert!(system.is_bonded(2, 1));
        assert!(!system.is_bonded(0, 3));
    }

    #[test]
    fn ring_chain_closes_bonds_and_wraps_angles() {
        let system = ChromatinSystem::new(
            line(4),
            ChromSequence::uniform(4, "A1"),
            vec![Chain::new(0, 4, true)],
        )
        .unwrap();
        assert_eq!(system.bonds().len(), 4);
        assert!(system.is_bonded(0, 3));
        assert_eq!(system.angles().len(), 4);
        assert_eq!(system.angles()[0], (3, 0, 1));
    }

    #[test]
    fn beads_of_different_chains_are_never_bonded() {
        let system = ChromatinSystem::new(
            line(4),
            ChromSequence::uniform(4, "A1"),
            vec![Chain::new(0, 2, false), Chain::new(2, 4, false)],
        )
        .unwrap();
        assert!(!system.is_bonded(1, 2));
        assert_eq!(system.bonds(), vec![(0, 1), (2, 3)]);
        assert!(system.angles().is_empty());
    }

    #[test]
    fn recenter_moves_center_of_mass_to_origin() {
        let mut system =
            ChromatinSystem::single_chain(line(5), ChromSequence::uniform(5, "A1")).unwrap();
        system.recenter();
        assert!(system.center_of_mass().coords.norm() < 1e-12);
        assert!((system.positions()[0].x + 2.0).abs() < 1e-12);
    }
}
