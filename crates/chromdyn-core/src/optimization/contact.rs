use super::error::TrainingError;
use crate::core::forcefield::potentials;
use crate::core::io::blob;
use nalgebra::{DMatrix, Point3};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Contact probability of every bead pair in one structure.
///
/// The diagonal is one; probabilities below `cutoff` are set to zero.
pub fn contact_probabilities(
    positions: &[Point3<f64>],
    mu: f64,
    rc: f64,
    cutoff: f64,
) -> DMatrix<f64> {
    let n = positions.len();
    let row = |i: usize| -> Vec<f64> {
        positions
            .iter()
            .enumerate()
            .map(|(j, pj)| {
                if i == j {
                    return 1.0;
                }
                let p = potentials::contact_probability((positions[i] - pj).norm(), mu, rc).0;
                if p < cutoff { 0.0 } else { p }
            })
            .collect()
    };

    #[cfg(feature = "parallel")]
    let rows: Vec<Vec<f64>> = (0..n).into_par_iter().map(row).collect();
    #[cfg(not(feature = "parallel"))]
    let rows: Vec<Vec<f64>> = (0..n).map(row).collect();

    DMatrix::from_fn(n, n, |i, j| rows[i][j])
}

/// Normalises an experimental Hi-C map into contact probabilities.
///
/// The strict upper triangle is kept with NaNs zeroed, each row is divided by its
/// maximum (all-zero rows stay zero), and the result is mirrored with a unit diagonal.
pub fn normalize_hic(dense: &DMatrix<f64>) -> DMatrix<f64> {
    let n = dense.nrows().min(dense.ncols());
    let mut upper = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in (i + 1)..n {
            let v = dense[(i, j)];
            upper[(i, j)] = if v.is_nan() { 0.0 } else { v };
        }
        let max = upper.row(i).iter().cloned().fold(0.0_f64, f64::max);
        if max > 0.0 {
            for j in (i + 1)..n {
                upper[(i, j)] /= max;
            }
        }
    }
    let mut phi = &upper + upper.transpose();
    phi.fill_diagonal(1.0);
    phi
}

/// Running sum of contact probability matrices over sampled frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactAccumulator {
    pub pi: DMatrix<f64>,
    pub n_frames: usize,
}

impl ContactAccumulator {
    pub fn new(n_beads: usize) -> Self {
        Self {
            pi: DMatrix::zeros(n_beads, n_beads),
            n_frames: 0,
        }
    }

    pub fn n_beads(&self) -> usize {
        self.pi.nrows()
    }

    fn check_size(&self, found: usize) -> Result<(), TrainingError> {
        if found != self.n_beads() {
            return Err(TrainingError::SizeMismatch {
                expected: self.n_beads(),
                found,
            });
        }
        Ok(())
    }

    pub fn add_matrix(&mut self, probabilities: &DMatrix<f64>) -> Result<(), TrainingError> {
        self.check_size(probabilities.nrows())?;
        self.pi += probabilities;
        self.n_frames += 1;
        Ok(())
    }

    pub fn add_state(
        &mut self,
        positions: &[Point3<f64>],
        mu: f64,
        rc: f64,
    ) -> Result<(), TrainingError> {
        self.check_size(positions.len())?;
        self.pi += contact_probabilities(positions, mu, rc, 0.0);
        self.n_frames += 1;
        debug!(frames = self.n_frames, "Accumulated contact frame");
        Ok(())
    }

    /// Adds the partial sums of another accumulator, e.g. one filled by another process.
    pub fn merge(&mut self, other: &ContactAccumulator) -> Result<(), TrainingError> {
        self.check_size(other.n_beads())?;
        self.pi += &other.pi;
        self.n_frames += other.n_frames;
        Ok(())
    }

    pub fn mean(&self) -> Result<DMatrix<f64>, TrainingError> {
        if self.n_frames == 0 {
            return Err(TrainingError::NoFrames);
        }
        Ok(&self.pi / self.n_frames as f64)
    }

    pub fn save(&self, path: &Path) -> Result<(), TrainingError> {
        Ok(blob::save(self, path)?)
    }

    pub fn load(path: &Path) -> Result<Self, TrainingError> {
        Ok(blob::load(path)?)
    }
}
