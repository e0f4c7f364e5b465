use super::contact::{ContactAccumulator, normalize_hic};
use super::error::TrainingError;
use crate::core::forcefield::nonbonded::{DEFAULT_MU, DEFAULT_RC};
use crate::core::forcefield::params::InteractionTable;
use crate::core::io::blob;
use crate::core::io::dense;
use nalgebra::{DMatrix, Point3};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, instrument};

/// Contacts closer than this along the diagonal do not enter the error estimate.
const ERROR_DIAGONAL_OFFSET: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdamParams {
    pub mu: f64,
    pub rc: f64,
    pub eta: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
}

impl Default for AdamParams {
    fn default() -> Self {
        Self {
            mu: DEFAULT_MU,
            rc: DEFAULT_RC,
            eta: 0.01,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

/// First and second moment estimates carried between Adam iterations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdamState {
    pub m: DMatrix<f64>,
    pub v: DMatrix<f64>,
    /// Iteration used for bias correction at the next update, starting at 1.
    pub iteration: u32,
}

impl AdamState {
    pub fn new(n: usize, iteration: u32) -> Self {
        Self {
            m: DMatrix::zeros(n, n),
            v: DMatrix::zeros(n, n),
            iteration: iteration.max(1),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), TrainingError> {
        Ok(blob::save(self, path)?)
    }

    pub fn load(path: &Path) -> Result<Self, TrainingError> {
        Ok(blob::load(path)?)
    }
}

/// Adam optimisation of bead-resolution pair energies against a Hi-C map.
#[derive(Debug, Clone)]
pub struct AdamTraining {
    params: AdamParams,
    initial_iteration: u32,
    phi_exp: Option<DMatrix<f64>>,
    mask: Option<DMatrix<bool>>,
    /// Sampled contact probabilities; partial sums from other runs may be added directly.
    pub accumulator: ContactAccumulator,
    state: Option<AdamState>,
    error: Option<f64>,
}

impl AdamTraining {
    pub fn new(params: AdamParams, iteration: u32) -> Self {
        Self {
            params,
            initial_iteration: iteration.max(1),
            phi_exp: None,
            mask: None,
            accumulator: ContactAccumulator::new(0),
            state: None,
            error: None,
        }
    }

    pub fn params(&self) -> &AdamParams {
        &self.params
    }

    /// Sets the experimental map and resets the accumulator to its size.
    pub fn load_hic_matrix(&mut self, dense: &DMatrix<f64>) -> Result<(), TrainingError> {
        if !dense.is_square() {
            return Err(TrainingError::SizeMismatch {
                expected: dense.nrows(),
                found: dense.ncols(),
            });
        }
        let phi = normalize_hic(dense);
        let n = phi.nrows();
        self.mask = Some(phi.map(|v| v == 0.0));
        self.phi_exp = Some(phi);
        self.accumulator = ContactAccumulator::new(n);
        self.state = Some(match self.state.take() {
            Some(state) if state.m.nrows() == n => state,
            _ => AdamState::new(n, self.initial_iteration),
        });
        info!(beads = n, "Loaded experimental contact map");
        Ok(())
    }

    pub fn load_hic(&mut self, path: &Path) -> Result<(), TrainingError> {
        self.load_hic_matrix(&dense::read_dense(path)?)
    }

    pub fn phi_exp(&self) -> Option<&DMatrix<f64>> {
        self.phi_exp.as_ref()
    }

    pub fn n_beads(&self) -> usize {
        self.accumulator.n_beads()
    }

    pub fn add_state(&mut self, positions: &[Point3<f64>]) -> Result<(), TrainingError> {
        self.accumulator
            .add_state(positions, self.params.mu, self.params.rc)
    }

    pub fn merge(&mut self, other: &ContactAccumulator) -> Result<(), TrainingError> {
        self.accumulator.merge(other)
    }

    pub fn state(&self) -> Option<&AdamState> {
        self.state.as_ref()
    }

    /// Restores moments saved by an earlier iteration. Call after loading the map.
    pub fn set_state(&mut self, state: AdamState) -> Result<(), TrainingError> {
        if state.m.nrows() != self.n_beads() || state.v.nrows() != self.n_beads() {
            return Err(TrainingError::SizeMismatch {
                expected: self.n_beads(),
                found: state.m.nrows(),
            });
        }
        self.state = Some(state);
        Ok(())
    }

    /// Relative error of the last update, if any.
    pub fn error(&self) -> Option<f64> {
        self.error
    }

    /// One Adam step on `lambdas`, returning the updated table.
    #[instrument(skip_all, name = "adam_update")]
    pub fn update_lambdas(
        &mut self,
        lambdas: &InteractionTable,
    ) -> Result<InteractionTable, TrainingError> {
        let (Some(phi_exp), Some(mask), Some(state)) =
            (self.phi_exp.as_ref(), self.mask.as_ref(), self.state.as_mut())
        else {
            return Err(TrainingError::InvalidParameter(
                "no experimental map loaded".to_string(),
            ));
        };
        let n = phi_exp.nrows();
        if lambdas.len() != n {
            return Err(TrainingError::SizeMismatch {
                expected: n,
                found: lambdas.len(),
            });
        }
        let mut phi_sim = self.accumulator.mean()?;
        phi_sim.zip_apply(mask, |v, masked| {
            if masked {
                *v = 0.0
            }
        });

        let gradient = phi_exp - &phi_sim;
        let (mut deviation, mut reference) = (0.0, 0.0);
        for i in 0..n {
            for j in (i + ERROR_DIAGONAL_OFFSET)..n {
                deviation += gradient[(i, j)].abs();
                reference += phi_exp[(i, j)];
            }
        }
        let error = if reference > 0.0 { deviation / reference } else { deviation };

        let AdamParams {
            eta,
            beta1,
            beta2,
            epsilon,
            ..
        } = self.params;
        state.m = &state.m * beta1 + &gradient * (1.0 - beta1);
        state.v = &state.v * beta2 + gradient.component_mul(&gradient) * (1.0 - beta2);
        let t = state.iteration as i32;
        let m_hat = &state.m / (1.0 - beta1.powi(t));
        let v_hat = &state.v / (1.0 - beta2.powi(t));
        let step = m_hat.zip_map(&v_hat, |m, v| eta * m / (v.sqrt() + epsilon));

        let updated = lambdas.values() - step;
        let symmetric = (&updated + updated.transpose()) * 0.5;
        state.iteration += 1;
        self.error = Some(error);
        info!(
            error,
            iteration = state.iteration - 1,
            frames = self.accumulator.n_frames,
            "Adam update applied"
        );
        Ok(InteractionTable::new(lambdas.names().to_vec(), symmetric)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn labels(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("b{}", i)).collect()
    }

    fn banded_map(n: usize) -> DMatrix<f64> {
        DMatrix::from_fn(n, n, |i, j| {
            let d = (i as f64 - j as f64).abs();
            if d > 3.0 { 0.0 } else { 10.0 / (1.0 + d) }
        })
    }

    fn line(n: usize) -> Vec<Point3<f64>> {
        (0..n).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect()
    }

    #[test]
    fn update_requires_map_and_frames() {
        let mut opt = AdamTraining::new(AdamParams::default(), 1);
        let table = InteractionTable::zeros(labels(4));
        assert!(matches!(
            opt.update_lambdas(&table),
            Err(TrainingError::InvalidParameter(_))
        ));
        opt.load_hic_matrix(&banded_map(4)).unwrap();
        assert!(matches!(
            opt.update_lambdas(&table),
            Err(TrainingError::NoFrames)
        ));
    }

    #[test]
    fn table_size_must_match_map() {
        let mut opt = AdamTraining::new(AdamParams::default(), 1);
        opt.load_hic_matrix(&banded_map(6)).unwrap();
        opt.add_state(&line(6)).unwrap();
        let table = InteractionTable::zeros(labels(5));
        assert!(matches!(
            opt.update_lambdas(&table),
            Err(TrainingError::SizeMismatch { expected: 6, found: 5 })
        ));
    }

    #[test]
    fn first_step_moves_each_entry_by_eta() {
        let mut opt = AdamTraining::new(AdamParams::default(), 1);
        opt.load_hic_matrix(&banded_map(6)).unwrap();
        opt.add_state(&line(6)).unwrap();
        let table = InteractionTable::zeros(labels(6));
        let updated = opt.update_lambdas(&table).unwrap();

        let phi_exp = opt.phi_exp().unwrap().clone();
        let phi_sim = opt.accumulator.mean().unwrap();
        for i in 0..6 {
            for j in 0..6 {
                let value = updated.values()[(i, j)];
                assert_eq!(value, updated.values()[(j, i)]);
                if phi_exp[(i, j)] == 0.0 {
                    assert_eq!(value, 0.0);
                    continue;
                }
                let g = phi_exp[(i, j)] - phi_sim[(i, j)];
                if g.abs() > 1e-6 {
                    assert!((value.abs() - 0.01).abs() < 1e-4);
                    assert_eq!(value.signum(), -g.signum());
                }
            }
        }
        assert_eq!(opt.state().unwrap().iteration, 2);
        assert!(opt.error().unwrap() >= 0.0);
    }

    #[test]
    fn external_partial_sums_can_be_added() {
        let mut opt = AdamTraining::new(AdamParams::default(), 1);
        opt.load_hic_matrix(&banded_map(4)).unwrap();
        opt.accumulator.pi += DMatrix::from_element(4, 4, 2.0);
        opt.accumulator.n_frames += 2;
        let phi_sim = opt.accumulator.mean().unwrap();
        assert!((phi_sim[(0, 3)] - 1.0).abs() < 1e-12);
        assert!(opt.update_lambdas(&InteractionTable::zeros(labels(4))).is_ok());
    }

    #[test]
    fn moments_persist_through_state_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("adam.state");
        let mut opt = AdamTraining::new(AdamParams::default(), 1);
        opt.load_hic_matrix(&banded_map(5)).unwrap();
        opt.add_state(&line(5)).unwrap();
        opt.update_lambdas(&InteractionTable::zeros(labels(5))).unwrap();
        opt.state().unwrap().save(&path).unwrap();

        let mut resumed = AdamTraining::new(AdamParams::default(), 1);
        resumed.load_hic_matrix(&banded_map(5)).unwrap();
        resumed.set_state(AdamState::load(&path).unwrap()).unwrap();
        assert_eq!(resumed.state(), opt.state());
        assert!(resumed.set_state(AdamState::new(3, 1)).is_err());
    }
}
