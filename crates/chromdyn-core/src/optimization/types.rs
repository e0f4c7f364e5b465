use super::contact::{contact_probabilities, normalize_hic};
use super::error::TrainingError;
use crate::core::forcefield::nonbonded::{DEFAULT_IC_DINIT, DEFAULT_MU, DEFAULT_RC};
use crate::core::forcefield::params::{IdealChromosomeTable, InteractionTable};
use crate::core::io::blob;
use crate::core::io::dense;
use crate::core::models::sequence::ChromSequence;
use nalgebra::{DMatrix, DVector, Point3};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, instrument};

pub const DEFAULT_TRAINING_DEND: usize = 200;
pub const DEFAULT_EIG_CUTOFF: f64 = 1e-3;

/// Pairs closer than this along the chain are excluded from type observables.
const MIN_TYPE_SEPARATION: usize = 2;

/// Result of one Newton step: the parameter change and the fit quality.
#[derive(Debug, Clone)]
pub struct TrainingUpdate<T> {
    /// Change to add to the current parameters.
    pub delta: T,
    /// `‖φ_sim - φ_exp‖ / ‖φ_exp‖`.
    pub error: f64,
    pub phi_sim: DVector<f64>,
    pub phi_exp: DVector<f64>,
}

/// Sums of an observable vector and of its outer product over sampled frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservableAccumulator {
    pub pi: DVector<f64>,
    pub pipj: DMatrix<f64>,
    pub n_frames: usize,
}

impl ObservableAccumulator {
    pub fn new(n: usize) -> Self {
        Self {
            pi: DVector::zeros(n),
            pipj: DMatrix::zeros(n, n),
            n_frames: 0,
        }
    }

    pub fn add(&mut self, observable: &DVector<f64>) {
        self.pi += observable;
        self.pipj += observable * observable.transpose();
        self.n_frames += 1;
    }

    pub fn merge(&mut self, other: &ObservableAccumulator) -> Result<(), TrainingError> {
        if other.pi.len() != self.pi.len() {
            return Err(TrainingError::SizeMismatch {
                expected: self.pi.len(),
                found: other.pi.len(),
            });
        }
        self.pi += &other.pi;
        self.pipj += &other.pipj;
        self.n_frames += other.n_frames;
        Ok(())
    }

    /// Mean observable and its covariance `⟨φφᵀ⟩ - ⟨φ⟩⟨φ⟩ᵀ`.
    fn moments(&self) -> Result<(DVector<f64>, DMatrix<f64>), TrainingError> {
        if self.n_frames == 0 {
            return Err(TrainingError::NoFrames);
        }
        let n = self.n_frames as f64;
        let mean = &self.pi / n;
        let covariance = &self.pipj / n - &mean * mean.transpose();
        Ok((mean, covariance))
    }
}

/// Newton-step training of type-to-type and ideal-chromosome energies.
#[derive(Debug, Clone)]
pub struct TypeTraining {
    sequence: ChromSequence,
    unique_types: Vec<String>,
    /// Observable index of each ordered type pair, `pair_index[a][b] == pair_index[b][a]`.
    pair_index: Vec<Vec<usize>>,
    classes: Vec<usize>,
    mu: f64,
    rc: f64,
    cutoff: f64,
    dinit: usize,
    dend: usize,
    eig_cutoff: f64,
    types: ObservableAccumulator,
    ideal: ObservableAccumulator,
}

impl TypeTraining {
    pub fn new(sequence: ChromSequence) -> Self {
        Self::with_parameters(
            sequence,
            DEFAULT_MU,
            DEFAULT_RC,
            0.0,
            DEFAULT_IC_DINIT,
            DEFAULT_TRAINING_DEND,
            DEFAULT_EIG_CUTOFF,
        )
    }

    pub fn with_parameters(
        sequence: ChromSequence,
        mu: f64,
        rc: f64,
        cutoff: f64,
        dinit: usize,
        dend: usize,
        eig_cutoff: f64,
    ) -> Self {
        let unique_types = sequence.unique_types();
        let k = unique_types.len();
        let mut pair_index = vec![vec![0; k]; k];
        let mut next = 0;
        for a in 0..k {
            for b in a..k {
                pair_index[a][b] = next;
                pair_index[b][a] = next;
                next += 1;
            }
        }
        let classes = sequence
            .types()
            .iter()
            .map(|t| unique_types.iter().position(|u| u == t).unwrap_or(0))
            .collect();
        let dend = dend.min(sequence.len()).max(dinit);
        info!(
            beads = sequence.len(),
            types = k,
            pairs = next,
            dinit,
            dend,
            "Type training initialized"
        );
        Self {
            sequence,
            unique_types,
            pair_index,
            classes,
            mu,
            rc,
            cutoff,
            dinit,
            dend,
            eig_cutoff,
            types: ObservableAccumulator::new(next),
            ideal: ObservableAccumulator::new(dend - dinit),
        }
    }

    pub fn from_sequence_file(path: &Path) -> Result<Self, TrainingError> {
        Ok(Self::new(ChromSequence::from_path(path)?))
    }

    pub fn sequence(&self) -> &ChromSequence {
        &self.sequence
    }

    /// Unordered type pairs trained, one per observable, `n(n+1)/2` for `n` types.
    pub fn type_pairs(&self) -> Vec<(String, String)> {
        self.sequence.type_pairs()
    }

    pub fn ideal_range(&self) -> (usize, usize) {
        (self.dinit, self.dend)
    }

    pub fn type_frames(&self) -> usize {
        self.types.n_frames
    }

    pub fn ideal_frames(&self) -> usize {
        self.ideal.n_frames
    }

    pub fn type_accumulator(&self) -> &ObservableAccumulator {
        &self.types
    }

    pub fn ideal_accumulator(&self) -> &ObservableAccumulator {
        &self.ideal
    }

    fn check_size(&self, found: usize) -> Result<(), TrainingError> {
        if found != self.sequence.len() {
            return Err(TrainingError::SizeMismatch {
                expected: self.sequence.len(),
                found,
            });
        }
        Ok(())
    }

    /// Sums `probabilities` over bead pairs at least two beads apart, per type pair.
    fn type_observable(&self, probabilities: &DMatrix<f64>) -> DVector<f64> {
        let mut phi = DVector::zeros(self.types.pi.len());
        let n = probabilities.nrows();
        for i in 0..n {
            let row = &self.pair_index[self.classes[i]];
            for j in (i + MIN_TYPE_SEPARATION)..n {
                phi[row[self.classes[j]]] += probabilities[(i, j)];
            }
        }
        phi
    }

    /// Sums `probabilities` along each diagonal in `[dinit, dend)`.
    fn ideal_observable(&self, probabilities: &DMatrix<f64>) -> DVector<f64> {
        let n = probabilities.nrows();
        DVector::from_iterator(
            self.dend - self.dinit,
            (self.dinit..self.dend).map(|d| {
                (0..n.saturating_sub(d))
                    .map(|i| probabilities[(i, i + d)])
                    .sum::<f64>()
            }),
        )
    }

    fn probabilities(&self, positions: &[Point3<f64>]) -> Result<DMatrix<f64>, TrainingError> {
        self.check_size(positions.len())?;
        Ok(contact_probabilities(positions, self.mu, self.rc, self.cutoff))
    }

    pub fn add_state_types(&mut self, positions: &[Point3<f64>]) -> Result<(), TrainingError> {
        let p = self.probabilities(positions)?;
        let phi = self.type_observable(&p);
        self.types.add(&phi);
        debug!(frames = self.types.n_frames, "Accumulated type frame");
        Ok(())
    }

    pub fn add_state_ic(&mut self, positions: &[Point3<f64>]) -> Result<(), TrainingError> {
        let p = self.probabilities(positions)?;
        let phi = self.ideal_observable(&p);
        self.ideal.add(&phi);
        debug!(frames = self.ideal.n_frames, "Accumulated ideal chromosome frame");
        Ok(())
    }

    /// Accumulates one frame for both observables, computing the contact matrix once.
    pub fn add_state(&mut self, positions: &[Point3<f64>]) -> Result<(), TrainingError> {
        let p = self.probabilities(positions)?;
        let types = self.type_observable(&p);
        let ideal = self.ideal_observable(&p);
        self.types.add(&types);
        self.ideal.add(&ideal);
        Ok(())
    }

    /// Adds accumulators filled elsewhere from the same sequence.
    pub fn merge(
        &mut self,
        types: &ObservableAccumulator,
        ideal: &ObservableAccumulator,
    ) -> Result<(), TrainingError> {
        self.types.merge(types)?;
        self.ideal.merge(ideal)
    }

    pub fn save_accumulators(&self, path: &Path) -> Result<(), TrainingError> {
        Ok(blob::save(&(&self.types, &self.ideal), path)?)
    }

    pub fn load_accumulators(&mut self, path: &Path) -> Result<(), TrainingError> {
        let (types, ideal): (ObservableAccumulator, ObservableAccumulator) = blob::load(path)?;
        self.merge(&types, &ideal)
    }

    fn experimental(&self, exp_map: &DMatrix<f64>) -> Result<DMatrix<f64>, TrainingError> {
        self.check_size(exp_map.nrows())?;
        if !exp_map.is_square() {
            return Err(TrainingError::SizeMismatch {
                expected: exp_map.nrows(),
                found: exp_map.ncols(),
            });
        }
        let mut phi = normalize_hic(exp_map);
        if self.cutoff > 0.0 {
            phi.apply(|v| {
                if *v < self.cutoff {
                    *v = 0.0
                }
            });
        }
        Ok(phi)
    }

    fn newton_step(
        &self,
        accumulator: &ObservableAccumulator,
        phi_exp: DVector<f64>,
    ) -> Result<(DVector<f64>, f64, DVector<f64>, DVector<f64>), TrainingError> {
        let (phi_sim, covariance) = accumulator.moments()?;
        let inverse = pseudo_inverse(covariance, self.eig_cutoff)?;
        let residual = &phi_sim - &phi_exp;
        let delta = inverse * &residual;
        let norm = phi_exp.norm();
        let error = if norm > 0.0 { residual.norm() / norm } else { residual.norm() };
        Ok((delta, error, phi_sim, phi_exp))
    }

    /// Newton update of the type-to-type energies against `exp_map`.
    #[instrument(skip_all, name = "type_lambdas")]
    pub fn type_lambdas(
        &self,
        exp_map: &DMatrix<f64>,
    ) -> Result<TrainingUpdate<InteractionTable>, TrainingError> {
        let phi_exp = self.type_observable(&self.experimental(exp_map)?);
        let (delta, error, phi_sim, phi_exp) = self.newton_step(&self.types, phi_exp)?;

        let k = self.unique_types.len();
        let values = DMatrix::from_fn(k, k, |a, b| delta[self.pair_index[a][b]]);
        let table = InteractionTable::new(self.unique_types.clone(), values)?;
        info!(error, frames = self.types.n_frames, "Type energies updated");
        Ok(TrainingUpdate {
            delta: table,
            error,
            phi_sim,
            phi_exp,
        })
    }

    /// Newton update of the ideal-chromosome energies against `exp_map`.
    #[instrument(skip_all, name = "ic_lambdas")]
    pub fn ic_lambdas(
        &self,
        exp_map: &DMatrix<f64>,
    ) -> Result<TrainingUpdate<IdealChromosomeTable>, TrainingError> {
        let phi_exp = self.ideal_observable(&self.experimental(exp_map)?);
        let (delta, error, phi_sim, phi_exp) = self.newton_step(&self.ideal, phi_exp)?;
        info!(error, frames = self.ideal.n_frames, "Ideal chromosome energies updated");
        Ok(TrainingUpdate {
            delta: IdealChromosomeTable::new(self.dinit, delta.iter().copied().collect()),
            error,
            phi_sim,
            phi_exp,
        })
    }

    pub fn type_lambdas_from_file(
        &self,
        path: &Path,
    ) -> Result<TrainingUpdate<InteractionTable>, TrainingError> {
        self.type_lambdas(&dense::read_dense(path)?)
    }

    pub fn ic_lambdas_from_file(
        &self,
        path: &Path,
    ) -> Result<TrainingUpdate<IdealChromosomeTable>, TrainingError> {
        self.ic_lambdas(&dense::read_dense(path)?)
    }
}

/// Moore-Penrose inverse discarding singular values below `rcond` times the largest.
fn pseudo_inverse(matrix: DMatrix<f64>, rcond: f64) -> Result<DMatrix<f64>, TrainingError> {
    if matrix.is_empty() {
        return Ok(matrix);
    }
    let svd = matrix.svd(true, true);
    let largest = svd.singular_values.iter().cloned().fold(0.0_f64, f64::max);
    svd.pseudo_inverse(rcond * largest)
        .map_err(|e| TrainingError::LinearAlgebra(e.to_string()))
}
