use super::term::EnergyBreakdown;
use crate::core::utils::neighbors::{self, NeighborPair};
use nalgebra::{Point3, Vector3};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

const MIN_PAIR_DISTANCE: f64 = 1e-9;
#[cfg(feature = "parallel")]
const PAIR_CHUNK: usize = 4096;

/// Per-evaluation view shared by every force term.
pub struct EvalContext<'a> {
    pub positions: &'a [Point3<f64>],
    /// Bead pairs closer than the largest non-bonded cutoff of the force field.
    pub pairs: &'a [NeighborPair],
    pub parallel: bool,
}

/// One additive contribution to the potential energy.
///
/// Implementations add their forces into `forces` (one entry per bead) and return their
/// energy. Terms that report a [`Force::cutoff`] receive all pairs within it through
/// [`EvalContext::pairs`], possibly alongside pairs that lie beyond it.
pub trait Force: Send + Sync {
    fn name(&self) -> &str;

    fn cutoff(&self) -> Option<f64> {
        None
    }

    fn compute(&self, ctx: &EvalContext<'_>, forces: &mut [Vector3<f64>]) -> f64;
}

/// Forces on every bead together with the energy of each term.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub forces: Vec<Vector3<f64>>,
    pub energies: EnergyBreakdown,
}

/// An ordered set of force terms evaluated together.
#[derive(Default)]
pub struct ForceField {
    forces: Vec<Box<dyn Force>>,
}

impl ForceField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, force: Box<dyn Force>) {
        self.forces.push(force);
    }

    pub fn add<F: Force + 'static>(&mut self, force: F) {
        self.forces.push(Box::new(force));
    }

    pub fn len(&self) -> usize {
        self.forces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.forces.iter().map(|f| f.name())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names().any(|n| n == name)
    }

    pub fn max_cutoff(&self) -> Option<f64> {
        self.forces
            .iter()
            .filter_map(|f| f.cutoff())
            .fold(None, |acc, c| Some(acc.map_or(c, |a: f64| a.max(c))))
    }

    pub fn evaluate(&self, positions: &[Point3<f64>], parallel: bool) -> Evaluation {
        let pairs = match self.max_cutoff() {
            Some(cutoff) => neighbors::pairs_within(positions, cutoff, parallel),
            None => Vec::new(),
        };
        let ctx = EvalContext {
            positions,
            pairs: &pairs,
            parallel,
        };

        let mut forces = vec![Vector3::zeros(); positions.len()];
        let mut energies = EnergyBreakdown::new();
        for force in &self.forces {
            let energy = force.compute(&ctx, &mut forces);
            energies.add(force.name(), energy);
        }
        Evaluation { forces, energies }
    }

    pub fn energy(&self, positions: &[Point3<f64>], parallel: bool) -> EnergyBreakdown {
        self.evaluate(positions, parallel).energies
    }
}

/// Adds the central force of a pair potential with radial derivative `de_dr`.
#[inline]
pub(crate) fn add_pair_force(
    positions: &[Point3<f64>],
    forces: &mut [Vector3<f64>],
    i: usize,
    j: usize,
    r: f64,
    de_dr: f64,
) {
    if r < MIN_PAIR_DISTANCE || de_dr == 0.0 {
        return;
    }
    let f = (positions[i] - positions[j]) * (-de_dr / r);
    forces[i] += f;
    forces[j] -= f;
}

/// Evaluates `potential` on the distance between `i` and `j` and applies its force.
#[inline]
pub(crate) fn apply_pair<P>(
    positions: &[Point3<f64>],
    forces: &mut [Vector3<f64>],
    i: usize,
    j: usize,
    potential: P,
) -> f64
where
    P: Fn(f64) -> (f64, f64),
{
    let r = (positions[i] - positions[j]).norm();
    let (energy, de_dr) = potential(r);
    add_pair_force(positions, forces, i, j, r, de_dr);
    energy
}

/// Sums `kernel` over the neighbor pairs of `ctx`, applying the resulting forces.
///
/// The kernel maps `(i, j, r)` to `(energy, dE/dr)` or `None` to skip the pair. In
/// parallel mode chunks of pairs accumulate into private force buffers that are reduced
/// at the end.
pub(crate) fn accumulate_pairs<K>(
    ctx: &EvalContext<'_>,
    forces: &mut [Vector3<f64>],
    kernel: K,
) -> f64
where
    K: Fn(usize, usize, f64) -> Option<(f64, f64)> + Sync,
{
    let apply = |acc: &mut [Vector3<f64>], pair: &NeighborPair| -> f64 {
        let (i, j, r) = *pair;
        match kernel(i, j, r) {
            Some((energy, de_dr)) => {
                add_pair_force(ctx.positions, acc, i, j, r, de_dr);
                energy
            }
            None => 0.0,
        }
    };

    #[cfg(feature = "parallel")]
    if ctx.parallel && ctx.pairs.len() > PAIR_CHUNK {
        let n = forces.len();
        let (energy, partial) = ctx
            .pairs
            .par_chunks(PAIR_CHUNK)
            .map(|chunk| {
                let mut local = vec![Vector3::zeros(); n];
                let energy: f64 = chunk.iter().map(|pair| apply(&mut local[..], pair)).sum();
                (energy, local)
            })
            .reduce(
                || (0.0, vec![Vector3::zeros(); n]),
                |(ea, mut fa), (eb, fb)| {
                    for (a, b) in fa.iter_mut().zip(fb) {
                        *a += b;
                    }
                    (ea + eb, fa)
                },
            );
        for (f, p) in forces.iter_mut().zip(partial) {
            *f += p;
        }
        return energy;
    }

    ctx.pairs.iter().map(|pair| apply(&mut *forces, pair)).sum()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    fn evaluate_single(force: &dyn Force, positions: &[Point3<f64>]) -> (f64, Vec<Vector3<f64>>) {
        let pairs = force
            .cutoff()
            .map(|c| neighbors::pairs_within(positions, c, false))
            .unwrap_or_default();
        let ctx = EvalContext {
            positions,
            pairs: &pairs,
            parallel: false,
        };
        let mut forces = vec![Vector3::zeros(); positions.len()];
        let energy = force.compute(&ctx, &mut forces);
        (energy, forces)
    }

    /// Checks the forces of `force` against a central-difference gradient of its energy.
    pub(crate) fn assert_forces_match_gradient(force: &dyn Force, positions: &[Point3<f64>]) {
        let (_, analytic) = evaluate_single(force, positions);

        let h = 1e-6;
        let mut work = positions.to_vec();
        for bead in 0..positions.len() {
            for axis in 0..3 {
                let original = work[bead][axis];
                work[bead][axis] = original + h;
                let up = evaluate_single(force, &work).0;
                work[bead][axis] = original - h;
                let down = evaluate_single(force, &work).0;
                work[bead][axis] = original;
                let numeric = -(up - down) / (2.0 * h);
                let a = analytic[bead][axis];
                assert!(
                    (a - numeric).abs() < 1e-4 * (1.0 + numeric.abs()),
                    "{}: bead {} axis {}: analytic {} vs numeric {}",
                    force.name(),
                    bead,
                    axis,
                    a,
                    numeric
                );
            }
        }
    }
}
