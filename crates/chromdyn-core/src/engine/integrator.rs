use crate::core::forcefield::energy::ForceField;
use crate::core::forcefield::term::EnergyBreakdown;
use nalgebra::{Point3, Vector3};
use rand::Rng;
use rand_distr::{Distribution, Normal, StandardNormal};

/// Positions, velocities and current forces of all beads (unit mass).
#[derive(Debug, Clone, Default)]
pub struct DynamicsState {
    pub positions: Vec<Point3<f64>>,
    pub velocities: Vec<Vector3<f64>>,
    pub forces: Vec<Vector3<f64>>,
}

impl DynamicsState {
    pub fn kinetic_energy(&self) -> f64 {
        kinetic_energy(&self.velocities)
    }

    pub fn is_finite(&self) -> bool {
        self.positions
            .iter()
            .all(|p| p.coords.iter().all(|c| c.is_finite()))
            && self
                .velocities
                .iter()
                .all(|v| v.iter().all(|c| c.is_finite()))
    }
}

/// Langevin dynamics with the BAOAB splitting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LangevinIntegrator {
    pub time_step: f64,
    pub friction: f64,
    pub temperature: f64,
}

impl LangevinIntegrator {
    pub fn new(time_step: f64, friction: f64, temperature: f64) -> Self {
        Self {
            time_step,
            friction,
            temperature,
        }
    }

    /// Advances `state` by one step and returns the potential energy at the new positions.
    ///
    /// `state.forces` must hold the forces at the current positions on entry and holds
    /// the forces at the new positions on return.
    pub fn step<R: Rng + ?Sized>(
        &self,
        state: &mut DynamicsState,
        forcefield: &ForceField,
        parallel: bool,
        rng: &mut R,
    ) -> EnergyBreakdown {
        let dt = self.time_step;
        let half = 0.5 * dt;
        let c1 = (-self.friction * dt).exp();
        let c2 = (1.0 - c1 * c1).max(0.0).sqrt() * self.temperature.sqrt();

        for (v, f) in state.velocities.iter_mut().zip(&state.forces) {
            *v += f * half;
        }
        for (x, v) in state.positions.iter_mut().zip(&state.velocities) {
            *x += v * half;
        }
        for v in state.velocities.iter_mut() {
            let noise = Vector3::new(
                StandardNormal.sample(rng),
                StandardNormal.sample(rng),
                StandardNormal.sample(rng),
            );
            *v = *v * c1 + noise * c2;
        }
        for (x, v) in state.positions.iter_mut().zip(&state.velocities) {
            *x += v * half;
        }

        let eval = forcefield.evaluate(&state.positions, parallel);
        state.forces = eval.forces;
        for (v, f) in state.velocities.iter_mut().zip(&state.forces) {
            *v += f * half;
        }
        eval.energies
    }
}

pub fn kinetic_energy(velocities: &[Vector3<f64>]) -> f64 {
    0.5 * velocities.iter().map(|v| v.norm_squared()).sum::<f64>()
}

/// Instantaneous temperature from the kinetic energy with three degrees of freedom per bead.
pub fn instantaneous_temperature(kinetic: f64, n_beads: usize) -> f64 {
    if n_beads == 0 {
        return 0.0;
    }
    2.0 * kinetic / (3.0 * n_beads as f64)
}

/// Velocities drawn at temperature `kt` with the net momentum removed.
pub fn maxwell_boltzmann<R: Rng + ?Sized>(n: usize, kt: f64, rng: &mut R) -> Vec<Vector3<f64>> {
    let sigma = kt.max(0.0).sqrt();
    let dist = match Normal::new(0.0, sigma) {
        Ok(d) => d,
        Err(_) => return vec![Vector3::zeros(); n],
    };
    let mut velocities: Vec<Vector3<f64>> = (0..n)
        .map(|_| Vector3::new(dist.sample(rng), dist.sample(rng), dist.sample(rng)))
        .collect();
    if n > 0 {
        let mean: Vector3<f64> = velocities.iter().sum::<Vector3<f64>>() / n as f64;
        for v in &mut velocities {
            *v -= mean;
        }
    }
    velocities
}
