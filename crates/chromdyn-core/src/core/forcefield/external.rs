use super::energy::{EvalContext, Force};
use super::potentials;
use nalgebra::Vector3;
use std::f64::consts::PI;

pub const DEFAULT_RESTRAINT_K: f64 = 5e-3;
pub const DEFAULT_RESTRAINT_RADIUS: f64 = 10.0;
pub const DEFAULT_CONFINEMENT_DENSITY: f64 = 0.1;
pub const DEFAULT_CONFINEMENT_K: f64 = 5.0;

/// Below this gap the wall potential continues linearly so that escaped beads feel a
/// bounded restoring force.
const MIN_WALL_GAP: f64 = 0.8;

/// Harmonic pull towards the origin for beads farther than `radius`.
#[derive(Debug, Clone)]
pub struct FlatBottomHarmonic {
    k: f64,
    radius: f64,
}

impl FlatBottomHarmonic {
    pub fn new(k: f64, radius: f64) -> Self {
        Self { k, radius }
    }
}

impl Force for FlatBottomHarmonic {
    fn name(&self) -> &str {
        "FlatBottomHarmonic"
    }

    fn compute(&self, ctx: &EvalContext<'_>, forces: &mut [Vector3<f64>]) -> f64 {
        let mut energy = 0.0;
        for (p, f) in ctx.positions.iter().zip(forces.iter_mut()) {
            let r = p.coords.norm();
            let (e, de_dr) = potentials::flat_bottom_harmonic(r, self.k, self.radius);
            if de_dr != 0.0 {
                *f -= p.coords * (de_dr / r);
            }
            energy += e;
        }
        energy
    }
}

/// Spherical wall centred at the origin.
///
/// Beads inside `radius` feel nothing; past it a WCA wall rises and diverges at
/// `radius + 2^(1/6)`.
#[derive(Debug, Clone)]
pub struct SphericalConfinement {
    radius: f64,
    k: f64,
}

impl SphericalConfinement {
    pub fn new(radius: f64, k: f64) -> Self {
        Self { radius, k }
    }

    /// Radius of the sphere holding `n_beads` at the given bead density.
    pub fn radius_for_density(n_beads: usize, density: f64) -> f64 {
        (3.0 * n_beads as f64 / (4.0 * PI * density)).cbrt()
    }

    pub fn from_density(n_beads: usize, density: f64, k: f64) -> Self {
        Self::new(Self::radius_for_density(n_beads, density), k)
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    fn wall(&self, r: f64) -> (f64, f64) {
        if r <= self.radius {
            return (0.0, 0.0);
        }
        let gap = self.radius + potentials::WCA_CUTOFF - r;
        if gap >= MIN_WALL_GAP {
            let (e, de_dgap) = potentials::lj_wall(gap, 1.0, self.k);
            return (e, -de_dgap);
        }
        let (e0, de_dgap) = potentials::lj_wall(MIN_WALL_GAP, 1.0, self.k);
        (e0 + de_dgap * (gap - MIN_WALL_GAP), -de_dgap)
    }
}

impl Force for SphericalConfinement {
    fn name(&self) -> &str {
        "SphericalConfinement"
    }

    fn compute(&self, ctx: &EvalContext<'_>, forces: &mut [Vector3<f64>]) -> f64 {
        let mut energy = 0.0;
        for (p, f) in ctx.positions.iter().zip(forces.iter_mut()) {
            let r = p.coords.norm();
            let (e, de_dr) = self.wall(r);
            if de_dr != 0.0 {
                *f -= p.coords * (de_dr / r);
            }
            energy += e;
        }
        energy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::energy::ForceField;
    use crate::core::forcefield::energy::test_support::assert_forces_match_gradient;
    use nalgebra::Point3;

    #[test]
    fn restraint_is_inactive_inside_radius() {
        let mut ff = ForceField::new();
        ff.add(FlatBottomHarmonic::new(DEFAULT_RESTRAINT_K, DEFAULT_RESTRAINT_RADIUS));
        let positions = vec![Point3::new(3.0, 4.0, 0.0)];
        let eval = ff.evaluate(&positions, false);
        assert_eq!(eval.energies.total(), 0.0);
        assert_eq!(eval.forces[0], Vector3::zeros());
    }

    #[test]
    fn restraint_pulls_outer_beads_inwards() {
        let mut ff = ForceField::new();
        ff.add(FlatBottomHarmonic::new(1.0, 10.0));
        let positions = vec![Point3::new(12.0, 0.0, 0.0)];
        let eval = ff.evaluate(&positions, false);
        assert!((eval.energies.total() - 4.0).abs() < 1e-12);
        assert!((eval.forces[0].x + 4.0).abs() < 1e-12);
    }

    #[test]
    fn restraint_forces_match_numeric_gradient() {
        let force = FlatBottomHarmonic::new(0.5, 2.0);
        let positions = vec![Point3::new(2.5, 1.0, -0.5), Point3::new(0.1, 0.2, 0.3)];
        assert_forces_match_gradient(&force, &positions);
    }

    #[test]
    fn confinement_radius_follows_density() {
        let radius = SphericalConfinement::radius_for_density(1000, 0.1);
        let volume = 4.0 / 3.0 * PI * radius.powi(3);
        assert!((1000.0 / volume - 0.1).abs() < 1e-9);
    }

    #[test]
    fn confinement_forces_match_numeric_gradient() {
        let force = SphericalConfinement::new(3.0, DEFAULT_CONFINEMENT_K);
        let positions = vec![
            Point3::new(3.3, 0.0, 0.2),
            Point3::new(0.0, 3.9, 0.5),
            Point3::new(0.5, 0.5, 0.5),
        ];
        assert_forces_match_gradient(&force, &positions);
    }

    #[test]
    fn confinement_pushes_escaped_beads_back() {
        let mut ff = ForceField::new();
        ff.add(SphericalConfinement::new(3.0, DEFAULT_CONFINEMENT_K));
        let eval = ff.evaluate(&[Point3::new(5.0, 0.0, 0.0)], false);
        assert!(eval.forces[0].x < 0.0);
        assert!(eval.energies.total().is_finite());
    }
}
