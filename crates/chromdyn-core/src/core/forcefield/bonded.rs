use super::energy::{EvalContext, Force, apply_pair};
use super::potentials;
use crate::core::models::system::Topology;
use nalgebra::Vector3;

pub const DEFAULT_FENE_K: f64 = 30.0;
pub const DEFAULT_FENE_R0: f64 = 1.5;
pub const DEFAULT_HARMONIC_K: f64 = 30.0;
pub const DEFAULT_HARMONIC_R0: f64 = 1.0;
pub const DEFAULT_ANGLE_KA: f64 = 2.0;

const MIN_ARM_LENGTH: f64 = 1e-9;

/// Finitely extensible bonds combined with a WCA core between bonded beads.
#[derive(Debug, Clone)]
pub struct FeneBonds {
    bonds: Vec<(usize, usize)>,
    k: f64,
    r0: f64,
}

impl FeneBonds {
    pub fn new(topology: &Topology, k: f64, r0: f64) -> Self {
        Self {
            bonds: topology.bonds(),
            k,
            r0,
        }
    }

    pub fn bonds(&self) -> &[(usize, usize)] {
        &self.bonds
    }
}

impl Force for FeneBonds {
    fn name(&self) -> &str {
        "FENEBond"
    }

    fn compute(&self, ctx: &EvalContext<'_>, forces: &mut [Vector3<f64>]) -> f64 {
        self.bonds
            .iter()
            .map(|&(i, j)| {
                apply_pair(ctx.positions, forces, i, j, |r| {
                    let (e_fene, d_fene) = potentials::fene(r, self.k, self.r0);
                    let (e_wca, d_wca) = potentials::wca(r, 1.0, 1.0);
                    (e_fene + e_wca, d_fene + d_wca)
                })
            })
            .sum()
    }
}

/// Harmonic springs between bonded beads.
#[derive(Debug, Clone)]
pub struct HarmonicBonds {
    bonds: Vec<(usize, usize)>,
    k: f64,
    r0: f64,
}

impl HarmonicBonds {
    pub fn new(topology: &Topology, k: f64, r0: f64) -> Self {
        Self {
            bonds: topology.bonds(),
            k,
            r0,
        }
    }
}

impl Force for HarmonicBonds {
    fn name(&self) -> &str {
        "HarmonicBond"
    }

    fn compute(&self, ctx: &EvalContext<'_>, forces: &mut [Vector3<f64>]) -> f64 {
        self.bonds
            .iter()
            .map(|&(i, j)| {
                apply_pair(ctx.positions, forces, i, j, |r| {
                    potentials::harmonic(r, self.k, self.r0)
                })
            })
            .sum()
    }
}

/// Bending stiffness `ka (1 - cos(θ - π))` on every consecutive triple.
#[derive(Debug, Clone)]
pub struct Angles {
    triples: Vec<(usize, usize, usize)>,
    ka: f64,
}

impl Angles {
    pub fn new(topology: &Topology, ka: f64) -> Self {
        Self {
            triples: topology.angles(),
            ka,
        }
    }
}

impl Force for Angles {
    fn name(&self) -> &str {
        "AngleForce"
    }

    fn compute(&self, ctx: &EvalContext<'_>, forces: &mut [Vector3<f64>]) -> f64 {
        let mut energy = 0.0;
        for &(a, b, c) in &self.triples {
            let u = ctx.positions[a] - ctx.positions[b];
            let v = ctx.positions[c] - ctx.positions[b];
            let (lu, lv) = (u.norm(), v.norm());
            if lu < MIN_ARM_LENGTH || lv < MIN_ARM_LENGTH {
                continue;
            }
            let cos = (u.dot(&v) / (lu * lv)).clamp(-1.0, 1.0);
            energy += potentials::angle(cos.acos(), self.ka).0;

            // E = ka (1 + cos θ), so dE/dcos θ = ka.
            let grad_a = (v / (lu * lv) - u * (cos / (lu * lu))) * self.ka;
            let grad_c = (u / (lu * lv) - v * (cos / (lv * lv))) * self.ka;
            forces[a] -= grad_a;
            forces[c] -= grad_c;
            forces[b] += grad_a + grad_c;
        }
        energy
    }
}
