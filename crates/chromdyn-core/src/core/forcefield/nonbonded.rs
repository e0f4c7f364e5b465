use super::energy::{EvalContext, Force, accumulate_pairs, apply_pair};
use super::params::{IdealChromosomeTable, InteractionTable, ParamLoadError};
use super::potentials;
use crate::core::models::sequence::SequenceError;
use crate::core::models::system::{ChromatinSystem, Topology};
use nalgebra::Vector3;

pub const DEFAULT_E_CUT: f64 = 4.0;
pub const DEFAULT_MU: f64 = 3.22;
pub const DEFAULT_RC: f64 = 1.78;
pub const DEFAULT_CUTOFF: f64 = 3.0;
pub const DEFAULT_IC_DINIT: usize = 3;
pub const DEFAULT_IC_DEND: usize = 500;
pub const DEFAULT_LOOP_STRENGTH: f64 = -1.612990;

/// Shape of the attractive contact function shared by the MiChroM interaction terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactShape {
    pub mu: f64,
    pub rc: f64,
    pub cutoff: f64,
}

impl Default for ContactShape {
    fn default() -> Self {
        Self {
            mu: DEFAULT_MU,
            rc: DEFAULT_RC,
            cutoff: DEFAULT_CUTOFF,
        }
    }
}

impl ContactShape {
    #[inline]
    fn weight(&self, r: f64) -> Option<(f64, f64)> {
        (r < self.cutoff).then(|| potentials::contact_probability(r, self.mu, self.rc))
    }
}

/// Capped Lennard-Jones repulsion between all non-bonded beads.
#[derive(Debug, Clone)]
pub struct RepulsiveSoftCore {
    topology: Topology,
    e_cut: f64,
}

impl RepulsiveSoftCore {
    pub fn new(topology: &Topology, e_cut: f64) -> Self {
        Self {
            topology: topology.clone(),
            e_cut,
        }
    }
}

impl Force for RepulsiveSoftCore {
    fn name(&self) -> &str {
        "RepulsiveSoftCore"
    }

    fn cutoff(&self) -> Option<f64> {
        Some(potentials::WCA_CUTOFF)
    }

    fn compute(&self, ctx: &EvalContext<'_>, forces: &mut [Vector3<f64>]) -> f64 {
        accumulate_pairs(ctx, forces, |i, j, r| {
            if r >= potentials::WCA_CUTOFF || self.topology.is_bonded(i, j) {
                return None;
            }
            Some(potentials::soft_core(r, self.e_cut))
        })
    }
}

/// Pair attraction `α(a_i, a_j) f(r_ij)` with `α` looked up per bead class.
///
/// In type mode every bead maps to its chromatin type; in per-bead mode every bead is
/// its own class and the table is `N x N`.
#[derive(Debug, Clone)]
pub struct TypeToType {
    name: &'static str,
    topology: Topology,
    classes: Vec<usize>,
    table: InteractionTable,
    shape: ContactShape,
}

impl TypeToType {
    pub fn new(
        system: &ChromatinSystem,
        table: InteractionTable,
        shape: ContactShape,
    ) -> Result<Self, ParamLoadError> {
        let classes = system
            .sequence()
            .type_indices(table.names())
            .map_err(|e| match e {
                SequenceError::UnknownType(t) => ParamLoadError::UnknownType(t),
                other => ParamLoadError::UnknownType(other.to_string()),
            })?;
        Ok(Self {
            name: "TypetoType",
            topology: system.topology().clone(),
            classes,
            table,
            shape,
        })
    }

    /// Bead-resolution interactions from an `N x N` table.
    pub fn per_bead(
        system: &ChromatinSystem,
        table: InteractionTable,
        shape: ContactShape,
    ) -> Result<Self, ParamLoadError> {
        if table.len() != system.len() {
            return Err(ParamLoadError::Shape {
                path: "<memory>".to_string(),
                reason: format!(
                    "per-bead table has {} entries for {} beads",
                    table.len(),
                    system.len()
                ),
            });
        }
        Ok(Self {
            name: "PerBeadInteractions",
            topology: system.topology().clone(),
            classes: (0..system.len()).collect(),
            table,
            shape,
        })
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn table(&self) -> &InteractionTable {
        &self.table
    }
}

impl Force for TypeToType {
    fn name(&self) -> &str {
        self.name
    }

    fn cutoff(&self) -> Option<f64> {
        Some(self.shape.cutoff)
    }

    fn compute(&self, ctx: &EvalContext<'_>, forces: &mut [Vector3<f64>]) -> f64 {
        let values = self.table.values();
        accumulate_pairs(ctx, forces, |i, j, r| {
            if self.topology.is_bonded(i, j) {
                return None;
            }
            let alpha = values[(self.classes[i], self.classes[j])];
            if alpha == 0.0 {
                return None;
            }
            let (f, df) = self.shape.weight(r)?;
            Some((alpha * f, alpha * df))
        })
    }
}

/// Distance-dependent attraction `γ(|i-j|) f(r_ij)` along each chain.
#[derive(Debug, Clone)]
pub struct IdealChromosome {
    topology: Topology,
    gammas: IdealChromosomeTable,
    shape: ContactShape,
}

impl IdealChromosome {
    pub fn new(topology: &Topology, gammas: IdealChromosomeTable, shape: ContactShape) -> Self {
        Self {
            topology: topology.clone(),
            gammas,
            shape,
        }
    }

    /// The analytic MiChroM law between `dinit` and `dend`.
    pub fn analytic(topology: &Topology, dinit: usize, dend: usize, shape: ContactShape) -> Self {
        Self::new(topology, IdealChromosomeTable::analytic(dinit, dend), shape)
    }

    pub fn gammas(&self) -> &IdealChromosomeTable {
        &self.gammas
    }
}

impl Force for IdealChromosome {
    fn name(&self) -> &str {
        "IdealChromosome"
    }

    fn cutoff(&self) -> Option<f64> {
        Some(self.shape.cutoff)
    }

    fn compute(&self, ctx: &EvalContext<'_>, forces: &mut [Vector3<f64>]) -> f64 {
        accumulate_pairs(ctx, forces, |i, j, r| {
            if !self.topology.same_chain(i, j) {
                return None;
            }
            let gamma = self.gammas.gamma(j.abs_diff(i))?;
            let (f, df) = self.shape.weight(r)?;
            Some((gamma * f, gamma * df))
        })
    }
}

/// Attraction `x f(r_ij)` between listed loop anchors, independent of the neighbor list.
#[derive(Debug, Clone)]
pub struct Loops {
    pairs: Vec<(usize, usize)>,
    strength: f64,
    shape: ContactShape,
}

impl Loops {
    pub fn new(
        pairs: Vec<(usize, usize)>,
        n_beads: usize,
        strength: f64,
        shape: ContactShape,
    ) -> Result<Self, ParamLoadError> {
        if let Some(&(i, j)) = pairs.iter().find(|&&(i, j)| i >= n_beads || j >= n_beads) {
            return Err(ParamLoadError::Shape {
                path: "<memory>".to_string(),
                reason: format!(
                    "loop ({}, {}) references a bead outside 1..={}",
                    i + 1,
                    j + 1,
                    n_beads
                ),
            });
        }
        Ok(Self {
            pairs,
            strength,
            shape,
        })
    }

    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }
}

impl Force for Loops {
    fn name(&self) -> &str {
        "LoopForce"
    }

    fn compute(&self, ctx: &EvalContext<'_>, forces: &mut [Vector3<f64>]) -> f64 {
        let x = self.strength;
        self.pairs
            .iter()
            .map(|&(i, j)| {
                apply_pair(ctx.positions, forces, i, j, |r| {
                    let (f, df) = potentials::contact_probability(r, self.shape.mu, self.shape.rc);
                    (x * f, x * df)
                })
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::energy::ForceField;
    use crate::core::forcefield::energy::test_support::assert_forces_match_gradient;
    use crate::core::models::sequence::ChromSequence;
    use nalgebra::{DMatrix, Point3};

    fn compact_chain(n: usize) -> Vec<Point3<f64>> {
        (0..n)
            .map(|i| {
                let t = i as f64 * 1.1;
                Point3::new(1.3 * t.cos(), 1.3 * t.sin(), 0.45 * i as f64)
            })
            .collect()
    }

    fn system(types: &[&str]) -> ChromatinSystem {
        let sequence =
            ChromSequence::new(types.iter().map(|t| t.to_string()).collect()).unwrap();
        ChromatinSystem::single_chain(compact_chain(types.len()), sequence).unwrap()
    }

    #[test]
    fn soft_core_ignores_bonded_neighbors() {
        let positions = vec![Point3::origin(), Point3::new(0.5, 0.0, 0.0)];
        let sys = ChromatinSystem::single_chain(positions.clone(), ChromSequence::uniform(2, "A1"))
            .unwrap();
        let mut ff = ForceField::new();
        ff.add(RepulsiveSoftCore::new(sys.topology(), DEFAULT_E_CUT));
        assert_eq!(ff.energy(&positions, false).total(), 0.0);
    }

    #[test]
    fn soft_core_forces_match_numeric_gradient() {
        let positions = vec![
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.2, 0.9, 0.0),
            Point3::new(0.5, 0.5, 0.6),
        ];
        let sys = ChromatinSystem::single_chain(positions.clone(), ChromSequence::uniform(5, "A1"))
            .unwrap();
        let force = RepulsiveSoftCore::new(sys.topology(), DEFAULT_E_CUT);
        assert_forces_match_gradient(&force, &positions);
    }

    #[test]
    fn type_to_type_rejects_types_missing_from_table() {
        let sys = system(&["A1", "ZZ", "B1"]);
        let result = TypeToType::new(&sys, InteractionTable::michrom_default(), ContactShape::default());
        assert!(matches!(result, Err(ParamLoadError::UnknownType(t)) if t == "ZZ"));
    }

    #[test]
    fn type_to_type_forces_match_numeric_gradient() {
        let sys = system(&["A1", "A1", "B1", "B2", "A2", "B1", "NA", "A1", "B3", "B1"]);
        let force =
            TypeToType::new(&sys, InteractionTable::michrom_default(), ContactShape::default())
                .unwrap();
        assert_forces_match_gradient(&force, sys.positions());
    }

    #[test]
    fn per_bead_table_must_match_bead_count() {
        let sys = system(&["A1"; 4]);
        let names = (0..3).map(|i| i.to_string()).collect();
        let table = InteractionTable::zeros(names);
        assert!(TypeToType::per_bead(&sys, table, ContactShape::default()).is_err());
    }

    #[test]
    fn per_bead_uses_bead_resolution_values() {
        let positions = vec![
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        let sys = ChromatinSystem::single_chain(positions.clone(), ChromSequence::uniform(3, "A1"))
            .unwrap();
        let mut values = DMatrix::zeros(3, 3);
        values[(0, 2)] = -0.5;
        values[(2, 0)] = -0.5;
        let names = (0..3).map(|i| i.to_string()).collect();
        let table = InteractionTable::new(names, values).unwrap();

        let mut ff = ForceField::new();
        ff.add(TypeToType::per_bead(&sys, table, ContactShape::default()).unwrap());
        let r = 2f64.sqrt();
        let expected = -0.5 * potentials::contact_probability(r, DEFAULT_MU, DEFAULT_RC).0;
        assert!((ff.energy(&positions, false).total() - expected).abs() < 1e-12);
    }

    #[test]
    fn ideal_chromosome_skips_separations_below_dinit() {
        let positions = vec![
            Point3::origin(),
            Point3::new(0.7, 0.7, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let sys = ChromatinSystem::single_chain(positions.clone(), ChromSequence::uniform(3, "A1"))
            .unwrap();
        let mut ff = ForceField::new();
        ff.add(IdealChromosome::analytic(
            sys.topology(),
            DEFAULT_IC_DINIT,
            DEFAULT_IC_DEND,
            ContactShape::default(),
        ));
        assert_eq!(ff.energy(&positions, false).total(), 0.0);
    }

    #[test]
    fn ideal_chromosome_forces_match_numeric_gradient() {
        let sys = system(&["A1"; 12]);
        let force = IdealChromosome::analytic(
            sys.topology(),
            DEFAULT_IC_DINIT,
            DEFAULT_IC_DEND,
            ContactShape::default(),
        );
        assert_forces_match_gradient(&force, sys.positions());
    }

    #[test]
    fn loops_reject_out_of_range_anchors() {
        assert!(Loops::new(vec![(0, 5)], 5, DEFAULT_LOOP_STRENGTH, ContactShape::default()).is_err());
    }

    #[test]
    fn loop_forces_match_numeric_gradient() {
        let sys = system(&["A1"; 8]);
        let force =
            Loops::new(vec![(0, 7), (2, 5)], 8, DEFAULT_LOOP_STRENGTH, ContactShape::default())
                .unwrap();
        assert_forces_match_gradient(&force, sys.positions());
    }
}
