use crate::core::forcefield::bonded::{
    DEFAULT_ANGLE_KA, DEFAULT_FENE_K, DEFAULT_FENE_R0,
};
use crate::core::forcefield::external::{DEFAULT_RESTRAINT_K, DEFAULT_RESTRAINT_RADIUS};
use crate::core::forcefield::nonbonded::{
    ContactShape, DEFAULT_E_CUT, DEFAULT_IC_DEND, DEFAULT_IC_DINIT,
};
use crate::core::forcefield::params::InteractionTable;
use crate::core::forcefield::term::EnergyBreakdown;
use crate::core::io::StructureFormat;
use crate::engine::config::{InitMode, ReporterConfig, SimulationConfig};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::simulation::Simulation;
use std::path::PathBuf;
use tracing::{info, instrument};

/// Where the initial coordinates come from.
#[derive(Debug, Clone, PartialEq)]
pub enum StructureInput {
    /// Generate coordinates for the beads listed in a sequence file.
    Sequence {
        path: PathBuf,
        mode: InitMode,
        is_ring: bool,
    },
    /// Read coordinates and bead types from a structure file or `.cndb` trajectory.
    File { path: PathBuf },
}

/// One force term to add, with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ForceSpec {
    FeneBonds { k: f64, r0: f64 },
    HarmonicBonds { k: f64, r0: f64 },
    Angles { ka: f64 },
    RepulsiveSoftCore { e_cut: f64 },
    /// Type-to-type energies from a table file, or the published MiChroM table.
    TypeToType {
        table: Option<PathBuf>,
        shape: ContactShape,
    },
    PerBeadInteractions { path: PathBuf, shape: ContactShape },
    IdealChromosome {
        dinit: usize,
        dend: usize,
        shape: ContactShape,
    },
    CustomIdealChromosome { path: PathBuf, shape: ContactShape },
    Loops {
        path: PathBuf,
        strength: f64,
        shape: ContactShape,
    },
    FlatBottomHarmonic { k: f64, radius: f64 },
    SphericalConfinement {
        radius: Option<f64>,
        density: f64,
        k: f64,
    },
}

impl ForceSpec {
    /// The standard MiChroM force field: FENE bonds, angles, soft-core repulsion,
    /// type-to-type and ideal-chromosome attraction, and a flat-bottom restraint.
    pub fn michrom_default() -> Vec<ForceSpec> {
        vec![
            ForceSpec::FeneBonds {
                k: DEFAULT_FENE_K,
                r0: DEFAULT_FENE_R0,
            },
            ForceSpec::Angles {
                ka: DEFAULT_ANGLE_KA,
            },
            ForceSpec::RepulsiveSoftCore {
                e_cut: DEFAULT_E_CUT,
            },
            ForceSpec::TypeToType {
                table: None,
                shape: ContactShape::default(),
            },
            ForceSpec::IdealChromosome {
                dinit: DEFAULT_IC_DINIT,
                dend: DEFAULT_IC_DEND,
                shape: ContactShape::default(),
            },
            ForceSpec::FlatBottomHarmonic {
                k: DEFAULT_RESTRAINT_K,
                radius: DEFAULT_RESTRAINT_RADIUS,
            },
        ]
    }

    fn apply(&self, sim: &mut Simulation) -> Result<(), EngineError> {
        match self {
            Self::FeneBonds { k, r0 } => sim.add_fene_bonds(*k, *r0),
            Self::HarmonicBonds { k, r0 } => sim.add_harmonic_bonds(*k, *r0),
            Self::Angles { ka } => sim.add_angles(*ka),
            Self::RepulsiveSoftCore { e_cut } => sim.add_repulsive_soft_core(*e_cut),
            Self::TypeToType { table, shape } => {
                let table = table
                    .as_deref()
                    .map(InteractionTable::load)
                    .transpose()?;
                sim.add_type_to_type(table, *shape)
            }
            Self::PerBeadInteractions { path, shape } => {
                sim.add_per_bead_interactions(path, *shape)
            }
            Self::IdealChromosome { dinit, dend, shape } => {
                sim.add_ideal_chromosome(*dinit, *dend, *shape)
            }
            Self::CustomIdealChromosome { path, shape } => {
                sim.add_custom_ideal_chromosome(path, *shape)
            }
            Self::Loops {
                path,
                strength,
                shape,
            } => sim.add_loops(path, *strength, *shape),
            Self::FlatBottomHarmonic { k, radius } => sim.add_flat_bottom_harmonic(*k, *radius),
            Self::SphericalConfinement { radius, density, k } => {
                sim.add_spherical_confinement(*radius, *density, *k)
            }
        }
    }
}

/// Everything needed to set up, run and save one simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationPlan {
    pub config: SimulationConfig,
    pub output_dir: PathBuf,
    pub input: StructureInput,
    pub center: bool,
    pub forces: Vec<ForceSpec>,
    pub reporters: ReporterConfig,
    pub steps: u64,
    /// Steps between stability checks and progress updates.
    pub block: u64,
    /// Log a status line after every block.
    pub verbose_blocks: bool,
    pub save_formats: Vec<StructureFormat>,
}

#[derive(Debug, Clone)]
pub struct SimulationSummary {
    pub steps: u64,
    pub energies: EnergyBreakdown,
    pub radius_of_gyration: f64,
    pub n_beads: usize,
    /// Reporter outputs and saved structures, in the order they were written.
    pub files: Vec<PathBuf>,
}

#[instrument(skip_all, name = "simulation_workflow")]
pub fn run(
    plan: &SimulationPlan,
    reporter: &ProgressReporter,
) -> Result<SimulationSummary, EngineError> {
    reporter.report(Progress::PhaseStart { name: "Setup" });
    let mut sim = Simulation::new(plan.config.clone());
    sim.save_folder(&plan.output_dir)?;

    match &plan.input {
        StructureInput::Sequence {
            path,
            mode,
            is_ring,
        } => {
            let positions = sim.init_structure_from_file(*mode, path, *is_ring)?;
            sim.load_structure(positions, plan.center)?;
        }
        StructureInput::File { path } => sim.load_structure_file(path, plan.center)?,
    }
    for force in &plan.forces {
        force.apply(&mut sim)?;
    }
    sim.create_simulation()?;
    sim.create_reporters(&plan.reporters)?;
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart { name: "Dynamics" });
    let outcome = sim.run(plan.steps, plan.verbose_blocks, plan.block, reporter);
    let mut files = sim.finish_reporters()?;
    outcome?;
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart { name: "Output" });
    let energies = sim.print_forces()?;
    for format in &plan.save_formats {
        files.push(sim.save_structure(None, *format)?);
    }
    reporter.report(Progress::PhaseFinish);

    let summary = SimulationSummary {
        steps: sim.step(),
        energies,
        radius_of_gyration: sim.radius_of_gyration()?,
        n_beads: sim.positions()?.len(),
        files,
    };
    info!(
        steps = summary.steps,
        rg = summary.radius_of_gyration,
        files = summary.files.len(),
        "Simulation workflow complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::{SimulationConfigBuilder, TrajectoryFormat};
    use std::fs;
    use tempfile::tempdir;

    fn write_sequence(path: &std::path::Path, n: usize) {
        let types = ["A1", "A2", "B1", "B2", "B3", "B4", "NA"];
        let body: String = (0..n)
            .map(|i| format!("{} {}\n", i + 1, types[(i / 6) % types.len()]))
            .collect();
        fs::write(path, body).unwrap();
    }

    fn plan(dir: &std::path::Path) -> SimulationPlan {
        let seq = dir.join("beads.txt");
        write_sequence(&seq, 60);
        SimulationPlan {
            config: SimulationConfigBuilder::new()
                .name("test")
                .seed(Some(11))
                .build()
                .unwrap(),
            output_dir: dir.join("output"),
            input: StructureInput::Sequence {
                path: seq,
                mode: InitMode::Spring,
                is_ring: false,
            },
            center: true,
            forces: ForceSpec::michrom_default(),
            reporters: ReporterConfig {
                statistics: true,
                trajectory: true,
                format: TrajectoryFormat::Structure(StructureFormat::Pdb),
                interval: 200,
                energy_components: false,
            },
            steps: 400,
            block: 100,
            verbose_blocks: true,
            save_formats: StructureFormat::ALL.to_vec(),
        }
    }

    #[test]
    fn default_scenario_writes_reports_and_structures() {
        let dir = tempdir().unwrap();
        let summary = run(&plan(dir.path()), &ProgressReporter::new()).unwrap();

        assert_eq!(summary.steps, 400);
        assert_eq!(summary.n_beads, 60);
        assert_eq!(summary.energies.len(), 6);
        assert!(summary.energies.total().is_finite());

        let out = dir.path().join("output");
        assert!(out.join("test_statistics.csv").exists());
        assert!(out.join("test_1.pdb").exists());
        assert!(out.join("test_2.pdb").exists());
        for ext in ["ndb", "pdb", "gro", "xyz"] {
            assert!(out.join(format!("test_400.{}", ext)).exists());
        }
        assert_eq!(summary.files.len(), 1 + 2 + 4);
    }

    #[test]
    fn restart_from_saved_structure() {
        let dir = tempdir().unwrap();
        let first = run(&plan(dir.path()), &ProgressReporter::new()).unwrap();
        let saved = first
            .files
            .iter()
            .find(|f| f.extension().is_some_and(|e| e == "ndb"))
            .cloned()
            .unwrap();

        let mut restart = plan(dir.path());
        restart.input = StructureInput::File { path: saved };
        restart.output_dir = dir.path().join("restart");
        restart.steps = 100;
        restart.save_formats = vec![];
        let second = run(&restart, &ProgressReporter::new()).unwrap();
        assert_eq!(second.n_beads, 60);
        assert_eq!(second.steps, 100);
    }

    #[test]
    fn missing_sequence_file_is_reported() {
        let dir = tempdir().unwrap();
        let mut bad = plan(dir.path());
        bad.input = StructureInput::Sequence {
            path: dir.path().join("missing.txt"),
            mode: InitMode::Line,
            is_ring: false,
        };
        assert!(matches!(
            run(&bad, &ProgressReporter::new()),
            Err(EngineError::Sequence(_))
        ));
    }
}
