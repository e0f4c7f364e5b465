use super::config::{InitMode, ReporterConfig, SimulationConfig, TrajectoryFormat};
use super::error::EngineError;
use super::init;
use super::integrator::{DynamicsState, LangevinIntegrator, kinetic_energy, maxwell_boltzmann};
use super::progress::{Progress, ProgressReporter};
use super::reporters::{
    EnergyComponentsReporter, Reporter, Snapshot, StatisticsReporter, TrajectoryReporter,
};
use crate::core::forcefield::bonded::{Angles, FeneBonds, HarmonicBonds};
use crate::core::forcefield::energy::{Force, ForceField};
use crate::core::forcefield::external::{FlatBottomHarmonic, SphericalConfinement};
use crate::core::forcefield::nonbonded::{
    ContactShape, IdealChromosome, Loops, RepulsiveSoftCore, TypeToType,
};
use crate::core::forcefield::params::{IdealChromosomeTable, InteractionTable, read_loops};
use crate::core::forcefield::term::EnergyBreakdown;
use crate::core::io::{StructureFormat, read_structure};
use crate::core::io::cndb::{CNDB_EXTENSION, CndbReader};
use crate::core::models::sequence::ChromSequence;
use crate::core::models::system::{Chain, ChromatinSystem};
use crate::core::utils::geometry;
use nalgebra::{Point3, Vector3};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Bead types and chain layout remembered between `init_structure` and `load_structure`.
#[derive(Debug, Clone)]
struct Layout {
    sequence: ChromSequence,
    chains: Vec<Chain>,
}

/// Molecular dynamics driver for a single chromatin system.
///
/// The lifecycle is: choose a save folder, initialize or load a structure, add forces,
/// [`Simulation::create_simulation`], attach reporters, then [`Simulation::run`] in as
/// many blocks as needed.
pub struct Simulation {
    config: SimulationConfig,
    folder: PathBuf,
    layout: Option<Layout>,
    system: Option<ChromatinSystem>,
    forcefield: ForceField,
    integrator: LangevinIntegrator,
    state: Option<DynamicsState>,
    energies: EnergyBreakdown,
    reporters: Vec<Box<dyn Reporter>>,
    rng: StdRng,
    step: u64,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let integrator =
            LangevinIntegrator::new(config.time_step, config.collision_rate, config.temperature);
        info!(
            name = %config.name,
            platform = %config.platform,
            temperature = config.temperature,
            time_step = config.time_step,
            "Simulation initialized"
        );
        Self {
            config,
            folder: PathBuf::from("."),
            layout: None,
            system: None,
            forcefield: ForceField::new(),
            integrator,
            state: None,
            energies: EnergyBreakdown::new(),
            reporters: Vec::new(),
            rng,
            step: 0,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Sets (and creates) the folder that receives every output file.
    pub fn save_folder(&mut self, folder: &Path) -> Result<(), EngineError> {
        fs::create_dir_all(folder).map_err(|source| EngineError::Io {
            path: folder.to_path_buf(),
            source,
        })?;
        self.folder = folder.to_path_buf();
        Ok(())
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Generates initial coordinates for a single chain with the given bead types.
    ///
    /// The sequence is remembered and used by the next [`Simulation::load_structure`].
    pub fn init_structure(
        &mut self,
        mode: InitMode,
        sequence: ChromSequence,
        is_ring: bool,
    ) -> Vec<Point3<f64>> {
        let chains = vec![Chain::new(0, sequence.len(), is_ring)];
        self.init_structure_with_chains(mode, sequence, chains)
    }

    pub fn init_structure_from_file(
        &mut self,
        mode: InitMode,
        sequence_path: &Path,
        is_ring: bool,
    ) -> Result<Vec<Point3<f64>>, EngineError> {
        let sequence = ChromSequence::from_path(sequence_path)?;
        info!(
            path = %sequence_path.display(),
            beads = sequence.len(),
            types = sequence.unique_types().len(),
            "Loaded bead sequence"
        );
        Ok(self.init_structure(mode, sequence, is_ring))
    }

    pub fn init_structure_with_chains(
        &mut self,
        mode: InitMode,
        sequence: ChromSequence,
        chains: Vec<Chain>,
    ) -> Vec<Point3<f64>> {
        let positions = init::init_structure(mode, &chains, &mut self.rng);
        self.layout = Some(Layout { sequence, chains });
        positions
    }

    /// Loads coordinates for the sequence given to the last `init_structure` call.
    pub fn load_structure(
        &mut self,
        positions: Vec<Point3<f64>>,
        center: bool,
    ) -> Result<(), EngineError> {
        self.ensure_not_created()?;
        let layout = self.layout.clone().ok_or_else(|| {
            EngineError::InvalidArgument(
                "bead types unknown; call init_structure or load a structure file".into(),
            )
        })?;
        let system = ChromatinSystem::new(positions, layout.sequence, layout.chains)?;
        self.set_system(system, center);
        Ok(())
    }

    /// Loads a structure file (`ndb`, `pdb`, `gro`, `xyz`) or the last frame of a `.cndb`.
    pub fn load_structure_file(&mut self, path: &Path, center: bool) -> Result<(), EngineError> {
        self.ensure_not_created()?;
        let is_cndb = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(CNDB_EXTENSION));
        let system = if is_cndb {
            let mut reader = CndbReader::open(path)?;
            let last = reader.n_frames();
            let positions = reader.positions(last)?;
            let header = reader.header().clone();
            ChromatinSystem::new(positions, ChromSequence::new(header.types)?, header.chains)?
        } else {
            read_structure(path)?
        };
        info!(path = %path.display(), beads = system.len(), "Loaded structure");
        self.layout = Some(Layout {
            sequence: system.sequence().clone(),
            chains: system.chains().to_vec(),
        });
        self.set_system(system, center);
        Ok(())
    }

    fn set_system(&mut self, mut system: ChromatinSystem, center: bool) {
        if center {
            system.recenter();
        }
        debug!(
            beads = system.len(),
            chains = system.chains().len(),
            rg = system.radius_of_gyration(),
            "Structure set"
        );
        self.system = Some(system);
    }

    fn ensure_not_created(&self) -> Result<(), EngineError> {
        if self.state.is_some() {
            return Err(EngineError::AlreadyCreated);
        }
        Ok(())
    }

    /// The loaded system, for force construction before the simulation is created.
    fn system_for_forces(&self) -> Result<&ChromatinSystem, EngineError> {
        self.ensure_not_created()?;
        self.system.as_ref().ok_or(EngineError::NoStructure)
    }

    fn push_force(&mut self, force: Box<dyn Force>) {
        info!(force = force.name(), "Force added");
        self.forcefield.push(force);
    }

    pub fn add_fene_bonds(&mut self, k: f64, r0: f64) -> Result<(), EngineError> {
        let force = FeneBonds::new(self.system_for_forces()?.topology(), k, r0);
        self.push_force(Box::new(force));
        Ok(())
    }

    pub fn add_harmonic_bonds(&mut self, k: f64, r0: f64) -> Result<(), EngineError> {
        let force = HarmonicBonds::new(self.system_for_forces()?.topology(), k, r0);
        self.push_force(Box::new(force));
        Ok(())
    }

    pub fn add_angles(&mut self, ka: f64) -> Result<(), EngineError> {
        let force = Angles::new(self.system_for_forces()?.topology(), ka);
        self.push_force(Box::new(force));
        Ok(())
    }

    pub fn add_repulsive_soft_core(&mut self, e_cut: f64) -> Result<(), EngineError> {
        let force = RepulsiveSoftCore::new(self.system_for_forces()?.topology(), e_cut);
        self.push_force(Box::new(force));
        Ok(())
    }

    /// Type-to-type attraction; the published MiChroM table is used when `table` is `None`.
    pub fn add_type_to_type(
        &mut self,
        table: Option<InteractionTable>,
        shape: ContactShape,
    ) -> Result<(), EngineError> {
        let table = table.unwrap_or_else(InteractionTable::michrom_default);
        let force = TypeToType::new(self.system_for_forces()?, table, shape)?;
        self.push_force(Box::new(force));
        Ok(())
    }

    pub fn add_custom_types(&mut self, path: &Path, shape: ContactShape) -> Result<(), EngineError> {
        let system = self.system_for_forces()?;
        let table = InteractionTable::load(path)?;
        let force = TypeToType::new(system, table, shape)?.with_name("CustomTypes");
        self.push_force(Box::new(force));
        Ok(())
    }

    pub fn add_per_bead_interactions(
        &mut self,
        path: &Path,
        shape: ContactShape,
    ) -> Result<(), EngineError> {
        let system = self.system_for_forces()?;
        let table = InteractionTable::load(path)?;
        let force = TypeToType::per_bead(system, table, shape)?;
        self.push_force(Box::new(force));
        Ok(())
    }

    pub fn add_ideal_chromosome(
        &mut self,
        dinit: usize,
        dend: usize,
        shape: ContactShape,
    ) -> Result<(), EngineError> {
        if dend <= dinit {
            return Err(EngineError::InvalidArgument(format!(
                "ideal chromosome range [{}, {}) is empty",
                dinit, dend
            )));
        }
        let force =
            IdealChromosome::analytic(self.system_for_forces()?.topology(), dinit, dend, shape);
        self.push_force(Box::new(force));
        Ok(())
    }

    pub fn add_custom_ideal_chromosome(
        &mut self,
        path: &Path,
        shape: ContactShape,
    ) -> Result<(), EngineError> {
        let topology = self.system_for_forces()?.topology();
        let gammas = IdealChromosomeTable::load(path)?;
        let force = IdealChromosome::new(topology, gammas, shape);
        self.push_force(Box::new(force));
        Ok(())
    }

    pub fn add_loops(
        &mut self,
        path: &Path,
        strength: f64,
        shape: ContactShape,
    ) -> Result<(), EngineError> {
        let n_beads = self.system_for_forces()?.len();
        let pairs = read_loops(path)?;
        let force = Loops::new(pairs, n_beads, strength, shape)?;
        self.push_force(Box::new(force));
        Ok(())
    }

    pub fn add_flat_bottom_harmonic(&mut self, k: f64, radius: f64) -> Result<(), EngineError> {
        self.system_for_forces()?;
        self.push_force(Box::new(FlatBottomHarmonic::new(k, radius)));
        Ok(())
    }

    /// Spherical wall; without an explicit radius it is derived from the bead density.
    pub fn add_spherical_confinement(
        &mut self,
        radius: Option<f64>,
        density: f64,
        k: f64,
    ) -> Result<(), EngineError> {
        let n_beads = self.system_for_forces()?.len();
        let force = match radius {
            Some(r) => SphericalConfinement::new(r, k),
            None => SphericalConfinement::from_density(n_beads, density, k),
        };
        info!(radius = force.radius(), "Spherical confinement radius");
        self.push_force(Box::new(force));
        Ok(())
    }

    pub fn forcefield(&self) -> &ForceField {
        &self.forcefield
    }

    /// Freezes the force field, draws initial velocities and evaluates the initial forces.
    pub fn create_simulation(&mut self) -> Result<(), EngineError> {
        self.ensure_not_created()?;
        let system = self.system.as_ref().ok_or(EngineError::NoStructure)?;
        if self.forcefield.is_empty() {
            warn!("Creating a simulation without any force terms");
        }
        let positions = system.positions().to_vec();
        let eval = self.forcefield.evaluate(&positions, self.parallel());
        let velocities = maxwell_boltzmann(positions.len(), self.config.temperature, &mut self.rng);
        self.energies = eval.energies;
        self.state = Some(DynamicsState {
            positions,
            velocities,
            forces: eval.forces,
        });
        info!(
            beads = system.len(),
            forces = self.forcefield.len(),
            potential_per_bead = self.energies.total() / system.len().max(1) as f64,
            "Simulation created"
        );
        Ok(())
    }

    /// Attaches the reporters selected in `config`, writing into the save folder.
    pub fn create_reporters(&mut self, config: &ReporterConfig) -> Result<(), EngineError> {
        let system = self.system.as_ref().ok_or(EngineError::NoStructure)?;
        if config.interval == 0 {
            return Err(EngineError::InvalidArgument(
                "reporter interval must be positive".into(),
            ));
        }
        let name = &self.config.name;
        let mut reporters: Vec<Box<dyn Reporter>> = Vec::new();
        if config.statistics {
            let path = self.folder.join(format!("{}_statistics.csv", name));
            reporters.push(Box::new(StatisticsReporter::create(&path, config.interval)?));
        }
        if config.trajectory {
            let reporter = match config.format {
                TrajectoryFormat::Cndb => {
                    let path = self.folder.join(format!("{}_0.{}", name, CNDB_EXTENSION));
                    TrajectoryReporter::cndb(&path, system, config.interval)?
                }
                TrajectoryFormat::Structure(format) => {
                    TrajectoryReporter::structures(&self.folder, name, format, config.interval)
                }
            };
            reporters.push(Box::new(reporter));
        }
        if config.energy_components {
            let path = self.folder.join(format!("{}_energy_components.csv", name));
            reporters.push(Box::new(EnergyComponentsReporter::create(&path, config.interval)?));
        }
        debug!(count = reporters.len(), "Reporters created");
        self.reporters.extend(reporters);
        Ok(())
    }

    fn parallel(&self) -> bool {
        self.config.platform.is_parallel()
    }

    /// Integrates `n_steps` steps in blocks of `block_size`, checking stability after each.
    #[instrument(skip_all, name = "simulation_run")]
    pub fn run(
        &mut self,
        n_steps: u64,
        report: bool,
        block_size: u64,
        progress: &ProgressReporter,
    ) -> Result<(), EngineError> {
        let Some(state) = self.state.as_mut() else {
            return Err(EngineError::NotCreated);
        };
        let system = self.system.as_ref().ok_or(EngineError::NoStructure)?;
        let parallel = self.config.platform.is_parallel();
        let block_size = block_size.max(1);
        let n_beads = state.positions.len().max(1) as f64;

        info!(steps = n_steps, block = block_size, "Running simulation");
        progress.report(Progress::TaskStart { total: n_steps });

        let mut done = 0;
        while done < n_steps {
            let block = block_size.min(n_steps - done);
            for _ in 0..block {
                self.energies =
                    self.integrator
                        .step(state, &self.forcefield, parallel, &mut self.rng);
                self.step += 1;
                for reporter in self.reporters.iter_mut() {
                    if self.step % reporter.interval() == 0 {
                        let snapshot = Snapshot {
                            step: self.step,
                            time: self.step as f64 * self.config.time_step,
                            positions: &state.positions,
                            energies: &self.energies,
                            kinetic_energy: state.kinetic_energy(),
                            system,
                        };
                        reporter.report(&snapshot)?;
                    }
                }
            }
            done += block;

            let kinetic = state.kinetic_energy();
            let potential = self.energies.total();
            if !potential.is_finite()
                || !state.is_finite()
                || kinetic / n_beads > self.config.critical_kinetic_energy
            {
                warn!(
                    step = self.step,
                    kinetic_per_bead = kinetic / n_beads,
                    "Simulation unstable"
                );
                return Err(EngineError::Unstable { step: self.step });
            }

            if report {
                let rg = geometry::radius_of_gyration(&state.positions);
                let text = format!(
                    "step {} | time {:.2} | Ep/N {:.4} | Ek/N {:.4} | Rg {:.4}",
                    self.step,
                    self.step as f64 * self.config.time_step,
                    potential / n_beads,
                    kinetic / n_beads,
                    rg
                );
                info!("{}", text);
                progress.report(Progress::StatusUpdate { text });
            }
            progress.report(Progress::TaskIncrement { amount: block });
        }

        progress.report(Progress::TaskFinish);
        Ok(())
    }

    /// Flushes and detaches all reporters, returning the files they wrote.
    pub fn finish_reporters(&mut self) -> Result<Vec<PathBuf>, EngineError> {
        let mut files = Vec::new();
        for mut reporter in self.reporters.drain(..) {
            files.extend(reporter.finish()?);
        }
        Ok(files)
    }

    /// Energy of every force term at the current positions.
    pub fn print_forces(&mut self) -> Result<EnergyBreakdown, EngineError> {
        let positions = self.positions()?.to_vec();
        let energies = self.forcefield.energy(&positions, self.parallel());
        let n = positions.len();
        for (name, energy) in energies.iter() {
            info!(force = name, energy, per_bead = energy / n.max(1) as f64, "Force energy");
        }
        info!(total = energies.total(), "Potential energy");
        Ok(energies)
    }

    /// Writes the current structure; the default name is `<name>_<step>.<ext>` in the save
    /// folder.
    pub fn save_structure(
        &self,
        filename: Option<&Path>,
        format: StructureFormat,
    ) -> Result<PathBuf, EngineError> {
        let system = self.current_system()?;
        let path = match filename {
            Some(f) => f.to_path_buf(),
            None => self.folder.join(format!(
                "{}_{}.{}",
                self.config.name,
                self.step,
                format.extension()
            )),
        };
        format.write_path(&system, &path)?;
        info!(path = %path.display(), "Structure saved");
        Ok(path)
    }

    /// The system with its current coordinates.
    pub fn current_system(&self) -> Result<ChromatinSystem, EngineError> {
        let mut system = self.system.clone().ok_or(EngineError::NoStructure)?;
        if let Some(state) = &self.state {
            system.set_positions(state.positions.clone())?;
        }
        Ok(system)
    }

    pub fn system(&self) -> Option<&ChromatinSystem> {
        self.system.as_ref()
    }

    pub fn positions(&self) -> Result<&[Point3<f64>], EngineError> {
        match (&self.state, &self.system) {
            (Some(state), _) => Ok(&state.positions),
            (None, Some(system)) => Ok(system.positions()),
            (None, None) => Err(EngineError::NoStructure),
        }
    }

    pub fn velocities(&self) -> Result<&[Vector3<f64>], EngineError> {
        self.state
            .as_ref()
            .map(|s| s.velocities.as_slice())
            .ok_or(EngineError::NotCreated)
    }

    pub fn energies(&self) -> &EnergyBreakdown {
        &self.energies
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn time(&self) -> f64 {
        self.step as f64 * self.config.time_step
    }

    pub fn kinetic_energy(&self) -> f64 {
        self.state
            .as_ref()
            .map_or(0.0, |s| kinetic_energy(&s.velocities))
    }

    pub fn radius_of_gyration(&self) -> Result<f64, EngineError> {
        Ok(geometry::radius_of_gyration(self.positions()?))
    }
}
