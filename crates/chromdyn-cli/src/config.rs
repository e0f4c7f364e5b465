mod defaults;

use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use crate::utils::parser;
use chromdyn::core::forcefield::bonded::{
    DEFAULT_ANGLE_KA, DEFAULT_FENE_K, DEFAULT_FENE_R0, DEFAULT_HARMONIC_K, DEFAULT_HARMONIC_R0,
};
use chromdyn::core::forcefield::external::{
    DEFAULT_CONFINEMENT_DENSITY, DEFAULT_CONFINEMENT_K, DEFAULT_RESTRAINT_K,
    DEFAULT_RESTRAINT_RADIUS,
};
use chromdyn::core::forcefield::nonbonded::{
    ContactShape, DEFAULT_E_CUT, DEFAULT_IC_DEND, DEFAULT_IC_DINIT, DEFAULT_LOOP_STRENGTH,
};
use chromdyn::core::io::StructureFormat;
use chromdyn::engine::config::{
    InitMode, Platform, ReporterConfig, SimulationConfigBuilder, TrajectoryFormat,
};
use chromdyn::workflows::simulate::{ForceSpec, SimulationPlan, StructureInput};
use defaults::DefaultsConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialStructureConfig {
    sequence: Option<PathBuf>,
    file: Option<PathBuf>,
    init_mode: Option<String>,
    ring: Option<bool>,
    center: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialIntegratorConfig {
    temperature: Option<f64>,
    time_step: Option<f64>,
    collision_rate: Option<f64>,
    platform: Option<String>,
    seed: Option<u64>,
    critical_kinetic_energy: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialRunConfig {
    steps: Option<u64>,
    block: Option<u64>,
    verbose: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialReporterConfig {
    statistics: Option<bool>,
    trajectory: Option<bool>,
    format: Option<String>,
    interval: Option<u64>,
    energy_components: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialOutputConfig {
    save_formats: Option<Vec<String>>,
}

/// One `[[forces]]` entry. Omitted parameters take the MiChroM defaults.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(
    tag = "type",
    rename_all = "kebab-case",
    rename_all_fields = "kebab-case",
    deny_unknown_fields
)]
enum PartialForce {
    FeneBonds {
        k: Option<f64>,
        r0: Option<f64>,
    },
    HarmonicBonds {
        k: Option<f64>,
        r0: Option<f64>,
    },
    Angles {
        ka: Option<f64>,
    },
    RepulsiveSoftCore {
        e_cut: Option<f64>,
    },
    TypeToType {
        table: Option<PathBuf>,
        mu: Option<f64>,
        rc: Option<f64>,
        cutoff: Option<f64>,
    },
    PerBeadInteractions {
        path: PathBuf,
        mu: Option<f64>,
        rc: Option<f64>,
        cutoff: Option<f64>,
    },
    IdealChromosome {
        dinit: Option<usize>,
        dend: Option<usize>,
        mu: Option<f64>,
        rc: Option<f64>,
        cutoff: Option<f64>,
    },
    CustomIdealChromosome {
        path: PathBuf,
        mu: Option<f64>,
        rc: Option<f64>,
        cutoff: Option<f64>,
    },
    Loops {
        path: PathBuf,
        strength: Option<f64>,
        mu: Option<f64>,
        rc: Option<f64>,
        cutoff: Option<f64>,
    },
    FlatBottomHarmonic {
        k: Option<f64>,
        radius: Option<f64>,
    },
    SphericalConfinement {
        radius: Option<f64>,
        density: Option<f64>,
        k: Option<f64>,
    },
}

fn shape(mu: Option<f64>, rc: Option<f64>, cutoff: Option<f64>) -> ContactShape {
    let defaults = ContactShape::default();
    ContactShape {
        mu: mu.unwrap_or(defaults.mu),
        rc: rc.unwrap_or(defaults.rc),
        cutoff: cutoff.unwrap_or(defaults.cutoff),
    }
}

impl PartialForce {
    fn into_spec(self, base_dir: &Path) -> ForceSpec {
        match self {
            Self::FeneBonds { k, r0 } => ForceSpec::FeneBonds {
                k: k.unwrap_or(DEFAULT_FENE_K),
                r0: r0.unwrap_or(DEFAULT_FENE_R0),
            },
            Self::HarmonicBonds { k, r0 } => ForceSpec::HarmonicBonds {
                k: k.unwrap_or(DEFAULT_HARMONIC_K),
                r0: r0.unwrap_or(DEFAULT_HARMONIC_R0),
            },
            Self::Angles { ka } => ForceSpec::Angles {
                ka: ka.unwrap_or(DEFAULT_ANGLE_KA),
            },
            Self::RepulsiveSoftCore { e_cut } => ForceSpec::RepulsiveSoftCore {
                e_cut: e_cut.unwrap_or(DEFAULT_E_CUT),
            },
            Self::TypeToType {
                table,
                mu,
                rc,
                cutoff,
            } => ForceSpec::TypeToType {
                table: table.map(|p| resolve_path(base_dir, p)),
                shape: shape(mu, rc, cutoff),
            },
            Self::PerBeadInteractions {
                path,
                mu,
                rc,
                cutoff,
            } => ForceSpec::PerBeadInteractions {
                path: resolve_path(base_dir, path),
                shape: shape(mu, rc, cutoff),
            },
            Self::IdealChromosome {
                dinit,
                dend,
                mu,
                rc,
                cutoff,
            } => ForceSpec::IdealChromosome {
                dinit: dinit.unwrap_or(DEFAULT_IC_DINIT),
                dend: dend.unwrap_or(DEFAULT_IC_DEND),
                shape: shape(mu, rc, cutoff),
            },
            Self::CustomIdealChromosome {
                path,
                mu,
                rc,
                cutoff,
            } => ForceSpec::CustomIdealChromosome {
                path: resolve_path(base_dir, path),
                shape: shape(mu, rc, cutoff),
            },
            Self::Loops {
                path,
                strength,
                mu,
                rc,
                cutoff,
            } => ForceSpec::Loops {
                path: resolve_path(base_dir, path),
                strength: strength.unwrap_or(DEFAULT_LOOP_STRENGTH),
                shape: shape(mu, rc, cutoff),
            },
            Self::FlatBottomHarmonic { k, radius } => ForceSpec::FlatBottomHarmonic {
                k: k.unwrap_or(DEFAULT_RESTRAINT_K),
                radius: radius.unwrap_or(DEFAULT_RESTRAINT_RADIUS),
            },
            Self::SphericalConfinement { radius, density, k } => {
                ForceSpec::SphericalConfinement {
                    radius,
                    density: density.unwrap_or(DEFAULT_CONFINEMENT_DENSITY),
                    k: k.unwrap_or(DEFAULT_CONFINEMENT_K),
                }
            }
        }
    }
}

/// Paths in a config file are relative to the file's directory.
fn resolve_path(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialSimulationConfig {
    name: Option<String>,
    output_dir: Option<PathBuf>,
    structure: Option<PartialStructureConfig>,
    integrator: Option<PartialIntegratorConfig>,
    run: Option<PartialRunConfig>,
    reporters: Option<PartialReporterConfig>,
    output: Option<PartialOutputConfig>,
    forces: Option<Vec<PartialForce>>,
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl PartialSimulationConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    pub fn merge_with_cli(mut self, args: &RunArgs) -> Result<SimulationPlan> {
        self.apply_cli_flags(args);
        self.apply_set_values(&args.set_values)?;

        let defaults = DefaultsConfig::default();
        let base_dir = self.base_dir.take().unwrap_or_default();
        let structure = self.structure.take().unwrap_or_default();
        let integrator = self.integrator.take().unwrap_or_default();
        let run = self.run.take().unwrap_or_default();
        let reporters = self.reporters.take().unwrap_or_default();
        let output = self.output.take().unwrap_or_default();

        let config_error = |e: chromdyn::engine::config::ConfigError| CliError::Config(e.to_string());

        let input = match (structure.sequence, structure.file) {
            (Some(_), Some(_)) => {
                return Err(CliError::Config(
                    "`structure.sequence` and `structure.file` are mutually exclusive."
                        .to_string(),
                ));
            }
            (Some(path), None) => StructureInput::Sequence {
                path: resolve_path(&base_dir, path),
                mode: match structure.init_mode {
                    Some(mode) => mode.parse::<InitMode>().map_err(config_error)?,
                    None => defaults.init_mode,
                },
                is_ring: structure.ring.unwrap_or(defaults.ring),
            },
            (None, Some(path)) => StructureInput::File {
                path: resolve_path(&base_dir, path),
            },
            (None, None) => {
                return Err(CliError::Config(
                    "A structure source is required: `structure.sequence`, `structure.file`, --sequence or --structure.".to_string(),
                ));
            }
        };

        let mut builder = SimulationConfigBuilder::new()
            .name(self.name.unwrap_or(defaults.name))
            .seed(integrator.seed);
        if let Some(t) = integrator.temperature {
            builder = builder.temperature(t);
        }
        if let Some(dt) = integrator.time_step {
            builder = builder.time_step(dt);
        }
        if let Some(gamma) = integrator.collision_rate {
            builder = builder.collision_rate(gamma);
        }
        if let Some(platform) = integrator.platform {
            builder = builder.platform(platform.parse::<Platform>().map_err(config_error)?);
        }
        if let Some(value) = integrator.critical_kinetic_energy {
            builder = builder.critical_kinetic_energy(value);
        }
        let config = builder.build().map_err(config_error)?;

        let reporter_defaults = defaults.reporters;
        let reporters = ReporterConfig {
            statistics: reporters.statistics.unwrap_or(reporter_defaults.statistics),
            trajectory: reporters.trajectory.unwrap_or(reporter_defaults.trajectory),
            format: match reporters.format {
                Some(format) => format.parse::<TrajectoryFormat>().map_err(config_error)?,
                None => reporter_defaults.format,
            },
            interval: reporters.interval.unwrap_or(reporter_defaults.interval),
            energy_components: reporters
                .energy_components
                .unwrap_or(reporter_defaults.energy_components),
        };
        if reporters.interval == 0 {
            return Err(CliError::Config(
                "`reporters.interval` must be positive.".to_string(),
            ));
        }

        let save_formats = match output.save_formats {
            Some(names) => names
                .iter()
                .map(|name| name.parse::<StructureFormat>().map_err(CliError::Config))
                .collect::<Result<Vec<_>>>()?,
            None => defaults.save_formats,
        };

        let forces = match self.forces.take() {
            Some(forces) if !forces.is_empty() => forces
                .into_iter()
                .map(|f| f.into_spec(&base_dir))
                .collect(),
            _ => ForceSpec::michrom_default(),
        };

        let block = run.block.unwrap_or(defaults.block);
        if block == 0 {
            return Err(CliError::Config("`run.block` must be positive.".to_string()));
        }

        Ok(SimulationPlan {
            config,
            output_dir: self
                .output_dir
                .map(|p| resolve_path(&base_dir, p))
                .unwrap_or(defaults.output_dir),
            input,
            center: structure.center.unwrap_or(defaults.center),
            forces,
            reporters,
            steps: run.steps.unwrap_or(defaults.steps),
            block,
            verbose_blocks: run.verbose.unwrap_or(defaults.verbose_blocks),
            save_formats,
        })
    }

    /// Explicit flags replace file values. Paths given on the command line are not
    /// rebased onto the config directory.
    fn apply_cli_flags(&mut self, args: &RunArgs) {
        if let Some(name) = &args.name {
            self.name = Some(name.clone());
        }
        if let Some(dir) = &args.output_dir {
            self.output_dir = Some(absolute_from_cwd(dir));
        }
        if let Some(path) = &args.sequence {
            let structure = self.structure.get_or_insert_with(Default::default);
            structure.sequence = Some(absolute_from_cwd(path));
            structure.file = None;
        }
        if let Some(path) = &args.structure {
            let structure = self.structure.get_or_insert_with(Default::default);
            structure.file = Some(absolute_from_cwd(path));
            structure.sequence = None;
        }
        if let Some(steps) = args.steps {
            self.run.get_or_insert_with(Default::default).steps = Some(steps);
        }
        if let Some(platform) = &args.platform {
            self.integrator.get_or_insert_with(Default::default).platform = Some(platform.clone());
        }
        if let Some(seed) = args.seed {
            self.integrator.get_or_insert_with(Default::default).seed = Some(seed);
        }
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        let arg_error = |e: parser::ParseError| CliError::Config(e.to_string());
        for kv_pair in set_values {
            let (key, value) = parser::parse_key_value(kv_pair).map_err(arg_error)?;
            match key {
                "name" => self.name = Some(value.to_string()),
                "output-dir" => self.output_dir = Some(absolute_from_cwd(Path::new(value))),
                "structure.init-mode" => {
                    self.structure
                        .get_or_insert_with(Default::default)
                        .init_mode = Some(value.to_string());
                }
                "structure.ring" => {
                    self.structure.get_or_insert_with(Default::default).ring =
                        Some(parser::parse_bool(key, value).map_err(arg_error)?);
                }
                "structure.center" => {
                    self.structure.get_or_insert_with(Default::default).center =
                        Some(parser::parse_bool(key, value).map_err(arg_error)?);
                }
                "integrator.temperature" => {
                    self.integrator
                        .get_or_insert_with(Default::default)
                        .temperature = Some(parser::parse_value(key, value).map_err(arg_error)?);
                }
                "integrator.time-step" => {
                    self.integrator
                        .get_or_insert_with(Default::default)
                        .time_step = Some(parser::parse_value(key, value).map_err(arg_error)?);
                }
                "integrator.collision-rate" => {
                    self.integrator
                        .get_or_insert_with(Default::default)
                        .collision_rate = Some(parser::parse_value(key, value).map_err(arg_error)?);
                }
                "integrator.platform" => {
                    self.integrator
                        .get_or_insert_with(Default::default)
                        .platform = Some(value.to_string());
                }
                "integrator.seed" => {
                    self.integrator.get_or_insert_with(Default::default).seed =
                        Some(parser::parse_value(key, value).map_err(arg_error)?);
                }
                "run.steps" => {
                    self.run.get_or_insert_with(Default::default).steps =
                        Some(parser::parse_value(key, value).map_err(arg_error)?);
                }
                "run.block" => {
                    self.run.get_or_insert_with(Default::default).block =
                        Some(parser::parse_value(key, value).map_err(arg_error)?);
                }
                "run.verbose" => {
                    self.run.get_or_insert_with(Default::default).verbose =
                        Some(parser::parse_bool(key, value).map_err(arg_error)?);
                }
                "reporters.statistics" => {
                    self.reporters
                        .get_or_insert_with(Default::default)
                        .statistics = Some(parser::parse_bool(key, value).map_err(arg_error)?);
                }
                "reporters.trajectory" => {
                    self.reporters
                        .get_or_insert_with(Default::default)
                        .trajectory = Some(parser::parse_bool(key, value).map_err(arg_error)?);
                }
                "reporters.format" => {
                    self.reporters.get_or_insert_with(Default::default).format =
                        Some(value.to_string());
                }
                "reporters.interval" => {
                    self.reporters
                        .get_or_insert_with(Default::default)
                        .interval = Some(parser::parse_value(key, value).map_err(arg_error)?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

fn absolute_from_cwd(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use once_cell::sync::Lazy;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    static TEST_DIR: Lazy<TempDir> = Lazy::new(|| tempdir().expect("Failed to create temp dir"));

    fn write_config_file(name: &str, content: &str) -> PathBuf {
        let file_path = TEST_DIR.path().join(name);
        fs::write(&file_path, content).unwrap();
        file_path
    }

    fn run_args(extra: &[&str]) -> RunArgs {
        let mut args = vec!["chromdyn", "run"];
        args.extend_from_slice(extra);
        match Cli::parse_from(args).command {
            Commands::Run(run) => run,
            _ => panic!("Expected 'run' subcommand"),
        }
    }

    fn plan_for(content: &str, name: &str, extra: &[&str]) -> Result<SimulationPlan> {
        let path = write_config_file(name, content);
        PartialSimulationConfig::from_file(&path)?.merge_with_cli(&run_args(extra))
    }

    #[test]
    fn minimal_file_takes_michrom_defaults() {
        let plan = plan_for(
            r#"
            [structure]
            sequence = "input/chr10_beads.txt"
            "#,
            "minimal.toml",
            &[],
        )
        .unwrap();

        assert_eq!(plan.config.name, "chromdyn");
        assert_eq!(plan.steps, 10_000);
        assert_eq!(plan.forces, ForceSpec::michrom_default());
        assert_eq!(plan.reporters, ReporterConfig::default());
        assert_eq!(plan.save_formats, vec![StructureFormat::Ndb]);
        match plan.input {
            StructureInput::Sequence {
                path,
                mode,
                is_ring,
            } => {
                assert_eq!(path, TEST_DIR.path().join("input/chr10_beads.txt"));
                assert_eq!(mode, InitMode::Spring);
                assert!(!is_ring);
            }
            other => panic!("Unexpected input: {:?}", other),
        }
    }

    #[test]
    fn file_sections_are_applied() {
        let plan = plan_for(
            r#"
            name = "chr10"
            output-dir = "out"

            [structure]
            file = "restart.ndb"
            center = false

            [integrator]
            temperature = 1.2
            platform = "opencl"
            seed = 7

            [run]
            steps = 500
            block = 100

            [reporters]
            format = "pdb"
            interval = 250
            energy-components = true

            [output]
            save-formats = ["ndb", "gro"]

            [[forces]]
            type = "fene-bonds"

            [[forces]]
            type = "ideal-chromosome"
            dinit = 3
            dend = 200
            mu = 3.0

            [[forces]]
            type = "spherical-confinement"
            density = 0.05
            "#,
            "full.toml",
            &[],
        )
        .unwrap();

        assert_eq!(plan.config.name, "chr10");
        assert_eq!(plan.config.temperature, 1.2);
        assert_eq!(plan.config.platform, Platform::Cpu);
        assert_eq!(plan.config.seed, Some(7));
        assert_eq!(plan.output_dir, TEST_DIR.path().join("out"));
        assert!(!plan.center);
        assert_eq!(plan.steps, 500);
        assert_eq!(plan.block, 100);
        assert_eq!(
            plan.reporters.format,
            TrajectoryFormat::Structure(StructureFormat::Pdb)
        );
        assert!(plan.reporters.energy_components);
        assert_eq!(
            plan.save_formats,
            vec![StructureFormat::Ndb, StructureFormat::Gro]
        );
        assert_eq!(plan.forces.len(), 3);
        assert_eq!(
            plan.forces[1],
            ForceSpec::IdealChromosome {
                dinit: 3,
                dend: 200,
                shape: ContactShape {
                    mu: 3.0,
                    ..ContactShape::default()
                },
            }
        );
        assert_eq!(
            plan.forces[2],
            ForceSpec::SphericalConfinement {
                radius: None,
                density: 0.05,
                k: DEFAULT_CONFINEMENT_K,
            }
        );
        assert_eq!(
            plan.input,
            StructureInput::File {
                path: TEST_DIR.path().join("restart.ndb")
            }
        );
    }

    #[test]
    fn cli_flags_override_file_and_set_values_override_flags() {
        let plan = plan_for(
            r#"
            name = "from-file"
            [structure]
            file = "restart.ndb"
            [run]
            steps = 100
            "#,
            "override.toml",
            &[
                "--name",
                "from-flag",
                "--sequence",
                "beads.txt",
                "--steps",
                "200",
                "-S",
                "run.steps=300",
                "-S",
                "integrator.temperature=0.8",
            ],
        )
        .unwrap();

        assert_eq!(plan.config.name, "from-flag");
        assert_eq!(plan.steps, 300);
        assert_eq!(plan.config.temperature, 0.8);
        assert!(matches!(plan.input, StructureInput::Sequence { .. }));
    }

    #[test]
    fn missing_structure_source_is_a_config_error() {
        let result = plan_for("name = \"empty\"\n", "empty.toml", &[]);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("structure")));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let path = write_config_file("typo.toml", "[integrator]\ntemprature = 1.0\n");
        assert!(matches!(
            PartialSimulationConfig::from_file(&path),
            Err(CliError::FileParsing { .. })
        ));

        let path = write_config_file("bad_force.toml", "[[forces]]\ntype = \"magnetic\"\n");
        assert!(PartialSimulationConfig::from_file(&path).is_err());
    }

    #[test]
    fn unsupported_set_key_and_bad_value_fail() {
        let content = "[structure]\nsequence = \"s.txt\"\n";
        assert!(matches!(
            plan_for(content, "set_key.toml", &["-S", "integrator.mass=2"]),
            Err(CliError::Config(msg)) if msg.contains("integrator.mass")
        ));
        assert!(matches!(
            plan_for(content, "set_value.toml", &["-S", "run.steps=many"]),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            plan_for(content, "set_platform.toml", &["--platform", "tpu"]),
            Err(CliError::Config(_))
        ));
    }
}
