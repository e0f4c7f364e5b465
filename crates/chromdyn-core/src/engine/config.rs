use crate::core::io::StructureFormat;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

/// Compute back-end. Accelerator names are accepted and run on the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Platform {
    /// Single-threaded evaluation, reproducible summation order.
    Reference,
    #[default]
    Cpu,
}

impl Platform {
    pub fn is_parallel(&self) -> bool {
        matches!(self, Self::Cpu)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference => f.write_str("Reference"),
            Self::Cpu => f.write_str("CPU"),
        }
    }
}

impl FromStr for Platform {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reference" => Ok(Self::Reference),
            "cpu" => Ok(Self::Cpu),
            "opencl" | "cuda" | "hip" => {
                warn!(
                    requested = s,
                    "Accelerated platforms are unavailable; running on the CPU platform"
                );
                Ok(Self::Cpu)
            }
            _ => Err(ConfigError::InvalidValue {
                parameter: "platform",
                reason: format!("unknown platform '{}'", s),
            }),
        }
    }
}

/// How an initial structure is generated from a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitMode {
    #[default]
    Spring,
    Line,
    Random,
}

impl FromStr for InitMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spring" => Ok(Self::Spring),
            "line" => Ok(Self::Line),
            "random" => Ok(Self::Random),
            _ => Err(ConfigError::InvalidValue {
                parameter: "init_mode",
                reason: format!("unknown initial structure mode '{}'", s),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub name: String,
    pub temperature: f64,
    pub time_step: f64,
    pub collision_rate: f64,
    pub platform: Platform,
    pub seed: Option<u64>,
    /// Kinetic energy per bead above which a run is declared unstable.
    pub critical_kinetic_energy: f64,
}

pub const DEFAULT_TEMPERATURE: f64 = 1.0;
pub const DEFAULT_TIME_STEP: f64 = 0.01;
pub const DEFAULT_COLLISION_RATE: f64 = 0.1;
pub const DEFAULT_CRITICAL_KINETIC_ENERGY: f64 = 50.0;

#[derive(Default)]
pub struct SimulationConfigBuilder {
    name: Option<String>,
    temperature: Option<f64>,
    time_step: Option<f64>,
    collision_rate: Option<f64>,
    platform: Option<Platform>,
    seed: Option<u64>,
    critical_kinetic_energy: Option<f64>,
}

impl SimulationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
    pub fn time_step(mut self, time_step: f64) -> Self {
        self.time_step = Some(time_step);
        self
    }
    pub fn collision_rate(mut self, rate: f64) -> Self {
        self.collision_rate = Some(rate);
        self
    }
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
    pub fn critical_kinetic_energy(mut self, value: f64) -> Self {
        self.critical_kinetic_energy = Some(value);
        self
    }

    pub fn build(self) -> Result<SimulationConfig, ConfigError> {
        let name = self.name.ok_or(ConfigError::MissingParameter("name"))?;
        if name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                parameter: "name",
                reason: "must not be empty".into(),
            });
        }
        let positive = |parameter: &'static str, value: f64| {
            if value > 0.0 && value.is_finite() {
                Ok(value)
            } else {
                Err(ConfigError::InvalidValue {
                    parameter,
                    reason: format!("must be positive, got {}", value),
                })
            }
        };
        Ok(SimulationConfig {
            name,
            temperature: positive(
                "temperature",
                self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            )?,
            time_step: positive("time_step", self.time_step.unwrap_or(DEFAULT_TIME_STEP))?,
            collision_rate: positive(
                "collision_rate",
                self.collision_rate.unwrap_or(DEFAULT_COLLISION_RATE),
            )?,
            platform: self.platform.unwrap_or_default(),
            seed: self.seed,
            critical_kinetic_energy: positive(
                "critical_kinetic_energy",
                self.critical_kinetic_energy
                    .unwrap_or(DEFAULT_CRITICAL_KINETIC_ENERGY),
            )?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrajectoryFormat {
    #[default]
    Cndb,
    Structure(StructureFormat),
}

impl FromStr for TrajectoryFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("cndb") {
            return Ok(Self::Cndb);
        }
        s.parse::<StructureFormat>()
            .map(Self::Structure)
            .map_err(|reason| ConfigError::InvalidValue {
                parameter: "trajectory_format",
                reason,
            })
    }
}

impl fmt::Display for TrajectoryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cndb => f.write_str("cndb"),
            Self::Structure(format) => write!(f, "{}", format),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReporterConfig {
    pub statistics: bool,
    pub trajectory: bool,
    pub format: TrajectoryFormat,
    pub interval: u64,
    pub energy_components: bool,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            statistics: true,
            trajectory: true,
            format: TrajectoryFormat::Cndb,
            interval: 1000,
            energy_components: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_fails_without_name() {
        assert_eq!(
            SimulationConfigBuilder::new().build().unwrap_err(),
            ConfigError::MissingParameter("name")
        );
    }

    #[test]
    fn build_applies_defaults() {
        let config = SimulationConfigBuilder::new().name("chr10").build().unwrap();
        assert_eq!(config.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(config.time_step, DEFAULT_TIME_STEP);
        assert_eq!(config.collision_rate, DEFAULT_COLLISION_RATE);
        assert_eq!(config.platform, Platform::Cpu);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn build_rejects_non_positive_time_step() {
        let result = SimulationConfigBuilder::new()
            .name("x")
            .time_step(0.0)
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                parameter: "time_step",
                ..
            })
        ));
    }

    #[test]
    fn gpu_platform_names_fall_back_to_cpu() {
        for name in ["opencl", "CUDA", "hip"] {
            assert_eq!(name.parse::<Platform>(), Ok(Platform::Cpu));
        }
        assert_eq!("Reference".parse::<Platform>(), Ok(Platform::Reference));
        assert!("tpu".parse::<Platform>().is_err());
    }

    #[test]
    fn trajectory_format_accepts_cndb_and_structure_names() {
        assert_eq!("cndb".parse(), Ok(TrajectoryFormat::Cndb));
        assert_eq!(
            "pdb".parse(),
            Ok(TrajectoryFormat::Structure(StructureFormat::Pdb))
        );
        assert!("h5".parse::<TrajectoryFormat>().is_err());
    }
}
