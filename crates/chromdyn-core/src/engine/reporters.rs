use super::error::EngineError;
use super::integrator::instantaneous_temperature;
use crate::core::forcefield::term::EnergyBreakdown;
use crate::core::io::StructureFormat;
use crate::core::io::cndb::{CndbHeader, CndbWriter};
use crate::core::models::system::ChromatinSystem;
use crate::core::utils::geometry;
use nalgebra::Point3;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// State of a simulation at a reporting step.
pub struct Snapshot<'a> {
    pub step: u64,
    pub time: f64,
    pub positions: &'a [Point3<f64>],
    pub energies: &'a EnergyBreakdown,
    pub kinetic_energy: f64,
    /// Bead types and chain layout of the simulated system.
    pub system: &'a ChromatinSystem,
}

pub trait Reporter {
    /// Reporting interval in steps.
    fn interval(&self) -> u64;

    fn report(&mut self, snapshot: &Snapshot<'_>) -> Result<(), EngineError>;

    /// Flushes pending output and returns the files written.
    fn finish(&mut self) -> Result<Vec<PathBuf>, EngineError>;
}

fn csv_writer(path: &Path) -> Result<csv::Writer<File>, EngineError> {
    csv::Writer::from_path(path).map_err(|source| EngineError::Report {
        path: path.to_path_buf(),
        source,
    })
}

/// Per-bead energies, temperature and radius of gyration as CSV.
pub struct StatisticsReporter {
    path: PathBuf,
    writer: csv::Writer<File>,
    interval: u64,
}

impl StatisticsReporter {
    pub const HEADER: [&'static str; 6] = ["step", "time", "potential", "kinetic", "temperature", "rg"];

    pub fn create(path: &Path, interval: u64) -> Result<Self, EngineError> {
        let mut writer = csv_writer(path)?;
        writer
            .write_record(Self::HEADER)
            .map_err(|source| EngineError::Report {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            interval,
        })
    }
}

impl Reporter for StatisticsReporter {
    fn interval(&self) -> u64 {
        self.interval
    }

    fn report(&mut self, snapshot: &Snapshot<'_>) -> Result<(), EngineError> {
        let n = snapshot.positions.len().max(1) as f64;
        let record = [
            snapshot.step.to_string(),
            format!("{:.4}", snapshot.time),
            format!("{:.6}", snapshot.energies.total() / n),
            format!("{:.6}", snapshot.kinetic_energy / n),
            format!(
                "{:.6}",
                instantaneous_temperature(snapshot.kinetic_energy, snapshot.positions.len())
            ),
            format!("{:.6}", geometry::radius_of_gyration(snapshot.positions)),
        ];
        self.writer
            .write_record(&record)
            .and_then(|_| self.writer.flush().map_err(csv::Error::from))
            .map_err(|source| EngineError::Report {
                path: self.path.clone(),
                source,
            })
    }

    fn finish(&mut self) -> Result<Vec<PathBuf>, EngineError> {
        self.writer.flush().map_err(|e| EngineError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(vec![self.path.clone()])
    }
}

enum TrajectorySink {
    Cndb(Option<CndbWriter>),
    Structures {
        folder: PathBuf,
        name: String,
        format: StructureFormat,
        written: Vec<PathBuf>,
    },
}

/// Trajectory frames, either in one `.cndb` container or as numbered structure files.
pub struct TrajectoryReporter {
    sink: TrajectorySink,
    cndb_path: Option<PathBuf>,
    interval: u64,
}

impl TrajectoryReporter {
    pub fn cndb(path: &Path, system: &ChromatinSystem, interval: u64) -> Result<Self, EngineError> {
        let header = CndbHeader {
            info: format!("chromatin polymer trajectory, {} beads", system.len()),
            types: system.sequence().types().to_vec(),
            chains: system.chains().to_vec(),
        };
        let writer = CndbWriter::create(path, &header)?;
        Ok(Self {
            sink: TrajectorySink::Cndb(Some(writer)),
            cndb_path: Some(path.to_path_buf()),
            interval,
        })
    }

    pub fn structures(folder: &Path, name: &str, format: StructureFormat, interval: u64) -> Self {
        Self {
            sink: TrajectorySink::Structures {
                folder: folder.to_path_buf(),
                name: name.to_string(),
                format,
                written: Vec::new(),
            },
            cndb_path: None,
            interval,
        }
    }
}

impl Reporter for TrajectoryReporter {
    fn interval(&self) -> u64 {
        self.interval
    }

    fn report(&mut self, snapshot: &Snapshot<'_>) -> Result<(), EngineError> {
        match &mut self.sink {
            TrajectorySink::Cndb(Some(writer)) => {
                writer.append_frame(snapshot.step, snapshot.positions)?;
            }
            TrajectorySink::Cndb(None) => {}
            TrajectorySink::Structures {
                folder,
                name,
                format,
                written,
            } => {
                let frame = written.len() + 1;
                let path = folder.join(format!("{}_{}.{}", name, frame, format.extension()));
                let mut system = snapshot.system.clone();
                system.set_positions(snapshot.positions.to_vec())?;
                format.write_path(&system, &path)?;
                debug!(path = %path.display(), step = snapshot.step, "Wrote trajectory frame");
                written.push(path);
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<PathBuf>, EngineError> {
        match &mut self.sink {
            TrajectorySink::Cndb(writer) => {
                if let Some(writer) = writer.take() {
                    writer.finish()?;
                }
                Ok(self.cndb_path.iter().cloned().collect())
            }
            TrajectorySink::Structures { written, .. } => Ok(written.clone()),
        }
    }
}

/// One CSV column per force term, energies per bead.
pub struct EnergyComponentsReporter {
    path: PathBuf,
    writer: csv::Writer<File>,
    columns: Option<Vec<String>>,
    interval: u64,
}

impl EnergyComponentsReporter {
    pub fn create(path: &Path, interval: u64) -> Result<Self, EngineError> {
        Ok(Self {
            path: path.to_path_buf(),
            writer: csv_writer(path)?,
            columns: None,
            interval,
        })
    }

    fn report_err(&self, source: csv::Error) -> EngineError {
        EngineError::Report {
            path: self.path.clone(),
            source,
        }
    }
}

impl Reporter for EnergyComponentsReporter {
    fn interval(&self) -> u64 {
        self.interval
    }

    fn report(&mut self, snapshot: &Snapshot<'_>) -> Result<(), EngineError> {
        if self.columns.is_none() {
            let names: Vec<String> = snapshot.energies.names().map(str::to_string).collect();
            let mut header = vec!["step".to_string()];
            header.extend(names.iter().cloned());
            if let Err(e) = self.writer.write_record(&header) {
                return Err(self.report_err(e));
            }
            self.columns = Some(names);
        }
        let n = snapshot.positions.len().max(1) as f64;
        let mut record = vec![snapshot.step.to_string()];
        if let Some(columns) = &self.columns {
            for name in columns {
                let value = snapshot.energies.get(name).unwrap_or(0.0) / n;
                record.push(format!("{:.6}", value));
            }
        }
        if let Err(e) = self.writer.write_record(&record) {
            return Err(self.report_err(e));
        }
        self.writer.flush().map_err(|e| EngineError::Io {
            path: self.path.clone(),
            source: e,
        })
    }

    fn finish(&mut self) -> Result<Vec<PathBuf>, EngineError> {
        self.writer.flush().map_err(|e| EngineError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(vec![self.path.clone()])
    }
}
