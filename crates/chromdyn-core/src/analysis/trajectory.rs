use super::error::AnalysisError;
use crate::core::io::cndb::{CndbHeader, CndbReader};
use crate::core::models::sequence::ChromSequence;
use crate::core::models::system::Chain;
use nalgebra::Point3;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Frames `first, first + step, ...` below `last`, counted from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRange {
    pub first: usize,
    /// Exclusive upper bound; `None` selects through the last frame.
    pub last: Option<usize>,
    pub step: usize,
}

impl Default for FrameRange {
    fn default() -> Self {
        Self {
            first: 1,
            last: None,
            step: 1,
        }
    }
}

impl FrameRange {
    pub fn new(first: usize, last: Option<usize>, step: usize) -> Self {
        Self { first, last, step }
    }

    /// Frame numbers selected from a trajectory with `n_frames` frames.
    pub fn indices(&self, n_frames: usize) -> Result<Vec<usize>, AnalysisError> {
        if self.first == 0 {
            return Err(AnalysisError::InvalidRange(
                "frames are counted from 1".to_string(),
            ));
        }
        if self.step == 0 {
            return Err(AnalysisError::InvalidRange(
                "step must be positive".to_string(),
            ));
        }
        let end = self.last.unwrap_or(n_frames + 1).min(n_frames + 1);
        Ok((self.first..end).step_by(self.step).collect())
    }
}

impl FromStr for FrameRange {
    type Err = AnalysisError;

    /// Parses `first:last:step`; empty fields keep their defaults.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        if parts.is_empty() || parts.len() > 3 {
            return Err(AnalysisError::InvalidRange(s.to_string()));
        }
        let parse = |part: Option<&&str>| -> Result<Option<usize>, AnalysisError> {
            match part {
                None => Ok(None),
                Some(p) if p.is_empty() => Ok(None),
                Some(p) => p
                    .parse()
                    .map(Some)
                    .map_err(|_| AnalysisError::InvalidRange(s.to_string())),
            }
        };
        let defaults = Self::default();
        Ok(Self {
            first: parse(parts.first())?.unwrap_or(defaults.first),
            last: parse(parts.get(1))?,
            step: parse(parts.get(2))?.unwrap_or(defaults.step),
        })
    }
}

impl fmt::Display for FrameRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.last {
            Some(last) => write!(f, "{}:{}:{}", self.first, last, self.step),
            None => write!(f, "{}::{}", self.first, self.step),
        }
    }
}

/// A stored trajectory held in memory.
#[derive(Debug, Clone)]
pub struct Trajectory {
    path: PathBuf,
    header: CndbHeader,
    sequence: ChromSequence,
    steps: Vec<u64>,
    frames: Vec<Vec<Point3<f64>>>,
}

impl Trajectory {
    pub fn load(path: &Path) -> Result<Self, AnalysisError> {
        let mut reader = CndbReader::open(path)?;
        let header = reader.header().clone();
        let sequence = ChromSequence::new(header.types.clone())?;
        let mut steps = Vec::with_capacity(reader.n_frames());
        let mut frames = Vec::with_capacity(reader.n_frames());
        for frame in reader.frames() {
            let frame = frame?;
            steps.push(frame.step);
            frames.push(frame.positions());
        }
        info!(
            path = %path.display(),
            beads = header.n_beads(),
            frames = frames.len(),
            "Loaded trajectory"
        );
        Ok(Self {
            path: path.to_path_buf(),
            header,
            sequence,
            steps,
            frames,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> &str {
        &self.header.info
    }

    pub fn n_beads(&self) -> usize {
        self.header.n_beads()
    }

    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn sequence(&self) -> &ChromSequence {
        &self.sequence
    }

    pub fn chains(&self) -> &[Chain] {
        &self.header.chains
    }

    pub fn unique_types(&self) -> Vec<String> {
        self.sequence.unique_types()
    }

    /// Bead indices grouped by type.
    pub fn beads_by_type(&self) -> BTreeMap<String, Vec<usize>> {
        self.sequence.indices_by_type()
    }

    pub fn beads_of_type(&self, bead_type: &str) -> Result<Vec<usize>, AnalysisError> {
        self.beads_by_type()
            .remove(bead_type)
            .ok_or_else(|| AnalysisError::UnknownType(bead_type.to_string()))
    }

    /// Simulation step recorded with frame `index`, counted from 1.
    pub fn step_of(&self, index: usize) -> Option<u64> {
        index.checked_sub(1).and_then(|k| self.steps.get(k)).copied()
    }

    /// Coordinates of the selected frames, optionally restricted to some beads.
    pub fn xyz(
        &self,
        range: FrameRange,
        selection: Option<&[usize]>,
    ) -> Result<Vec<Vec<Point3<f64>>>, AnalysisError> {
        let n_beads = self.n_beads();
        if let Some(&index) = selection.and_then(|s| s.iter().find(|&&i| i >= n_beads)) {
            return Err(AnalysisError::BeadOutOfRange { index, n_beads });
        }
        let indices = range.indices(self.n_frames())?;
        let xyz: Vec<Vec<Point3<f64>>> = indices
            .iter()
            .map(|&k| {
                let frame = &self.frames[k - 1];
                match selection {
                    Some(beads) => beads.iter().map(|&b| frame[b]).collect(),
                    None => frame.clone(),
                }
            })
            .collect();
        debug!(frames = xyz.len(), range = %range, "Selected trajectory frames");
        Ok(xyz)
    }
}

impl fmt::Display for Trajectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Trajectory: {}", self.path.display())?;
        writeln!(f, "  {}", self.header.info)?;
        writeln!(
            f,
            "  {} beads in {} chain(s), {} frame(s)",
            self.n_beads(),
            self.header.chains.len(),
            self.n_frames()
        )?;
        write!(f, "  types: {}", self.unique_types().join(", "))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::core::io::cndb::{CndbHeader, CndbWriter};
    use crate::core::models::system::Chain;
    use nalgebra::Point3;
    use std::path::Path;

    /// Writes `n_frames` frames of a straight chain shifted by the frame number.
    pub(crate) fn write_line_trajectory(path: &Path, types: &[&str], n_frames: usize) {
        let n = types.len();
        let header = CndbHeader {
            info: "line".into(),
            types: types.iter().map(|t| t.to_string()).collect(),
            chains: vec![Chain::new(0, n, false)],
        };
        let mut writer = CndbWriter::create(path, &header).unwrap();
        for frame in 1..=n_frames {
            let positions: Vec<_> = (0..n)
                .map(|i| Point3::new(i as f64, frame as f64, 0.0))
                .collect();
            writer.append_frame(frame as u64 * 10, &positions).unwrap();
        }
        writer.finish().unwrap();
    }
}
