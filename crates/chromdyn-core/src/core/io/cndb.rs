//! The `.cndb` trajectory container.
//!
//! Layout: the magic bytes `CNDB`, a little-endian `u32` format version, a `u32` length
//! followed by the bincode-encoded [`CndbHeader`], then any number of frames. Each frame
//! is a `u64` length followed by an LZ4 block (size-prepended) holding a bincode-encoded
//! [`CndbFrame`]. Frames are appended without touching earlier bytes, so a container can
//! be read while a simulation is still writing to it.

use crate::core::models::system::Chain;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const CNDB_MAGIC: &[u8; 4] = b"CNDB";
pub const CNDB_VERSION: u32 = 1;
pub const CNDB_EXTENSION: &str = "cndb";

#[derive(Debug, Error)]
pub enum CndbError {
    #[error("I/O error for '{path}': {source}")]
    Io {
        path: PathBuf,
        source: io::Error,
    },
    #[error("'{0}' is not a cndb container")]
    BadMagic(PathBuf),
    #[error("Unsupported cndb version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("Corrupt cndb data: {0}")]
    Corrupt(String),
    #[error("Container is truncated at byte {0}")]
    Truncated(u64),
    #[error("Frame has {found} beads but the container holds {expected}")]
    BeadCountMismatch { found: usize, expected: usize },
    #[error("Frame {index} out of range (container has {n_frames} frames, numbered from 1)")]
    FrameOutOfRange { index: usize, n_frames: usize },
}

/// Topology and provenance stored once per container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CndbHeader {
    pub info: String,
    pub types: Vec<String>,
    pub chains: Vec<Chain>,
}

impl CndbHeader {
    pub fn n_beads(&self) -> usize {
        self.types.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CndbFrame {
    pub step: u64,
    pub coords: Vec<[f32; 3]>,
}

impl CndbFrame {
    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.coords
            .iter()
            .map(|c| Point3::new(c[0] as f64, c[1] as f64, c[2] as f64))
            .collect()
    }
}

pub struct CndbWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    n_beads: usize,
    n_frames: usize,
}

impl CndbWriter {
    pub fn create(path: &Path, header: &CndbHeader) -> Result<Self, CndbError> {
        let io_err = |source| CndbError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);

        let encoded = bincode::serialize(header).map_err(|e| CndbError::Corrupt(e.to_string()))?;
        let header_len = u32::try_from(encoded.len())
            .map_err(|_| CndbError::Corrupt("header larger than 4 GiB".into()))?;
        writer.write_all(CNDB_MAGIC).map_err(io_err)?;
        writer
            .write_all(&CNDB_VERSION.to_le_bytes())
            .map_err(io_err)?;
        writer
            .write_all(&header_len.to_le_bytes())
            .map_err(io_err)?;
        writer.write_all(&encoded).map_err(io_err)?;

        debug!(path = %path.display(), beads = header.n_beads(), "Created cndb container");
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            n_beads: header.n_beads(),
            n_frames: 0,
        })
    }

    pub fn append_frame(&mut self, step: u64, positions: &[Point3<f64>]) -> Result<(), CndbError> {
        if positions.len() != self.n_beads {
            return Err(CndbError::BeadCountMismatch {
                found: positions.len(),
                expected: self.n_beads,
            });
        }
        let frame = CndbFrame {
            step,
            coords: positions
                .iter()
                .map(|p| [p.x as f32, p.y as f32, p.z as f32])
                .collect(),
        };
        let encoded = bincode::serialize(&frame).map_err(|e| CndbError::Corrupt(e.to_string()))?;
        let compressed = lz4_flex::compress_prepend_size(&encoded);

        let io_err = |source| CndbError::Io {
            path: self.path.clone(),
            source,
        };
        self.writer
            .write_all(&(compressed.len() as u64).to_le_bytes())
            .map_err(io_err)?;
        self.writer.write_all(&compressed).map_err(io_err)?;
        self.writer.flush().map_err(io_err)?;
        self.n_frames += 1;
        Ok(())
    }

    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn finish(mut self) -> Result<PathBuf, CndbError> {
        self.writer.flush().map_err(|source| CndbError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(self.path)
    }
}

/// Random access to the frames of a container.
///
/// Opening scans the frame lengths once to index their offsets; frames are decoded on
/// demand.
pub struct CndbReader {
    path: PathBuf,
    reader: BufReader<File>,
    header: CndbHeader,
    /// Byte offset and length of every frame payload.
    frames: Vec<(u64, u64)>,
}

impl CndbReader {
    pub fn open(path: &Path) -> Result<Self, CndbError> {
        let io_err = |source| CndbError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_err)?;
        let file_len = file.metadata().map_err(io_err)?.len();
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        read_exact_or_truncated(&mut reader, &mut magic, 0)?;
        if &magic != CNDB_MAGIC {
            return Err(CndbError::BadMagic(path.to_path_buf()));
        }
        let mut word = [0u8; 4];
        read_exact_or_truncated(&mut reader, &mut word, 4)?;
        let version = u32::from_le_bytes(word);
        if version != CNDB_VERSION {
            return Err(CndbError::UnsupportedVersion {
                found: version,
                expected: CNDB_VERSION,
            });
        }
        read_exact_or_truncated(&mut reader, &mut word, 8)?;
        let header_len = u32::from_le_bytes(word) as u64;
        if 12 + header_len > file_len {
            return Err(CndbError::Truncated(file_len));
        }
        let mut encoded = vec![0u8; header_len as usize];
        read_exact_or_truncated(&mut reader, &mut encoded, 12)?;
        let header: CndbHeader =
            bincode::deserialize(&encoded).map_err(|e| CndbError::Corrupt(e.to_string()))?;

        let mut frames = Vec::new();
        let mut offset = 12 + header_len;
        while offset < file_len {
            if offset + 8 > file_len {
                return Err(CndbError::Truncated(offset));
            }
            let mut len_bytes = [0u8; 8];
            read_exact_or_truncated(&mut reader, &mut len_bytes, offset)?;
            let len = u64::from_le_bytes(len_bytes);
            let payload = offset + 8;
            let end = payload
                .checked_add(len)
                .filter(|&end| end <= file_len)
                .ok_or(CndbError::Truncated(payload))?;
            frames.push((payload, len));
            offset = end;
            reader
                .seek(SeekFrom::Start(offset))
                .map_err(io_err)?;
        }

        debug!(path = %path.display(), frames = frames.len(), "Opened cndb container");
        Ok(Self {
            path: path.to_path_buf(),
            reader,
            header,
            frames,
        })
    }

    pub fn header(&self) -> &CndbHeader {
        &self.header
    }

    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn n_beads(&self) -> usize {
        self.header.n_beads()
    }

    /// Decodes frame `index`, counted from 1.
    pub fn frame(&mut self, index: usize) -> Result<CndbFrame, CndbError> {
        let n_frames = self.frames.len();
        let &(offset, len) = index
            .checked_sub(1)
            .and_then(|k| self.frames.get(k))
            .ok_or(CndbError::FrameOutOfRange { index, n_frames })?;

        let io_err = |source| CndbError::Io {
            path: self.path.clone(),
            source,
        };
        self.reader.seek(SeekFrom::Start(offset)).map_err(io_err)?;
        let mut compressed = vec![0u8; len as usize];
        self.reader.read_exact(&mut compressed).map_err(io_err)?;
        let decoded = lz4_flex::decompress_size_prepended(&compressed)
            .map_err(|e| CndbError::Corrupt(format!("frame {}: {}", index, e)))?;
        let frame: CndbFrame = bincode::deserialize(&decoded)
            .map_err(|e| CndbError::Corrupt(format!("frame {}: {}", index, e)))?;
        if frame.coords.len() != self.header.n_beads() {
            return Err(CndbError::BeadCountMismatch {
                found: frame.coords.len(),
                expected: self.header.n_beads(),
            });
        }
        Ok(frame)
    }

    /// Positions of frame `index`, counted from 1.
    pub fn positions(&mut self, index: usize) -> Result<Vec<Point3<f64>>, CndbError> {
        Ok(self.frame(index)?.positions())
    }

    pub fn frames(&mut self) -> impl Iterator<Item = Result<CndbFrame, CndbError>> + '_ {
        (1..=self.n_frames()).map(move |i| self.frame(i))
    }
}

fn read_exact_or_truncated(
    reader: &mut impl Read,
    buf: &mut [u8],
    offset: u64,
) -> Result<(), CndbError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => CndbError::Truncated(offset),
        _ => CndbError::Corrupt(e.to_string()),
    })
}
