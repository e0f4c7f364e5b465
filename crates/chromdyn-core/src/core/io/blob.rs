//! Compressed bincode snapshots used for accumulator and optimizer state files.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("I/O error for '{path}': {source}")]
    Io { path: String, source: io::Error },
    #[error("Failed to encode or decode '{path}': {reason}")]
    Codec { path: String, reason: String },
}

pub fn save<T: Serialize>(value: &T, path: &Path) -> Result<(), BlobError> {
    let path_str = path.to_string_lossy().to_string();
    let encoded = bincode::serialize(value).map_err(|e| BlobError::Codec {
        path: path_str.clone(),
        reason: e.to_string(),
    })?;
    fs::write(path, lz4_flex::compress_prepend_size(&encoded)).map_err(|e| BlobError::Io {
        path: path_str,
        source: e,
    })
}

pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T, BlobError> {
    let path_str = path.to_string_lossy().to_string();
    let compressed = fs::read(path).map_err(|e| BlobError::Io {
        path: path_str.clone(),
        source: e,
    })?;
    let decoded =
        lz4_flex::decompress_size_prepended(&compressed).map_err(|e| BlobError::Codec {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;
    bincode::deserialize(&decoded).map_err(|e| BlobError::Codec {
        path: path_str,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn garbage_file_fails_to_decode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.bin");
        fs::write(&path, b"\x01\x02").unwrap();
        assert!(matches!(load::<Vec<f64>>(&path), Err(BlobError::Codec { .. })));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            load::<Vec<f64>>(&dir.path().join("absent.bin")),
            Err(BlobError::Io { .. })
        ));
    }
}
