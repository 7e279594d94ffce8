//! Content digests and modification times for media files.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

const BLOCK_SIZE: usize = 64 * 1024;

/// Errors while reading file content or metadata.
#[derive(Debug, Error)]
pub enum DigestError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Modification time of {path} predates the unix epoch")]
    Time { path: PathBuf },
}

/// Stream the whole file through BLAKE3 and return the hex digest.
pub fn compute_digest(path: &Path) -> Result<String, DigestError> {
    let mut file = fs::File::open(path).map_err(|source| DigestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; BLOCK_SIZE];
    loop {
        let read = file.read(&mut buffer).map_err(|source| DigestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Current modification time of `path` in unix nanoseconds.
pub fn modified_ns(path: &Path) -> Result<i64, DigestError> {
    let meta = fs::metadata(path).map_err(|source| DigestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let modified = meta.modified().map_err(|source| DigestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    to_nanos(&modified, path)
}

fn to_nanos(time: &SystemTime, path: &Path) -> Result<i64, DigestError> {
    let duration = time
        .duration_since(UNIX_EPOCH)
        .map_err(|_| DigestError::Time {
            path: path.to_path_buf(),
        })?;
    Ok(duration.as_nanos().min(i64::MAX as u128) as i64)
}
