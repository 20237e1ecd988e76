//! dsk-store
//!
//! Durable checkpoint storage for the reconciliation engine.
//!
//! # Contract
//! - `load()` on a missing file returns an empty [`Checkpoint`]; anything else
//!   that prevents reading or decoding is a [`StoreError`].
//! - `save()` atomically replaces the file: the JSON is written to a temp file
//!   in the same directory, synced, then renamed over the target. A crash at
//!   any point leaves either the old or the new checkpoint on disk, never a
//!   torn one.
//! - `save()` is called after every single post, so it must stay cheap and
//!   side-effect free apart from the file replacement.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use dsk_schemas::Checkpoint;
use tracing::debug;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors raised while reading or writing the checkpoint.
#[derive(Debug)]
pub enum StoreError {
    /// The checkpoint file exists but could not be read.
    Read { path: PathBuf, source: io::Error },
    /// The checkpoint file was read but is not a valid checkpoint.
    Decode { path: PathBuf, message: String },
    /// The checkpoint could not be encoded.
    Encode(String),
    /// The checkpoint could not be written or moved into place.
    Write { path: PathBuf, source: io::Error },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Read { path, source } => {
                write!(f, "checkpoint read failed path={}: {source}", path.display())
            }
            StoreError::Decode { path, message } => {
                write!(
                    f,
                    "checkpoint decode failed path={}: {message}",
                    path.display()
                )
            }
            StoreError::Encode(msg) => write!(f, "checkpoint encode failed: {msg}"),
            StoreError::Write { path, source } => {
                write!(f, "checkpoint write failed path={}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Read { source, .. } | StoreError::Write { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Checkpoint persistence boundary.
///
/// Synchronous on purpose: the engine appends to its in-memory chain and saves
/// without yielding, so a cancelled iteration can never separate the two.
pub trait CheckpointStore: Send + Sync {
    fn load(&self) -> Result<Checkpoint, StoreError>;

    fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// Stores the checkpoint as a single JSON file.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory the temp file is created in. Must be on the same filesystem
    /// as the target for the rename to be atomic.
    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn write_err(&self, source: io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self) -> Result<Checkpoint, StoreError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no checkpoint yet, starting empty");
                return Ok(Checkpoint::empty());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_slice(&raw).map_err(|e| StoreError::Decode {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        let body =
            serde_json::to_vec_pretty(checkpoint).map_err(|e| StoreError::Encode(e.to_string()))?;

        let dir = self.parent_dir();
        fs::create_dir_all(&dir).map_err(|e| self.write_err(e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.write_err(e))?;
        tmp.write_all(&body).map_err(|e| self.write_err(e))?;
        tmp.as_file().sync_all().map_err(|e| self.write_err(e))?;
        tmp.persist(&self.path).map_err(|e| self.write_err(e.error))?;

        debug!(
            path = %self.path.display(),
            tracked = checkpoint.len(),
            "checkpoint saved"
        );
        Ok(())
    }
}
