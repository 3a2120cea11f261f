//! Applied-state persistence for Slipway.
//!
//! This crate provides the storage layer: `StateLayout` for the on-disk
//! directory structure and format marker, `StateStore` for per-resource
//! `ResourceRecord`s written atomically with a blake3 checksum, and `Journal`
//! for in-flight provider operations that must be recovered after a crash.

pub mod journal;
pub mod layout;
pub mod records;

pub use journal::{Journal, JournalEntry, JournalOp};
pub use layout::{StateLayout, STATE_FORMAT_VERSION};
pub use records::{validate_address, ResourceRecord, ResourceState, StateStore};

use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Fsync a directory so that a preceding `rename()` is durable.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

/// Write `content` to `dest` via a synced temp file in `dir` and a rename.
pub(crate) fn write_atomic(dir: &Path, dest: &Path, content: &[u8]) -> Result<(), StoreError> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| StoreError::Io(e.error))?;
    fsync_dir(dir)?;
    Ok(())
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("integrity check failed for record '{address}': expected {expected}, got {actual}")]
    IntegrityFailure {
        address: String,
        expected: String,
        actual: String,
    },
    #[error("no recorded state for '{0}'")]
    RecordNotFound(String),
    #[error("state format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid record address: {0}")]
    InvalidAddress(String),
    #[error("state '{state}' of '{address}' is transient and cannot be recorded")]
    TransientState { address: String, state: String },
}
