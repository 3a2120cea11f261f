use crate::{write_atomic, StoreError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Current state format version. Incremented on incompatible layout changes.
pub const STATE_FORMAT_VERSION: u32 = 1;
const VERSION_FILE: &str = "version";

/// Directory layout of the applied-state root.
///
/// ```text
/// <root>/state/version
/// <root>/state/resources/<kind>.<name>
/// <root>/state/journal/<op-id>.json
/// <root>/state/.lock
/// ```
#[derive(Debug, Clone)]
pub struct StateLayout {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateVersion {
    format_version: u32,
}

impl StateLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn state_dir(&self) -> PathBuf {
        self.root.join("state")
    }

    #[inline]
    pub fn resources_dir(&self) -> PathBuf {
        self.state_dir().join("resources")
    }

    #[inline]
    pub fn record_path(&self, address: &str) -> PathBuf {
        self.resources_dir().join(address)
    }

    #[inline]
    pub fn journal_dir(&self) -> PathBuf {
        self.state_dir().join("journal")
    }

    #[inline]
    pub fn lock_file(&self) -> PathBuf {
        self.state_dir().join(".lock")
    }

    #[inline]
    fn version_file(&self) -> PathBuf {
        self.state_dir().join(VERSION_FILE)
    }

    /// True once [`initialize`](Self::initialize) has run for this root.
    pub fn is_initialized(&self) -> bool {
        self.version_file().exists()
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(self.resources_dir())?;
        fs::create_dir_all(self.journal_dir())?;

        let version_path = self.version_file();
        if version_path.exists() {
            self.verify_version()?;
        } else {
            let ver = StateVersion {
                format_version: STATE_FORMAT_VERSION,
            };
            let content = serde_json::to_string_pretty(&ver)?;
            write_atomic(&self.state_dir(), &version_path, content.as_bytes())?;
            tracing::debug!("initialized state root at {}", self.root.display());
        }

        Ok(())
    }

    pub fn verify_version(&self) -> Result<(), StoreError> {
        let content = fs::read_to_string(self.version_file())?;
        let ver: StateVersion = serde_json::from_str(&content)?;

        if ver.format_version != STATE_FORMAT_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: STATE_FORMAT_VERSION,
                found: ver.format_version,
            });
        }
        Ok(())
    }
}
