use crate::layout::StateLayout;
use crate::{write_atomic, StoreError};
use serde::{Deserialize, Serialize};
use slipway_schema::{Address, Resource};
use std::fs;

/// Lifecycle state of a resource as observed by the engine.
///
/// `Declared` and `Resolved` only exist in memory. `Destroyed` and
/// `DestroyFailed` are outcomes: a destroyed resource has no record, a failed
/// destroy keeps the previous record with `last_error` set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    Declared,
    Resolved,
    Created,
    CreateFailed,
    Destroyed,
    DestroyFailed,
}

impl ResourceState {
    /// Whether a record may carry this state.
    pub fn is_persistent(self) -> bool {
        matches!(self, ResourceState::Created | ResourceState::CreateFailed)
    }
}

impl std::fmt::Display for ResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceState::Declared => write!(f, "declared"),
            ResourceState::Resolved => write!(f, "resolved"),
            ResourceState::Created => write!(f, "created"),
            ResourceState::CreateFailed => write!(f, "create_failed"),
            ResourceState::Destroyed => write!(f, "destroyed"),
            ResourceState::DestroyFailed => write!(f, "destroy_failed"),
        }
    }
}

/// Persisted applied state of one resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceRecord {
    pub address: Address,
    pub state: ResourceState,
    /// Position in the apply order of the run that wrote the record.
    pub sequence: usize,
    /// Snapshot of the declared resource, enough to destroy it later.
    pub resource: Resource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    /// blake3 checksum for integrity verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl ResourceRecord {
    pub fn new(resource: Resource, state: ResourceState, sequence: usize) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            address: resource.address(),
            state,
            sequence,
            resource,
            provider_id: None,
            last_error: None,
            created_at: now.clone(),
            updated_at: now,
            checksum: None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }

    /// Checksum over the record content, excluding the checksum field itself.
    fn compute_checksum(&self) -> Result<String, StoreError> {
        let mut copy = self.clone();
        copy.checksum = None;
        let json = serde_json::to_string_pretty(&copy)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

/// Reject addresses that cannot be used as a record file name.
pub fn validate_address(address: &str) -> Result<(), StoreError> {
    if address.is_empty() || address.len() > 255 {
        return Err(StoreError::InvalidAddress(
            "record address must be 1-255 characters".to_owned(),
        ));
    }
    if address.starts_with('.') || address.contains(['/', '\\', '\0']) {
        return Err(StoreError::InvalidAddress(format!(
            "'{address}' cannot be stored as a record"
        )));
    }
    Ok(())
}

/// Per-resource applied-state records, one JSON file per address.
pub struct StateStore {
    layout: StateLayout,
}

impl StateStore {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    pub fn put(&self, record: &ResourceRecord) -> Result<(), StoreError> {
        let address = record.address.to_string();
        validate_address(&address)?;
        if !record.state.is_persistent() {
            return Err(StoreError::TransientState {
                address,
                state: record.state.to_string(),
            });
        }

        let mut with_checksum = record.clone();
        with_checksum.checksum = Some(with_checksum.compute_checksum()?);
        let content = serde_json::to_string_pretty(&with_checksum)?;

        let dir = self.layout.resources_dir();
        fs::create_dir_all(&dir)?;
        write_atomic(&dir, &self.layout.record_path(&address), content.as_bytes())?;
        tracing::debug!("recorded {address} as {}", record.state);
        Ok(())
    }

    pub fn get(&self, address: &str) -> Result<ResourceRecord, StoreError> {
        validate_address(address)?;
        let path = self.layout.record_path(address);
        if !path.exists() {
            return Err(StoreError::RecordNotFound(address.to_owned()));
        }
        let content = fs::read_to_string(&path)?;
        let record: ResourceRecord = serde_json::from_str(&content)?;

        let Some(expected) = record.checksum.as_ref() else {
            return Err(StoreError::IntegrityFailure {
                address: address.to_owned(),
                expected: "checksum".to_owned(),
                actual: "none".to_owned(),
            });
        };
        let actual = record.compute_checksum()?;
        if actual != *expected {
            return Err(StoreError::IntegrityFailure {
                address: address.to_owned(),
                expected: expected.clone(),
                actual,
            });
        }
        if record.address.to_string() != address {
            return Err(StoreError::IntegrityFailure {
                address: address.to_owned(),
                expected: address.to_owned(),
                actual: record.address.to_string(),
            });
        }

        Ok(record)
    }

    /// `Ok(None)` when there is no record for `address`.
    pub fn find(&self, address: &str) -> Result<Option<ResourceRecord>, StoreError> {
        match self.get(address) {
            Ok(record) => Ok(Some(record)),
            Err(StoreError::RecordNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn exists(&self, address: &str) -> bool {
        validate_address(address).is_ok() && self.layout.record_path(address).exists()
    }

    /// Remove a record; removing an absent record is not an error.
    pub fn remove(&self, address: &str) -> Result<(), StoreError> {
        validate_address(address)?;
        let path = self.layout.record_path(address);
        if path.exists() {
            fs::remove_file(path)?;
            tracing::debug!("removed record {address}");
        }
        Ok(())
    }

    /// Every readable record, ordered by apply sequence. Corrupt records are
    /// skipped with a warning.
    pub fn list(&self) -> Result<Vec<ResourceRecord>, StoreError> {
        let mut results = Vec::new();
        for entry in self.list_with_errors()? {
            match entry {
                Ok(record) => results.push(record),
                Err((name, e)) => {
                    tracing::warn!("skipping corrupted state record '{name}': {e}");
                }
            }
        }
        Ok(results)
    }

    /// Like `list()`, but returns per-entry `Result`s so callers can surface
    /// individual corruption errors.
    #[allow(clippy::type_complexity)]
    pub fn list_with_errors(
        &self,
    ) -> Result<Vec<Result<ResourceRecord, (String, StoreError)>>, StoreError> {
        let dir = self.layout.resources_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let name = entry.file_name().to_string_lossy().into_owned();
                if !name.starts_with('.') {
                    names.push(name);
                }
            }
        }
        names.sort();

        let mut results: Vec<Result<ResourceRecord, (String, StoreError)>> = names
            .into_iter()
            .map(|name| self.get(&name).map_err(|e| (name, e)))
            .collect();
        results.sort_by_key(|r| match r {
            Ok(record) => (0, record.sequence),
            Err(_) => (1, 0),
        });
        Ok(results)
    }
}
