use crate::layout::StateLayout;
use crate::records::{ResourceRecord, ResourceState, StateStore};
use crate::{write_atomic, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slipway_schema::{Address, Resource};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// The provider operation being tracked.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JournalOp {
    Create,
    Destroy,
}

impl std::fmt::Display for JournalOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JournalOp::Create => write!(f, "create"),
            JournalOp::Destroy => write!(f, "destroy"),
        }
    }
}

/// A journal entry representing an in-flight provider call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub op_id: String,
    pub op: JournalOp,
    pub address: Address,
    pub sequence: usize,
    pub resource: Resource,
    pub timestamp: String,
}

/// Journal of provider calls whose outcome has not been recorded yet.
///
/// The engine writes an entry before calling `create`/`destroy` and commits
/// (removes) it once the outcome is in the state store. Entries left behind
/// by a crash are turned into records on the next start.
pub struct Journal {
    dir: PathBuf,
}

impl Journal {
    pub fn new(layout: &StateLayout) -> Self {
        Self {
            dir: layout.journal_dir(),
        }
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Begin a new entry for an operation. Returns the op_id.
    pub fn begin(
        &self,
        op: JournalOp,
        resource: &Resource,
        sequence: usize,
    ) -> Result<String, StoreError> {
        let address = resource.address();
        let now = Utc::now();
        let op_id = format!(
            "{}-{}-{op}",
            now.format("%Y%m%d%H%M%S%6f"),
            &blake3::hash(address.to_string().as_bytes()).to_hex()[..8]
        );
        let entry = JournalEntry {
            op_id: op_id.clone(),
            op,
            address,
            sequence,
            resource: resource.clone(),
            timestamp: now.to_rfc3339(),
        };
        self.write_entry(&entry)?;
        debug!("journal begin: {op} {} (op_id={op_id})", entry.address);
        Ok(op_id)
    }

    /// Commit (remove) an entry once its outcome is recorded.
    pub fn commit(&self, op_id: &str) -> Result<(), StoreError> {
        let path = self.entry_path(op_id);
        if path.exists() {
            fs::remove_file(&path)?;
            debug!("journal commit: {op_id}");
        }
        Ok(())
    }

    /// All entries left behind, oldest first.
    pub fn list_incomplete(&self) -> Result<Vec<JournalEntry>, StoreError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            if path.extension().is_some_and(|e| e == "json") {
                match fs::read_to_string(&path) {
                    Ok(content) => match serde_json::from_str::<JournalEntry>(&content) {
                        Ok(entry) => entries.push(entry),
                        Err(e) => {
                            warn!("corrupt journal entry {}: {e}", path.display());
                            let _ = fs::remove_file(&path);
                        }
                    },
                    Err(e) => {
                        warn!("unreadable journal entry {}: {e}", path.display());
                        let _ = fs::remove_file(&path);
                    }
                }
            }
        }
        entries.sort_by(|a, b| a.op_id.cmp(&b.op_id));
        Ok(entries)
    }

    /// Turn every leftover entry into state records and remove it.
    ///
    /// An interrupted create becomes a `CreateFailed` record so a later
    /// destroy cleans it up. An interrupted destroy keeps the record and notes
    /// the interruption. Returns the number of entries recovered.
    pub fn recover(&self, store: &StateStore) -> Result<usize, StoreError> {
        let entries = self.list_incomplete()?;
        let count = entries.len();
        for entry in &entries {
            info!(
                "journal recovery: interrupted {} on {} (op_id={})",
                entry.op, entry.address, entry.op_id
            );
            if let Err(e) = recover_entry(store, entry) {
                warn!("journal recovery: failed to record {}: {e}", entry.address);
                continue;
            }
            let _ = fs::remove_file(self.entry_path(&entry.op_id));
        }
        if count > 0 {
            info!("journal recovery complete: {count} entries recovered");
        }
        Ok(count)
    }

    fn entry_path(&self, op_id: &str) -> PathBuf {
        self.dir.join(format!("{op_id}.json"))
    }

    fn write_entry(&self, entry: &JournalEntry) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let content = serde_json::to_string_pretty(entry)?;
        write_atomic(&self.dir, &self.entry_path(&entry.op_id), content.as_bytes())
    }
}

/// True when `record` was written after `entry` began, i.e. the outcome was
/// recorded and only the commit was lost.
fn recorded_after(record: &ResourceRecord, entry: &JournalEntry) -> bool {
    let parse = |s: &str| DateTime::parse_from_rfc3339(s).ok();
    match (parse(&record.updated_at), parse(&entry.timestamp)) {
        (Some(updated), Some(started)) => updated >= started,
        _ => false,
    }
}

fn recover_entry(store: &StateStore, entry: &JournalEntry) -> Result<(), StoreError> {
    let address = entry.address.to_string();
    let existing = store.find(&address)?;
    match entry.op {
        JournalOp::Create => {
            if let Some(record) = &existing {
                if recorded_after(record, entry) {
                    debug!("journal recovery: {address} outcome already recorded");
                    return Ok(());
                }
            }
            let mut record = existing.unwrap_or_else(|| {
                ResourceRecord::new(
                    entry.resource.clone(),
                    ResourceState::CreateFailed,
                    entry.sequence,
                )
            });
            record.state = ResourceState::CreateFailed;
            record.resource = entry.resource.clone();
            record.last_error = Some("create was interrupted".to_owned());
            record.touch();
            store.put(&record)
        }
        JournalOp::Destroy => match existing {
            Some(mut record) if !recorded_after(&record, entry) => {
                record.last_error = Some("destroy was interrupted".to_owned());
                record.touch();
                store.put(&record)
            }
            _ => Ok(()),
        },
    }
}
