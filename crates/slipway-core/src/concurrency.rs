//! Cross-process exclusion for a state root.
//!
//! Every command that changes records or the journal holds the [`StateLock`]
//! of its state root. The lock file names the holding process so a waiting
//! command can say who it is waiting for.

use crate::CoreError;
use fs2::FileExt;
use slipway_store::StateLayout;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use tracing::debug;

/// Exclusive advisory lock on `state/.lock`, released on drop.
#[derive(Debug)]
pub struct StateLock {
    file: File,
}

impl StateLock {
    /// Take the lock, waiting for the current holder if there is one.
    pub fn acquire(layout: &StateLayout) -> Result<Self, CoreError> {
        let file = open(layout)?;
        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() != fs2::lock_contended_error().kind() {
                return Err(e.into());
            }
            match Self::holder(layout) {
                Some(pid) => debug!("waiting for the state lock held by pid {pid}"),
                None => debug!("waiting for the state lock"),
            }
            file.lock_exclusive()?;
        }
        Self::claimed(file)
    }

    /// `None` while another process holds the lock.
    pub fn try_acquire(layout: &StateLayout) -> Result<Option<Self>, CoreError> {
        let file = open(layout)?;
        match file.try_lock_exclusive() {
            Ok(()) => Self::claimed(file).map(Some),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Process id recorded by the last holder, if the lock file names one.
    pub fn holder(layout: &StateLayout) -> Option<u32> {
        fs::read_to_string(layout.lock_file())
            .ok()?
            .trim()
            .parse()
            .ok()
    }

    fn claimed(mut file: File) -> Result<Self, CoreError> {
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(file, "{}", std::process::id())?;
        Ok(Self { file })
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        let _ = self.file.set_len(0);
        let _ = self.file.unlock();
    }
}

fn open(layout: &StateLayout) -> Result<File, CoreError> {
    fs::create_dir_all(layout.state_dir())?;
    Ok(OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(layout.lock_file())?)
}
