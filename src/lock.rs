//! Advisory lock guarding the registry's load-mutate-persist cycle
//!
//! The lock file lives at `<storage>/LOCK`. Locks are advisory (`fs2`): they
//! only exclude other processes that also take the lock. The lock is released
//! when the guard is dropped.

use crate::error::{Result, SnapshotError};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Lock file name inside the storage directory
pub const LOCK_FILE: &str = "LOCK";

/// Held exclusive lock on a storage directory
#[derive(Debug)]
pub struct RegistryLock {
    file: File,
    path: PathBuf,
}

impl RegistryLock {
    /// Block until the exclusive lock for `storage_dir` is acquired
    pub fn acquire(storage_dir: &Path) -> Result<Self> {
        let (file, path) = open_lock_file(storage_dir)?;
        file.lock_exclusive().map_err(|source| SnapshotError::LockFailed {
            path: path.clone(),
            source,
        })?;
        debug!("Acquired registry lock {:?}", path);
        Ok(Self { file, path })
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        // Closing the descriptor releases the lock anyway
        let _ = FileExt::unlock(&self.file);
        trace!("Released registry lock {:?}", self.path);
    }
}

fn open_lock_file(storage_dir: &Path) -> Result<(File, PathBuf)> {
    let path = storage_dir.join(LOCK_FILE);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .map_err(|source| SnapshotError::LockFailed {
            path: path.clone(),
            source,
        })?;
    Ok((file, path))
}
