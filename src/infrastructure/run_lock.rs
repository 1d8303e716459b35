//! Run Lock
//!
//! Exclusive, non-blocking file lock held for the whole relay run, so two
//! overlapping invocations cannot race on the stores or the sent cache.

use crate::error::{RelayError, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Held lock; released when dropped.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    _lock_file: File,
}

impl RunLock {
    /// Take the lock at `path`, creating the file if needed.
    ///
    /// Returns `RelayError::Lock` if another process already holds it.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        lock_file.try_lock_exclusive().map_err(|e| {
            RelayError::Lock(format!("{} is held by another run: {}", path.display(), e))
        })?;

        // Owner pid, for operators only.
        lock_file.set_len(0)?;
        writeln!(lock_file, "{}", std::process::id())?;

        tracing::debug!("run lock acquired: {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
