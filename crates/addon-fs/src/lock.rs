//! Advisory run lock for the install root
//!
//! One convergence run may write to an install root at a time. The lock is a
//! `fs2` exclusive advisory lock on a well-known file inside the root, held
//! for the lifetime of the [`RunLock`] value. Acquisition never blocks: a
//! held lock surfaces immediately as [`Error::LockBusy`] so the caller can
//! fail fast instead of queueing behind another run.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::{Error, Result};

/// Exclusive lock over an install root, released on drop.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Acquire the lock file at `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockBusy`] if another process already holds the lock,
    /// [`Error::LockFailed`] on any other locking failure.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| Error::io(path, e))?;

        file.try_lock_exclusive().map_err(|e| {
            if e.kind() == io::ErrorKind::WouldBlock
                || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
            {
                Error::LockBusy {
                    path: path.to_path_buf(),
                }
            } else {
                Error::LockFailed {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;

        tracing::debug!(path = %path.display(), "acquired run lock");

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Path of the underlying lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // Unlock errors on drop are unreportable; the OS releases the lock
        // when the descriptor closes anyway.
        let _ = FileExt::unlock(&self.file);
    }
}
