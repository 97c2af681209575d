//! workdir::lock
//!
//! Exclusive ownership lock for a working directory.
//!
//! # Architecture
//!
//! A [`crate::workdir::WorkingDirectory`] assumes one logical owner per
//! clone. The index-lock wait defends against *external* Git processes, not
//! against two CI tasks adopting the same clone. Drivers that share a clone
//! pool acquire a `WorkdirLock` before constructing the handle to make the
//! single-owner rule enforceable.
//!
//! # Storage
//!
//! - `<git_dir>/gitfarm.lock` - lock file with an OS-level exclusive lock
//!
//! # Invariants
//!
//! - Lock acquisition is non-blocking (fails fast if held elsewhere)
//! - The lock is released on drop (RAII)

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already owns the working directory.
    #[error("working directory is owned by another gitfarm process")]
    AlreadyLocked,

    /// Failed to create the lock file.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),
}

/// An exclusive ownership lock on a working directory.
///
/// The lock is automatically released when this guard is dropped, even if
/// the owning task panics.
#[derive(Debug)]
pub struct WorkdirLock {
    /// Path to the lock file.
    path: PathBuf,
    /// The open file handle; `Some` while the lock is held.
    file: Option<File>,
}

impl WorkdirLock {
    /// Attempt to acquire the ownership lock for the given `.git` directory.
    ///
    /// Uses OS-level file locking via `fs2`, which works across processes.
    /// Non-blocking: if another process holds the lock this returns
    /// [`LockError::AlreadyLocked`] immediately.
    pub fn acquire(git_dir: &Path) -> Result<Self, LockError> {
        let path = git_dir.join("gitfarm.lock");

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                file: Some(file),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(LockError::AlreadyLocked),
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    /// Try to acquire, returning `None` if another process holds the lock.
    pub fn try_acquire(git_dir: &Path) -> Result<Option<Self>, LockError> {
        match Self::acquire(git_dir) {
            Ok(lock) => Ok(Some(lock)),
            Err(LockError::AlreadyLocked) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Check if this guard still holds the lock.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Get the path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock explicitly. Also happens on drop.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            file.unlock()
                .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for WorkdirLock {
    fn drop(&mut self) {
        // Best-effort release; errors are moot at drop time
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}
