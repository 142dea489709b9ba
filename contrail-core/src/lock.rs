//! Per-project exclusive lock.
//!
//! Capture, checkout, recovery and pull mutate the context working tree and
//! must not interleave. The lock is an advisory `flock` on
//! `<context>/.git/contrail.lock`, held for the lifetime of [`ProjectLock`]
//! and released on drop (or when the process dies).

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{io_err, CoreError};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// File name of the lock inside the context repository's `.git`.
pub const LOCK_FILE: &str = "contrail.lock";

/// RAII guard for the per-project lock.
#[derive(Debug)]
pub struct ProjectLock {
    file: File,
    path: PathBuf,
}

impl ProjectLock {
    /// Acquire the lock in `git_dir`, polling until `timeout` expires.
    pub fn acquire(git_dir: &Path, timeout: Duration) -> Result<Self, CoreError> {
        let path = git_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| io_err(&path, e))?;

        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    tracing::debug!("acquired {}", path.display());
                    return Ok(Self { file, path });
                }
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if Instant::now() >= deadline {
                        return Err(CoreError::LockTimeout { path });
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(io_err(&path, e)),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("failed to release {}: {e}", self.path.display());
        }
    }
}
