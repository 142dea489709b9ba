//! [`PublishQueue`] that hands requests to a running daemon.

use std::path::PathBuf;

use contrail_core::CommitId;
use contrail_sync::PublishQueue;

use crate::error::DaemonError;
use crate::protocol::request_publish;

/// Forwards capture's publish requests over the daemon socket.
///
/// A missing daemon is not an error: the cursor only advances on a
/// successful publish, so the next publish picks the commit up.
#[derive(Debug, Clone)]
pub struct DaemonPublishQueue {
    pub home: PathBuf,
    pub code_root: PathBuf,
}

impl DaemonPublishQueue {
    pub fn new(home: impl Into<PathBuf>, code_root: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            code_root: code_root.into(),
        }
    }
}

impl PublishQueue for DaemonPublishQueue {
    fn request_publish(&self, context_commit: &CommitId) {
        match request_publish(&self.home, &self.code_root) {
            Ok(ack) => tracing::debug!(
                commit = %context_commit.short(),
                queued = ?ack.queued,
                "publish handed to daemon"
            ),
            Err(DaemonError::DaemonNotRunning { .. }) => tracing::info!(
                commit = %context_commit.short(),
                "daemon not running; publish deferred"
            ),
            Err(err) => tracing::warn!(
                commit = %context_commit.short(),
                error = %err,
                "could not hand publish to daemon"
            ),
        }
    }
}
