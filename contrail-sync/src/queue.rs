//! Hand-off point between capture and background publishing.

use contrail_core::CommitId;

/// Receives "this project has a new context commit" notifications.
///
/// Implementations must return promptly: capture calls this on the commit
/// hook's thread and never waits for the publish itself.
pub trait PublishQueue {
    fn request_publish(&self, context_commit: &CommitId);
}

/// Drops every request. Used when no remote is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPublish;

impl PublishQueue for NoPublish {
    fn request_publish(&self, context_commit: &CommitId) {
        tracing::debug!("publishing disabled; not queueing {}", context_commit.short());
    }
}
