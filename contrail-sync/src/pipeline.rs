//! Publish / pull pipeline shared by the CLI and the daemon.
//!
//! # Object layout
//!
//! ```text
//! <project_id>/bundles/<unix_millis:020>-<head12>.bundle
//! ```
//!
//! Keys sort lexically in publish order. Pull lists the prefix, drops every
//! key already in the consumed set (see [`cursor::imported_keys`]) and applies
//! the rest oldest first. A bundle whose prerequisites are not present yet is
//! deferred: the remaining keys are still applied, deferred ones are retried
//! while any progress is made, and whatever is left stays unconsumed for the
//! next pull.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use contrail_core::{BranchName, Config, GitRepo, ProjectBinding, ProjectId, ProjectLock};

use crate::bundle::{self, BranchUpdate};
use crate::cursor;
use crate::error::SyncError;
use crate::store::ObjectStore;

const DEFAULT_BRANCH: &str = "main";

/// `<project_id>/bundles/`
pub fn object_prefix(project: &ProjectId) -> String {
    format!("{project}/bundles/")
}

pub fn object_key(project: &ProjectId, unix_millis: u128, head12: &str) -> String {
    format!("{}{unix_millis:020}-{head12}.bundle", object_prefix(project))
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishOutcome {
    /// Key of the uploaded bundle; `None` when nothing was new.
    pub key: Option<String>,
    pub branches: Vec<BranchName>,
    pub bytes: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PullOutcome {
    /// Keys applied, oldest first.
    pub applied: Vec<String>,
    /// Keys whose prerequisites are still missing; retried next pull.
    pub deferred: Vec<String>,
    pub updates: Vec<BranchUpdate>,
    /// True when pull created the local context repository.
    pub created: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncOutcome {
    pub pull: PullOutcome,
    pub publish: PublishOutcome,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Upload everything committed since the cursor as one bundle.
///
/// Takes no project lock: it only reads branch refs and moves cursor refs, so
/// it can run in the background while captures continue.
pub fn publish(binding: &ProjectBinding, store: &dyn ObjectStore) -> Result<PublishOutcome, SyncError> {
    let context = GitRepo::open_context(&binding.context_root)?;
    let loaded = cursor::load(&context)?;
    let Some(artifact) = bundle::export(&context, &loaded)? else {
        return Ok(PublishOutcome::default());
    };

    let key = object_key(&binding.id, now_millis(), &artifact.head12());
    store.put(&key, &artifact.bytes)?;
    cursor::record_imported(&context, &key)?;
    tracing::info!("published {key} ({} bytes)", artifact.bytes.len());

    // Only exported branches move, each guarded by the value exported against.
    for (branch, tip) in &artifact.tips {
        if !cursor::advance(&context, branch, tip, loaded.get(branch))? {
            tracing::warn!("cursor for {branch} moved during publish; leaving it in place");
        }
    }

    Ok(PublishOutcome {
        key: Some(key),
        branches: artifact.tips.keys().cloned().collect(),
        bytes: artifact.bytes.len(),
    })
}

/// Download and apply every bundle not consumed yet.
pub fn pull(
    binding: &ProjectBinding,
    config: &Config,
    store: &dyn ObjectStore,
) -> Result<PullOutcome, SyncError> {
    let mut outcome = PullOutcome::default();
    let context = if binding.is_initialized() {
        GitRepo::open_context(&binding.context_root)?
    } else {
        outcome.created = true;
        GitRepo::init(&binding.context_root, &BranchName::from(DEFAULT_BRANCH))?
    };
    let _lock = ProjectLock::acquire(&context.git_dir(), config.lock_timeout())?;

    let consumed = cursor::imported_keys(&context)?;
    let mut pending: Vec<String> = store
        .list(&object_prefix(&binding.id))?
        .into_iter()
        .filter(|key| !consumed.contains(key))
        .collect();
    pending.sort();

    let mut current = cursor::load(&context)?;
    loop {
        let mut deferred = Vec::new();
        let before = outcome.applied.len();
        for key in pending {
            let bytes = store.get(&key)?;
            let report = match bundle::import(&context, &bytes, &current) {
                Ok(report) => report,
                Err(SyncError::MissingPrerequisites { detail }) => {
                    tracing::debug!("{key}: deferring ({detail})");
                    deferred.push(key);
                    continue;
                }
                Err(err) => return Err(err),
            };
            for diverged in report.diverged() {
                tracing::warn!("{}: {} kept local history ({})", key, diverged.branch, diverged.outcome);
            }
            cursor::save(&context, &report.cursor)?;
            cursor::record_imported(&context, &key)?;
            cursor::set_last_imported(&context, &key)?;
            current = report.cursor;
            outcome.updates.extend(report.branches);
            outcome.applied.push(key);
        }
        pending = deferred;
        if pending.is_empty() || outcome.applied.len() == before {
            break;
        }
    }

    for key in &pending {
        tracing::warn!("{key}: prerequisites not present yet, will retry on next pull");
    }
    outcome.deferred = pending;
    Ok(outcome)
}

/// Pull, then publish.
pub fn sync(
    binding: &ProjectBinding,
    config: &Config,
    store: &dyn ObjectStore,
) -> Result<SyncOutcome, SyncError> {
    let pull = pull(binding, config, store)?;
    let publish = publish(binding, store)?;
    Ok(SyncOutcome { pull, publish })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_sort_in_publish_order() {
        let id = ProjectId::from("0123456789abcdef");
        let early = object_key(&id, 999, "aaaaaaaaaaaa");
        let late = object_key(&id, 1_000, "000000000000");
        assert!(early < late);
        assert_eq!(
            late,
            "0123456789abcdef/bundles/00000000000000001000-000000000000.bundle"
        );
    }
}
