//! Capture: runs after every code commit.
//!
//! 1. Read the code HEAD; detached HEAD is skipped, an unborn branch fails.
//! 2. Mirror the branch into the context repository, seeding a new branch
//!    from the context of the nearest linked code ancestor.
//! 3. Switch the context repository to that branch if it is not current.
//! 4. Stage pending transcripts (possibly none).
//! 5. Commit with the link trailer, even when nothing was staged, so every
//!    code commit on a branch has exactly one context commit.
//! 6. Hand the new commit to the publish queue.
//!
//! A failure in steps 4–5 resets the context index back to the branch's
//! prior tip before it is reported.

use std::fmt;

use serde::Serialize;

use contrail_core::link::{self, nearest_linked};
use contrail_core::mirror::ensure_branch;
use contrail_core::{
    BranchName, CommitId, HeadState, PendingTranscriptSet, RepositoryHandle, TranscriptFilter,
};

use crate::outcome::{Failure, FailureKind, RepoRole};
use crate::queue::PublishQueue;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Detached HEAD has no branch identity to mirror.
    DetachedHead,
    /// No context repository exists for this project yet.
    NotInitialized,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DetachedHead => f.write_str("detached HEAD"),
            Self::NotInitialized => f.write_str("context repository not initialized"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureStatus {
    Captured,
    Skipped(SkipReason),
    Failed(Failure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureResult {
    pub status: CaptureStatus,
    pub context_commit: Option<CommitId>,
    pub code_commit: Option<CommitId>,
    pub branch: Option<BranchName>,
    /// Number of transcript files included in the commit.
    pub transcripts: usize,
}

impl CaptureResult {
    pub fn skipped(reason: SkipReason) -> Self {
        Self::bare(CaptureStatus::Skipped(reason))
    }

    pub fn failed(failure: Failure) -> Self {
        Self::bare(CaptureStatus::Failed(failure))
    }

    fn bare(status: CaptureStatus) -> Self {
        Self {
            status,
            context_commit: None,
            code_commit: None,
            branch: None,
            transcripts: 0,
        }
    }

    pub fn is_captured(&self) -> bool {
        self.status == CaptureStatus::Captured
    }

    /// One-line summary printed by the commit hook.
    pub fn summary(&self) -> String {
        match (&self.status, &self.context_commit, &self.branch) {
            (CaptureStatus::Captured, Some(ctx), Some(branch)) => format!(
                "contrail: captured {} transcript(s) on {branch} as {}",
                self.transcripts,
                ctx.short()
            ),
            (CaptureStatus::Skipped(reason), ..) => format!("contrail: skipped ({reason})"),
            (CaptureStatus::Failed(failure), ..) => format!("contrail: capture failed: {failure}"),
            _ => "contrail: captured".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Settings for a capture run.
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub filter: TranscriptFilter,
    pub ancestor_search_depth: usize,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            filter: TranscriptFilter::default(),
            ancestor_search_depth: 100,
        }
    }
}

/// Record a context commit for the code repository's current commit.
///
/// Never touches the code repository. The caller holds the project lock.
pub fn capture<C, X>(
    code: &C,
    context: &X,
    options: &CaptureOptions,
    queue: &dyn PublishQueue,
) -> CaptureResult
where
    C: RepositoryHandle + ?Sized,
    X: RepositoryHandle + ?Sized,
{
    // Step 1
    let (branch, code_commit) = match code.head() {
        Ok(HeadState::Branch { name, commit }) => (name, commit),
        Ok(HeadState::Detached { commit }) => {
            tracing::info!("capture skipped: code repository detached at {}", commit.short());
            return CaptureResult::skipped(SkipReason::DetachedHead);
        }
        Ok(HeadState::Unborn { branch }) => {
            return CaptureResult::failed(Failure::new(
                FailureKind::NoActiveBranch,
                RepoRole::Code,
                "read HEAD",
                format!("branch {branch} has no commits"),
            ));
        }
        Err(e) => return CaptureResult::failed(Failure::code("read HEAD", e)),
    };

    let mut result = CaptureResult {
        status: CaptureStatus::Captured,
        context_commit: None,
        code_commit: Some(code_commit.clone()),
        branch: Some(branch.clone()),
        transcripts: 0,
    };

    let context_unborn = matches!(context.head(), Ok(HeadState::Unborn { .. }));

    // Step 2
    let mirrored = match mirror_branch(code, context, &branch, &code_commit, options) {
        Ok(mirrored) => mirrored,
        Err(failure) => {
            result.status = CaptureStatus::Failed(failure);
            return result;
        }
    };

    // Step 3
    match context.head() {
        Ok(head) if head.is_on(&branch) => {
            // The branch HEAD named was just created under it; load its tree.
            if context_unborn {
                if let Err(e) = context
                    .reset_mixed(&mirrored)
                    .and_then(|_| context.restore_missing())
                {
                    result.status = CaptureStatus::Failed(Failure::context("populate branch", e));
                    return result;
                }
            }
        }
        Ok(_) => {
            if let Err(e) = context.checkout_branch(&branch) {
                result.status = CaptureStatus::Failed(Failure::context("checkout branch", e));
                return result;
            }
        }
        Err(e) => {
            result.status = CaptureStatus::Failed(Failure::context("read HEAD", e));
            return result;
        }
    }

    // Steps 4 and 5
    match commit_pending(context, &code_commit, options) {
        Ok((commit, staged)) => {
            tracing::info!(
                "captured {} for {} on {branch} ({staged} transcript(s))",
                commit.short(),
                code_commit.short()
            );
            result.context_commit = Some(commit);
            result.transcripts = staged;
        }
        Err(failure) => {
            if let Err(e) = context.reset_mixed(&mirrored) {
                tracing::warn!("rollback to {} failed: {e}", mirrored.short());
            }
            result.status = CaptureStatus::Failed(failure);
            return result;
        }
    }

    // Step 6
    if let Some(commit) = &result.context_commit {
        queue.request_publish(commit);
    }
    result
}

/// Ensure the context branch exists and return its tip before this capture.
fn mirror_branch<C, X>(
    code: &C,
    context: &X,
    branch: &BranchName,
    code_commit: &CommitId,
    options: &CaptureOptions,
) -> Result<CommitId, Failure>
where
    C: RepositoryHandle + ?Sized,
    X: RepositoryHandle + ?Sized,
{
    let exists = context
        .branch_tip(branch)
        .map_err(|e| Failure::context("look up branch", e))?
        .is_some();
    let hint = if exists {
        None
    } else {
        nearest_linked(
            code,
            context,
            code_commit,
            options.ancestor_search_depth,
            false,
        )
        .map_err(|e| Failure::context("find ancestor context", e))?
        .map(|found| found.context)
    };
    ensure_branch(context, branch, hint.as_ref())
        .map(|mirrored| mirrored.tip)
        .map_err(|e| Failure::context("ensure branch", e))
}

fn commit_pending<X: RepositoryHandle + ?Sized>(
    context: &X,
    code_commit: &CommitId,
    options: &CaptureOptions,
) -> Result<(CommitId, usize), Failure> {
    let pending = PendingTranscriptSet::scan(context, &options.filter)
        .map_err(|e| Failure::context("scan transcripts", e))?;
    context
        .stage(&pending.paths)
        .map_err(|e| Failure::context("stage transcripts", e))?;
    let commit = context
        .commit(&link::encode(code_commit), true)
        .map_err(|e| Failure::context("commit", e))?;
    Ok((commit, pending.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::FailureKind;
    use crate::queue::NoPublish;
    use std::cell::{Cell, RefCell};
    use std::path::{Path, PathBuf};

    use contrail_core::repo::{LogEntry, LogScope, StashApply, StashEntry, StatusEntry};
    use contrail_core::{CoreError, GitRepo};
    use tempfile::TempDir;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Breaks {
        Stage,
        Commit,
    }

    /// A real context repository whose `stage` or `commit` fails. Records the
    /// target of every `reset_mixed`.
    struct BrokenContext {
        inner: GitRepo,
        breaks: Breaks,
        resets: RefCell<Vec<CommitId>>,
    }

    impl BrokenContext {
        fn refuse(&self, op: &str) -> CoreError {
            CoreError::Git {
                root: self.inner.root().to_path_buf(),
                args: op.to_string(),
                stderr: "fatal: Unable to create index.lock: File exists".to_string(),
            }
        }
    }

    impl RepositoryHandle for BrokenContext {
        fn root(&self) -> &Path {
            self.inner.root()
        }
        fn head(&self) -> Result<HeadState, CoreError> {
            self.inner.head()
        }
        fn status(&self) -> Result<Vec<StatusEntry>, CoreError> {
            self.inner.status()
        }
        fn resolve(&self, rev: &str) -> Result<Option<CommitId>, CoreError> {
            self.inner.resolve(rev)
        }
        fn list_branches(&self) -> Result<Vec<BranchName>, CoreError> {
            self.inner.list_branches()
        }
        fn create_branch(&self, branch: &BranchName, at: &CommitId) -> Result<(), CoreError> {
            self.inner.create_branch(branch, at)
        }
        fn create_root_commit(&self, message: &str) -> Result<CommitId, CoreError> {
            self.inner.create_root_commit(message)
        }
        fn checkout_branch(&self, branch: &BranchName) -> Result<(), CoreError> {
            self.inner.checkout_branch(branch)
        }
        fn checkout_detached(&self, commit: &CommitId) -> Result<(), CoreError> {
            self.inner.checkout_detached(commit)
        }
        fn checkout_ref(&self, target: &str) -> Result<(), CoreError> {
            self.inner.checkout_ref(target)
        }
        fn stage(&self, paths: &[PathBuf]) -> Result<(), CoreError> {
            match self.breaks {
                Breaks::Stage => Err(self.refuse("add")),
                Breaks::Commit => self.inner.stage(paths),
            }
        }
        fn commit(&self, message: &str, allow_empty: bool) -> Result<CommitId, CoreError> {
            match self.breaks {
                Breaks::Commit => Err(self.refuse("commit")),
                Breaks::Stage => self.inner.commit(message, allow_empty),
            }
        }
        fn reset_mixed(&self, to: &CommitId) -> Result<(), CoreError> {
            self.resets.borrow_mut().push(to.clone());
            self.inner.reset_mixed(to)
        }
        fn restore_missing(&self) -> Result<usize, CoreError> {
            self.inner.restore_missing()
        }
        fn stash_push(&self, message: &str) -> Result<Option<CommitId>, CoreError> {
            self.inner.stash_push(message)
        }
        fn stash_list(&self) -> Result<Vec<StashEntry>, CoreError> {
            self.inner.stash_list()
        }
        fn stash_apply(&self, stash: &CommitId) -> Result<StashApply, CoreError> {
            self.inner.stash_apply(stash)
        }
        fn stash_drop(&self, stash: &CommitId) -> Result<(), CoreError> {
            self.inner.stash_drop(stash)
        }
        fn log_grep(&self, scope: LogScope<'_>, needle: &str) -> Result<Vec<LogEntry>, CoreError> {
            self.inner.log_grep(scope, needle)
        }
        fn parents(&self, commit: &CommitId) -> Result<Vec<CommitId>, CoreError> {
            self.inner.parents(commit)
        }
        fn root_commit(&self) -> Result<Option<CommitId>, CoreError> {
            self.inner.root_commit()
        }
        fn is_ancestor(&self, ancestor: &CommitId, descendant: &CommitId) -> Result<bool, CoreError> {
            self.inner.is_ancestor(ancestor, descendant)
        }
    }

    #[derive(Default)]
    struct CountingQueue {
        requests: Cell<usize>,
    }

    impl PublishQueue for CountingQueue {
        fn request_publish(&self, _context_commit: &CommitId) {
            self.requests.set(self.requests.get() + 1);
        }
    }

    fn failing_capture_rolls_back(breaks: Breaks) {
        let code_dir = TempDir::new().unwrap();
        let ctx_dir = TempDir::new().unwrap();
        let main = BranchName::from("main");
        let code = GitRepo::init(code_dir.path(), &main).unwrap();
        code.commit("code", true).unwrap();
        let ctx = GitRepo::init(ctx_dir.path(), &main).unwrap();
        let prior = ctx.commit("Empty initial state", true).unwrap();
        std::fs::write(ctx_dir.path().join("t.jsonl"), "{}\n").unwrap();

        let context = BrokenContext {
            inner: ctx,
            breaks,
            resets: RefCell::new(Vec::new()),
        };
        let queue = CountingQueue::default();
        let result = capture(&code, &context, &CaptureOptions::default(), &queue);

        match &result.status {
            CaptureStatus::Failed(f) => assert_eq!(f.repo, RepoRole::Context),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(result.context_commit, None);
        assert_eq!(*context.resets.borrow(), vec![prior.clone()]);
        assert_eq!(queue.requests.get(), 0);
        assert_eq!(context.inner.branch_tip(&main).unwrap(), Some(prior));
        // Nothing left staged; the transcript is still on disk for the next run.
        assert!(context
            .inner
            .status()
            .unwrap()
            .iter()
            .all(StatusEntry::is_untracked));
        assert!(ctx_dir.path().join("t.jsonl").exists());
    }

    #[test]
    fn failed_stage_resets_to_prior_tip_without_publishing() {
        failing_capture_rolls_back(Breaks::Stage);
    }

    #[test]
    fn failed_commit_resets_to_prior_tip_without_publishing() {
        failing_capture_rolls_back(Breaks::Commit);
    }

    #[test]
    fn summary_lines() {
        let skipped = CaptureResult::skipped(SkipReason::DetachedHead);
        assert_eq!(skipped.summary(), "contrail: skipped (detached HEAD)");
        let failed = CaptureResult::failed(Failure::new(
            FailureKind::NoActiveBranch,
            RepoRole::Code,
            "read HEAD",
            "",
        ));
        assert_eq!(
            failed.summary(),
            "contrail: capture failed: no active branch in code repository"
        );
    }

    #[test]
    fn unborn_code_branch_fails_without_touching_context() {
        let code_dir = TempDir::new().unwrap();
        let ctx_dir = TempDir::new().unwrap();
        let code = GitRepo::init(code_dir.path(), &BranchName::from("main")).unwrap();
        let ctx = GitRepo::init(ctx_dir.path(), &BranchName::from("main")).unwrap();

        let result = capture(&code, &ctx, &CaptureOptions::default(), &NoPublish);
        match result.status {
            CaptureStatus::Failed(f) => assert_eq!(f.kind, FailureKind::NoActiveBranch),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(ctx.list_branches().unwrap().is_empty());
    }
}
