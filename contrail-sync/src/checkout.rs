//! Checkout: keeps the context repository on the context of whatever code
//! commit is checked out.
//!
//! Order of operations:
//!
//! 1. Stash a dirty context working tree (tracked and untracked).
//! 2. Switch the code repository. On failure restore the stash and stop;
//!    the context repository is otherwise untouched.
//! 3. A detached code HEAD has no context: restore the stash and stop.
//! 4. Mirror the code branch and switch the context repository to it.
//! 5. Resolve the linked context commit (exact link on the branch, else the
//!    nearest linked code ancestor) and check it out. The context repository
//!    stays attached when that commit is the branch tip.
//! 6. Reapply the stash. A conflict keeps the stash in the stash list.
//!
//! Steps 3–6 are shared with `recovery::resume`, which finishes a run that
//! was interrupted after step 2.

use serde::Serialize;

use contrail_core::link::{self, nearest_linked};
use contrail_core::mirror::ensure_branch;
use contrail_core::{BranchName, CommitId, HeadState, RepositoryHandle, StashApply};

use crate::outcome::{Failure, FailureKind, RepoRole};

/// Prefix of every stash message written by checkout.
pub const STASH_PREFIX: &str = "contrail-checkout:";

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// What to do with the code repository in step 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutTarget<'a> {
    /// Check out this reference in the code repository.
    Switch(&'a str),
    /// The code repository was already switched (post-checkout hook).
    AlreadySwitched,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckoutStatus {
    /// The context commit linked to the code commit is checked out.
    Restored,
    /// No exact link; the context of the nearest linked ancestor is checked out.
    InheritedFromAncestor { code_commit: CommitId },
    /// No context exists for this commit or its ancestors; the context
    /// repository is on the branch tip.
    NoContextForCommit,
    /// The code repository is detached; the context repository was left as is.
    DetachedNoContext,
    /// Context was restored but reapplying the stash conflicted. The stash is
    /// still in the stash list.
    StashConflict { stash: CommitId, detail: String },
    Failed(Failure),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutResult {
    pub status: CheckoutStatus,
    pub restored_context_commit: Option<CommitId>,
    pub code_commit: Option<CommitId>,
    pub branch: Option<BranchName>,
}

impl CheckoutResult {
    fn bare(status: CheckoutStatus) -> Self {
        Self {
            status,
            restored_context_commit: None,
            code_commit: None,
            branch: None,
        }
    }

    pub fn failed(failure: Failure) -> Self {
        Self::bare(CheckoutStatus::Failed(failure))
    }

    /// One-line summary printed by the checkout hook.
    pub fn summary(&self) -> String {
        let ctx = self
            .restored_context_commit
            .as_ref()
            .map(|c| c.short().to_string())
            .unwrap_or_default();
        match &self.status {
            CheckoutStatus::Restored => format!("contrail: restored context {ctx}"),
            CheckoutStatus::InheritedFromAncestor { code_commit } => format!(
                "contrail: restored context {ctx} from ancestor {}",
                code_commit.short()
            ),
            CheckoutStatus::NoContextForCommit => {
                "contrail: no context recorded for this commit".to_string()
            }
            CheckoutStatus::DetachedNoContext => {
                "contrail: code is detached; context left unchanged".to_string()
            }
            CheckoutStatus::StashConflict { stash, detail } => format!(
                "contrail: context {ctx} restored but stashed changes conflicted (kept as {}): {detail}",
                stash.short()
            ),
            CheckoutStatus::Failed(failure) => format!("contrail: checkout failed: {failure}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Switch the code repository (unless already switched) and bring the context
/// repository along. The caller holds the project lock.
pub fn checkout<C, X>(
    code: &C,
    context: &X,
    target: CheckoutTarget<'_>,
    ancestor_search_depth: usize,
) -> CheckoutResult
where
    C: RepositoryHandle + ?Sized,
    X: RepositoryHandle + ?Sized,
{
    // Step 1
    let stash = match stash_if_dirty(context, target) {
        Ok(stash) => stash,
        Err(failure) => return CheckoutResult::failed(failure),
    };

    // Step 2
    if let CheckoutTarget::Switch(reference) = target {
        if let Err(e) = code.checkout_ref(reference) {
            tracing::warn!("code checkout of {reference} failed: {e}");
            restore_stash(context, stash.as_ref());
            return CheckoutResult::failed(Failure::new(
                FailureKind::CodeCheckoutFailed,
                RepoRole::Code,
                "checkout",
                e,
            ));
        }
    }

    finish(code, context, stash, ancestor_search_depth)
}

fn stash_if_dirty<X: RepositoryHandle + ?Sized>(
    context: &X,
    target: CheckoutTarget<'_>,
) -> Result<Option<CommitId>, Failure> {
    let dirty = context
        .is_dirty()
        .map_err(|e| Failure::context("read status", e))?;
    if !dirty {
        return Ok(None);
    }
    let from = context
        .head()
        .map(|h| h.to_string())
        .map_err(|e| Failure::context("read HEAD", e))?;
    let to = match target {
        CheckoutTarget::Switch(reference) => reference.to_string(),
        CheckoutTarget::AlreadySwitched => "code HEAD".to_string(),
    };
    let stash = context
        .stash_push(&format!("{STASH_PREFIX} {from} -> {to}"))
        .map_err(|e| Failure::context("stash", e))?;
    if let Some(id) = &stash {
        tracing::info!("stashed context changes as {}", id.short());
    }
    Ok(stash)
}

/// Apply then drop; a conflict or error leaves the stash in place.
fn restore_stash<X: RepositoryHandle + ?Sized>(context: &X, stash: Option<&CommitId>) {
    let Some(stash) = stash else { return };
    match context.stash_apply(stash) {
        Ok(StashApply::Applied) => {
            if let Err(e) = context.stash_drop(stash) {
                tracing::warn!("could not drop applied stash {}: {e}", stash.short());
            }
        }
        Ok(StashApply::Conflict { detail }) => {
            tracing::warn!("stash {} kept after conflict: {detail}", stash.short());
        }
        Err(e) => tracing::warn!("stash {} kept: {e}", stash.short()),
    }
}

/// Steps 3–6 for the code repository's current HEAD.
pub(crate) fn finish<C, X>(
    code: &C,
    context: &X,
    stash: Option<CommitId>,
    ancestor_search_depth: usize,
) -> CheckoutResult
where
    C: RepositoryHandle + ?Sized,
    X: RepositoryHandle + ?Sized,
{
    // Step 3
    let (branch, code_commit) = match code.head() {
        Ok(HeadState::Branch { name, commit }) => (name, commit),
        Ok(HeadState::Detached { commit }) => {
            restore_stash(context, stash.as_ref());
            let mut result = CheckoutResult::bare(CheckoutStatus::DetachedNoContext);
            result.code_commit = Some(commit);
            return result;
        }
        Ok(HeadState::Unborn { branch }) => {
            restore_stash(context, stash.as_ref());
            return CheckoutResult::failed(Failure::new(
                FailureKind::NoActiveBranch,
                RepoRole::Code,
                "read HEAD",
                format!("branch {branch} has no commits"),
            ));
        }
        Err(e) => return CheckoutResult::failed(Failure::code("read HEAD", e)),
    };

    let mut result = CheckoutResult {
        status: CheckoutStatus::NoContextForCommit,
        restored_context_commit: None,
        code_commit: Some(code_commit.clone()),
        branch: Some(branch.clone()),
    };

    // Steps 4 and 5. On failure the stash stays for `recover --resume`.
    match place_context(code, context, &branch, &code_commit, ancestor_search_depth) {
        Ok((status, commit)) => {
            result.status = status;
            result.restored_context_commit = Some(commit);
        }
        Err(failure) => {
            if let Some(stash) = &stash {
                tracing::warn!("context switch failed; stash {} left for recovery", stash.short());
            }
            result.status = CheckoutStatus::Failed(failure);
            return result;
        }
    }

    // Step 6
    if let Some(stash) = stash {
        match context.stash_apply(&stash) {
            Ok(StashApply::Applied) => {
                if let Err(e) = context.stash_drop(&stash) {
                    tracing::warn!("could not drop applied stash {}: {e}", stash.short());
                }
            }
            Ok(StashApply::Conflict { detail }) => {
                result.status = CheckoutStatus::StashConflict { stash, detail };
            }
            Err(e) => {
                result.status = CheckoutStatus::StashConflict {
                    stash,
                    detail: e.to_string(),
                };
            }
        }
    }

    tracing::info!("{}", result.summary());
    result
}

/// Mirror `branch`, switch to it, then move to the linked context commit.
fn place_context<C, X>(
    code: &C,
    context: &X,
    branch: &BranchName,
    code_commit: &CommitId,
    depth: usize,
) -> Result<(CheckoutStatus, CommitId), Failure>
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
        nearest_linked(code, context, code_commit, depth, true)
            .map_err(|e| Failure::context("find ancestor context", e))?
            .map(|found| found.context)
    };
    let mirrored = ensure_branch(context, branch, hint.as_ref())
        .map_err(|e| Failure::context("ensure branch", e))?;

    let on_branch = context
        .head()
        .map_err(|e| Failure::context("read HEAD", e))?
        .is_on(branch);
    if !on_branch {
        context
            .checkout_branch(branch)
            .map_err(|e| Failure::context("checkout branch", e))?;
    }

    let exact = link::resolve(context, branch, code_commit)
        .map_err(|e| Failure::context("resolve link", e))?;
    let (status, target) = match exact {
        Some(commit) => (CheckoutStatus::Restored, commit),
        None => match nearest_linked(code, context, code_commit, depth, true)
            .map_err(|e| Failure::context("find ancestor context", e))?
        {
            Some(found) if &found.code == code_commit => (CheckoutStatus::Restored, found.context),
            Some(found) => (
                CheckoutStatus::InheritedFromAncestor {
                    code_commit: found.code,
                },
                found.context,
            ),
            None => (CheckoutStatus::NoContextForCommit, mirrored.tip.clone()),
        },
    };

    if target != mirrored.tip {
        context
            .checkout_detached(&target)
            .map_err(|e| Failure::context("checkout context commit", e))?;
    }
    Ok((status, target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summaries_name_the_outcome() {
        let mut result = CheckoutResult::bare(CheckoutStatus::Restored);
        result.restored_context_commit = Some(CommitId::from("0123456789abcdef"));
        assert_eq!(result.summary(), "contrail: restored context 0123456");

        result.status = CheckoutStatus::InheritedFromAncestor {
            code_commit: CommitId::from("fedcba9876"),
        };
        assert_eq!(
            result.summary(),
            "contrail: restored context 0123456 from ancestor fedcba9"
        );
    }

    #[test]
    fn status_serializes_with_tag() {
        let json = serde_json::to_value(CheckoutStatus::DetachedNoContext).unwrap();
        assert_eq!(json["status"], "detached_no_context");
    }
}
