//! Recovery for interrupted checkouts.
//!
//! A checkout killed between switching the code repository and settling the
//! context repository leaves the pair "code switched, context not yet",
//! possibly with the context changes parked in a `contrail-checkout:` stash.
//! [`diagnose`] describes the pair; [`resume`] finishes the checkout for the
//! code repository's current HEAD without stashing again.

use std::fmt;

use serde::Serialize;

use contrail_core::link;
use contrail_core::{BranchName, CommitId, CoreError, HeadState, RepositoryHandle, StashEntry};

use crate::checkout::{self, CheckoutResult, STASH_PREFIX};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PairState {
    InSync,
    /// The code repository is detached; there is nothing to mirror.
    CodeDetached,
    /// The context repository is attached to a different branch.
    BranchMismatch {
        code_branch: BranchName,
        context_branch: BranchName,
    },
    /// A context commit is linked to the code HEAD but is not checked out.
    ContextBehind { code_commit: CommitId },
    /// A checkout stash was left behind by an interrupted run.
    OrphanedStash { stash: CommitId, message: String },
}

impl fmt::Display for PairState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InSync => f.write_str("in sync"),
            Self::CodeDetached => f.write_str("code repository is detached"),
            Self::BranchMismatch {
                code_branch,
                context_branch,
            } => write!(f, "code is on {code_branch} but context is on {context_branch}"),
            Self::ContextBehind { code_commit } => write!(
                f,
                "context for {} exists but is not checked out",
                code_commit.short()
            ),
            Self::OrphanedStash { stash, message } => {
                write!(f, "interrupted checkout left stash {} ({message})", stash.short())
            }
        }
    }
}

impl PairState {
    pub fn needs_resume(&self) -> bool {
        !matches!(self, Self::InSync | Self::CodeDetached)
    }
}

/// Newest stash written by an interrupted checkout, if any.
pub fn orphaned_stash<X: RepositoryHandle + ?Sized>(
    context: &X,
) -> Result<Option<StashEntry>, CoreError> {
    Ok(context
        .stash_list()?
        .into_iter()
        .find(|entry| entry.message.contains(STASH_PREFIX)))
}

pub fn diagnose<C, X>(code: &C, context: &X) -> Result<PairState, CoreError>
where
    C: RepositoryHandle + ?Sized,
    X: RepositoryHandle + ?Sized,
{
    if let Some(entry) = orphaned_stash(context)? {
        return Ok(PairState::OrphanedStash {
            stash: entry.id,
            message: entry.message,
        });
    }

    let (code_branch, code_commit) = match code.head()? {
        HeadState::Branch { name, commit } => (name, commit),
        HeadState::Detached { .. } => return Ok(PairState::CodeDetached),
        HeadState::Unborn { .. } => return Ok(PairState::InSync),
    };

    let context_head = context.head()?;
    if let Some(context_branch) = context_head.branch() {
        if context_branch != &code_branch {
            return Ok(PairState::BranchMismatch {
                code_branch,
                context_branch: context_branch.clone(),
            });
        }
    }

    if let Some(linked) = link::resolve(context, &code_branch, &code_commit)? {
        if context_head.commit() != Some(&linked) {
            return Ok(PairState::ContextBehind { code_commit });
        }
    }
    Ok(PairState::InSync)
}

/// Finish steps 3–6 of checkout for the current code HEAD, consuming an
/// orphaned checkout stash when one exists.
pub fn resume<C, X>(code: &C, context: &X, ancestor_search_depth: usize) -> CheckoutResult
where
    C: RepositoryHandle + ?Sized,
    X: RepositoryHandle + ?Sized,
{
    let stash = match orphaned_stash(context) {
        Ok(entry) => entry.map(|e| e.id),
        Err(e) => {
            return CheckoutResult::failed(crate::outcome::Failure::context("list stashes", e))
        }
    };
    if let Some(id) = &stash {
        tracing::info!("resuming checkout with orphaned stash {}", id.short());
    }
    checkout::finish(code, context, stash, ancestor_search_depth)
}
