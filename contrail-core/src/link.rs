//! Commit links: the association between a code commit and the context
//! commit captured for it, embedded as a trailer in the context commit
//! message:
//!
//! ```text
//! Context for code commit 3f2a…
//!
//! Contrail-Code-Commit: 3f2a…
//! ```
//!
//! Only the trailer is authoritative; the subject line is informational.

use std::collections::{HashSet, VecDeque};

use crate::error::CoreError;
use crate::repo::{LogScope, RepositoryHandle};
use crate::types::{BranchName, CommitId};

/// Trailer key carrying the linked code commit id.
pub const LINK_TRAILER: &str = "Contrail-Code-Commit";

/// A resolved (code commit, context commit) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitLink {
    pub code: CommitId,
    pub context: CommitId,
}

/// Commit message linking a new context commit to `code`.
pub fn encode(code: &CommitId) -> String {
    format!("Context for code commit {code}\n\n{LINK_TRAILER}: {code}\n")
}

/// Extract the linked code commit from a context commit message.
pub fn decode(message: &str) -> Option<CommitId> {
    message.lines().find_map(|line| {
        let value = line.trim().strip_prefix(LINK_TRAILER)?.strip_prefix(':')?;
        let value = value.trim();
        CommitId::is_well_formed(value).then(|| CommitId::from(value))
    })
}

/// Newest context commit on `branch` linked to `code`.
///
/// History is walked newest-first and the first exact match wins, so when
/// several context commits reference the same code commit the most recent
/// one is returned.
pub fn resolve<R: RepositoryHandle + ?Sized>(
    repo: &R,
    branch: &BranchName,
    code: &CommitId,
) -> Result<Option<CommitId>, CoreError> {
    first_match(repo, LogScope::Branch(branch), code)
}

/// Like [`resolve`], across every context branch.
pub fn resolve_any<R: RepositoryHandle + ?Sized>(
    repo: &R,
    code: &CommitId,
) -> Result<Option<CommitId>, CoreError> {
    first_match(repo, LogScope::AllBranches, code)
}

fn first_match<R: RepositoryHandle + ?Sized>(
    repo: &R,
    scope: LogScope<'_>,
    code: &CommitId,
) -> Result<Option<CommitId>, CoreError> {
    let needle = format!("{LINK_TRAILER}: {code}");
    let hits = repo.log_grep(scope, &needle)?;
    Ok(hits
        .into_iter()
        .find(|entry| decode(&entry.message).as_ref() == Some(code))
        .map(|entry| entry.id))
}

/// Nearest code commit (breadth-first over parents, starting at `start`)
/// that has a link on any context branch, visiting at most `max_depth`
/// commits. `include_start = false` skips `start` itself.
pub fn nearest_linked<C, X>(
    code_repo: &C,
    context_repo: &X,
    start: &CommitId,
    max_depth: usize,
    include_start: bool,
) -> Result<Option<CommitLink>, CoreError>
where
    C: RepositoryHandle + ?Sized,
    X: RepositoryHandle + ?Sized,
{
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    if include_start {
        queue.push_back(start.clone());
    } else {
        visited.insert(start.clone());
        queue.extend(code_repo.parents(start)?);
    }

    let mut checked = 0usize;
    while let Some(candidate) = queue.pop_front() {
        if checked >= max_depth {
            break;
        }
        if !visited.insert(candidate.clone()) {
            continue;
        }
        checked += 1;
        if let Some(context) = resolve_any(context_repo, &candidate)? {
            return Ok(Some(CommitLink {
                code: candidate,
                context,
            }));
        }
        queue.extend(code_repo.parents(&candidate)?);
    }
    Ok(None)
}
