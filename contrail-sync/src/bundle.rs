//! Bundle export and import.
//!
//! A [`BundleArtifact`] is a `git bundle` covering every branch that moved
//! since the sync cursor, with the cursor tips as prerequisites. Import
//! fetches the bundle into staging refs and then applies each branch with a
//! fast-forward-or-reject policy: a local branch is never rewritten.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use contrail_core::{BranchName, CommitId, GitRepo, HeadState, RepositoryHandle};

use crate::cursor::SyncCursor;
use crate::error::{io_err, SyncError};

const INCOMING_PREFIX: &str = "refs/contrail/incoming/";

/// A portable slice of context history.
#[derive(Debug, Clone)]
pub struct BundleArtifact {
    pub bytes: Vec<u8>,
    /// Branch tips recorded in the bundle.
    pub tips: BTreeMap<BranchName, CommitId>,
    /// Cursor the bundle was cut against; empty for a full bundle.
    pub base: SyncCursor,
}

impl BundleArtifact {
    /// Twelve hex chars of the greatest tip id; makes object keys unique.
    pub fn head12(&self) -> String {
        let mut ids: Vec<&str> = self.tips.values().map(|c| c.0.as_str()).collect();
        ids.sort_unstable();
        ids.last().map(|id| id[..id.len().min(12)].to_string()).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Bundle every branch whose tip differs from `since`. `None` when nothing
/// moved.
pub fn export(repo: &GitRepo, since: &SyncCursor) -> Result<Option<BundleArtifact>, SyncError> {
    let tips: BTreeMap<BranchName, CommitId> = repo
        .refs_under("refs/heads/")?
        .into_iter()
        .map(|(name, tip)| (BranchName::from(name), tip))
        .filter(|(name, tip)| since.get(name) != Some(tip))
        .collect();
    if tips.is_empty() {
        tracing::debug!("nothing to export from {}", repo.root().display());
        return Ok(None);
    }

    let mut basis = Vec::new();
    for commit in since.commits() {
        if repo.resolve(&commit.0)?.is_some() {
            basis.push(commit);
        }
    }
    // A tip already contained in the basis would be dropped from an
    // incremental bundle, so fall back to full history.
    let mut full = basis.is_empty();
    if !full {
        'tips: for tip in tips.values() {
            for base in &basis {
                if repo.is_ancestor(tip, base)? {
                    full = true;
                    break 'tips;
                }
            }
        }
    }

    let mut revs: Vec<String> = tips.keys().map(BranchName::as_ref_name).collect();
    let base = if full {
        SyncCursor::default()
    } else {
        revs.extend(basis.iter().map(|c| format!("^{c}")));
        since.clone()
    };

    let dir = tempfile::tempdir().map_err(|e| io_err(std::env::temp_dir(), e))?;
    let path = dir.path().join("export.bundle");
    repo.bundle_create(&path, &revs)?;
    let bytes = std::fs::read(&path).map_err(|e| io_err(&path, e))?;
    tracing::info!(
        "exported {} branch(es), {} bytes ({})",
        tips.len(),
        bytes.len(),
        if full { "full" } else { "incremental" }
    );
    Ok(Some(BundleArtifact { bytes, tips, base }))
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// Per-branch result of an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum BranchImport {
    Created,
    UpToDate,
    FastForwarded { from: CommitId },
    /// The local branch already contains the incoming tip.
    LocalAhead,
    /// Local and incoming histories diverged; the local branch was kept.
    Diverged { reason: String },
}

impl fmt::Display for BranchImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::UpToDate => f.write_str("up to date"),
            Self::FastForwarded { from } => write!(f, "fast-forwarded from {}", from.short()),
            Self::LocalAhead => f.write_str("local ahead"),
            Self::Diverged { reason } => write!(f, "diverged: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchUpdate {
    pub branch: BranchName,
    pub incoming: CommitId,
    pub outcome: BranchImport,
}

#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub branches: Vec<BranchUpdate>,
    /// Cursor after import; diverged branches keep their previous entry.
    pub cursor: SyncCursor,
}

impl ImportReport {
    pub fn diverged(&self) -> impl Iterator<Item = &BranchUpdate> {
        self.branches
            .iter()
            .filter(|u| matches!(u.outcome, BranchImport::Diverged { .. }))
    }
}

/// Apply `bytes` (a bundle) to `repo`. The caller persists `report.cursor`.
pub fn import(
    repo: &GitRepo,
    bytes: &[u8],
    cursor: &SyncCursor,
) -> Result<ImportReport, SyncError> {
    let mut file = tempfile::Builder::new()
        .prefix("contrail-import-")
        .suffix(".bundle")
        .tempfile()
        .map_err(|e| io_err(std::env::temp_dir(), e))?;
    std::io::Write::write_all(&mut file, bytes).map_err(|e| io_err(file.path(), e))?;
    let path = file.path().to_path_buf();

    if let Err(detail) = repo.bundle_verify(&path)? {
        return Err(SyncError::MissingPrerequisites { detail });
    }

    let result = repo
        .fetch_bundle(&path, &format!("+refs/heads/*:{INCOMING_PREFIX}*"))
        .map_err(SyncError::from)
        .and_then(|_| apply_incoming(repo, cursor));

    match repo.refs_under(INCOMING_PREFIX) {
        Ok(staged) => {
            for name in staged.keys() {
                if let Err(e) = repo.delete_ref(&format!("{INCOMING_PREFIX}{name}")) {
                    tracing::warn!("could not delete staging ref {name}: {e}");
                }
            }
        }
        Err(e) => tracing::warn!("could not list staging refs: {e}"),
    }
    result
}

fn apply_incoming(repo: &GitRepo, cursor: &SyncCursor) -> Result<ImportReport, SyncError> {
    let head = repo.head()?;
    let mut report = ImportReport {
        branches: Vec::new(),
        cursor: cursor.clone(),
    };

    for (name, incoming) in repo.refs_under(INCOMING_PREFIX)? {
        let branch = BranchName::from(name);
        let outcome = apply_branch(repo, &head, &branch, &incoming)?;
        tracing::info!("import {branch}: {outcome}");
        if !matches!(outcome, BranchImport::Diverged { .. }) {
            report.cursor.set(branch.clone(), incoming.clone());
        }
        report.branches.push(BranchUpdate {
            branch,
            incoming,
            outcome,
        });
    }
    Ok(report)
}

fn apply_branch(
    repo: &GitRepo,
    head: &HeadState,
    branch: &BranchName,
    incoming: &CommitId,
) -> Result<BranchImport, SyncError> {
    let ref_name = branch.as_ref_name();
    let Some(local) = repo.branch_tip(branch)? else {
        repo.update_ref(&ref_name, incoming, None)?;
        if matches!(head, HeadState::Unborn { branch: b } if b == branch) {
            // HEAD now has a commit; load its tree without clobbering
            // transcripts already on disk.
            repo.reset_mixed(incoming)?;
            let restored = repo.restore_missing()?;
            tracing::debug!("materialized {restored} file(s) on {branch}");
        }
        return Ok(BranchImport::Created);
    };

    if &local == incoming {
        return Ok(BranchImport::UpToDate);
    }
    if repo.is_ancestor(&local, incoming)? {
        if head.is_on(branch) {
            if let Err(reason) = repo.merge_ff_only(&incoming.0)? {
                return Ok(BranchImport::Diverged { reason });
            }
        } else {
            repo.update_ref(&ref_name, incoming, Some(&local))?;
        }
        return Ok(BranchImport::FastForwarded { from: local });
    }
    if repo.is_ancestor(incoming, &local)? {
        return Ok(BranchImport::LocalAhead);
    }
    Ok(BranchImport::Diverged {
        reason: format!(
            "local {} and incoming {} have no fast-forward relation",
            local.short(),
            incoming.short()
        ),
    })
}
