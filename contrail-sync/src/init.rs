//! Context repository creation.

use std::path::PathBuf;

use contrail_core::link;
use contrail_core::mirror::BOOTSTRAP_MESSAGE;
use contrail_core::{
    BranchName, CommitId, GitRepo, HeadState, PendingTranscriptSet, ProjectBinding,
    RepositoryHandle, TranscriptFilter,
};

use crate::error::SyncError;

const DEFAULT_BRANCH: &str = "main";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    Created {
        context_root: PathBuf,
        initial: CommitId,
        /// Commit holding transcripts that existed before init, linked to the
        /// code HEAD.
        linked: Option<CommitId>,
    },
    AlreadyInitialized { context_root: PathBuf },
}

/// Create the context repository for `binding`. Idempotent.
///
/// The repository starts on the code repository's current branch with an
/// empty root commit. Transcripts already present in the directory are
/// committed and linked to the code HEAD when it has a commit.
pub fn init(binding: &ProjectBinding, filter: &TranscriptFilter) -> Result<InitOutcome, SyncError> {
    if binding.is_initialized() {
        return Ok(InitOutcome::AlreadyInitialized {
            context_root: binding.context_root.clone(),
        });
    }

    let code = GitRepo::discover(&binding.code_root)?;
    let code_head = code.head()?;
    let branch = match &code_head {
        HeadState::Branch { name, .. } => name.clone(),
        HeadState::Unborn { branch } => branch.clone(),
        HeadState::Detached { .. } => BranchName::from(DEFAULT_BRANCH),
    };

    let context = GitRepo::init(&binding.context_root, &branch)?;
    let initial = context.commit(BOOTSTRAP_MESSAGE, true)?;
    tracing::info!(
        "initialized context repository {} on {branch}",
        binding.context_root.display()
    );

    let mut linked = None;
    if let Some(code_commit) = code_head.commit() {
        let pending = PendingTranscriptSet::scan(&context, filter)?;
        if !pending.is_empty() {
            context.stage(&pending.paths)?;
            let commit = context.commit(&link::encode(code_commit), false)?;
            tracing::info!(
                "linked {} existing transcript(s) to {}",
                pending.len(),
                code_commit.short()
            );
            linked = Some(commit);
        }
    }

    Ok(InitOutcome::Created {
        context_root: binding.context_root.clone(),
        initial,
        linked,
    })
}
