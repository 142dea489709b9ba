//! Failure reporting shared by the orchestrators.
//!
//! Expected states (detached HEAD, missing context) are result variants of
//! each orchestrator; [`Failure`] covers the cases where an operation could
//! not complete, naming the repository and the step.

use std::fmt;

use serde::Serialize;

/// Which side of the pair a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoRole {
    Code,
    Context,
}

impl fmt::Display for RepoRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code => f.write_str("code"),
            Self::Context => f.write_str("context"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The code repository has no commit on its current branch.
    NoActiveBranch,
    /// Switching the code repository failed; the context side was untouched.
    CodeCheckoutFailed,
    /// Any other repository command failure.
    Repository,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub repo: RepoRole,
    pub step: &'static str,
    pub detail: String,
}

impl Failure {
    pub fn new(kind: FailureKind, repo: RepoRole, step: &'static str, detail: impl fmt::Display) -> Self {
        Self {
            kind,
            repo,
            step,
            detail: detail.to_string(),
        }
    }

    pub(crate) fn code(step: &'static str, detail: impl fmt::Display) -> Self {
        Self::new(FailureKind::Repository, RepoRole::Code, step, detail)
    }

    pub(crate) fn context(step: &'static str, detail: impl fmt::Display) -> Self {
        Self::new(FailureKind::Repository, RepoRole::Context, step, detail)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FailureKind::NoActiveBranch => write!(f, "no active branch in {} repository", self.repo)?,
            FailureKind::CodeCheckoutFailed => f.write_str("code checkout failed")?,
            FailureKind::Repository => write!(f, "{} repository: {} failed", self.repo, self.step)?,
        }
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}
