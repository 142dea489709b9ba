//! Domain types shared by every contrail crate.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A full commit object id (hex) in either repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommitId(pub String);

impl CommitId {
    /// First seven characters, for display.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(7);
        &self.0[..end]
    }

    /// True when the value looks like a (possibly abbreviated) hex object id.
    pub fn is_well_formed(value: &str) -> bool {
        (4..=64).contains(&value.len()) && value.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for CommitId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CommitId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A branch name without the `refs/heads/` prefix. Code and context branches
/// share names by convention.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BranchName(pub String);

impl BranchName {
    pub fn as_ref_name(&self) -> String {
        format!("refs/heads/{}", self.0)
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for BranchName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for BranchName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Stable identity of a project, derived from its canonical code root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(pub String);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// HEAD state
// ---------------------------------------------------------------------------

/// Where a repository's HEAD points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadState {
    /// Attached to a branch that has at least one commit.
    Branch { name: BranchName, commit: CommitId },
    /// Detached at a commit.
    Detached { commit: CommitId },
    /// Attached to a branch with no commits yet.
    Unborn { branch: BranchName },
}

impl HeadState {
    pub fn commit(&self) -> Option<&CommitId> {
        match self {
            HeadState::Branch { commit, .. } | HeadState::Detached { commit } => Some(commit),
            HeadState::Unborn { .. } => None,
        }
    }

    pub fn branch(&self) -> Option<&BranchName> {
        match self {
            HeadState::Branch { name, .. } => Some(name),
            HeadState::Unborn { branch } => Some(branch),
            HeadState::Detached { .. } => None,
        }
    }

    pub fn is_detached(&self) -> bool {
        matches!(self, HeadState::Detached { .. })
    }

    /// True when attached (born) to exactly `branch`.
    pub fn is_on(&self, branch: &BranchName) -> bool {
        matches!(self, HeadState::Branch { name, .. } if name == branch)
    }
}

impl fmt::Display for HeadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeadState::Branch { name, commit } => write!(f, "{name}@{}", commit.short()),
            HeadState::Detached { commit } => write!(f, "detached@{}", commit.short()),
            HeadState::Unborn { branch } => write!(f, "{branch} (no commits)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
