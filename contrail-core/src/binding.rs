//! Project binding: the immutable pairing of a code repository with its
//! context repository.
//!
//! The pairing is a pure function of the canonical code root, so no registry
//! is kept: the same code repository always maps to the same context
//! directory and the same [`ProjectId`].
//!
//! ```text
//! <context_root>/
//!   -home-ada-src-widget/      (context repository for /home/ada/src/widget)
//!     .git/
//!     <session>.jsonl
//! ```

use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::error::CoreError;
use crate::repo::{GitRepo, RepositoryHandle};
use crate::types::ProjectId;

/// Pairing of a code repository root and a context repository root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectBinding {
    pub id: ProjectId,
    /// Canonical root of the code working tree.
    pub code_root: PathBuf,
    /// Root of the context working tree.
    pub context_root: PathBuf,
}

impl ProjectBinding {
    /// Derive the binding for an already-canonical code root. Pure, no I/O.
    pub fn derive(code_root: &Path, config: &Config, home: &Path) -> Self {
        Self {
            id: project_id(code_root),
            code_root: code_root.to_path_buf(),
            context_root: config.context_root_at(home).join(encode_path(code_root)),
        }
    }

    /// Find the code repository containing `cwd` and derive its binding.
    pub fn discover(cwd: &Path, config: &Config, home: &Path) -> Result<Self, CoreError> {
        let code = GitRepo::discover(cwd)?;
        Ok(Self::derive(code.root(), config, home))
    }

    pub fn is_initialized(&self) -> bool {
        GitRepo::is_repository(&self.context_root)
    }
}

/// Directory name for a code root: every path separator and `_` becomes `-`.
pub fn encode_path(code_root: &Path) -> String {
    code_root
        .to_string_lossy()
        .chars()
        .map(|c| if c == MAIN_SEPARATOR || c == '/' || c == '_' { '-' } else { c })
        .collect()
}

/// First 16 hex chars of SHA-256 over the canonical code root.
pub fn project_id(code_root: &Path) -> ProjectId {
    let mut hasher = Sha256::new();
    hasher.update(code_root.to_string_lossy().as_bytes());
    let digest = hex::encode(hasher.finalize());
    ProjectId(digest[..16].to_string())
}
