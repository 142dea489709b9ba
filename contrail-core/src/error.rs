//! Error types for contrail-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from configuration, binding and repository
/// operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.contrail/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The `git` binary could not be started.
    #[error("failed to run git in {root}: {source}")]
    Spawn {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A git command exited unsuccessfully.
    #[error("git {args} failed in {root}: {stderr}")]
    Git {
        root: PathBuf,
        args: String,
        stderr: String,
    },

    /// The path is not inside a git working tree.
    #[error("not a git repository: {path}")]
    NotARepository { path: PathBuf },

    /// The context repository for a project has not been created yet.
    #[error("context repository not initialized at {path}; run `contrail init`")]
    NotInitialized { path: PathBuf },

    /// Another orchestrator run holds the project lock.
    #[error("timed out waiting for project lock at {path}")]
    LockTimeout { path: PathBuf },
}

/// Convenience constructor for [`CoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CoreError {
    CoreError::Io {
        path: path.into(),
        source,
    }
}
