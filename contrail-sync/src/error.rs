//! Error types for contrail-sync.

use std::path::PathBuf;

use thiserror::Error;

use contrail_core::CoreError;

/// Errors from the object-store contract.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No object under this key.
    #[error("object not found: {key}")]
    NotFound { key: String },

    /// Keys are `/`-separated and may not escape the store root.
    #[error("invalid object key: {key:?}")]
    InvalidKey { key: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The server answered with a non-success status.
    #[error("object store returned HTTP {status} for {key}: {message}")]
    Http {
        key: String,
        status: u16,
        message: String,
    },

    /// The request never produced a response.
    #[error("object store request for {key} failed: {message}")]
    Transport { key: String, message: String },

    /// The bearer token environment variable is unset.
    #[error("object store token variable {var} is not set")]
    MissingToken { var: String },
}

/// All errors that can arise from orchestration and bundle exchange.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("object store error: {0}")]
    Store(#[from] StoreError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `remote:` is absent from the configuration.
    #[error("no remote configured; add a `remote:` section to ~/.contrail/config.yaml")]
    NoRemote,

    /// The bundle depends on commits this repository does not have.
    #[error("bundle cannot be applied: {detail}")]
    MissingPrerequisites { detail: String },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn store_io(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
