//! Contrail core library: domain types, configuration, project binding and
//! the repository primitives both orchestrators are built on.
//!
//! - [`types`]: newtypes and HEAD state
//! - [`error`]: [`CoreError`]
//! - [`config`]: `~/.contrail/config.yaml`
//! - [`binding`]: code repository → context repository pairing
//! - [`repo`]: [`RepositoryHandle`] and the `git`-backed [`GitRepo`]
//! - [`link`]: commit link encoding and reverse lookup
//! - [`mirror`]: context branch mirroring
//! - [`transcripts`]: pending transcript discovery
//! - [`lock`]: per-project exclusive lock

pub mod binding;
pub mod config;
pub mod error;
pub mod link;
pub mod lock;
pub mod mirror;
pub mod repo;
pub mod transcripts;
pub mod types;

pub use binding::ProjectBinding;
pub use config::{Config, RemoteConfig};
pub use error::CoreError;
pub use link::CommitLink;
pub use lock::ProjectLock;
pub use mirror::ContextBranch;
pub use repo::{
    GitRepo, LogScope, RepositoryHandle, StashApply, StashEntry, StatusEntry,
    HOOKS_SUPPRESSED_ENV,
};
pub use transcripts::{PendingTranscriptSet, TranscriptFilter};
pub use types::{BranchName, CommitId, HeadState, ProjectId};
