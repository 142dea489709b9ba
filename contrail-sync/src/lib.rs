//! # contrail-sync
//!
//! The orchestration layer over a (code, context) repository pair and the
//! bundle exchange that carries context history through an object store.
//!
//! - [`capture`]: post-commit state machine
//! - [`checkout`]: branch/commit switch state machine
//! - [`recovery`]: diagnose and finish interrupted checkouts
//! - [`bundle`] / [`cursor`]: incremental export and fast-forward import
//! - [`store`]: object-store contract (filesystem and HTTP)
//! - [`pipeline`]: publish, pull and sync for one project
//! - [`session`]: lock-holding entry points used by the hooks

pub mod bundle;
pub mod capture;
pub mod checkout;
pub mod cursor;
pub mod error;
pub mod init;
pub mod outcome;
pub mod pipeline;
pub mod queue;
pub mod recovery;
pub mod session;
pub mod store;

pub use bundle::{BranchImport, BundleArtifact, ImportReport};
pub use capture::{CaptureOptions, CaptureResult, CaptureStatus, SkipReason};
pub use checkout::{CheckoutResult, CheckoutStatus, CheckoutTarget};
pub use cursor::SyncCursor;
pub use error::{StoreError, SyncError};
pub use init::InitOutcome;
pub use outcome::{Failure, FailureKind, RepoRole};
pub use pipeline::{PublishOutcome, PullOutcome, SyncOutcome};
pub use queue::{NoPublish, PublishQueue};
pub use recovery::PairState;
pub use session::ProjectSession;
pub use store::{FsObjectStore, HttpObjectStore, ObjectStore};
