//! # contrail-daemon
//!
//! Background publishing. Hook processes send `publish` requests over a Unix
//! socket; the [`SyncScheduler`] runs at most one publish per project at a
//! time and folds requests that arrive meanwhile into one trailing publish.

mod error;
pub mod paths;
pub mod protocol;
pub mod queue;
mod runtime;
pub mod scheduler;

pub use error::DaemonError;
pub use protocol::{request_publish, request_status, request_stop, DaemonRequest, PublishAck};
pub use queue::DaemonPublishQueue;
pub use runtime::{run, start_blocking};
pub use scheduler::{Enqueued, PublishEvent, PublishFn, SlotStatus, SyncScheduler};

/// Daemon logging: `info` unless `RUST_LOG` says otherwise. Set
/// `CONTRAIL_LOG_FORMAT=json` for one JSON object per line.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = match std::env::var("CONTRAIL_LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().try_init(),
        _ => builder.try_init(),
    };
}
