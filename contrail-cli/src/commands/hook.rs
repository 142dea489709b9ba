//! Git hook entry points. Both always exit 0: a hook must never make git
//! report a failed commit or checkout. Both are no-ops when git was started by
//! contrail itself (see [`HOOKS_SUPPRESSED_ENV`]).

use anyhow::Result;
use clap::Args;

use contrail_core::HOOKS_SUPPRESSED_ENV;
use contrail_daemon::DaemonPublishQueue;
use contrail_sync::{CheckoutTarget, NoPublish, PublishQueue};

use super::Project;

/// `git` passes the previous HEAD, the new HEAD and 1 for a branch checkout
/// or 0 for a file checkout.
#[derive(Args, Debug)]
pub struct CheckoutSyncArgs {
    pub old_head: String,
    pub new_head: String,
    pub flag: String,
}

fn suppressed() -> bool {
    std::env::var_os(HOOKS_SUPPRESSED_ENV).is_some_and(|v| v == "1")
}

/// `contrail capture` (post-commit).
pub fn capture() -> Result<()> {
    if suppressed() {
        return Ok(());
    }
    let project = match Project::load(None) {
        Ok(project) => project,
        Err(err) => {
            eprintln!("contrail: capture skipped: {err:#}");
            return Ok(());
        }
    };

    let queue: Box<dyn PublishQueue> = match project.config().remote {
        Some(_) => Box::new(DaemonPublishQueue::new(
            &project.home,
            &project.binding().code_root,
        )),
        None => Box::new(NoPublish),
    };
    let result = project.session.capture(queue.as_ref());
    eprintln!("{}", result.summary());
    Ok(())
}

impl CheckoutSyncArgs {
    /// `contrail checkout-sync <old> <new> <flag>` (post-checkout).
    pub fn run(self) -> Result<()> {
        if self.flag == "0" || suppressed() {
            return Ok(());
        }
        let project = match Project::load(None) {
            Ok(project) => project,
            Err(err) => {
                eprintln!("contrail: checkout sync skipped: {err:#}");
                return Ok(());
            }
        };
        if !project.binding().is_initialized() {
            return Ok(());
        }

        let result = project.session.checkout(CheckoutTarget::AlreadySwitched);
        eprintln!("{}", result.summary());
        Ok(())
    }
}
