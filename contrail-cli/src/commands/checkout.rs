//! `contrail checkout <ref>` and `contrail recover [--resume]`.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use contrail_sync::{CheckoutStatus, CheckoutTarget};

use super::Project;

/// Check out a code reference and restore its context.
#[derive(Args, Debug)]
pub struct CheckoutArgs {
    /// Branch name or commit to check out in the code repository.
    pub reference: String,
}

impl CheckoutArgs {
    pub fn run(self) -> Result<()> {
        let project = Project::load(None)?;
        if !project.binding().is_initialized() {
            bail!("no context repository yet; run `contrail init` first");
        }

        let result = project
            .session
            .checkout(CheckoutTarget::Switch(&self.reference));
        println!("{}", result.summary());
        match result.status {
            CheckoutStatus::Failed(failure) => {
                bail!("checkout of '{}' failed: {failure}", self.reference)
            }
            CheckoutStatus::StashConflict { .. } => {
                bail!("resolve the stash conflict in the context repository, then `git stash drop`")
            }
            _ => Ok(()),
        }
    }
}

/// Diagnose, and optionally finish, an interrupted checkout.
#[derive(Args, Debug)]
pub struct RecoverArgs {
    /// Finish the interrupted checkout instead of only reporting.
    #[arg(long)]
    pub resume: bool,
}

impl RecoverArgs {
    pub fn run(self) -> Result<()> {
        let project = Project::load(None)?;
        let state = project
            .session
            .diagnose()
            .context("failed to inspect the repository pair")?;

        if !state.needs_resume() {
            println!("{} {state}", "✓".green());
            return Ok(());
        }
        println!("{} {state}", "!".yellow().bold());
        if !self.resume {
            println!("  run `contrail recover --resume` to finish the checkout");
            return Ok(());
        }

        let result = project.session.resume();
        println!("{}", result.summary());
        if let CheckoutStatus::Failed(failure) = result.status {
            bail!("resume failed: {failure}");
        }
        Ok(())
    }
}
