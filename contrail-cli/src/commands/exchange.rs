//! `contrail publish`, `contrail pull`, `contrail sync`.

use anyhow::{Context, Result};
use colored::Colorize;

use contrail_sync::bundle::{BranchImport, BranchUpdate};
use contrail_sync::{pipeline, store, PublishOutcome, PullOutcome, SyncError};

use super::Project;

#[derive(Debug, Clone, Copy)]
pub enum ExchangeCommand {
    Publish,
    Pull,
    Sync,
}

pub fn run(command: ExchangeCommand) -> Result<()> {
    let project = Project::load(None)?;
    let remote = project.config().remote.as_ref().ok_or(SyncError::NoRemote)?;
    let store = store::open(remote).context("failed to open the remote store")?;
    let binding = project.binding();

    match command {
        ExchangeCommand::Publish => {
            let outcome = pipeline::publish(binding, store.as_ref()).context("publish failed")?;
            print_publish(&outcome);
        }
        ExchangeCommand::Pull => {
            let outcome = pipeline::pull(binding, project.config(), store.as_ref())
                .context("pull failed")?;
            print_pull(&outcome);
        }
        ExchangeCommand::Sync => {
            let outcome = pipeline::sync(binding, project.config(), store.as_ref())
                .context("sync failed")?;
            print_pull(&outcome.pull);
            print_publish(&outcome.publish);
        }
    }
    Ok(())
}

fn print_publish(outcome: &PublishOutcome) {
    match &outcome.key {
        Some(key) => {
            let branches: Vec<&str> = outcome.branches.iter().map(|b| b.0.as_str()).collect();
            println!(
                "{} published {} ({} bytes; {})",
                "✓".green(),
                key,
                outcome.bytes,
                branches.join(", ")
            );
        }
        None => println!("nothing new to publish"),
    }
}

fn print_pull(outcome: &PullOutcome) {
    if outcome.created {
        println!("{} created local context repository", "✓".green());
    }
    if outcome.applied.is_empty() {
        println!("no new bundles");
    } else {
        println!("{} applied {} bundle(s)", "✓".green(), outcome.applied.len());
        for update in &outcome.updates {
            print_update(update);
        }
    }
    if !outcome.deferred.is_empty() {
        println!(
            "{}",
            format!(
                "{} bundle(s) waiting for earlier history, retried on next pull",
                outcome.deferred.len()
            )
            .yellow()
        );
    }
}

fn print_update(update: &BranchUpdate) {
    let line = format!("  {}: {}", update.branch, update.outcome);
    match update.outcome {
        BranchImport::Diverged { .. } => println!("{}", line.yellow()),
        BranchImport::UpToDate => {}
        _ => println!("{line}"),
    }
}
