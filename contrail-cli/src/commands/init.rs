//! `contrail init [path]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use contrail_sync::init::{self, InitOutcome};

use super::Project;

/// Create the context repository for a code repository.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Any path inside the code repository (defaults to the working directory).
    pub path: Option<PathBuf>,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let project = Project::load(self.path.as_deref())?;
        let binding = project.binding();
        let outcome = init::init(binding, &project.session.filter()).with_context(|| {
            format!(
                "failed to initialize context for '{}'",
                binding.code_root.display()
            )
        })?;

        match outcome {
            InitOutcome::Created {
                context_root,
                initial,
                linked,
            } => {
                println!("✓ Context repository created at {}", context_root.display());
                println!("  project id: {}", binding.id);
                println!("  root commit: {}", initial.short());
                if let Some(linked) = linked {
                    println!("  existing transcripts committed as {}", linked.short());
                }
                println!("  run `contrail hooks install` to capture on every commit");
            }
            InitOutcome::AlreadyInitialized { context_root } => {
                println!("Already initialized: {}", context_root.display());
            }
        }
        Ok(())
    }
}
