//! `contrail hooks install`

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use contrail_core::{GitRepo, RepositoryHandle};

const MARKER: &str = "# managed by contrail";

#[derive(Subcommand, Debug)]
pub enum HooksCommand {
    /// Install post-commit and post-checkout hooks in the current repository.
    Install(InstallArgs),
}

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Replace hooks that were not written by contrail.
    #[arg(long)]
    pub force: bool,
}

pub fn run(command: HooksCommand) -> Result<()> {
    match command {
        HooksCommand::Install(args) => install(args.force),
    }
}

fn install(force: bool) -> Result<()> {
    let cwd = std::env::current_dir().context("could not determine working directory")?;
    let code = GitRepo::discover(&cwd).context("not inside a git repository")?;
    let hooks = code.git_path("hooks")?;
    fs::create_dir_all(&hooks).with_context(|| format!("create {}", hooks.display()))?;

    let scripts = [
        ("post-commit", "contrail capture || true"),
        (
            "post-checkout",
            "contrail checkout-sync \"$1\" \"$2\" \"$3\" || true",
        ),
    ];
    for (name, command) in scripts {
        let path = hooks.join(name);
        if !force && is_foreign(&path)? {
            bail!(
                "{} exists and was not written by contrail; rerun with --force to replace it",
                path.display()
            );
        }
        let script = format!("#!/bin/sh\n{MARKER}\n{command}\n");
        fs::write(&path, script).with_context(|| format!("write {}", path.display()))?;
        make_executable(&path)?;
        println!("✓ installed {}", path.display());
    }
    println!("  code root: {}", code.root().display());
    Ok(())
}

fn is_foreign(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    let body = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(!body.contains(MARKER))
}

fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("chmod {}", path.display()))
}
