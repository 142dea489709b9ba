//! Contrail: keeps AI session transcripts in a git repository that mirrors
//! the branches and commits of your code repository.
//!
//! # Usage
//!
//! ```text
//! contrail init [path]
//! contrail capture                          (post-commit hook)
//! contrail checkout-sync <old> <new> <flag> (post-checkout hook)
//! contrail checkout <ref>
//! contrail publish | pull | sync
//! contrail status [--json]
//! contrail recover [--resume]
//! contrail hooks install [--force]
//! contrail daemon start|stop|status
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    checkout::{CheckoutArgs, RecoverArgs},
    daemon::DaemonCommand,
    exchange::ExchangeCommand,
    hook::CheckoutSyncArgs,
    hooks::HooksCommand,
    init::InitArgs,
    status::StatusArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "contrail",
    version,
    about = "Version AI session transcripts alongside your code",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the context repository for a code repository.
    Init(InitArgs),

    /// Commit pending transcripts and link them to the code HEAD (post-commit hook).
    Capture,

    /// Move the context repository to match a code checkout (post-checkout hook).
    CheckoutSync(CheckoutSyncArgs),

    /// Check out a code reference and restore its context.
    Checkout(CheckoutArgs),

    /// Upload new context history to the configured remote.
    Publish,

    /// Download and apply context history from the configured remote.
    Pull,

    /// Pull, then publish.
    Sync,

    /// Show the state of the current project's repository pair.
    Status(StatusArgs),

    /// Diagnose, and optionally finish, an interrupted checkout.
    Recover(RecoverArgs),

    /// Manage git hooks in the code repository.
    Hooks {
        #[command(subcommand)]
        command: HooksCommand,
    },

    /// Manage the background publishing daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if !matches!(
        cli.command,
        Commands::Daemon {
            command: DaemonCommand::Start
        }
    ) {
        init_tracing();
    }

    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Capture => commands::hook::capture(),
        Commands::CheckoutSync(args) => args.run(),
        Commands::Checkout(args) => args.run(),
        Commands::Publish => commands::exchange::run(ExchangeCommand::Publish),
        Commands::Pull => commands::exchange::run(ExchangeCommand::Pull),
        Commands::Sync => commands::exchange::run(ExchangeCommand::Sync),
        Commands::Status(args) => args.run(),
        Commands::Recover(args) => args.run(),
        Commands::Hooks { command } => commands::hooks::run(command),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}

/// Warnings and errors go to stderr so that stdout stays parseable.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
