//! `contrail status`: the state of the current repository pair.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use contrail_core::{RemoteConfig, RepositoryHandle};
use contrail_sync::{cursor, PairState};

use super::Project;

/// Arguments for `contrail status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    project: String,
    code_root: String,
    context_root: String,
    initialized: bool,
    code_head: String,
    context_head: Option<String>,
    pair: Option<PairState>,
    remote: Option<String>,
    /// Branch -> last published tip.
    published: BTreeMap<String, String>,
    last_imported: Option<String>,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "field")]
    field: &'static str,
    #[tabled(rename = "value")]
    value: String,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let project = Project::load(None)?;
        let report = build_report(&project)?;
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }
        print_table(report);
        Ok(())
    }
}

fn build_report(project: &Project) -> Result<StatusReport> {
    let binding = project.binding();
    let code = project.session.code().context("failed to open code repository")?;
    let code_head = code.head().context("failed to read code HEAD")?.to_string();
    let initialized = binding.is_initialized();

    let mut report = StatusReport {
        project: binding.id.to_string(),
        code_root: binding.code_root.display().to_string(),
        context_root: binding.context_root.display().to_string(),
        initialized,
        code_head,
        context_head: None,
        pair: None,
        remote: project.config().remote.as_ref().map(describe_remote),
        published: BTreeMap::new(),
        last_imported: None,
    };
    if !initialized {
        return Ok(report);
    }

    let context = project
        .session
        .context()
        .context("failed to open context repository")?;
    report.context_head = Some(
        context
            .head()
            .context("failed to read context HEAD")?
            .to_string(),
    );
    report.pair = Some(
        project
            .session
            .diagnose()
            .context("failed to inspect the repository pair")?,
    );
    report.published = cursor::load(&context)?
        .iter()
        .map(|(branch, tip)| (branch.to_string(), tip.short().to_string()))
        .collect();
    report.last_imported = cursor::last_imported(&context)?;
    Ok(report)
}

fn describe_remote(remote: &RemoteConfig) -> String {
    match remote {
        RemoteConfig::Fs { path } => format!("fs:{}", path.display()),
        RemoteConfig::Http {
            base_url, bucket, ..
        } => format!("{}/{}", base_url.trim_end_matches('/'), bucket),
    }
}

fn print_table(report: StatusReport) {
    println!(
        "Contrail v{} | project {}",
        env!("CARGO_PKG_VERSION"),
        report.project
    );

    let pair = match &report.pair {
        Some(state) if state.needs_resume() => format!("{} {state}", "!".yellow().bold()),
        Some(state) => format!("{} {state}", "✓".green()),
        None => "not initialized; run `contrail init`".bright_black().to_string(),
    };
    let published = if report.published.is_empty() {
        "never".to_string()
    } else {
        report
            .published
            .iter()
            .map(|(branch, tip)| format!("{branch}@{tip}"))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let rows = vec![
        StatusTableRow {
            field: "code",
            value: format!("{} ({})", report.code_root, report.code_head),
        },
        StatusTableRow {
            field: "context",
            value: match &report.context_head {
                Some(head) => format!("{} ({head})", report.context_root),
                None => report.context_root.clone(),
            },
        },
        StatusTableRow {
            field: "pair",
            value: pair,
        },
        StatusTableRow {
            field: "remote",
            value: report.remote.clone().unwrap_or_else(|| "none".to_string()),
        },
        StatusTableRow {
            field: "published",
            value: published,
        },
        StatusTableRow {
            field: "last pulled",
            value: report.last_imported.clone().unwrap_or_else(|| "never".to_string()),
        },
    ];
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if report.pair.as_ref().is_some_and(PairState::needs_resume) {
        println!("Run 'contrail recover --resume' to finish the interrupted checkout.");
    }
}
