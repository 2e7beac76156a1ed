//! taskshift - moves Google Tasks that are nearly due into a primary list.

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

use anyhow::{Context, Result};
use application::commands::{
    ClearTarget, LiveAppState, RunOutcome, authenticate_impl, clear_impl, list_lists_impl, logout_impl,
    run_scan_impl,
};
use chrono::Utc;
use clap::Parser;
use cli::{Cli, Commands};
use std::io::{IsTerminal, Write};
use std::process::ExitCode;

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.default_log_filter()))
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::error!("Error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    let workspace_root = match cli.root {
        Some(path) => path,
        None => std::env::current_dir().context("failed to resolve current directory")?,
    };
    let interactive = !cli.no_interactive && std::io::stdin().is_terminal();

    let state = LiveAppState::new(workspace_root.clone(), interactive)
        .with_context(|| format!("failed to initialize workspace {}", workspace_root.display()))?;
    log::debug!(
        "workspace {} (timezone {}, interactive consent {})",
        state.workspace_root().display(),
        state.config().timezone,
        if interactive { "on" } else { "off" }
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(dispatch(&state, cli.command))
}

async fn dispatch(state: &LiveAppState, command: Commands) -> Result<()> {
    match command {
        Commands::Run { primary_list } => {
            let outcome = run_scan_impl(state, primary_list, Utc::now())
                .await
                .context("run aborted")?;
            if let RunOutcome::Scanned(report) = outcome {
                for failure in report.failures.iter().filter(|failure| failure.duplicated_as.is_some()) {
                    log::warn!(
                        "Duplicate left behind: task {} in list {} (copy {})",
                        failure.task_id.as_deref().unwrap_or("?"),
                        failure.list_id,
                        failure.duplicated_as.as_deref().unwrap_or("?")
                    );
                }
            }
        }

        Commands::Lists { primary_list } => {
            let lists = list_lists_impl(state, primary_list)
                .await
                .context("failed to list task lists")?;
            println!("primary    {}  {}", lists.primary.id, lists.primary.title);
            for list in &lists.secondary {
                println!("secondary  {}  {}", list.id, list.title);
            }
        }

        Commands::Auth => {
            authenticate_impl(state).await.context("authentication failed")?;
        }

        Commands::Logout => {
            logout_impl(state).context("failed to remove stored credential")?;
        }

        Commands::Clear(args) => {
            if !args.yes {
                anyhow::bail!("refusing to delete tasks without --yes");
            }
            let target = if args.all {
                ClearTarget::All
            } else {
                ClearTarget::Lists(args.list_ids)
            };
            let report = clear_impl(state, target).await.context("clear aborted")?;
            log::info!(
                "Deleted {} task(s), {} failure(s)",
                report.deleted,
                report.failures.len()
            );
        }
    }

    Ok(())
}
