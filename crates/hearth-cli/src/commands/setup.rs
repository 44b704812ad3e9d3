//! `hearth setup` — Prepare data directories and run one reconciliation cycle.

use std::process::ExitCode;

use clap::Args;

use super::GlobalArgs;
use super::context::{self, Workspace};
use crate::output;

/// Arguments for the `setup` command.
#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Print the cycle report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `setup` command.
///
/// Loads and resolves the catalog, creates the data directories its
/// volumes live in, then starts or recreates every service that drifted.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the engine cannot
/// be reached.
pub async fn execute(global: &GlobalArgs, args: SetupArgs) -> anyhow::Result<ExitCode> {
    let workspace = Workspace::load(global)?;
    let resolved = workspace.resolve()?;
    let reconciler = context::reconciler(&workspace.config)?;

    let report = reconciler
        .setup(&resolved, &workspace.config.data_dir)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", output::format_report(&report));
    }
    Ok(super::exit_code(&report))
}
