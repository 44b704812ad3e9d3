//! `hearth update` — Stop all services, pull fresh images, and start them again.

use std::process::ExitCode;

use clap::Args;

use super::GlobalArgs;
use super::context::{self, Workspace};
use crate::output;

/// Arguments for the `update` command.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Print the cycle report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `update` command.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the engine cannot
/// be reached.
pub async fn execute(global: &GlobalArgs, args: UpdateArgs) -> anyhow::Result<ExitCode> {
    let workspace = Workspace::load(global)?;
    // Resolve before stopping anything so a broken catalog leaves the
    // running services alone.
    let resolved = workspace.resolve()?;
    let reconciler = context::reconciler(&workspace.config)?;

    let report = reconciler.update(&resolved).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", output::format_report(&report));
    }
    Ok(super::exit_code(&report))
}
