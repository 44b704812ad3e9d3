//! `hearth plan` — Show what a cycle would change.

use std::process::ExitCode;

use clap::Args;

use super::GlobalArgs;
use super::context::{self, Workspace};
use crate::output;

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Print the plan as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `plan` command.
///
/// Takes one snapshot of the engine and diffs it against the resolved
/// catalog. Nothing is started or stopped.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the engine cannot
/// be listed.
pub async fn execute(global: &GlobalArgs, args: PlanArgs) -> anyhow::Result<ExitCode> {
    let workspace = Workspace::load(global)?;
    let resolved = workspace.resolve()?;
    let reconciler = context::reconciler(&workspace.config)?;

    let plan = reconciler.plan(&resolved).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        println!("Plan for: {}", workspace.config.catalog_file.display());
        println!();
        print!("{}", output::format_plan(&plan));
        for unresolved in &resolved.unresolved {
            eprintln!("  {}: {}", unresolved.name, unresolved.error);
        }
    }
    Ok(ExitCode::SUCCESS)
}
