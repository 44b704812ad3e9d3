//! `hearth ps` — List running managed services.

use std::process::ExitCode;

use clap::Args;

use super::{GlobalArgs, context};
use crate::output;

/// Arguments for the `ps` command.
#[derive(Args, Debug)]
pub struct PsArgs {
    /// Print the instances as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `ps` command.
///
/// # Errors
///
/// Returns an error if the engine cannot be listed.
pub async fn execute(global: &GlobalArgs, args: PsArgs) -> anyhow::Result<ExitCode> {
    let reconciler = context::reconciler(&global.config())?;
    let instances = reconciler.snapshot().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&instances)?);
    } else {
        print!("{}", output::format_instances(&instances));
    }
    Ok(ExitCode::SUCCESS)
}
