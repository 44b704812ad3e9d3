//! `hearth stop` — Stop every managed service, dependents first.

use std::process::ExitCode;

use clap::Args;

use super::{GlobalArgs, context};
use crate::output;

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Print the cycle report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `stop` command.
///
/// Works from the engine's own record of what is running, so it needs no
/// catalog.
///
/// # Errors
///
/// Returns an error if the engine cannot be reached.
pub async fn execute(global: &GlobalArgs, args: StopArgs) -> anyhow::Result<ExitCode> {
    let reconciler = context::reconciler(&global.config())?;
    let report = reconciler.stop_all().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", output::format_report(&report));
    }
    Ok(super::exit_code(&report))
}
