//! CLI command definitions and dispatch.

pub mod context;
pub mod plan;
pub mod ps;
pub mod setup;
pub mod stop;
pub mod update;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use hearth_common::config::HearthConfig;
use hearth_common::constants;
use hearth_runtime::report::CycleReport;

/// Hearth — declarative service reconciler for a single home server.
#[derive(Parser, Debug)]
#[command(name = "hearth", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Plain,
    /// One JSON object per event.
    Json,
}

/// Options shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Path to the service catalog.
    #[arg(
        short,
        long,
        global = true,
        env = "HEARTH_CATALOG",
        default_value = constants::DEFAULT_CATALOG_FILE
    )]
    pub file: PathBuf,

    /// Environment file, least specific first. Repeatable; replaces the
    /// default `hearth.env` and `hearth.local.env` next to the catalog.
    #[arg(long = "env-file", global = true)]
    pub env_files: Vec<PathBuf>,

    /// Do not use the process environment as the most specific layer.
    #[arg(long, global = true)]
    pub no_process_env: bool,

    /// Directory every volume host path is rooted under.
    #[arg(
        long,
        global = true,
        env = "HEARTH_DATA_DIR",
        default_value = constants::DEFAULT_DATA_DIR
    )]
    pub data_dir: PathBuf,

    /// Container engine binary.
    #[arg(long, global = true, env = "HEARTH_ENGINE", default_value = constants::DEFAULT_ENGINE)]
    pub engine: String,

    /// Maximum number of engine actions in flight.
    #[arg(
        long,
        global = true,
        env = "HEARTH_WORKERS",
        default_value_t = constants::DEFAULT_WORKERS
    )]
    pub workers: usize,

    /// Per-action timeout, in seconds.
    #[arg(
        long = "timeout",
        global = true,
        env = "HEARTH_TIMEOUT",
        default_value_t = constants::DEFAULT_ACTION_TIMEOUT_SECS
    )]
    pub timeout_secs: u64,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,
}

impl GlobalArgs {
    /// Builds the configuration these arguments describe.
    #[must_use]
    pub fn config(&self) -> HearthConfig {
        let env_files = if self.env_files.is_empty() {
            let base = self
                .file
                .parent()
                .map(PathBuf::from)
                .unwrap_or_default();
            vec![
                base.join(constants::DEFAULT_ENV_FILE),
                base.join(constants::LOCAL_ENV_FILE),
            ]
        } else {
            self.env_files.clone()
        };
        HearthConfig {
            data_dir: self.data_dir.clone(),
            catalog_file: self.file.clone(),
            env_files,
            inherit_process_env: !self.no_process_env,
            workers: self.workers,
            action_timeout_secs: self.timeout_secs,
            engine: self.engine.clone(),
        }
    }

    /// Returns `true` if the environment files were given explicitly.
    #[must_use]
    pub fn explicit_env_files(&self) -> bool {
        !self.env_files.is_empty()
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Prepare data directories and run one reconciliation cycle.
    Setup(setup::SetupArgs),
    /// Stop every managed service, pull fresh images, and run one cycle.
    Update(update::UpdateArgs),
    /// Show what a cycle would change, without changing anything.
    Plan(plan::PlanArgs),
    /// List running managed services.
    Ps(ps::PsArgs),
    /// Stop every managed service.
    Stop(stop::StopArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the cycle
/// cannot run at all. Failed actions are reported through the exit code.
pub async fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::Setup(args) => setup::execute(&cli.global, args).await,
        Command::Update(args) => update::execute(&cli.global, args).await,
        Command::Plan(args) => plan::execute(&cli.global, args).await,
        Command::Ps(args) => ps::execute(&cli.global, args).await,
        Command::Stop(args) => stop::execute(&cli.global, args).await,
    }
}

/// Exit code for a finished cycle: success only if nothing failed or was
/// blocked.
pub fn exit_code(report: &CycleReport) -> ExitCode {
    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_env_files_sit_next_to_the_catalog() {
        let cli = Cli::parse_from(["hearth", "--file", "/etc/hearth/hearth.yaml", "plan"]);
        let config = cli.global.config();
        assert_eq!(
            config.env_files,
            vec![
                PathBuf::from("/etc/hearth/hearth.env"),
                PathBuf::from("/etc/hearth/hearth.local.env"),
            ]
        );
        assert!(config.inherit_process_env);
        assert!(!cli.global.explicit_env_files());
    }

    #[test]
    fn explicit_env_files_replace_defaults_in_order() {
        let cli = Cli::parse_from([
            "hearth",
            "setup",
            "--env-file",
            "base.env",
            "--env-file",
            "nas.env",
            "--no-process-env",
            "--workers",
            "2",
            "--timeout",
            "30",
        ]);
        let config = cli.global.config();
        assert_eq!(
            config.env_files,
            vec![PathBuf::from("base.env"), PathBuf::from("nas.env")]
        );
        assert!(!config.inherit_process_env);
        assert_eq!(config.workers, 2);
        assert_eq!(config.action_timeout_secs, 30);
    }

    #[test]
    fn log_format_parses_json() {
        let cli = Cli::parse_from(["hearth", "--log-format", "json", "ps"]);
        assert_eq!(cli.global.log_format, LogFormat::Json);
        assert!(matches!(cli.command, Command::Ps(_)));
    }
}
