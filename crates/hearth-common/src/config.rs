//! Global configuration model for Hearth.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;

/// Root configuration for a Hearth invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HearthConfig {
    /// Base directory under which every volume host path is rooted.
    pub data_dir: PathBuf,
    /// Path to the service catalog.
    pub catalog_file: PathBuf,
    /// Environment files, least specific first.
    pub env_files: Vec<PathBuf>,
    /// Whether the process environment is the most specific layer.
    pub inherit_process_env: bool,
    /// Maximum number of engine actions in flight.
    pub workers: usize,
    /// Per-action timeout in seconds.
    pub action_timeout_secs: u64,
    /// Container engine binary name or path.
    pub engine: String,
}

impl HearthConfig {
    /// Returns the per-action timeout.
    #[must_use]
    pub const fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs)
    }

    /// Returns the worker count, never less than one.
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        self.workers.max(1)
    }
}

impl Default for HearthConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(constants::DEFAULT_DATA_DIR),
            catalog_file: PathBuf::from(constants::DEFAULT_CATALOG_FILE),
            env_files: vec![
                PathBuf::from(constants::DEFAULT_ENV_FILE),
                PathBuf::from(constants::LOCAL_ENV_FILE),
            ],
            inherit_process_env: true,
            workers: constants::DEFAULT_WORKERS,
            action_timeout_secs: constants::DEFAULT_ACTION_TIMEOUT_SECS,
            engine: constants::DEFAULT_ENGINE.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_layer_machine_file_over_shared_file() {
        let config = HearthConfig::default();
        assert_eq!(
            config.env_files,
            vec![
                PathBuf::from("hearth.env"),
                PathBuf::from("hearth.local.env")
            ]
        );
        assert!(config.inherit_process_env);
    }

    #[test]
    fn zero_workers_is_clamped_to_one() {
        let config = HearthConfig {
            workers: 0,
            ..HearthConfig::default()
        };
        assert_eq!(config.effective_workers(), 1);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: HearthConfig =
            serde_json::from_str(r#"{"data_dir": "/tmp/hearth", "workers": 2}"#).expect("parse");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/hearth"));
        assert_eq!(config.workers, 2);
        assert_eq!(config.engine, "docker");
        assert_eq!(config.action_timeout(), Duration::from_secs(120));
    }
}
