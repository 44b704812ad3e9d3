//! On-disk shape of the catalog file, as deserialized by `serde_yaml`.

use hearth_common::types::RestartPolicy;
use serde::Deserialize;

/// Root node of a catalog file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawCatalog {
    /// Service entries, in file order.
    #[serde(default)]
    pub services: Vec<RawService>,
}

/// One entry of the `services` list.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawService {
    /// Unique service name, also the container name.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Environment bindings.
    #[serde(default)]
    pub environment: RawEnvironment,
    /// `host:container[:ro|rw]` mounts.
    #[serde(default)]
    pub volumes: Vec<String>,
    /// `[ip:]host:container[/proto]` port mappings.
    #[serde(default)]
    pub ports: Vec<String>,
    /// Restart policy.
    #[serde(default)]
    pub restart: RestartPolicy,
    /// Services that must be reconciled first.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// Environment bindings, either as `KEY=value` strings or as a mapping.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawEnvironment {
    /// `- KEY=value` or `- KEY` entries.
    List(Vec<String>),
    /// `KEY: value` entries, in file order.
    Map(serde_yaml::Mapping),
}

impl Default for RawEnvironment {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}
