//! Container engine abstraction.
//!
//! The reconciler never inspects containers itself: everything it knows
//! about "currently running" comes from [`EngineAdapter::list_running`],
//! and every change goes through [`EngineAdapter::start`] or
//! [`EngineAdapter::stop`].

pub mod docker;
pub mod memory;

use std::collections::BTreeMap;

use hearth_common::error::Result;
use hearth_common::types::{PortBinding, RestartPolicy, VolumeBinding};
use hearth_compose::resolver::ResolvedDescriptor;
use serde::{Deserialize, Serialize};

/// State of a running managed instance, as reported by the engine.
///
/// Collections are normalized (environment as a map where the last
/// binding of a key wins, volumes and ports sorted) so that two states
/// describing the same container compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceState {
    /// Service (and container) name.
    pub name: String,
    /// Image reference the instance was started from.
    pub image: String,
    /// Environment variables.
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// Volume mounts, sorted.
    #[serde(default)]
    pub volumes: Vec<VolumeBinding>,
    /// Published ports, sorted.
    #[serde(default)]
    pub ports: Vec<PortBinding>,
    /// Restart policy.
    #[serde(default)]
    pub restart: RestartPolicy,
    /// Dependencies recorded at start time, used to order orphan stops.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl InstanceState {
    /// Returns the state an instance started from `service` would report.
    #[must_use]
    pub fn desired(service: &ResolvedDescriptor) -> Self {
        Self {
            name: service.name.clone(),
            image: service.image.clone(),
            environment: service.environment.iter().cloned().collect(),
            volumes: service.volumes.clone(),
            ports: service.ports.clone(),
            restart: service.restart,
            depends_on: service.depends_on.clone(),
        }
        .normalized()
    }

    /// Sorts and deduplicates the collection fields.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.volumes.sort();
        self.volumes.dedup();
        self.ports.sort();
        self.ports.dedup();
        self
    }
}

/// Operations the reconciler needs from a container engine.
///
/// Calls are blocking; the executor runs them on the blocking thread pool
/// and applies its own timeout.
pub trait EngineAdapter: Send + Sync {
    /// Short name used in logs and CLI output.
    fn name(&self) -> &str;

    /// Lists every running instance managed by Hearth.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be queried.
    fn list_running(&self) -> Result<Vec<InstanceState>>;

    /// Starts a fresh instance of `service`, replacing any stopped
    /// leftover with the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine refuses to start the instance.
    fn start(&self, service: &ResolvedDescriptor) -> Result<()>;

    /// Stops and removes the instance named `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the instance cannot be stopped.
    fn stop(&self, name: &str) -> Result<()>;

    /// Refreshes the local copy of `image` from its registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the pull fails.
    fn pull(&self, image: &str) -> Result<()>;

    /// Returns whether the engine is reachable.
    fn is_available(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn descriptor() -> ResolvedDescriptor {
        ResolvedDescriptor {
            name: "jellyfin".into(),
            image: "jellyfin/jellyfin:10.9.11".into(),
            environment: vec![
                ("TZ".into(), "UTC".into()),
                ("TZ".into(), "Europe/Paris".into()),
            ],
            volumes: vec![
                VolumeBinding {
                    host: PathBuf::from("/srv/hearth/media"),
                    container: "/media".into(),
                    read_only: true,
                },
                VolumeBinding {
                    host: PathBuf::from("/srv/hearth/jellyfin"),
                    container: "/config".into(),
                    read_only: false,
                },
            ],
            ports: Vec::new(),
            restart: RestartPolicy::OnFailure,
            depends_on: Vec::new(),
        }
    }

    #[test]
    fn desired_state_keeps_last_env_binding() {
        let state = InstanceState::desired(&descriptor());
        assert_eq!(state.environment.len(), 1);
        assert_eq!(state.environment["TZ"], "Europe/Paris");
    }

    #[test]
    fn desired_state_sorts_volumes() {
        let state = InstanceState::desired(&descriptor());
        assert_eq!(state.volumes[0].container, "/config");
        assert_eq!(state.volumes[1].container, "/media");
    }

    #[test]
    fn state_survives_json_label_encoding() {
        let state = InstanceState::desired(&descriptor());
        let json = serde_json::to_string(&state).expect("serialize");
        let back: InstanceState = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, state);
    }
}
