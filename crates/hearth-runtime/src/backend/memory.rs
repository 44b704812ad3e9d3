//! In-process engine used by tests and dry runs.
//!
//! Keeps running instances in a map and records every call, with optional
//! per-service failure injection and artificial latency.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use hearth_common::error::{HearthError, Result};
use hearth_compose::resolver::ResolvedDescriptor;

use super::{EngineAdapter, InstanceState};

/// A call received by a [`MemoryEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// `list_running`.
    List,
    /// `start` of the named service.
    Start(String),
    /// `stop` of the named instance.
    Stop(String),
    /// `pull` of the named image.
    Pull(String),
}

#[derive(Debug, Default)]
struct State {
    running: BTreeMap<String, InstanceState>,
    calls: Vec<EngineCall>,
    fail_start: BTreeSet<String>,
    fail_stop: BTreeSet<String>,
    fail_pull: BTreeSet<String>,
    fail_list: bool,
    delays: BTreeMap<String, Duration>,
}

/// Engine adapter holding its state in memory.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    state: Mutex<State>,
}

impl MemoryEngine {
    /// Creates an engine with nothing running.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a running instance.
    #[must_use]
    pub fn with_running(self, instance: InstanceState) -> Self {
        self.insert(instance);
        self
    }

    /// Adds or replaces a running instance.
    pub fn insert(&self, instance: InstanceState) {
        let instance = instance.normalized();
        let _ = self.lock().running.insert(instance.name.clone(), instance);
    }

    /// Makes every `start` of `service` fail.
    #[must_use]
    pub fn fail_start(self, service: &str) -> Self {
        let _ = self.lock().fail_start.insert(service.to_string());
        self
    }

    /// Makes every `stop` of `service` fail.
    #[must_use]
    pub fn fail_stop(self, service: &str) -> Self {
        let _ = self.lock().fail_stop.insert(service.to_string());
        self
    }

    /// Makes every `pull` of `image` fail.
    #[must_use]
    pub fn fail_pull(self, image: &str) -> Self {
        let _ = self.lock().fail_pull.insert(image.to_string());
        self
    }

    /// Makes `list_running` fail.
    #[must_use]
    pub fn fail_list(self) -> Self {
        self.lock().fail_list = true;
        self
    }

    /// Delays every `start` and `stop` of `service` by `delay`.
    #[must_use]
    pub fn delay(self, service: &str, delay: Duration) -> Self {
        let _ = self.lock().delays.insert(service.to_string(), delay);
        self
    }

    /// Returns the running instances, sorted by name.
    #[must_use]
    pub fn running(&self) -> Vec<InstanceState> {
        self.lock().running.values().cloned().collect()
    }

    /// Returns every call received so far, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn pause(&self, service: &str) {
        let delay = self.lock().delays.get(service).copied();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
    }
}

impl EngineAdapter for MemoryEngine {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn list_running(&self) -> Result<Vec<InstanceState>> {
        let mut state = self.lock();
        state.calls.push(EngineCall::List);
        if state.fail_list {
            return Err(HearthError::Engine {
                operation: "list",
                service: "*".into(),
                message: "engine unreachable".into(),
            });
        }
        Ok(state.running.values().cloned().collect())
    }

    fn start(&self, service: &ResolvedDescriptor) -> Result<()> {
        self.lock().calls.push(EngineCall::Start(service.name.clone()));
        self.pause(&service.name);
        let mut state = self.lock();
        if state.fail_start.contains(&service.name) {
            return Err(HearthError::Engine {
                operation: "start",
                service: service.name.clone(),
                message: "injected start failure".into(),
            });
        }
        let _ = state
            .running
            .insert(service.name.clone(), InstanceState::desired(service));
        Ok(())
    }

    fn stop(&self, name: &str) -> Result<()> {
        self.lock().calls.push(EngineCall::Stop(name.to_string()));
        self.pause(name);
        let mut state = self.lock();
        if state.fail_stop.contains(name) {
            return Err(HearthError::Engine {
                operation: "stop",
                service: name.to_string(),
                message: "injected stop failure".into(),
            });
        }
        match state.running.remove(name) {
            Some(_) => Ok(()),
            None => Err(HearthError::NotFound {
                kind: "instance",
                id: name.to_string(),
            }),
        }
    }

    fn pull(&self, image: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(EngineCall::Pull(image.to_string()));
        if state.fail_pull.contains(image) {
            return Err(HearthError::Engine {
                operation: "pull",
                service: image.to_string(),
                message: "injected pull failure".into(),
            });
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use hearth_common::types::RestartPolicy;

    use super::*;

    fn svc(name: &str) -> ResolvedDescriptor {
        ResolvedDescriptor {
            name: name.into(),
            image: format!("{name}:latest"),
            environment: Vec::new(),
            volumes: Vec::new(),
            ports: Vec::new(),
            restart: RestartPolicy::UnlessStopped,
            depends_on: Vec::new(),
        }
    }

    #[test]
    fn start_then_stop_updates_running_set() {
        let engine = MemoryEngine::new();
        engine.start(&svc("web")).unwrap();
        assert_eq!(engine.list_running().unwrap().len(), 1);
        engine.stop("web").unwrap();
        assert!(engine.running().is_empty());
        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::Start("web".into()),
                EngineCall::List,
                EngineCall::Stop("web".into()),
            ]
        );
    }

    #[test]
    fn injected_failures_leave_state_untouched() {
        let engine = MemoryEngine::new().fail_start("web").fail_list();
        assert!(engine.start(&svc("web")).is_err());
        assert!(engine.running().is_empty());
        assert!(engine.list_running().is_err());
    }

    #[test]
    fn stopping_unknown_instance_is_not_found() {
        let err = MemoryEngine::new().stop("ghost").unwrap_err();
        assert!(matches!(err, HearthError::NotFound { .. }), "got: {err}");
    }
}
