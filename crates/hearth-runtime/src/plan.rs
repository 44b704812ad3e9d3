//! Diffing desired state against the engine's running state.
//!
//! A plan is a pure function of the resolved catalog and a snapshot of
//! running instances: it never talks to the engine.

use std::collections::{HashMap, HashSet};
use std::fmt;

use hearth_compose::graph::DependencyGraph;
use hearth_compose::resolver::ResolvedCatalog;
use serde::{Deserialize, Serialize};

use crate::backend::InstanceState;

/// A descriptor field compared when diffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    /// Image reference.
    Image,
    /// Environment variables.
    Environment,
    /// Volume mounts.
    Volumes,
    /// Published ports.
    Ports,
    /// Restart policy.
    Restart,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Image => "image",
            Self::Environment => "environment",
            Self::Volumes => "volumes",
            Self::Ports => "ports",
            Self::Restart => "restart",
        };
        f.write_str(name)
    }
}

/// What a cycle does to one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ActionKind {
    /// Start an instance that is not running.
    Create,
    /// Replace a running instance whose configuration drifted.
    Recreate {
        /// Fields that differ from the running instance.
        changed: Vec<Field>,
    },
    /// Stop an orphaned instance.
    Stop,
    /// Nothing to do.
    NoOp,
}

impl ActionKind {
    /// Short verb used in logs and reports.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Recreate { .. } => "recreate",
            Self::Stop => "stop",
            Self::NoOp => "no-op",
        }
    }

    /// Returns `true` if the action changes the engine state.
    #[must_use]
    pub const fn is_change(&self) -> bool {
        !matches!(self, Self::NoOp)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recreate { changed } => {
                let fields: Vec<String> = changed.iter().map(ToString::to_string).collect();
                write!(f, "recreate ({})", fields.join(", "))
            }
            other => f.write_str(other.operation()),
        }
    }
}

/// One planned action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedAction {
    /// Target service or instance.
    pub service: String,
    /// What to do.
    pub kind: ActionKind,
    /// Actions in the same phase that must succeed before this one runs.
    pub after: Vec<String>,
}

/// The ordered result of diffing one cycle.
///
/// Orphan stops come first in reverse dependency order, then one action
/// per resolved service in deployment order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationPlan {
    /// Planned actions.
    pub actions: Vec<PlannedAction>,
    /// Services that failed resolution and are reported as failed.
    pub unresolved: Vec<String>,
}

impl ReconciliationPlan {
    /// Returns `true` if applying the plan changes nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.unresolved.is_empty() && self.actions.iter().all(|a| !a.kind.is_change())
    }

    /// Orphan stop actions.
    pub fn stop_actions(&self) -> impl Iterator<Item = &PlannedAction> {
        self.actions.iter().filter(|a| a.kind == ActionKind::Stop)
    }

    /// Actions on declared services.
    pub fn service_actions(&self) -> impl Iterator<Item = &PlannedAction> {
        self.actions.iter().filter(|a| a.kind != ActionKind::Stop)
    }
}

/// Lists the fields in which `desired` and `running` differ.
#[must_use]
pub fn diff(desired: &InstanceState, running: &InstanceState) -> Vec<Field> {
    let mut changed = Vec::new();
    if desired.image != running.image {
        changed.push(Field::Image);
    }
    if desired.environment != running.environment {
        changed.push(Field::Environment);
    }
    if desired.volumes != running.volumes {
        changed.push(Field::Volumes);
    }
    if desired.ports != running.ports {
        changed.push(Field::Ports);
    }
    if desired.restart != running.restart {
        changed.push(Field::Restart);
    }
    changed
}

/// Computes the plan that moves `running` to the state `resolved` declares.
///
/// Running instances of services that failed resolution are left alone.
#[must_use]
pub fn plan(resolved: &ResolvedCatalog, running: &[InstanceState]) -> ReconciliationPlan {
    let by_name: HashMap<&str, &InstanceState> =
        running.iter().map(|r| (r.name.as_str(), r)).collect();

    let orphans: Vec<InstanceState> = running
        .iter()
        .filter(|r| !resolved.declares(&r.name))
        .cloned()
        .collect();
    let mut actions = stop_plan(&orphans);

    for service in &resolved.services {
        let desired = InstanceState::desired(service);
        let kind = match by_name.get(service.name.as_str()) {
            None => ActionKind::Create,
            Some(current) => {
                let changed = diff(&desired, &InstanceState::clone(current).normalized());
                if changed.is_empty() {
                    ActionKind::NoOp
                } else {
                    ActionKind::Recreate { changed }
                }
            }
        };
        tracing::debug!(service = %service.name, action = %kind, "planned");
        actions.push(PlannedAction {
            service: service.name.clone(),
            kind,
            after: service.depends_on.clone(),
        });
    }

    ReconciliationPlan {
        actions,
        unresolved: resolved.unresolved.iter().map(|u| u.name.clone()).collect(),
    }
}

/// Orders stop actions for `instances`: dependents before the services they
/// depend on, ties by name. Falls back to name order if the recorded
/// dependencies form a cycle.
#[must_use]
pub fn stop_plan(instances: &[InstanceState]) -> Vec<PlannedAction> {
    let mut sorted: Vec<&InstanceState> = instances.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    let names: HashSet<&str> = sorted.iter().map(|i| i.name.as_str()).collect();

    // Reversed edges: a dependency waits on each of its dependents.
    let mut graph = DependencyGraph::new();
    for instance in &sorted {
        let _ = graph.add_service(instance.name.as_str());
    }
    let mut stop_first: HashMap<&str, Vec<String>> = HashMap::new();
    for instance in &sorted {
        for dep in instance.depends_on.iter().filter(|d| names.contains(d.as_str())) {
            if let (Some(dependency), Some(dependent)) =
                (graph.node(dep), graph.node(&instance.name))
            {
                graph.add_dependency(dependency, dependent);
                stop_first
                    .entry(dep.as_str())
                    .or_default()
                    .push(instance.name.clone());
            }
        }
    }

    let order = graph.resolve_order().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "recorded dependencies are cyclic, stopping in name order");
        stop_first.clear();
        sorted.iter().map(|i| i.name.clone()).collect()
    });

    order
        .into_iter()
        .map(|name| {
            let after = stop_first.remove(name.as_str()).unwrap_or_default();
            PlannedAction {
                service: name,
                kind: ActionKind::Stop,
                after,
            }
        })
        .collect()
}
