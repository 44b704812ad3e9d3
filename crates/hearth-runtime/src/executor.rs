//! Dependency-aware execution of planned actions.
//!
//! An action is handed to the worker pool once every action it waits on has
//! succeeded. A failure marks its direct and transitive dependents blocked;
//! independent branches keep going. Engine calls are blocking, so each runs
//! on the blocking thread pool under a timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hearth_common::constants::{DEFAULT_ACTION_TIMEOUT_SECS, DEFAULT_WORKERS};
use hearth_common::error::{HearthError, Result};
use hearth_compose::resolver::{ResolvedCatalog, ResolvedDescriptor};
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};

use crate::backend::EngineAdapter;
use crate::plan::{ActionKind, PlannedAction};
use crate::report::ActionOutcome;

/// Tuning for one execution.
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Maximum number of engine calls in flight.
    pub workers: usize,
    /// Limit for a single action.
    pub action_timeout: Duration,
    /// Pull the image before each create or recreate.
    pub pull_images: bool,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            action_timeout: Duration::from_secs(DEFAULT_ACTION_TIMEOUT_SECS),
            pull_images: false,
        }
    }
}

/// Runs `f` against the engine on the blocking pool, bounded by `limit`.
///
/// A timeout is reported as a failure; the engine call itself keeps running
/// on its thread until the engine returns.
pub(crate) async fn engine_call<T, F>(
    engine: &Arc<dyn EngineAdapter>,
    operation: &'static str,
    target: &str,
    limit: Duration,
    f: F,
) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn EngineAdapter) -> Result<T> + Send + 'static,
{
    let engine = Arc::clone(engine);
    let handle = tokio::task::spawn_blocking(move || f(engine.as_ref()));
    match tokio::time::timeout(limit, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(HearthError::Engine {
            operation,
            service: target.to_string(),
            message: format!("engine call aborted: {join}"),
        }),
        Err(_) => Err(HearthError::Timeout {
            operation,
            service: target.to_string(),
            limit,
        }),
    }
}

/// The engine work behind one action.
fn apply(
    engine: &dyn EngineAdapter,
    kind: &ActionKind,
    name: &str,
    service: Option<&ResolvedDescriptor>,
    pull: bool,
) -> Result<()> {
    match (kind, service) {
        (ActionKind::NoOp, _) => Ok(()),
        (ActionKind::Stop, _) => engine.stop(name),
        (ActionKind::Create | ActionKind::Recreate { .. }, Some(service)) => {
            if pull {
                engine.pull(&service.image)?;
            }
            if matches!(kind, ActionKind::Recreate { .. }) {
                engine.stop(name)?;
            }
            engine.start(service)
        }
        (_, None) => Err(HearthError::NotFound {
            kind: "resolved service",
            id: name.to_string(),
        }),
    }
}

enum Readiness<'a> {
    Ready,
    Waiting,
    Blocked(&'a str),
}

fn readiness<'a>(
    action: &'a PlannedAction,
    index: &HashMap<&str, usize>,
    outcomes: &[Option<ActionOutcome>],
) -> Readiness<'a> {
    let mut waiting = false;
    for dep in &action.after {
        // Dependencies outside this batch are already settled.
        let Some(&j) = index.get(dep.as_str()) else {
            continue;
        };
        match &outcomes[j] {
            Some(outcome) if outcome.is_success() => {}
            Some(_) => return Readiness::Blocked(dep),
            None => waiting = true,
        }
    }
    if waiting {
        Readiness::Waiting
    } else {
        Readiness::Ready
    }
}

/// Executes `actions`, returning one outcome per action in the same order.
pub async fn execute(
    actions: &[PlannedAction],
    catalog: &ResolvedCatalog,
    engine: &Arc<dyn EngineAdapter>,
    options: &ExecutorOptions,
) -> Vec<ActionOutcome> {
    let index: HashMap<&str, usize> = actions
        .iter()
        .enumerate()
        .map(|(i, a)| (a.service.as_str(), i))
        .collect();
    let mut outcomes: Vec<Option<ActionOutcome>> = vec![None; actions.len()];
    let mut scheduled = vec![false; actions.len()];
    let semaphore = Arc::new(Semaphore::new(options.workers.max(1)));
    let mut tasks: JoinSet<Result<()>> = JoinSet::new();
    let mut in_flight: HashMap<Id, usize> = HashMap::new();

    loop {
        let mut settled_any = true;
        while settled_any {
            settled_any = false;
            for (i, action) in actions.iter().enumerate() {
                if scheduled[i] {
                    continue;
                }
                match readiness(action, &index, &outcomes) {
                    Readiness::Waiting => {}
                    Readiness::Blocked(by) => {
                        tracing::warn!(
                            service = %action.service,
                            blocked_by = by,
                            "action blocked"
                        );
                        let kind = action.kind.clone();
                        outcomes[i] = Some(ActionOutcome::blocked(&action.service, kind, by));
                        scheduled[i] = true;
                        settled_any = true;
                    }
                    Readiness::Ready if action.kind == ActionKind::NoOp => {
                        tracing::debug!(service = %action.service, "up to date");
                        outcomes[i] =
                            Some(ActionOutcome::succeeded(&action.service, ActionKind::NoOp));
                        scheduled[i] = true;
                        settled_any = true;
                    }
                    Readiness::Ready => {
                        scheduled[i] = true;
                        let id =
                            spawn_action(&mut tasks, action, catalog, engine, options, &semaphore);
                        let _ = in_flight.insert(id, i);
                    }
                }
            }
        }

        let Some(joined) = tasks.join_next_with_id().await else {
            break;
        };
        let (id, result) = match joined {
            Ok((id, result)) => (id, result),
            Err(e) => {
                let id = e.id();
                let message = e.to_string();
                let service = in_flight
                    .get(&id)
                    .map_or_else(String::new, |&i| actions[i].service.clone());
                (
                    id,
                    Err(HearthError::Engine {
                        operation: "execute",
                        service,
                        message,
                    }),
                )
            }
        };
        let Some(i) = in_flight.remove(&id) else {
            continue;
        };
        let action = &actions[i];
        outcomes[i] = Some(match result {
            Ok(()) => {
                tracing::info!(
                    service = %action.service,
                    action = %action.kind,
                    "action succeeded"
                );
                ActionOutcome::succeeded(&action.service, action.kind.clone())
            }
            Err(e) => {
                tracing::warn!(
                    service = %action.service,
                    action = %action.kind,
                    error = %e,
                    "action failed"
                );
                ActionOutcome::failed(&action.service, Some(action.kind.clone()), e)
            }
        });
    }

    outcomes
        .into_iter()
        .zip(actions)
        .map(|(outcome, action)| {
            outcome.unwrap_or_else(|| {
                let by = action.after.first().cloned().unwrap_or_default();
                ActionOutcome::blocked(&action.service, action.kind.clone(), by)
            })
        })
        .collect()
}

fn spawn_action(
    tasks: &mut JoinSet<Result<()>>,
    action: &PlannedAction,
    catalog: &ResolvedCatalog,
    engine: &Arc<dyn EngineAdapter>,
    options: &ExecutorOptions,
    semaphore: &Arc<Semaphore>,
) -> Id {
    let name = action.service.clone();
    let kind = action.kind.clone();
    let service = catalog.get(&name).cloned();
    let engine = Arc::clone(engine);
    let semaphore = Arc::clone(semaphore);
    let limit = options.action_timeout;
    let pull = options.pull_images;

    tasks
        .spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| HearthError::Engine {
                    operation: kind.operation(),
                    service: name.clone(),
                    message: e.to_string(),
                })?;
            tracing::info!(service = %name, action = %kind, "action started");
            let target = name.clone();
            engine_call(&engine, kind.operation(), &target, limit, move |engine| {
                apply(engine, &kind, &name, service.as_ref(), pull)
            })
            .await
        })
        .id()
}
