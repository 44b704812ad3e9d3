//! Reconciliation cycles.
//!
//! A cycle takes one snapshot of the engine's running state, plans against
//! it, stops orphans, then applies service actions. Only one cycle runs at
//! a time per [`Reconciler`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hearth_common::config::HearthConfig;
use hearth_common::error::{HearthError, Result};
use hearth_common::types::CycleId;
use hearth_compose::resolver::ResolvedCatalog;
use tokio::sync::{Mutex, MutexGuard};
use tracing::Instrument;

use crate::backend::{EngineAdapter, InstanceState};
use crate::executor::{self, ExecutorOptions};
use crate::plan::{self, PlannedAction, ReconciliationPlan};
use crate::report::CycleReport;

/// Drives an engine toward the state a resolved catalog declares.
pub struct Reconciler {
    engine: Arc<dyn EngineAdapter>,
    options: ExecutorOptions,
    cycle_lock: Mutex<()>,
}

impl Reconciler {
    /// Creates a reconciler over `engine`.
    #[must_use]
    pub fn new(engine: Arc<dyn EngineAdapter>, options: ExecutorOptions) -> Self {
        Self {
            engine,
            options,
            cycle_lock: Mutex::new(()),
        }
    }

    /// Creates a reconciler using the worker and timeout settings of `config`.
    #[must_use]
    pub fn from_config(engine: Arc<dyn EngineAdapter>, config: &HearthConfig) -> Self {
        Self::new(
            engine,
            ExecutorOptions {
                workers: config.effective_workers(),
                action_timeout: config.action_timeout(),
                pull_images: false,
            },
        )
    }

    fn lock_cycle(&self) -> Result<MutexGuard<'_, ()>> {
        self.cycle_lock
            .try_lock()
            .map_err(|_| HearthError::CycleInProgress)
    }

    /// Fetches the running managed instances.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be listed in time.
    pub async fn snapshot(&self) -> Result<Vec<InstanceState>> {
        let running = executor::engine_call(
            &self.engine,
            "list",
            "*",
            self.options.action_timeout,
            |engine| engine.list_running(),
        )
        .await?;
        tracing::debug!(running = running.len(), "engine snapshot taken");
        Ok(running)
    }

    /// Computes the plan for `resolved` without changing anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be listed.
    pub async fn plan(&self, resolved: &ResolvedCatalog) -> Result<ReconciliationPlan> {
        let running = self.snapshot().await?;
        Ok(plan::plan(resolved, &running))
    }

    /// Runs one cycle toward `resolved`.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::CycleInProgress`] if another cycle holds the
    /// lock, or an error if the engine cannot be listed. Action failures are
    /// recorded in the report instead.
    pub async fn reconcile(&self, resolved: &ResolvedCatalog) -> Result<CycleReport> {
        let _guard = self.lock_cycle()?;
        let mut report = CycleReport::begin(CycleId::generate(), "reconcile");
        let span = cycle_span(&report);
        self.run_cycle(&mut report, resolved, &self.options)
            .instrument(span)
            .await?;
        Ok(report)
    }

    /// Prepares data directories under `data_dir`, then runs one cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created, or as
    /// [`Reconciler::reconcile`].
    pub async fn setup(&self, resolved: &ResolvedCatalog, data_dir: &Path) -> Result<CycleReport> {
        let _guard = self.lock_cycle()?;
        let mut report = CycleReport::begin(CycleId::generate(), "setup");
        let span = cycle_span(&report);
        async {
            prepare_data_dirs(data_dir, resolved).await?;
            self.run_cycle(&mut report, resolved, &self.options).await
        }
        .instrument(span)
        .await?;
        Ok(report)
    }

    /// Stops every managed instance, then runs one cycle pulling each image
    /// before starting it. Instances of services that failed resolution are
    /// neither stopped nor restarted.
    ///
    /// # Errors
    ///
    /// As [`Reconciler::reconcile`].
    pub async fn update(&self, resolved: &ResolvedCatalog) -> Result<CycleReport> {
        let _guard = self.lock_cycle()?;
        let mut report = CycleReport::begin(CycleId::generate(), "update");
        let span = cycle_span(&report);
        let options = ExecutorOptions {
            pull_images: true,
            ..self.options.clone()
        };
        async {
            // Unresolved services could not be started again; leave them running.
            let running: Vec<InstanceState> = self
                .snapshot()
                .await?
                .into_iter()
                .filter(|r| !resolved.unresolved.iter().any(|u| u.name == r.name))
                .collect();
            let stops = plan::stop_plan(&running);
            report.extend(self.run_phase("stop", &stops, resolved, &self.options).await);
            self.run_cycle(&mut report, resolved, &options).await
        }
        .instrument(span)
        .await?;
        Ok(report)
    }

    /// Stops every managed instance, dependents first.
    ///
    /// # Errors
    ///
    /// As [`Reconciler::reconcile`].
    pub async fn stop_all(&self) -> Result<CycleReport> {
        let _guard = self.lock_cycle()?;
        let mut report = CycleReport::begin(CycleId::generate(), "stop");
        let span = cycle_span(&report);
        async {
            let running = self.snapshot().await?;
            let stops = plan::stop_plan(&running);
            report.extend(
                self.run_phase("stop", &stops, &ResolvedCatalog::default(), &self.options)
                    .await,
            );
            report.finish();
            Ok::<_, HearthError>(())
        }
        .instrument(span)
        .await?;
        Ok(report)
    }

    async fn run_cycle(
        &self,
        report: &mut CycleReport,
        resolved: &ResolvedCatalog,
        options: &ExecutorOptions,
    ) -> Result<()> {
        let running = self.snapshot().await?;
        let plan = plan::plan(resolved, &running);
        tracing::info!(
            actions = plan.actions.len(),
            unresolved = plan.unresolved.len(),
            noop = plan.is_noop(),
            "plan computed"
        );

        let stops: Vec<PlannedAction> = plan.stop_actions().cloned().collect();
        let services: Vec<PlannedAction> = plan.service_actions().cloned().collect();
        report.extend(self.run_phase("orphans", &stops, resolved, options).await);
        report.extend(self.run_phase("services", &services, resolved, options).await);
        report.record_unresolved(&resolved.unresolved);
        report.finish();

        tracing::info!(
            changed = report.changed(),
            failed = report.failed().count(),
            blocked = report.blocked().count(),
            "cycle finished"
        );
        Ok(())
    }

    async fn run_phase(
        &self,
        phase: &'static str,
        actions: &[PlannedAction],
        resolved: &ResolvedCatalog,
        options: &ExecutorOptions,
    ) -> Vec<crate::report::ActionOutcome> {
        if actions.is_empty() {
            return Vec::new();
        }
        tracing::info!(phase, actions = actions.len(), "phase started");
        executor::execute(actions, resolved, &self.engine, options).await
    }
}

fn cycle_span(report: &CycleReport) -> tracing::Span {
    tracing::info_span!("cycle", id = %report.cycle, command = %report.command)
}

/// Directories `setup` creates: the data directory and the parent of every
/// volume host path under it.
#[must_use]
pub fn data_dirs(data_dir: &Path, resolved: &ResolvedCatalog) -> BTreeSet<PathBuf> {
    let mut dirs = BTreeSet::new();
    let _ = dirs.insert(data_dir.to_path_buf());
    for service in &resolved.services {
        for volume in &service.volumes {
            if let Some(parent) = volume.host.parent().filter(|p| p.starts_with(data_dir)) {
                let _ = dirs.insert(parent.to_path_buf());
            }
        }
    }
    dirs
}

async fn prepare_data_dirs(data_dir: &Path, resolved: &ResolvedCatalog) -> Result<()> {
    for dir in data_dirs(data_dir, resolved) {
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| HearthError::Io {
                path: dir.clone(),
                source: e,
            })?;
        tracing::debug!(dir = %dir.display(), "data directory ready");
    }
    Ok(())
}
