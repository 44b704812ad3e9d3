//! Reconciliation of desired service state against a container engine.
//!
//! - [`backend`]: the [`EngineAdapter`](backend::EngineAdapter) boundary and its
//!   implementations.
//! - [`plan`]: diffing desired against running state into a
//!   [`ReconciliationPlan`](plan::ReconciliationPlan).
//! - [`executor`]: dependency-aware, bounded-concurrency execution of planned actions.
//! - [`reconciler`]: the cycle-locked `setup`, `update`, and `stop` flows.
//! - [`report`]: per-service outcomes of a cycle.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod backend;
pub mod executor;
pub mod plan;
pub mod reconciler;
pub mod report;
