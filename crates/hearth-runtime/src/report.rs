//! Per-service outcomes of a reconciliation cycle.

use chrono::{DateTime, Utc};
use hearth_common::types::CycleId;
use hearth_compose::resolver::UnresolvedService;
use serde::{Deserialize, Serialize};

use crate::plan::ActionKind;

/// How one action ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ActionStatus {
    /// The action completed, or there was nothing to do.
    Succeeded,
    /// The action failed.
    Failed {
        /// Error message.
        error: String,
    },
    /// The action was skipped because a dependency's action did not succeed.
    Blocked {
        /// The dependency that failed or was itself blocked.
        by: String,
    },
}

/// Outcome of one service in a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Service or instance name.
    pub service: String,
    /// The action attempted; `None` for services that failed resolution
    /// and never got a plan entry.
    pub action: Option<ActionKind>,
    /// Result.
    #[serde(flatten)]
    pub status: ActionStatus,
}

impl ActionOutcome {
    /// Builds a successful outcome.
    #[must_use]
    pub fn succeeded(service: impl Into<String>, action: ActionKind) -> Self {
        Self {
            service: service.into(),
            action: Some(action),
            status: ActionStatus::Succeeded,
        }
    }

    /// Builds a failed outcome.
    #[must_use]
    pub fn failed(
        service: impl Into<String>,
        action: Option<ActionKind>,
        error: impl ToString,
    ) -> Self {
        Self {
            service: service.into(),
            action,
            status: ActionStatus::Failed {
                error: error.to_string(),
            },
        }
    }

    /// Builds a blocked outcome.
    #[must_use]
    pub fn blocked(service: impl Into<String>, action: ActionKind, by: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            action: Some(action),
            status: ActionStatus::Blocked { by: by.into() },
        }
    }

    /// Returns `true` if the action succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, ActionStatus::Succeeded)
    }
}

/// Report of one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Cycle identifier, also attached to the cycle's log span.
    pub cycle: CycleId,
    /// Command that ran the cycle (`setup`, `update`, `stop`).
    pub command: String,
    /// When the cycle started.
    pub started_at: DateTime<Utc>,
    /// When the cycle finished.
    pub finished_at: DateTime<Utc>,
    /// Outcomes: stops first, then service actions, then resolution failures.
    pub outcomes: Vec<ActionOutcome>,
}

impl CycleReport {
    /// Starts an empty report.
    #[must_use]
    pub fn begin(cycle: CycleId, command: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            cycle,
            command: command.into(),
            started_at: now,
            finished_at: now,
            outcomes: Vec::new(),
        }
    }

    /// Appends outcomes.
    pub fn extend(&mut self, outcomes: impl IntoIterator<Item = ActionOutcome>) {
        self.outcomes.extend(outcomes);
    }

    /// Records services that failed resolution as failed.
    pub fn record_unresolved(&mut self, unresolved: &[UnresolvedService]) {
        self.outcomes
            .extend(unresolved.iter().map(|u| ActionOutcome::failed(&u.name, None, &u.error)));
    }

    /// Stamps the finish time.
    pub fn finish(&mut self) {
        self.finished_at = Utc::now();
    }

    /// Returns `true` if no outcome failed or was blocked.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(ActionOutcome::is_success)
    }

    /// Failed outcomes.
    pub fn failed(&self) -> impl Iterator<Item = &ActionOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ActionStatus::Failed { .. }))
    }

    /// Blocked outcomes.
    pub fn blocked(&self) -> impl Iterator<Item = &ActionOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ActionStatus::Blocked { .. }))
    }

    /// Number of outcomes that changed the engine state.
    #[must_use]
    pub fn changed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.is_success() && o.action.as_ref().is_some_and(ActionKind::is_change))
            .count()
    }

    /// Looks up the outcome for `service`.
    #[must_use]
    pub fn outcome(&self, service: &str) -> Option<&ActionOutcome> {
        self.outcomes.iter().find(|o| o.service == service)
    }
}

#[cfg(test)]
mod tests {
    use hearth_common::error::HearthError;

    use super::*;

    #[test]
    fn report_with_blocked_outcome_is_not_a_success() {
        let mut report = CycleReport::begin(CycleId::generate(), "setup");
        report.extend([
            ActionOutcome::succeeded("db", ActionKind::NoOp),
            ActionOutcome::blocked("app", ActionKind::Create, "db"),
        ]);
        report.finish();
        assert!(!report.is_success());
        assert_eq!(report.blocked().count(), 1);
        assert_eq!(report.changed(), 0);
        assert!(report.finished_at >= report.started_at);
    }

    #[test]
    fn unresolved_services_are_reported_failed_without_action() {
        let mut report = CycleReport::begin(CycleId::generate(), "setup");
        report.record_unresolved(&[UnresolvedService {
            name: "extra".into(),
            error: HearthError::UnresolvedPlaceholder {
                service: "extra".into(),
                field: "image".into(),
                key: "TAG".into(),
            },
        }]);
        let outcome = report.outcome("extra").unwrap();
        assert_eq!(outcome.action, None);
        assert!(matches!(&outcome.status, ActionStatus::Failed { error } if error.contains("TAG")));
    }

    #[test]
    fn outcome_json_is_flat() {
        let outcome = ActionOutcome::blocked("app", ActionKind::Create, "db");
        let json = serde_json::to_value(outcome).unwrap();
        assert_eq!(json["status"], "blocked");
        assert_eq!(json["by"], "db");
        assert_eq!(json["action"]["kind"], "create");
    }
}
