//! Formatted output helpers for CLI commands.
//!
//! Formatting functions return strings so commands stay thin and the
//! layout can be tested without capturing stdout.

use std::fmt::Write as _;

use hearth_runtime::backend::InstanceState;
use hearth_runtime::plan::{ActionKind, ReconciliationPlan};
use hearth_runtime::report::{ActionStatus, CycleReport};

/// Marker shown in front of a planned action.
const fn marker(kind: &ActionKind) -> char {
    match kind {
        ActionKind::Create => '+',
        ActionKind::Recreate { .. } => '~',
        ActionKind::Stop => '-',
        ActionKind::NoOp => '=',
    }
}

/// Renders a plan, one line per action.
#[must_use]
pub fn format_plan(plan: &ReconciliationPlan) -> String {
    let mut out = String::new();
    for action in &plan.actions {
        let _ = write!(out, "  {} {:<20} {}", marker(&action.kind), action.service, action.kind);
        if !action.after.is_empty() && action.kind.is_change() {
            let _ = write!(out, " (after {})", action.after.join(", "));
        }
        out.push('\n');
    }
    for name in &plan.unresolved {
        let _ = writeln!(out, "  ! {name:<20} unresolved");
    }

    let changes = plan.actions.iter().filter(|a| a.kind.is_change()).count();
    if plan.is_noop() {
        out.push_str("\n  Everything is up to date.\n");
    } else {
        let _ = writeln!(
            out,
            "\n  {changes} change(s), {} unresolved service(s).",
            plan.unresolved.len()
        );
    }
    out
}

/// Renders a cycle report as a table followed by a summary line.
#[must_use]
pub fn format_report(report: &CycleReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<20} {:<28} {}", "SERVICE", "ACTION", "RESULT");
    for outcome in &report.outcomes {
        let action = outcome
            .action
            .as_ref()
            .map_or_else(|| "-".to_string(), ToString::to_string);
        let result = match &outcome.status {
            ActionStatus::Succeeded => "ok".to_string(),
            ActionStatus::Failed { error } => format!("failed: {error}"),
            ActionStatus::Blocked { by } => format!("blocked by {by}"),
        };
        let _ = writeln!(out, "{:<20} {action:<28} {result}", outcome.service);
    }

    let elapsed = report.finished_at - report.started_at;
    let _ = writeln!(
        out,
        "\n{}: {} changed, {} failed, {} blocked in {}.{:03}s [{}]",
        report.command,
        report.changed(),
        report.failed().count(),
        report.blocked().count(),
        elapsed.num_seconds(),
        elapsed.num_milliseconds() % 1000,
        report.cycle,
    );
    out
}

/// Renders running instances as a table.
#[must_use]
pub fn format_instances(instances: &[InstanceState]) -> String {
    if instances.is_empty() {
        return "No managed services running.\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(out, "{:<20} {:<40} {:<16} {}", "NAME", "IMAGE", "RESTART", "PORTS");
    for instance in instances {
        let ports: Vec<String> = instance.ports.iter().map(ToString::to_string).collect();
        let ports = if ports.is_empty() {
            "-".to_string()
        } else {
            ports.join(", ")
        };
        let _ = writeln!(
            out,
            "{:<20} {:<40} {:<16} {ports}",
            instance.name,
            instance.image,
            instance.restart.to_string(),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use hearth_common::types::{CycleId, PortBinding, Protocol, RestartPolicy};
    use hearth_runtime::plan::{Field, PlannedAction};
    use hearth_runtime::report::ActionOutcome;

    use super::*;

    #[test]
    fn plan_lists_markers_and_summary() {
        let plan = ReconciliationPlan {
            actions: vec![
                PlannedAction {
                    service: "old".into(),
                    kind: ActionKind::Stop,
                    after: Vec::new(),
                },
                PlannedAction {
                    service: "db".into(),
                    kind: ActionKind::NoOp,
                    after: Vec::new(),
                },
                PlannedAction {
                    service: "app".into(),
                    kind: ActionKind::Recreate {
                        changed: vec![Field::Image],
                    },
                    after: vec!["db".into()],
                },
            ],
            unresolved: vec!["extra".into()],
        };
        let text = format_plan(&plan);
        assert!(text.contains("  - old"), "got:\n{text}");
        assert!(text.contains("  = db"), "got:\n{text}");
        assert!(text.contains("recreate (image) (after db)"), "got:\n{text}");
        assert!(text.contains("  ! extra"), "got:\n{text}");
        assert!(text.contains("2 change(s), 1 unresolved service(s)."), "got:\n{text}");
    }

    #[test]
    fn empty_plan_is_up_to_date() {
        assert!(format_plan(&ReconciliationPlan::default()).contains("up to date"));
    }

    #[test]
    fn report_shows_blocked_dependency_and_counts() {
        let mut report = CycleReport::begin(CycleId::generate(), "setup");
        report.extend([
            ActionOutcome::failed("db", Some(ActionKind::Create), "engine start failed"),
            ActionOutcome::blocked("app", ActionKind::Create, "db"),
        ]);
        report.finished_at = report.started_at + chrono::Duration::milliseconds(1500);
        let text = format_report(&report);
        assert!(text.contains("failed: engine start failed"), "got:\n{text}");
        assert!(text.contains("blocked by db"), "got:\n{text}");
        assert!(text.contains("setup: 0 changed, 1 failed, 1 blocked in 1.500s"), "got:\n{text}");
    }

    #[test]
    fn instances_table_lists_ports() {
        let instance = InstanceState {
            name: "jellyfin".into(),
            image: "jellyfin/jellyfin:10.9.11".into(),
            environment: Default::default(),
            volumes: Vec::new(),
            ports: vec![PortBinding {
                host_ip: None,
                host: 7359,
                container: 7359,
                protocol: Protocol::Udp,
            }],
            restart: RestartPolicy::OnFailure,
            depends_on: Vec::new(),
        };
        let text = format_instances(&[instance]);
        assert!(text.contains("7359:7359/udp"), "got:\n{text}");
        assert!(text.contains("on-failure"), "got:\n{text}");
        assert!(format_instances(&[]).contains("No managed services"));
    }
}
