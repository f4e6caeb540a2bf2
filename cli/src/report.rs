//! Plain-text rendering of run outcomes and history for the terminal.

use std::fmt::Write;

use chrono::Local;

use ghosthand_contracts::execution::{HistorySummary, RunOutcome, StepStatus};
use ghosthand_history::QueuedGoal;

fn status_label(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Success => "ok",
        StepStatus::Failure => "FAILED",
        StepStatus::Skipped => "skipped",
    }
}

pub fn render_outcome(outcome: &RunOutcome) -> String {
    let record = &outcome.record;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "run {} [{}]{}",
        record.run_id.0,
        record.overall_status.as_str(),
        if record.dry_run { " (dry run)" } else { "" }
    );
    if let Some(reason) = &record.failure_reason {
        let _ = writeln!(out, "  reason: {}", reason);
    }

    if let Some(plan) = &record.plan {
        for (index, (action, result)) in plan.iter().zip(&record.results).enumerate() {
            let _ = writeln!(
                out,
                "  {:>2}. {:<16} {:<7} {}",
                index + 1,
                action.kind().as_str(),
                status_label(result.status),
                result.detail
            );
        }
    }

    if let Some(warning) = &outcome.store_warning {
        let _ = writeln!(out, "warning: {}", warning);
    }
    out
}

pub fn render_history(user: &str, summaries: &[HistorySummary]) -> String {
    if summaries.is_empty() {
        return format!("no history for {}\n", user);
    }
    let mut out = String::new();
    for s in summaries {
        let when = s.timestamp.format("%Y-%m-%d %H:%M:%S");
        let _ = writeln!(out, "{}  {}  -> {}", when, s.goal, s.result);
    }
    out
}

pub fn render_queue(user: &str, goals: &[QueuedGoal]) -> String {
    if goals.is_empty() {
        return format!("nothing queued for {}\n", user);
    }
    let mut out = String::new();
    for g in goals {
        let every = g.every_minutes.map(|m| format!(" (every {} min)", m)).unwrap_or_default();
        let due = g.due_at.with_timezone(&Local).format("%Y-%m-%d %H:%M");
        let _ = writeln!(out, "{}  {}{}  {}", g.id, due, every, g.goal);
    }
    out
}
