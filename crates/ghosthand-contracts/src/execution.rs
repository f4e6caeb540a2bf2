//! Step-level results and the persisted run record.
//!
//! `StepResult` is what one executor invocation (or the orchestrator acting
//! in its place) produces. `RunRecord` is what gets appended to the history
//! store, exactly one per run, never modified afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::plan::Plan;

/// Detail recorded for every step of a dry run.
pub const DRY_RUN_DETAIL: &str = "dry run";
/// Detail recorded when a privileged step is blocked by the identity gate.
pub const PRIVILEGED_BLOCKED_DETAIL: &str = "privileged action blocked";
/// Detail recorded when an `enroll-user` step targets someone other than the
/// submitting user, or re-enrolls an enrolled user without verified identity.
pub const ENROLLMENT_BLOCKED_DETAIL: &str =
    "enrollment blocked: only the verified submitting user may enroll";
/// Detail recorded when an executor exceeds the step timeout.
pub const TIMED_OUT_DETAIL: &str = "timed out";
/// Detail recorded for steps not dispatched because the run was cancelled.
pub const CANCELLED_DETAIL: &str = "cancelled";
/// Detail recorded for steps not dispatched because the run aborted.
pub const ABORTED_DETAIL: &str = "not executed: run aborted";

/// Outcome class of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failure,
    Skipped,
}

/// The outcome of executing (or declining to execute) one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub status: StepStatus,
    /// Free-form diagnostic text.
    pub detail: String,
    /// Optional output. No later step reads it; it exists for display and audit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub produced_value: Option<Value>,
}

impl StepResult {
    pub fn success(detail: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Success,
            detail: detail.into(),
            produced_value: None,
        }
    }

    pub fn success_with(detail: impl Into<String>, value: Value) -> Self {
        Self {
            status: StepStatus::Success,
            detail: detail.into(),
            produced_value: Some(value),
        }
    }

    pub fn failure(detail: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Failure,
            detail: detail.into(),
            produced_value: None,
        }
    }

    pub fn skipped(detail: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Skipped,
            detail: detail.into(),
            produced_value: None,
        }
    }
}

/// Aggregate status of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every step succeeded, or the run was a dry run.
    Success,
    /// A mix of outcomes.
    Partial,
    /// Every step failed, or the run aborted.
    Failed,
}

impl RunStatus {
    /// Compute the status of a run that reached `Completed`.
    ///
    /// Dry runs are successful by definition. Otherwise all-success is
    /// `Success`, all-failure is `Failed`, and anything else (including
    /// steps skipped by the identity gate or a missing executor) is
    /// `Partial`.
    pub fn from_results(results: &[StepResult], dry_run: bool) -> Self {
        if dry_run {
            return RunStatus::Success;
        }
        if results.iter().all(|r| r.status == StepStatus::Success) {
            RunStatus::Success
        } else if results.iter().all(|r| r.status == StepStatus::Failure) {
            RunStatus::Failed
        } else {
            RunStatus::Partial
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }
}

/// Unique identifier for one orchestrator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub uuid::Uuid);

impl RunId {
    /// Create a new, unique run ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

/// The persisted, immutable outcome of one goal or plan submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    /// Wall-clock time the run finished (UTC).
    pub timestamp: DateTime<Utc>,
    pub user: String,
    /// The original instruction, or empty when a plan was submitted directly.
    pub goal_text: String,
    /// The plan executed. Absent only when planning itself failed.
    pub plan: Option<Plan>,
    /// One result per plan action, in plan order.
    pub results: Vec<StepResult>,
    pub dry_run: bool,
    pub overall_status: RunStatus,
    /// Why the run aborted, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl RunRecord {
    /// Number of actions in the plan (0 when planning failed).
    pub fn step_count(&self) -> usize {
        self.plan.as_ref().map_or(0, Plan::len)
    }

    /// One-line description of the outcome, e.g. `"partial: 1 ok, 0 failed, 1 skipped"`.
    pub fn result_line(&self) -> String {
        if let Some(reason) = &self.failure_reason {
            return format!("{}: {}", self.overall_status.as_str(), reason);
        }
        let count = |status| self.results.iter().filter(|r| r.status == status).count();
        format!(
            "{}: {} ok, {} failed, {} skipped",
            self.overall_status.as_str(),
            count(StepStatus::Success),
            count(StepStatus::Failure),
            count(StepStatus::Skipped),
        )
    }

    /// Project this record into the display form used by front ends.
    pub fn summary(&self) -> HistorySummary {
        let goal = if self.goal_text.is_empty() {
            let kinds: Vec<&str> = self
                .plan
                .iter()
                .flat_map(|p| p.iter().map(|a| a.kind().as_str()))
                .collect();
            format!("direct: {}", kinds.join(" → "))
        } else {
            self.goal_text.clone()
        };
        HistorySummary {
            timestamp: self.timestamp,
            goal,
            result: self.result_line(),
        }
    }
}

/// Display projection of a `RunRecord`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub timestamp: DateTime<Utc>,
    pub goal: String,
    pub result: String,
}

/// What a submission returns to its caller.
///
/// `store_warning` is set when the record could not be appended to the
/// history store. The record itself is still complete and returned.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub record: RunRecord,
    pub store_warning: Option<String>,
}

impl RunOutcome {
    /// True if the record reached the history store.
    pub fn is_recorded(&self) -> bool {
        self.store_warning.is_none()
    }
}
