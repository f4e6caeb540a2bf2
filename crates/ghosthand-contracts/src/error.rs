//! Error taxonomy for the Ghosthand orchestration core.
//!
//! Every fallible operation in the workspace returns `GhosthandResult<T>`.
//! Step-level variants are recovered into `StepResult`s by the orchestrator;
//! only construction and configuration errors ever reach a caller directly.

use thiserror::Error;

/// The unified error type for the Ghosthand runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GhosthandError {
    /// An action kind outside the closed action set was named.
    #[error("unknown action kind '{kind}'")]
    UnknownActionKind { kind: String },

    /// An action's parameters do not match the schema of its kind.
    #[error("invalid parameters for '{kind}': {reason}")]
    InvalidParameters { kind: String, reason: String },

    /// A plan with no actions was constructed.
    #[error("a plan must contain at least one action")]
    EmptyPlan,

    /// Plan text could not be parsed or serialized.
    #[error("plan text could not be parsed: {reason}")]
    PlanParse { reason: String },

    /// Neither the heuristic rules nor the generative fallback produced a plan.
    #[error("goal could not be planned: {reason}")]
    UnplannableGoal { reason: String },

    /// The goal guard refused a goal or a submitting user before planning.
    #[error("goal rejected: {reason}")]
    GoalRejected { reason: String },

    /// The action kind is valid but nothing in this deployment executes it.
    #[error("no executor registered for action kind '{kind}'")]
    NoExecutorRegistered { kind: String },

    /// An executor reported a runtime failure while performing one action.
    #[error("executor for '{kind}' failed: {reason}")]
    ExecutorFailure { kind: String, reason: String },

    /// The history store's backing persistence could not be reached.
    #[error("history store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    /// An orchestrator-internal invariant broke (e.g. a poisoned registry).
    #[error("integrity failure: {reason}")]
    IntegrityFailure { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// The identity collaborator rejected or could not complete enrollment.
    #[error("enrollment failed for '{user}': {reason}")]
    EnrollmentFailed { user: String, reason: String },
}

impl GhosthandError {
    /// Shorthand used by executors to report a failure for `kind`.
    pub fn executor(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExecutorFailure {
            kind: kind.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for `StoreUnavailable`.
    pub fn store(reason: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the Ghosthand crates.
pub type GhosthandResult<T> = Result<T, GhosthandError>;
