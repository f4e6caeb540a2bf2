//! Seam traits between the orchestrator and its collaborators.
//!
//! - `Planner` turns goal text or plan text into a validated `Plan`
//! - `ActionExecutor` performs one action and is opaque to the core
//! - `HistoryStore` is the append-only record of finished runs
//! - `IdentityVerifier` is the yes/no gate consulted before privileged actions
//!
//! The orchestrator only talks to these traits. Concrete implementations
//! live in the planner, history and capabilities crates.

use ghosthand_contracts::{
    action::Parameters,
    error::GhosthandResult,
    execution::{RunRecord, StepResult},
    plan::Plan,
};

/// Produces plans. Implementations must be deterministic for a given input.
pub trait Planner: Send + Sync {
    /// Translate a natural-language goal into a plan.
    ///
    /// `similar_history` holds past runs with similar goals. It is a hint
    /// for breaking ties between equally good rules and is never required
    /// for a correct answer.
    ///
    /// Returns `UnplannableGoal` when no valid plan can be produced.
    fn plan_from_goal(
        &self,
        goal_text: &str,
        user: &str,
        similar_history: &[RunRecord],
    ) -> GhosthandResult<Plan>;

    /// Parse an authored plan, bypassing translation entirely.
    ///
    /// Uses the same validation path as `plan_from_goal`, so
    /// `plan_from_text(&plan.to_text()?)` yields `plan` again.
    fn plan_from_text(&self, plan_text: &str) -> GhosthandResult<Plan>;
}

/// The single-method contract every capability module satisfies.
///
/// Executors are considered **opaque**: they may touch the filesystem, send
/// mail, or drive the desktop. Any `Err` they return, and any panic they
/// raise, is converted into a `failure` `StepResult` by the orchestrator.
pub trait ActionExecutor: Send + Sync {
    /// Perform one action. `parameters` has already been validated against
    /// the action kind's schema.
    fn execute(&self, parameters: &Parameters) -> GhosthandResult<StepResult>;
}

/// The run history: an append-only log of `RunRecord`s.
///
/// Implementations must make `append` a single atomic insert: concurrent
/// writers never observe a partially written record.
pub trait HistoryStore: Send + Sync {
    /// Append one record. There is no update or delete path.
    fn append(&self, record: &RunRecord) -> GhosthandResult<()>;

    /// All records for `user`, most recent first.
    fn query_by_user(&self, user: &str) -> GhosthandResult<Vec<RunRecord>>;

    /// Records for `user` whose goal text scores at least `threshold`
    /// against `goal_text`, best match first, ties most recent first.
    fn fuzzy_match(
        &self,
        goal_text: &str,
        user: &str,
        threshold: f64,
    ) -> GhosthandResult<Vec<RunRecord>>;

    /// Distinct users with at least one record.
    fn list_users(&self) -> GhosthandResult<Vec<String>>;
}

/// The identity collaborator (voice print, passphrase, …).
///
/// The core never inspects samples; it only records whether enrollment
/// succeeded and whether a verification attempt passed.
pub trait IdentityVerifier: Send + Sync {
    /// Register `sample` as the reference credential for `user`.
    fn enroll(&self, user: &str, sample: &[u8]) -> GhosthandResult<()>;

    /// Check `sample` against the enrolled credential for `user`.
    fn verify(&self, user: &str, sample: &[u8]) -> GhosthandResult<bool>;

    /// True if `user` has an enrolled credential.
    fn is_enrolled(&self, user: &str) -> bool;
}
