//! The Ghosthand orchestrator: drives one plan through the capability
//! registry and records the outcome.
//!
//! Every submission walks the same state machine:
//!
//!   Idle → Planning → Executing → Completed
//!              │           │
//!              └──────► Aborted ◄┘
//!
//! Within `Executing`, each action goes through the same gates in order:
//!
//!   Cancel check → Guard → Dry run → Identity gate → Enrollment gate
//!     → Registry resolve → Execute
//!
//! Before any of that, the goal guard may refuse the whole submission; the
//! run is then recorded as aborted without reaching the planner.
//!
//! The enrollment gate only applies to `enroll-user`: the target must be the
//! submitting user, and replacing an existing enrollment needs that user's
//! verified identity even when `require_identity` is off.
//!
//! Step-level problems (guard, identity gate, missing executor, executor
//! errors, panics, timeouts) are recovered into a `StepResult` and the run
//! continues. Only a guard refusal, a planning failure, a cancellation, or
//! an orchestrator-internal integrity failure aborts a run. Either way exactly
//! one `RunRecord` is handed to the history store.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{mpsc, Arc},
    thread,
    time::Duration,
};

use chrono::Utc;
use tracing::{debug, info, warn};

use ghosthand_contracts::{
    action::{Action, ActionKind, Parameters},
    context::{EnrollmentStatus, IdentityStatus, RunContext},
    error::{GhosthandError, GhosthandResult},
    execution::{
        HistorySummary, RunId, RunOutcome, RunRecord, RunStatus, StepResult, ABORTED_DETAIL,
        CANCELLED_DETAIL, DRY_RUN_DETAIL, ENROLLMENT_BLOCKED_DETAIL, PRIVILEGED_BLOCKED_DETAIL,
        TIMED_OUT_DETAIL,
    },
    plan::Plan,
};

use crate::{
    guard::GoalGuard,
    ledger::EnrollmentLedger,
    registry::CapabilityRegistry,
    traits::{ActionExecutor, HistoryStore, IdentityVerifier, Planner},
};

/// Lifecycle of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Planning,
    Executing,
    Completed,
    Aborted,
}

impl RunState {
    /// Return true if the state machine allows moving from `self` to `next`.
    pub fn permits(self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::Idle, RunState::Planning)
                | (RunState::Planning, RunState::Executing)
                | (RunState::Planning, RunState::Aborted)
                | (RunState::Executing, RunState::Completed)
                | (RunState::Executing, RunState::Aborted)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Aborted)
    }
}

/// Deployment-level knobs for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// When false, privileged actions run without an identity check.
    pub require_identity: bool,
    /// Upper bound on one executor call. `None` runs executors inline.
    pub step_timeout: Option<Duration>,
    /// Minimum similarity for a past run to count as a planning hint.
    pub fuzzy_threshold: f64,
    /// Maximum number of planning hints passed to the planner.
    pub max_hints: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            require_identity: true,
            step_timeout: None,
            fuzzy_threshold: 0.6,
            max_hints: 3,
        }
    }
}

/// Mutable state of one in-flight run. Owned exclusively by the call that
/// created it and dropped once its `RunRecord` has been built.
struct Run<'a> {
    id: RunId,
    ctx: &'a RunContext,
    state: RunState,
    goal_text: String,
    plan: Option<Plan>,
    results: Vec<StepResult>,
    failure_reason: Option<String>,
}

impl<'a> Run<'a> {
    fn start(ctx: &'a RunContext, goal_text: &str) -> Self {
        let mut run = Self {
            id: RunId::new(),
            ctx,
            state: RunState::Idle,
            goal_text: goal_text.to_string(),
            plan: None,
            results: Vec::new(),
            failure_reason: None,
        };
        run.advance(RunState::Planning);
        run
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.state.permits(next),
            "illegal run transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(
            run_id = %self.id.0,
            user = %self.ctx.user,
            from = ?self.state,
            to = ?next,
            "run state transition"
        );
        self.state = next;
    }

    fn abort(&mut self, reason: String) {
        warn!(run_id = %self.id.0, user = %self.ctx.user, reason = %reason, "run aborted");
        self.failure_reason = Some(reason);
        self.advance(RunState::Aborted);
    }

    /// Pad `results` so every plan action has exactly one result.
    fn fill_remaining(&mut self, total: usize, detail: &str) {
        while self.results.len() < total {
            self.results.push(StepResult::skipped(detail));
        }
    }

    fn into_record(self) -> RunRecord {
        let overall_status = match self.state {
            RunState::Completed => RunStatus::from_results(&self.results, self.ctx.dry_run),
            _ => RunStatus::Failed,
        };
        RunRecord {
            run_id: self.id,
            timestamp: Utc::now(),
            user: self.ctx.user.clone(),
            goal_text: self.goal_text,
            plan: self.plan,
            results: self.results,
            dry_run: self.ctx.dry_run,
            overall_status,
            failure_reason: self.failure_reason,
        }
    }
}

/// Drives goal and plan submissions from planning through to history.
///
/// One `Orchestrator` serves any number of concurrent submissions: every
/// call builds its own run state, and the registry, history store and
/// ledger are shared behind `Arc`s.
pub struct Orchestrator {
    planner: Arc<dyn Planner>,
    registry: Arc<CapabilityRegistry>,
    history: Arc<dyn HistoryStore>,
    identity: Option<Arc<dyn IdentityVerifier>>,
    ledger: Arc<EnrollmentLedger>,
    guard: GoalGuard,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    /// Create an orchestrator with default settings and no identity
    /// verifier (privileged actions stay blocked until one is attached or
    /// `require_identity` is turned off).
    pub fn new(
        planner: Arc<dyn Planner>,
        registry: Arc<CapabilityRegistry>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            planner,
            registry,
            history,
            identity: None,
            ledger: Arc::new(EnrollmentLedger::new()),
            guard: GoalGuard::default(),
            settings: OrchestratorSettings::default(),
        }
    }

    pub fn with_guard(mut self, guard: GoalGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_identity_verifier(mut self, verifier: Arc<dyn IdentityVerifier>) -> Self {
        self.identity = Some(verifier);
        self
    }

    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn ledger(&self) -> &EnrollmentLedger {
        &self.ledger
    }

    // ── Boundary operations ──────────────────────────────────────────────────

    /// Plan `goal_text` and execute the result.
    ///
    /// Always returns a complete `RunRecord`. A goal that cannot be planned
    /// yields a `failed` record with no plan and no results.
    pub fn submit_goal(&self, goal_text: &str, ctx: &RunContext) -> RunOutcome {
        info!(user = %ctx.user, dry_run = ctx.dry_run, goal = %goal_text, "goal received");

        let mut run = Run::start(ctx, goal_text);
        if let Err(e) = self.guard.check_goal(goal_text, &ctx.user) {
            run.abort(e.to_string());
            return self.finish(run);
        }
        let hints = self.similar_history(goal_text, &ctx.user);

        match self.planner.plan_from_goal(goal_text, &ctx.user, &hints) {
            Ok(plan) => self.execute(&mut run, plan),
            Err(e) => run.abort(e.to_string()),
        }

        self.finish(run)
    }

    /// Parse `plan_text` and execute it. The record's `goal_text` is empty.
    pub fn submit_plan(&self, plan_text: &str, ctx: &RunContext) -> RunOutcome {
        info!(user = %ctx.user, dry_run = ctx.dry_run, "direct plan received");

        let mut run = Run::start(ctx, "");
        if let Err(e) = self.guard.check_user(&ctx.user) {
            run.abort(e.to_string());
            return self.finish(run);
        }
        match self.planner.plan_from_text(plan_text) {
            Ok(plan) => self.execute(&mut run, plan),
            Err(e) => run.abort(e.to_string()),
        }

        self.finish(run)
    }

    /// Display projection of `user`'s history, most recent first.
    ///
    /// An unavailable store yields an empty list.
    pub fn get_history(&self, user: &str) -> Vec<HistorySummary> {
        match self.history.query_by_user(user) {
            Ok(records) => records.iter().map(RunRecord::summary).collect(),
            Err(e) => {
                warn!(user = %user, error = %e, "history query failed");
                Vec::new()
            }
        }
    }

    /// Users with recorded runs. An unavailable store yields an empty list.
    pub fn list_users(&self) -> Vec<String> {
        self.history.list_users().unwrap_or_else(|e| {
            warn!(error = %e, "user listing failed");
            Vec::new()
        })
    }

    /// Enroll `user` with the identity collaborator and record the outcome.
    ///
    /// A first enrollment needs nothing more. Replacing an existing one
    /// requires `identity` to be verified for `user`; otherwise the current
    /// credential stays in place and `Failed` is returned.
    pub fn enroll_user(
        &self,
        user: &str,
        sample: &[u8],
        identity: &IdentityStatus,
    ) -> EnrollmentStatus {
        let Some(verifier) = &self.identity else {
            let status = EnrollmentStatus::Failed {
                reason: "no identity verifier configured".to_string(),
            };
            warn!(user = %user, "enrollment failed: no identity verifier configured");
            self.ledger.record(user, status.clone());
            return status;
        };

        // A refused replacement leaves the existing enrollment untouched,
        // ledger entry included.
        if self.is_enrolled(user) && !identity.is_verified_for(user) {
            warn!(user = %user, "re-enrollment refused without verified identity");
            return EnrollmentStatus::Failed {
                reason: "already enrolled; verify the current identity to re-enroll".to_string(),
            };
        }

        let status = match verifier.enroll(user, sample) {
            Ok(()) => EnrollmentStatus::Enrolled,
            Err(e) => EnrollmentStatus::Failed {
                reason: e.to_string(),
            },
        };
        match &status {
            EnrollmentStatus::Enrolled => info!(user = %user, "user enrolled"),
            EnrollmentStatus::Failed { reason } => {
                warn!(user = %user, reason = %reason, "enrollment failed")
            }
        }
        self.ledger.record(user, status.clone());
        status
    }

    /// Check `sample` for `user`; the result goes into a `RunContext`.
    pub fn verify_identity(&self, user: &str, sample: &[u8]) -> IdentityStatus {
        let Some(verifier) = &self.identity else {
            warn!(user = %user, "identity check requested but no verifier configured");
            return IdentityStatus::Unverified;
        };
        match verifier.verify(user, sample) {
            Ok(true) => {
                info!(user = %user, "identity verified");
                IdentityStatus::Verified {
                    user: user.to_string(),
                }
            }
            Ok(false) => {
                warn!(user = %user, "identity verification rejected");
                IdentityStatus::Unverified
            }
            Err(e) => {
                warn!(user = %user, error = %e, "identity verification failed");
                IdentityStatus::Unverified
            }
        }
    }

    // ── Run internals ────────────────────────────────────────────────────────

    fn similar_history(&self, goal_text: &str, user: &str) -> Vec<RunRecord> {
        if goal_text.trim().is_empty() {
            return Vec::new();
        }
        match self
            .history
            .fuzzy_match(goal_text, user, self.settings.fuzzy_threshold)
        {
            Ok(mut records) => {
                records.truncate(self.settings.max_hints);
                debug!(user = %user, hints = records.len(), "similar past goals found");
                records
            }
            Err(e) => {
                warn!(user = %user, error = %e, "history lookup failed; planning without hints");
                Vec::new()
            }
        }
    }

    fn execute(&self, run: &mut Run<'_>, plan: Plan) {
        run.advance(RunState::Executing);
        let total = plan.len();

        for (index, action) in plan.iter().enumerate() {
            if run.ctx.cancel.is_cancelled() {
                run.abort(format!("cancelled before step {index}"));
                run.fill_remaining(total, CANCELLED_DETAIL);
                break;
            }

            match self.dispatch(run, index, action) {
                Ok(result) => {
                    debug!(
                        run_id = %run.id.0,
                        step = index,
                        kind = %action.kind(),
                        status = ?result.status,
                        detail = %result.detail,
                        "step finished"
                    );
                    run.results.push(result);
                }
                Err(e) => {
                    run.abort(e.to_string());
                    run.fill_remaining(total, ABORTED_DETAIL);
                    break;
                }
            }
        }

        if run.state == RunState::Executing {
            run.advance(RunState::Completed);
        }
        run.plan = Some(plan);
    }

    /// Decide what happens to one action.
    ///
    /// Returns `Err` only for integrity failures that must abort the run.
    fn dispatch(
        &self,
        run: &Run<'_>,
        index: usize,
        action: &Action,
    ) -> GhosthandResult<StepResult> {
        let kind = action.kind();

        if let Some(phrase) = self.guard.check_action(action) {
            warn!(
                run_id = %run.id.0,
                step = index,
                kind = %kind,
                phrase = %phrase,
                "step refused by guard"
            );
            return Ok(StepResult::skipped(format!("blocked by guard: contains '{phrase}'")));
        }

        if run.ctx.dry_run {
            debug!(run_id = %run.id.0, step = index, kind = %kind, "dry run: step not executed");
            return Ok(StepResult::skipped(DRY_RUN_DETAIL));
        }

        if action.is_privileged() && !self.identity_satisfied(run.ctx) {
            warn!(
                run_id = %run.id.0,
                step = index,
                kind = %kind,
                user = %run.ctx.user,
                "privileged action blocked by identity gate"
            );
            return Ok(StepResult::skipped(PRIVILEGED_BLOCKED_DETAIL));
        }

        if kind == ActionKind::EnrollUser
            && !self.enrollment_permitted(run.ctx, action.parameters())
        {
            warn!(
                run_id = %run.id.0,
                step = index,
                user = %run.ctx.user,
                "enrollment step blocked"
            );
            return Ok(StepResult::skipped(ENROLLMENT_BLOCKED_DETAIL));
        }

        let executor = match self.registry.resolve(kind) {
            Ok(executor) => executor,
            Err(e @ GhosthandError::NoExecutorRegistered { .. }) => {
                warn!(run_id = %run.id.0, step = index, kind = %kind, "no executor registered");
                return Ok(StepResult::skipped(e.to_string()));
            }
            Err(e) => return Err(e),
        };

        debug!(run_id = %run.id.0, step = index, kind = %kind, "dispatching step");
        Ok(self.invoke(kind, executor, action.parameters()))
    }

    fn is_enrolled(&self, user: &str) -> bool {
        self.ledger.is_enrolled(user) || self.identity.as_ref().is_some_and(|v| v.is_enrolled(user))
    }

    fn identity_satisfied(&self, ctx: &RunContext) -> bool {
        if !self.settings.require_identity {
            return true;
        }
        self.is_enrolled(&ctx.user) && ctx.identity.is_verified_for(&ctx.user)
    }

    fn enrollment_permitted(&self, ctx: &RunContext, parameters: &Parameters) -> bool {
        let target = parameters.get("user").and_then(|v| v.as_str());
        if target != Some(ctx.user.as_str()) {
            return false;
        }
        !self.is_enrolled(&ctx.user) || ctx.identity.is_verified_for(&ctx.user)
    }

    fn invoke(
        &self,
        kind: ActionKind,
        executor: Arc<dyn ActionExecutor>,
        parameters: &Parameters,
    ) -> StepResult {
        let Some(limit) = self.settings.step_timeout else {
            return run_guarded(executor.as_ref(), parameters);
        };

        // The worker is never interrupted: on timeout it keeps running and its
        // result is dropped when the channel's receiver is gone.
        let (tx, rx) = mpsc::channel();
        let parameters = parameters.clone();
        let spawned = thread::Builder::new()
            .name(format!("ghosthand-{kind}"))
            .spawn(move || {
                let _ = tx.send(run_guarded(executor.as_ref(), &parameters));
            });
        if let Err(e) = spawned {
            return StepResult::failure(format!("could not start executor thread: {e}"));
        }

        match rx.recv_timeout(limit) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(kind = %kind, timeout_ms = limit.as_millis() as u64, "executor timed out");
                StepResult::failure(TIMED_OUT_DETAIL)
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                StepResult::failure("executor exited without reporting a result")
            }
        }
    }

    fn finish(&self, run: Run<'_>) -> RunOutcome {
        debug_assert!(run.state.is_terminal());
        let record = run.into_record();

        info!(
            run_id = %record.run_id.0,
            user = %record.user,
            status = record.overall_status.as_str(),
            steps = record.step_count(),
            dry_run = record.dry_run,
            "run finished"
        );

        let store_warning = match self.history.append(&record) {
            Ok(()) => None,
            Err(e) => {
                warn!(run_id = %record.run_id.0, error = %e, "run record could not be stored");
                Some(format!("run {} was not recorded: {e}", record.run_id.0))
            }
        };

        RunOutcome {
            record,
            store_warning,
        }
    }
}

/// Call an executor, converting both `Err` and panics into a failure result.
fn run_guarded(executor: &dyn ActionExecutor, parameters: &Parameters) -> StepResult {
    match panic::catch_unwind(AssertUnwindSafe(|| executor.execute(parameters))) {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => StepResult::failure(e.to_string()),
        Err(payload) => StepResult::failure(format!(
            "executor panicked: {}",
            panic_message(payload.as_ref())
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
