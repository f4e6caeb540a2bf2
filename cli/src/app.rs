//! Wiring a deployment from config, and the operations the CLI exposes.

use std::{fs, path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use tracing::info;

use ghosthand_capabilities::{
    default_registry, files::expand_home, CommandRunner, PassphraseVerifier,
};
use ghosthand_contracts::{
    context::{EnrollmentStatus, IdentityStatus, RunContext},
    error::{GhosthandError, GhosthandResult},
    execution::{HistorySummary, RunOutcome},
};
use ghosthand_core::{traits::IdentityVerifier, Orchestrator};
use ghosthand_history::{GoalQueue, JsonlHistoryStore, QueuedGoal};
use ghosthand_planner::{HttpPlanGenerator, RulePlanner, RuleTable};

use crate::config::GhosthandConfig;

/// A fully wired runtime.
pub struct App {
    orchestrator: Orchestrator,
    history: Arc<JsonlHistoryStore>,
    queue: GoalQueue,
}

impl App {
    pub fn build(
        config: &GhosthandConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> GhosthandResult<Self> {
        let history = Arc::new(JsonlHistoryStore::open(expand_home(&config.history.path))?);
        let queue = GoalQueue::open(expand_home(&config.queue.path))?;

        let table = match &config.planner.rules_path {
            Some(path) => RuleTable::from_file(&expand_home(path))?,
            None => RuleTable::builtin()?,
        };
        let mut planner = RulePlanner::new(&table)?.with_preferences(config.preferences.clone());
        if let Some(generative) = &config.planner.generative {
            planner = planner.with_generator(Arc::new(HttpPlanGenerator::new(generative.clone())?));
        }

        let verifier: Option<Arc<dyn IdentityVerifier>> = if config.identity.store.is_empty() {
            None
        } else {
            Some(Arc::new(PassphraseVerifier::open(expand_home(&config.identity.store))?))
        };

        let registry = Arc::new(default_registry(&config.capabilities, runner, verifier.clone())?);

        let mut orchestrator = Orchestrator::new(Arc::new(planner), registry, history.clone())
            .with_settings(config.orchestrator_settings())
            .with_guard(config.goal_guard());
        if let Some(verifier) = verifier {
            orchestrator = orchestrator.with_identity_verifier(verifier);
        }

        info!(
            history = %history.path().display(),
            queue = %queue.path().display(),
            rules = table.rules.len(),
            generative = config.planner.generative.is_some(),
            "runtime wired"
        );
        Ok(Self {
            orchestrator,
            history,
            queue,
        })
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Per-call context. A passphrase, when given, is checked up front.
    pub fn context(&self, user: &str, dry_run: bool, passphrase: Option<&str>) -> RunContext {
        let identity = passphrase
            .map(|p| self.orchestrator.verify_identity(user, p.as_bytes()))
            .unwrap_or(IdentityStatus::Unverified);
        RunContext::new(user).dry_run(dry_run).with_identity(identity)
    }

    pub fn run_goal(&self, goal: &str, ctx: &RunContext) -> RunOutcome {
        self.orchestrator.submit_goal(goal, ctx)
    }

    /// `plan_arg` is JSON plan text, or `@path` to read it from a file.
    pub fn run_plan(&self, plan_arg: &str, ctx: &RunContext) -> GhosthandResult<RunOutcome> {
        let text = read_plan_arg(plan_arg)?;
        Ok(self.orchestrator.submit_plan(&text, ctx))
    }

    /// Most recent first, at most `limit` entries.
    pub fn history(&self, user: &str, limit: Option<usize>) -> Vec<HistorySummary> {
        let mut summaries = self.orchestrator.get_history(user);
        if let Some(limit) = limit {
            summaries.truncate(limit);
        }
        summaries
    }

    pub fn users(&self) -> Vec<String> {
        self.orchestrator.list_users()
    }

    /// Enroll `user` from a sample file. Replacing an existing enrollment
    /// needs the current passphrase.
    pub fn enroll(
        &self,
        user: &str,
        sample_path: &Path,
        current: Option<&str>,
    ) -> GhosthandResult<()> {
        let sample = fs::read(sample_path).map_err(|e| GhosthandError::EnrollmentFailed {
            user: user.to_string(),
            reason: format!("cannot read sample '{}': {}", sample_path.display(), e),
        })?;
        let identity = current
            .map(|p| self.orchestrator.verify_identity(user, p.as_bytes()))
            .unwrap_or(IdentityStatus::Unverified);
        match self.orchestrator.enroll_user(user, &sample, &identity) {
            EnrollmentStatus::Enrolled => Ok(()),
            EnrollmentStatus::Failed { reason } => Err(GhosthandError::EnrollmentFailed {
                user: user.to_string(),
                reason,
            }),
        }
    }

    pub fn queue_goal(
        &self,
        user: &str,
        goal: &str,
        due_at: DateTime<Utc>,
        every_minutes: Option<u32>,
    ) -> GhosthandResult<QueuedGoal> {
        self.queue.enqueue(user, goal, due_at, every_minutes)
    }

    /// `user`'s queued goals, soonest first.
    pub fn queued(&self, user: &str) -> GhosthandResult<Vec<QueuedGoal>> {
        let mut goals = self.queue.pending()?;
        goals.retain(|g| g.user == user);
        Ok(goals)
    }

    /// Remove one of `user`'s queued goals by id. Returns false if `user`
    /// has no such goal.
    pub fn unqueue(&self, user: &str, id: &str) -> GhosthandResult<bool> {
        let found = self
            .queue
            .pending()?
            .into_iter()
            .find(|g| g.user == user && g.id.to_string() == id);
        match found {
            Some(goal) => self.queue.remove(goal.id),
            None => Ok(false),
        }
    }

    /// Run every goal due at `now`, each as its owner. `passphrase` only
    /// vouches for `user`'s own goals; everyone else's run unverified.
    pub fn run_due(
        &self,
        now: DateTime<Utc>,
        user: &str,
        passphrase: Option<&str>,
    ) -> GhosthandResult<Vec<RunOutcome>> {
        let due = self.queue.take_due(now)?;
        let mut outcomes = Vec::with_capacity(due.len());
        for goal in due {
            info!(id = %goal.id, user = %goal.user, "running queued goal");
            let secret = passphrase.filter(|_| goal.user == user);
            let ctx = self.context(&goal.user, false, secret);
            outcomes.push(self.run_goal(&goal.goal, &ctx));
        }
        Ok(outcomes)
    }

    /// Verify the history hash chain; returns the number of entries checked.
    pub fn verify_history(&self) -> GhosthandResult<usize> {
        self.history.verify_integrity()?;
        Ok(self.history.entries()?.len())
    }
}

fn read_plan_arg(plan_arg: &str) -> GhosthandResult<String> {
    match plan_arg.strip_prefix('@') {
        Some(path) => {
            let path = expand_home(path);
            fs::read_to_string(&path).map_err(|e| GhosthandError::PlanParse {
                reason: format!("cannot read plan file '{}': {}", path.display(), e),
            })
        }
        None => Ok(plan_arg.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use ghosthand_capabilities::SystemCommandRunner;
    use ghosthand_contracts::execution::{RunStatus, StepStatus, DRY_RUN_DETAIL};

    use super::*;

    const GOAL: &str = "find my latest screenshot and email the screenshot to bob@example.com";

    struct Fixture {
        _dir: tempfile::TempDir,
        pictures: PathBuf,
        outbox: PathBuf,
        app: App,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let pictures = dir.path().join("Pictures");
        fs::create_dir_all(&pictures).unwrap();
        fs::write(pictures.join("Screenshot from 2026-10-19.png"), b"png").unwrap();
        let outbox = dir.path().join("outbox");

        let mut config = GhosthandConfig::default();
        config.history.path = dir.path().join("history.jsonl").display().to_string();
        config.queue.path = dir.path().join("queue.jsonl").display().to_string();
        config.identity.store = dir.path().join("identity.json").display().to_string();
        config.capabilities.search_dirs = vec![pictures.display().to_string()];
        config.capabilities.outbox = outbox.display().to_string();

        let app = App::build(&config, Arc::new(SystemCommandRunner)).unwrap();
        Fixture {
            _dir: dir,
            pictures,
            outbox,
            app,
        }
    }

    // ── 1. Goals ─────────────────────────────────────────────────────────────

    #[test]
    fn dry_run_plans_without_touching_anything() {
        let fx = fixture();
        let ctx = fx.app.context("william", true, None);
        let outcome = fx.app.run_goal(GOAL, &ctx);

        assert_eq!(outcome.record.overall_status, RunStatus::Success);
        assert_eq!(outcome.record.results.len(), 2);
        assert!(outcome.record.results.iter().all(|r| r.detail == DRY_RUN_DETAIL));
        assert!(!fx.outbox.exists());
    }

    #[test]
    fn unverified_email_is_skipped_but_lookup_runs() {
        let fx = fixture();
        let ctx = fx.app.context("william", false, None);
        let outcome = fx.app.run_goal(GOAL, &ctx);

        let statuses: Vec<StepStatus> = outcome.record.results.iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![StepStatus::Success, StepStatus::Skipped]);
        assert_eq!(outcome.record.overall_status, RunStatus::Partial);
        assert!(outcome.is_recorded());
        assert!(!fx.outbox.exists());
    }

    #[test]
    fn enrolled_and_verified_user_sends_the_email() {
        let fx = fixture();
        let sample = fx.pictures.join("..").join("passphrase.txt");
        fs::write(&sample, "open sesame\n").unwrap();
        fx.app.enroll("william", &sample, None).unwrap();

        let ctx = fx.app.context("william", false, Some("open sesame"));
        let outcome = fx.app.run_goal(GOAL, &ctx);

        assert_eq!(
            outcome.record.overall_status,
            RunStatus::Success,
            "{:?}",
            outcome.record.results
        );
        assert_eq!(fs::read_dir(&fx.outbox).unwrap().count(), 1);
    }

    #[test]
    fn wrong_passphrase_leaves_identity_unverified() {
        let fx = fixture();
        let sample = fx.pictures.join("..").join("passphrase.txt");
        fs::write(&sample, "open sesame").unwrap();
        fx.app.enroll("william", &sample, None).unwrap();

        let ctx = fx.app.context("william", false, Some("let me in"));
        assert_eq!(ctx.identity, IdentityStatus::Unverified);
    }

    #[test]
    fn re_enrolling_needs_the_current_passphrase() {
        let fx = fixture();
        let old = fx.pictures.join("..").join("old.txt");
        let new = fx.pictures.join("..").join("new.txt");
        fs::write(&old, "open sesame").unwrap();
        fs::write(&new, "hijacked").unwrap();
        fx.app.enroll("william", &old, None).unwrap();

        match fx.app.enroll("william", &new, None) {
            Err(GhosthandError::EnrollmentFailed { reason, .. }) => {
                assert!(reason.contains("already enrolled"), "{reason}")
            }
            other => panic!("expected EnrollmentFailed, got {:?}", other),
        }
        assert!(fx.app.enroll("william", &new, Some("wrong guess")).is_err());
        let identity =
            |passphrase: &str| fx.app.context("william", false, Some(passphrase)).identity;
        assert!(identity("open sesame").is_verified_for("william"));

        fx.app.enroll("william", &new, Some("open sesame")).unwrap();
        assert!(identity("hijacked").is_verified_for("william"));
        assert_eq!(identity("open sesame"), IdentityStatus::Unverified);
    }

    // ── 2. Direct plans ──────────────────────────────────────────────────────

    #[test]
    fn plan_is_read_from_file() {
        let fx = fixture();
        let plan_path = fx.pictures.join("..").join("plan.json");
        fs::write(
            &plan_path,
            r#"[{"kind": "locate-file", "parameters": {"pattern": "screenshot"}}]"#,
        )
        .unwrap();

        let ctx = fx.app.context("william", false, None);
        let outcome = fx
            .app
            .run_plan(&format!("@{}", plan_path.display()), &ctx)
            .unwrap();
        assert_eq!(outcome.record.overall_status, RunStatus::Success);
    }

    #[test]
    fn missing_plan_file_is_an_error() {
        let fx = fixture();
        let ctx = fx.app.context("william", false, None);
        match fx.app.run_plan("@/nonexistent/plan.json", &ctx) {
            Err(GhosthandError::PlanParse { reason }) => {
                assert!(reason.contains("cannot read plan file"))
            }
            other => panic!("expected PlanParse, got {:?}", other.map(|o| o.record)),
        }
    }

    // ── 3. History ───────────────────────────────────────────────────────────

    #[test]
    fn history_is_listed_and_verifiable() {
        let fx = fixture();
        let ctx = fx.app.context("william", true, None);
        fx.app.run_goal(GOAL, &ctx);
        fx.app.run_goal("say \"hello\"", &ctx);
        fx.app.run_goal("say \"bye\"", &fx.app.context("ada", true, None));

        let history = fx.app.history("william", Some(1));
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].goal, "say \"hello\"");
        assert_eq!(fx.app.users(), vec!["william".to_string(), "ada".to_string()]);
        assert_eq!(fx.app.verify_history().unwrap(), 3);
    }

    // ── 4. Guard and queue ───────────────────────────────────────────────────

    #[test]
    fn harmful_goal_is_refused_and_recorded() {
        let fx = fixture();
        let ctx = fx.app.context("william", false, None);
        let outcome = fx.app.run_goal("rm -rf the pictures folder", &ctx);

        assert_eq!(outcome.record.overall_status, RunStatus::Failed);
        assert!(outcome.record.failure_reason.unwrap().starts_with("goal rejected"));
        assert_eq!(fx.app.history("william", None).len(), 1);
    }

    #[test]
    fn due_goals_run_as_their_owner_once() {
        let fx = fixture();
        let now = Utc::now();
        fx.app
            .queue_goal("william", GOAL, now - chrono::Duration::minutes(5), None)
            .unwrap();
        fx.app
            .queue_goal("ada", GOAL, now - chrono::Duration::minutes(1), Some(60))
            .unwrap();
        fx.app
            .queue_goal("william", "say \"later\"", now + chrono::Duration::hours(1), None)
            .unwrap();

        let outcomes = fx.app.run_due(now, "william", None).unwrap();
        let owners: Vec<&str> = outcomes.iter().map(|o| o.record.user.as_str()).collect();
        assert_eq!(owners, vec!["william", "ada"]);
        assert_eq!(outcomes[0].record.overall_status, RunStatus::Partial, "email needs identity");

        assert!(fx.app.run_due(now, "william", None).unwrap().is_empty());
        assert_eq!(fx.app.queued("william").unwrap().len(), 1);
        assert_eq!(fx.app.queued("ada").unwrap()[0].every_minutes, Some(60));
    }

    #[test]
    fn only_the_owner_can_unqueue() {
        let fx = fixture();
        let goal = fx
            .app
            .queue_goal("william", "say \"hi\"", Utc::now(), None)
            .unwrap();
        let id = goal.id.to_string();

        assert!(!fx.app.unqueue("mallory", &id).unwrap());
        assert!(fx.app.unqueue("william", &id).unwrap());
        assert!(fx.app.queued("william").unwrap().is_empty());
    }

    #[test]
    fn enrolling_with_unreadable_sample_fails() {
        let fx = fixture();
        match fx.app.enroll("william", Path::new("/nonexistent/sample"), None) {
            Err(GhosthandError::EnrollmentFailed { user, .. }) => assert_eq!(user, "william"),
            other => panic!("expected EnrollmentFailed, got {:?}", other),
        }
    }
}
