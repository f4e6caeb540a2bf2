//! `RulePlanner`: the `Planner` implementation used by the runtime.
//!
//! Planning algorithm:
//!
//! 1. Try each `PlanSource` in order (heuristic rules first, then the
//!    generative fallback if one is configured).
//! 2. The first source that proposes steps wins. Its candidates go through
//!    the shared structural validation; a rejection makes the goal
//!    unplannable rather than falling through to the next source.
//! 3. A source that fires but cannot complete its steps (a rule needing a
//!    value the goal lacks) defers to the next source.
//! 4. If no source produces steps, the goal is unplannable. The reasons of
//!    every source that failed are kept.

use std::{collections::BTreeSet, sync::Arc};

use tracing::{debug, info, warn};

use ghosthand_contracts::{
    action::ActionKind,
    error::{GhosthandError, GhosthandResult},
    execution::RunRecord,
    plan::Plan,
};
use ghosthand_core::traits::Planner;

use crate::{
    preferences::Preferences,
    rule::RuleTable,
    source::{HeuristicRules, PlanGenerator, PlanSource},
    validate,
};

/// Rule-table planner with an optional generative fallback.
///
/// ```rust,ignore
/// use ghosthand_planner::RulePlanner;
///
/// let planner = RulePlanner::builtin()?.with_generator(Arc::new(generator));
/// ```
#[derive(Debug)]
pub struct RulePlanner {
    sources: Vec<PlanSource>,
    preferences: Preferences,
}

impl RulePlanner {
    /// A heuristic-only planner over `table`.
    ///
    /// Returns `ConfigError` if any rule is malformed.
    pub fn new(table: &RuleTable) -> GhosthandResult<Self> {
        Ok(Self {
            sources: vec![PlanSource::Heuristic(HeuristicRules::compile(table)?)],
            preferences: Preferences::new(),
        })
    }

    /// A heuristic-only planner over the built-in rule table.
    pub fn builtin() -> GhosthandResult<Self> {
        Self::new(&RuleTable::builtin()?)
    }

    /// Append a generative source, consulted when no rule matches.
    pub fn with_generator(mut self, generator: Arc<dyn PlanGenerator>) -> Self {
        self.sources.push(PlanSource::Generative(generator));
        self
    }

    pub fn with_preferences(mut self, preferences: Preferences) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn sources(&self) -> &[PlanSource] {
        &self.sources
    }
}

/// Kinds used by past plans for similar goals.
fn hint_kinds(similar_history: &[RunRecord]) -> BTreeSet<ActionKind> {
    similar_history
        .iter()
        .filter_map(|record| record.plan.as_ref())
        .flat_map(|plan| plan.iter().map(|action| action.kind()))
        .collect()
}

fn unplannable_reason(error: GhosthandError) -> String {
    match error {
        GhosthandError::UnplannableGoal { reason } => reason,
        other => other.to_string(),
    }
}

impl Planner for RulePlanner {
    fn plan_from_goal(
        &self,
        goal_text: &str,
        user: &str,
        similar_history: &[RunRecord],
    ) -> GhosthandResult<Plan> {
        if goal_text.trim().is_empty() {
            return Err(GhosthandError::UnplannableGoal {
                reason: "goal text is empty".to_string(),
            });
        }

        let hints = hint_kinds(similar_history);
        let prefs = self.preferences.get(user);
        debug!(user = %user, hints = hints.len(), "planning goal");

        let mut failures: Vec<String> = Vec::new();
        for source in &self.sources {
            let candidates = match source.produce(goal_text, user, &hints, prefs) {
                Ok(Some(candidates)) => candidates,
                Ok(None) => {
                    debug!(source = source.name(), "source proposed nothing");
                    continue;
                }
                Err(e) => {
                    warn!(source = source.name(), error = %e, "source could not plan goal");
                    failures.push(unplannable_reason(e));
                    continue;
                }
            };

            let plan = validate::candidates_to_plan(candidates).map_err(|e| {
                warn!(source = source.name(), error = %e, "proposed plan failed validation");
                GhosthandError::UnplannableGoal {
                    reason: format!("{} plan rejected: {}", source.name(), e),
                }
            })?;

            info!(
                user = %user,
                source = source.name(),
                steps = plan.len(),
                "goal planned"
            );
            return Ok(plan);
        }

        if !failures.is_empty() {
            return Err(GhosthandError::UnplannableGoal {
                reason: failures.join("; "),
            });
        }

        warn!(user = %user, goal = %goal_text, "no plan source matched goal");
        Err(GhosthandError::UnplannableGoal {
            reason: "no planning rule matched the goal and no generative planner is configured"
                .to_string(),
        })
    }

    fn plan_from_text(&self, plan_text: &str) -> GhosthandResult<Plan> {
        validate::parse_plan_text(plan_text)
    }
}
