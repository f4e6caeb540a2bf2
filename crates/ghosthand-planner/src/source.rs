//! Plan sources: the heuristic rule table and the generative fallback.
//!
//! Both produce `CandidateStep`s, which are untrusted until they pass the
//! same structural validation (`validate::candidates_to_plan`).

use std::{collections::BTreeSet, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::debug;

use ghosthand_contracts::{
    action::{ActionKind, Parameters},
    error::{GhosthandError, GhosthandResult},
};

use crate::{
    preferences::UserPreferences,
    rule::{CompiledRule, RuleMatch, RuleTable},
    template::{self, GoalFacts},
    validate,
};

/// An action proposed by a source, not yet checked against the schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateStep {
    pub kind: String,
    #[serde(default)]
    pub parameters: Parameters,
}

/// Produces raw plan text for a goal, e.g. from a language model.
///
/// The text is expected to be a JSON array of `{kind, parameters}` objects
/// and is validated exactly like an authored plan.
pub trait PlanGenerator: Send + Sync {
    fn generate(
        &self,
        goal_text: &str,
        user: &str,
        hint_kinds: &[ActionKind],
    ) -> GhosthandResult<String>;
}

/// Compiled heuristic rules.
#[derive(Debug, Clone)]
pub struct HeuristicRules {
    rules: Vec<CompiledRule>,
}

impl HeuristicRules {
    /// Validate and compile every rule in `table`.
    pub fn compile(table: &RuleTable) -> GhosthandResult<Self> {
        let rules = table
            .rules
            .iter()
            .enumerate()
            .map(|(order, rule)| CompiledRule::compile(rule, order))
            .collect::<GhosthandResult<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Select the rules that fire for `goal`, in goal-text order.
    ///
    /// Each rule contributes at most its longest match. Overlapping matches
    /// are resolved greedily: longer literal first, then a rule whose kind
    /// appears in `hint_kinds`, then declaration order.
    pub(crate) fn select(
        &self,
        goal: &str,
        hint_kinds: &BTreeSet<ActionKind>,
    ) -> Vec<&CompiledRule> {
        let mut candidates: Vec<RuleMatch> = self
            .rules
            .iter()
            .filter_map(|rule| rule.longest_match(goal))
            .collect();

        candidates.sort_by(|a, b| {
            let hinted = |m: &RuleMatch| hint_kinds.contains(&self.rules[m.rule].kind);
            b.len()
                .cmp(&a.len())
                .then(hinted(b).cmp(&hinted(a)))
                .then(a.rule.cmp(&b.rule))
        });

        let mut accepted: Vec<RuleMatch> = Vec::new();
        for candidate in candidates {
            if let Some(winner) = accepted.iter().find(|m| m.overlaps(&candidate)) {
                debug!(
                    rule_id = %self.rules[candidate.rule].id,
                    beaten_by = %self.rules[winner.rule].id,
                    "overlapping rule match discarded"
                );
                continue;
            }
            accepted.push(candidate);
        }

        accepted.sort_by_key(|m| m.start);
        accepted.into_iter().map(|m| &self.rules[m.rule]).collect()
    }
}

/// Where candidate steps come from.
#[derive(Clone)]
pub enum PlanSource {
    /// Keyword rules matched against the goal text.
    Heuristic(HeuristicRules),
    /// An external generator whose output is parsed as plan text.
    Generative(Arc<dyn PlanGenerator>),
}

impl std::fmt::Debug for PlanSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanSource::Heuristic(rules) => write!(f, "Heuristic({} rules)", rules.len()),
            PlanSource::Generative(_) => write!(f, "Generative"),
        }
    }
}

impl PlanSource {
    pub fn name(&self) -> &'static str {
        match self {
            PlanSource::Heuristic(_) => "heuristic",
            PlanSource::Generative(_) => "generative",
        }
    }

    /// Propose steps for `goal`.
    ///
    /// `Ok(None)` means this source has nothing to offer and the next source
    /// should be tried. `Err` means the goal is unplannable.
    pub fn produce(
        &self,
        goal: &str,
        user: &str,
        hint_kinds: &BTreeSet<ActionKind>,
        prefs: Option<&UserPreferences>,
    ) -> GhosthandResult<Option<Vec<CandidateStep>>> {
        match self {
            PlanSource::Heuristic(rules) => {
                let fired = rules.select(goal, hint_kinds);
                if fired.is_empty() {
                    return Ok(None);
                }
                let facts = GoalFacts::extract(goal, user, prefs);
                fired
                    .into_iter()
                    .map(|rule| {
                        debug!(rule_id = %rule.id, kind = %rule.kind, "rule fired");
                        Ok(CandidateStep {
                            kind: rule.kind.as_str().to_string(),
                            parameters: template::resolve(&rule.id, &rule.parameters, &facts)?,
                        })
                    })
                    .collect::<GhosthandResult<Vec<_>>>()
                    .map(Some)
            }
            PlanSource::Generative(generator) => {
                let hints: Vec<ActionKind> = hint_kinds.iter().copied().collect();
                let text = generator.generate(goal, user, &hints).map_err(|e| {
                    GhosthandError::UnplannableGoal {
                        reason: format!("generative planner failed: {}", e),
                    }
                })?;
                debug!(chars = text.len(), "generative planner returned text");
                validate::parse_candidates(&text)
                    .map(Some)
                    .map_err(|e| GhosthandError::UnplannableGoal {
                        reason: format!("generated plan rejected: {}", e),
                    })
            }
        }
    }
}
