//! The ordered action sequence a run executes.

use serde::{Deserialize, Serialize};

use crate::{
    action::Action,
    error::{GhosthandError, GhosthandResult},
};

/// A non-empty, ordered sequence of validated actions.
///
/// Sequence order is execution order; nothing reorders or parallelizes it.
/// The serialized form is a bare JSON array of `{kind, parameters}` objects,
/// which is also the format accepted by direct plan submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<Action>", try_from = "Vec<Action>")]
pub struct Plan {
    actions: Vec<Action>,
}

impl Plan {
    /// Build a plan. Returns `EmptyPlan` when `actions` is empty.
    pub fn new(actions: Vec<Action>) -> GhosthandResult<Self> {
        if actions.is_empty() {
            return Err(GhosthandError::EmptyPlan);
        }
        Ok(Self { actions })
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Always false for a constructed plan.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Action> {
        self.actions.iter()
    }

    /// Serialize to the plan text format.
    pub fn to_text(&self) -> GhosthandResult<String> {
        serde_json::to_string(self).map_err(|e| GhosthandError::PlanParse {
            reason: format!("failed to serialize plan: {e}"),
        })
    }
}

impl From<Plan> for Vec<Action> {
    fn from(plan: Plan) -> Self {
        plan.actions
    }
}

impl TryFrom<Vec<Action>> for Plan {
    type Error = GhosthandError;

    fn try_from(actions: Vec<Action>) -> Result<Self, Self::Error> {
        Plan::new(actions)
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a Action;
    type IntoIter = std::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}
