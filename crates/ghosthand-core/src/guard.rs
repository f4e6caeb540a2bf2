//! Goal guard: refuses goals and steps before anything is planned or run.
//!
//! Two rules, both optional:
//!
//! - `allowed_users`: when non-empty, only these users (case-insensitive)
//!   may submit goals or plans.
//! - `deny_phrases`: a goal, or a step whose string parameters contain one
//!   of these phrases as whole words (case-insensitive), is refused.
//!
//! A refused goal never reaches the planner; the orchestrator records it as
//! a `failed` run whose `failure_reason` names the rule.

use tracing::warn;

use ghosthand_contracts::{
    action::Action,
    error::{GhosthandError, GhosthandResult},
};

/// Phrases refused when a deployment does not configure its own list.
pub const DEFAULT_DENY_PHRASES: &[&str] = &[
    "rm -rf",
    "format",
    "shutdown",
    "delete system32",
    "self-destruct",
];

/// The guard applied at the submission boundary. The default allows
/// everything.
#[derive(Debug, Clone, Default)]
pub struct GoalGuard {
    deny_phrases: Vec<String>,
    allowed_users: Vec<String>,
}

impl GoalGuard {
    /// A guard refusing `phrases`. Blank phrases are ignored.
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let deny_phrases = phrases
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self {
            deny_phrases,
            allowed_users: Vec::new(),
        }
    }

    /// A guard refusing `DEFAULT_DENY_PHRASES`.
    pub fn standard() -> Self {
        Self::new(DEFAULT_DENY_PHRASES)
    }

    pub fn with_allowed_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_users = users
            .into_iter()
            .map(|u| u.as_ref().trim().to_lowercase())
            .filter(|u| !u.is_empty())
            .collect();
        self
    }

    pub fn deny_phrases(&self) -> &[String] {
        &self.deny_phrases
    }

    /// Refuse `user` unless the allow-list is empty or names them.
    pub fn check_user(&self, user: &str) -> GhosthandResult<()> {
        if self.allowed_users.is_empty() || self.allowed_users.contains(&user.to_lowercase()) {
            return Ok(());
        }
        warn!(user = %user, "submission refused: user not allowed");
        Err(GhosthandError::GoalRejected {
            reason: format!("user '{}' is not allowed to submit goals", user),
        })
    }

    /// Refuse a goal from a disallowed user or containing a denied phrase.
    pub fn check_goal(&self, goal_text: &str, user: &str) -> GhosthandResult<()> {
        self.check_user(user)?;
        if let Some(phrase) = self.denied_phrase_in(goal_text) {
            warn!(user = %user, phrase = %phrase, "goal refused: denied phrase");
            return Err(GhosthandError::GoalRejected {
                reason: format!("goal contains the denied phrase '{}'", phrase),
            });
        }
        Ok(())
    }

    /// The denied phrase found in any of the action's string parameters.
    pub fn check_action(&self, action: &Action) -> Option<&str> {
        action
            .parameters()
            .values()
            .filter_map(|v| v.as_str())
            .find_map(|text| self.denied_phrase_in(text))
    }

    fn denied_phrase_in(&self, text: &str) -> Option<&str> {
        if self.deny_phrases.is_empty() {
            return None;
        }
        let text = text.to_lowercase();
        self.deny_phrases
            .iter()
            .find(|phrase| contains_phrase(&text, phrase))
            .map(String::as_str)
    }
}

/// True if `phrase` occurs in `text` and is not glued to letters or digits
/// on either side, so "format" does not match "information".
fn contains_phrase(text: &str, phrase: &str) -> bool {
    text.match_indices(phrase).any(|(start, found)| {
        let before = text[..start].chars().next_back();
        let after = text[start + found.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use ghosthand_contracts::action::ActionKind;

    use super::*;

    fn speak(text: &str) -> Action {
        let params = serde_json::from_value(json!({ "text": text })).unwrap();
        Action::new(ActionKind::Speak, params).unwrap()
    }

    #[test]
    fn default_guard_allows_everything() {
        let guard = GoalGuard::default();
        guard.check_goal("rm -rf / and shutdown", "anyone").unwrap();
        assert!(guard.check_action(&speak("self-destruct")).is_none());
    }

    #[test]
    fn denied_phrases_are_matched_as_whole_words() {
        let guard = GoalGuard::standard();
        match guard.check_goal("please RM -RF my home folder", "william") {
            Err(GhosthandError::GoalRejected { reason }) => {
                assert!(reason.contains("'rm -rf'"), "{reason}")
            }
            other => panic!("expected GoalRejected, got {:?}", other),
        }
        assert!(guard.check_goal("shutdown the laptop", "william").is_err());
        guard.check_goal("read the information sheet aloud", "william").unwrap();
        guard.check_goal("email the reformatted report to bob@example.com", "william").unwrap();
    }

    #[test]
    fn allow_list_is_case_insensitive() {
        let guard = GoalGuard::default().with_allowed_users(["William"]);
        guard.check_user("william").unwrap();
        match guard.check_goal("say hi", "mallory") {
            Err(GhosthandError::GoalRejected { reason }) => assert!(reason.contains("mallory")),
            other => panic!("expected GoalRejected, got {:?}", other),
        }
    }

    #[test]
    fn step_parameters_are_checked() {
        let guard = GoalGuard::new(["delete system32", "  "]);
        assert_eq!(guard.deny_phrases(), ["delete system32".to_string()]);
        assert_eq!(guard.check_action(&speak("now delete System32!")), Some("delete system32"));
        assert!(guard.check_action(&speak("hello")).is_none());
    }
}
