//! Placeholder extraction and parameter-template resolution.
//!
//! Rule parameters are JSON templates. Any string inside them may contain
//! `{name}` or `{name|fallback}`. Names resolve against facts pulled out of
//! the goal text at planning time:
//!
//! | Placeholder | Source |
//! |---|---|
//! | `{user}`   | the submitting user |
//! | `{goal}`   | the goal text, trimmed |
//! | `{email}`  | first e-mail address in the goal, else the user's `default_recipient` |
//! | `{url}`    | first `http(s)://` URL |
//! | `{quoted}` | first non-empty double-quoted string |
//! | `{path}`   | first token starting with `/`, `~/`, `./` or `../` |
//! | `{x}` `{y}` | first `N,M` / `N x M` coordinate pair (integers) |
//!
//! A string that is exactly one integer placeholder becomes a JSON number.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use ghosthand_contracts::{
    action::Parameters,
    error::{GhosthandError, GhosthandResult},
};

use crate::preferences::UserPreferences;

const KNOWN: [&str; 8] = ["user", "goal", "email", "url", "quoted", "path", "x", "y"];

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)(?:\|([^{}]*))?\}").unwrap());
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap());
static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"https?://[^\s"'<>]+"#).unwrap());
static QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""([^"]+)""#).unwrap());
static PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?:^|\s)((?:~|\.{1,2})?/[^\s"']+)"#).unwrap());
static COORDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,5})\s*(?:,|x|×)\s*(\d{1,5})\b").unwrap());

/// A resolved placeholder value.
#[derive(Debug, Clone, PartialEq)]
enum Fact {
    Text(String),
    Int(i64),
}

impl Fact {
    fn render(&self) -> String {
        match self {
            Fact::Text(s) => s.clone(),
            Fact::Int(n) => n.to_string(),
        }
    }
}

/// Everything a template can reference, extracted once per goal.
#[derive(Debug, Clone, Default)]
pub struct GoalFacts {
    pub user: String,
    pub goal: String,
    pub email: Option<String>,
    pub url: Option<String>,
    pub quoted: Option<String>,
    pub path: Option<String>,
    pub coords: Option<(i64, i64)>,
}

impl GoalFacts {
    /// Pull placeholder values out of `goal`.
    pub fn extract(goal: &str, user: &str, prefs: Option<&UserPreferences>) -> Self {
        let email = EMAIL_RE
            .find(goal)
            .map(|m| m.as_str().to_string())
            .or_else(|| prefs.and_then(|p| p.default_recipient.clone()));

        let url = URL_RE
            .find(goal)
            .map(|m| trim_trailing_punctuation(m.as_str()).to_string());

        let quoted = QUOTED_RE
            .captures(goal)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        let path = PATH_RE
            .captures(goal)
            .and_then(|c| c.get(1))
            .map(|m| trim_trailing_punctuation(m.as_str()).to_string());

        let coords = COORDS_RE.captures(goal).and_then(|c| {
            let x = c.get(1)?.as_str().parse().ok()?;
            let y = c.get(2)?.as_str().parse().ok()?;
            Some((x, y))
        });

        Self {
            user: user.to_string(),
            goal: goal.trim().to_string(),
            email,
            url,
            quoted,
            path,
            coords,
        }
    }

    fn get(&self, name: &str) -> Option<Fact> {
        match name {
            "user" => Some(Fact::Text(self.user.clone())),
            "goal" => Some(Fact::Text(self.goal.clone())),
            "email" => self.email.clone().map(Fact::Text),
            "url" => self.url.clone().map(Fact::Text),
            "quoted" => self.quoted.clone().map(Fact::Text),
            "path" => self.path.clone().map(Fact::Text),
            "x" => self.coords.map(|(x, _)| Fact::Int(x)),
            "y" => self.coords.map(|(_, y)| Fact::Int(y)),
            _ => None,
        }
    }
}

fn trim_trailing_punctuation(s: &str) -> &str {
    s.trim_end_matches(['.', ',', ';', ':', ')', '!', '?'])
}

/// Reject templates that name a placeholder outside the known set.
pub(crate) fn check_placeholders(rule_id: &str, parameters: &Parameters) -> GhosthandResult<()> {
    let mut unknown = None;
    for value in parameters.values() {
        visit_strings(value, &mut |s| {
            for caps in PLACEHOLDER_RE.captures_iter(s) {
                let name = &caps[1];
                if unknown.is_none() && !KNOWN.contains(&name) {
                    unknown = Some(name.to_string());
                }
            }
        });
    }
    match unknown {
        Some(name) => Err(GhosthandError::ConfigError {
            reason: format!("rule '{}' uses unknown placeholder '{{{}}}'", rule_id, name),
        }),
        None => Ok(()),
    }
}

fn visit_strings(value: &Value, f: &mut impl FnMut(&str)) {
    match value {
        Value::String(s) => f(s),
        Value::Array(items) => items.iter().for_each(|v| visit_strings(v, f)),
        Value::Object(map) => map.values().for_each(|v| visit_strings(v, f)),
        _ => {}
    }
}

/// Fill every placeholder in `template` from `facts`.
///
/// Returns `UnplannableGoal` naming the rule and the placeholder when a
/// value is missing and the template gives no fallback.
pub(crate) fn resolve(
    rule_id: &str,
    template: &Parameters,
    facts: &GoalFacts,
) -> GhosthandResult<Parameters> {
    template
        .iter()
        .map(|(name, value)| Ok((name.clone(), resolve_value(rule_id, value, facts)?)))
        .collect()
}

fn resolve_value(rule_id: &str, value: &Value, facts: &GoalFacts) -> GhosthandResult<Value> {
    match value {
        Value::String(s) => resolve_string(rule_id, s, facts),
        Value::Array(items) => items
            .iter()
            .map(|v| resolve_value(rule_id, v, facts))
            .collect::<GhosthandResult<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| Ok((k.clone(), resolve_value(rule_id, v, facts)?)))
            .collect::<GhosthandResult<serde_json::Map<_, _>>>()
            .map(Value::Object),
        other => Ok(other.clone()),
    }
}

fn resolve_string(rule_id: &str, s: &str, facts: &GoalFacts) -> GhosthandResult<Value> {
    // A lone placeholder keeps the fact's own type.
    if let Some(caps) = PLACEHOLDER_RE.captures(s) {
        if caps.get(0).is_some_and(|m| m.start() == 0 && m.end() == s.len()) {
            return Ok(match lookup(rule_id, &caps, facts)? {
                Fact::Int(n) => Value::from(n),
                Fact::Text(t) => Value::String(t),
            });
        }
    }

    let mut missing = None;
    let rendered = PLACEHOLDER_RE.replace_all(s, |caps: &Captures| {
        match lookup(rule_id, caps, facts) {
            Ok(fact) => fact.render(),
            Err(e) => {
                missing.get_or_insert(e);
                String::new()
            }
        }
    });
    match missing {
        Some(e) => Err(e),
        None => Ok(Value::String(rendered.into_owned())),
    }
}

fn lookup(rule_id: &str, caps: &Captures, facts: &GoalFacts) -> GhosthandResult<Fact> {
    let name = &caps[1];
    if let Some(fact) = facts.get(name) {
        return Ok(fact);
    }
    match caps.get(2) {
        Some(fallback) => Ok(Fact::Text(fallback.as_str().to_string())),
        None => Err(GhosthandError::UnplannableGoal {
            reason: format!("rule '{}' needs {{{}}} but the goal provides none", rule_id, name),
        }),
    }
}
