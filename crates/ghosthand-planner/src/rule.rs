//! Heuristic rule types and the TOML rule-table schema.
//!
//! A `RuleTable` is deserialized from TOML and holds an ordered list of
//! `PlanRule`s. Each rule maps a set of literal trigger phrases to one action
//! kind plus a parameter template. Declaration order is the last tie-breaker
//! when two rules claim overlapping parts of a goal.
//!
//! Example:
//! ```toml
//! [[rules]]
//! id = "locate-screenshot"
//! description = "Find the newest screenshot"
//! patterns = ["screenshot", "latest screenshot"]
//! kind = "locate-file"
//! parameters = { pattern = "screenshot" }
//! ```

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use ghosthand_contracts::{
    action::{ActionKind, Parameters},
    error::{GhosthandError, GhosthandResult},
};

use crate::template;

/// The rule table compiled into the binary.
pub const DEFAULT_RULES: &str = include_str!("default_rules.toml");

/// A single heuristic rule loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRule {
    /// Stable identifier used in logs and unplannable-goal reasons.
    pub id: String,

    #[serde(default)]
    pub description: String,

    /// Literal trigger phrases. Matched case-insensitively on word boundaries.
    pub patterns: Vec<String>,

    /// Action kind this rule contributes, by wire name.
    pub kind: String,

    /// Parameter templates. String values may contain `{placeholder}`s.
    #[serde(default)]
    pub parameters: Parameters,
}

/// The top-level structure deserialized from a TOML rule file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleTable {
    /// Ordered list of rules. Earlier rules win otherwise-equal ties.
    pub rules: Vec<PlanRule>,
}

impl RuleTable {
    /// Parse `s` as a TOML rule table.
    ///
    /// Returns `ConfigError` if the TOML is malformed or does not match the
    /// expected schema.
    pub fn from_toml_str(s: &str) -> GhosthandResult<Self> {
        toml::from_str(s).map_err(|e| GhosthandError::ConfigError {
            reason: format!("failed to parse rule TOML: {}", e),
        })
    }

    /// Read the file at `path` and parse it as a TOML rule table.
    pub fn from_file(path: &Path) -> GhosthandResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| GhosthandError::ConfigError {
            reason: format!("failed to read rule file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// The built-in rule table.
    pub fn builtin() -> GhosthandResult<Self> {
        Self::from_toml_str(DEFAULT_RULES)
    }
}

/// A rule whose kind, patterns and templates have been checked.
#[derive(Debug, Clone)]
pub(crate) struct CompiledRule {
    pub(crate) id: String,
    pub(crate) kind: ActionKind,
    pub(crate) order: usize,
    patterns: Vec<(String, Regex)>,
    pub(crate) parameters: Parameters,
}

/// Where a rule matched in a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RuleMatch {
    pub(crate) rule: usize,
    pub(crate) start: usize,
    pub(crate) end: usize,
}

impl RuleMatch {
    pub(crate) fn len(&self) -> usize {
        self.end - self.start
    }

    pub(crate) fn overlaps(&self, other: &RuleMatch) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl CompiledRule {
    /// Validate `rule` and compile its trigger phrases.
    ///
    /// Fails with `ConfigError` for an unknown kind, an empty pattern list,
    /// or a template naming an unknown placeholder.
    pub(crate) fn compile(rule: &PlanRule, order: usize) -> GhosthandResult<Self> {
        let kind: ActionKind = rule.kind.parse().map_err(|_| GhosthandError::ConfigError {
            reason: format!("rule '{}' names unknown action kind '{}'", rule.id, rule.kind),
        })?;

        let mut patterns = Vec::with_capacity(rule.patterns.len());
        for phrase in &rule.patterns {
            let phrase = phrase.trim().to_lowercase();
            if phrase.is_empty() {
                continue;
            }
            let regex = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&phrase))).map_err(|e| {
                GhosthandError::ConfigError {
                    reason: format!("rule '{}' pattern '{}' is invalid: {}", rule.id, phrase, e),
                }
            })?;
            patterns.push((phrase, regex));
        }
        if patterns.is_empty() {
            return Err(GhosthandError::ConfigError {
                reason: format!("rule '{}' has no patterns", rule.id),
            });
        }

        template::check_placeholders(&rule.id, &rule.parameters)?;

        Ok(Self {
            id: rule.id.clone(),
            kind,
            order,
            patterns,
            parameters: rule.parameters.clone(),
        })
    }

    /// The longest of this rule's patterns found in `goal`, if any.
    ///
    /// Equal-length matches resolve to the earliest occurrence.
    pub(crate) fn longest_match(&self, goal: &str) -> Option<RuleMatch> {
        self.patterns
            .iter()
            .filter_map(|(_, regex)| regex.find(goal))
            .map(|m| RuleMatch {
                rule: self.order,
                start: m.start(),
                end: m.end(),
            })
            .max_by(|a, b| a.len().cmp(&b.len()).then(b.start.cmp(&a.start)))
    }
}
