//! `ghosthand.toml`: deployment configuration.
//!
//! Every section and field is optional. A missing file means all defaults.
//!
//! ```toml
//! [history]
//! path = "~/.ghosthand/history.jsonl"
//!
//! [planner]
//! rules_path = "~/.ghosthand/rules.toml"
//! fuzzy_threshold = 0.6
//! hint_limit = 3
//!
//! [planner.generative]
//! endpoint = "https://api.openai.com/v1/chat/completions"
//! model = "gpt-4o-mini"
//!
//! [orchestrator]
//! require_identity = true
//! step_timeout_secs = 30
//!
//! [capabilities]
//! search_dirs = ["~/Pictures", "~/Desktop"]
//!
//! [identity]
//! store = "~/.ghosthand/identity.json"
//!
//! [queue]
//! path = "~/.ghosthand/queue.jsonl"
//!
//! [guard]
//! deny_phrases = ["rm -rf", "shutdown"]
//! allowed_users = ["william"]
//!
//! [preferences.william]
//! default_recipient = "tutor@school.uk"
//! ```

use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use tracing::debug;

use ghosthand_capabilities::{files::expand_home, CapabilityConfig};
use ghosthand_contracts::error::{GhosthandError, GhosthandResult};
use ghosthand_core::{GoalGuard, OrchestratorSettings, DEFAULT_DENY_PHRASES};
use ghosthand_planner::{HttpGeneratorConfig, Preferences};

/// Location checked when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "~/.ghosthand/config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GhosthandConfig {
    pub history: HistoryConfig,
    pub planner: PlannerConfig,
    pub orchestrator: OrchestratorConfig,
    pub capabilities: CapabilityConfig,
    pub identity: IdentityConfig,
    pub queue: QueueConfig,
    pub guard: GuardConfig,
    pub preferences: Preferences,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    pub path: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: "~/.ghosthand/history.jsonl".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlannerConfig {
    /// Replaces the built-in rule table when set.
    pub rules_path: Option<String>,
    pub fuzzy_threshold: f64,
    pub hint_limit: usize,
    /// Enables the generative fallback when present.
    pub generative: Option<HttpGeneratorConfig>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        let settings = OrchestratorSettings::default();
        Self {
            rules_path: None,
            fuzzy_threshold: settings.fuzzy_threshold,
            hint_limit: settings.max_hints,
            generative: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorConfig {
    pub require_identity: bool,
    pub step_timeout_secs: Option<u64>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            require_identity: true,
            step_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdentityConfig {
    /// Passphrase digest store. Empty disables identity entirely.
    pub store: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            store: "~/.ghosthand/identity.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
    pub path: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            path: "~/.ghosthand/queue.jsonl".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuardConfig {
    /// Goals and steps containing any of these are refused. An empty list
    /// turns phrase checks off.
    pub deny_phrases: Vec<String>,
    /// When non-empty, only these users may submit goals.
    pub allowed_users: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            deny_phrases: DEFAULT_DENY_PHRASES.iter().map(|p| p.to_string()).collect(),
            allowed_users: Vec::new(),
        }
    }
}

impl GhosthandConfig {
    pub fn from_toml_str(s: &str) -> GhosthandResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| GhosthandError::ConfigError {
            reason: format!("invalid config: {}", e),
        })?;
        config.check()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> GhosthandResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| GhosthandError::ConfigError {
            reason: format!("cannot read config '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&text)
    }

    /// Load `explicit` if given, else the default location if it exists,
    /// else defaults.
    pub fn load(explicit: Option<&Path>) -> GhosthandResult<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let fallback = expand_home(DEFAULT_CONFIG_PATH);
        if fallback.is_file() {
            debug!(path = %fallback.display(), "using default config file");
            return Self::from_file(&fallback);
        }
        Ok(Self::default())
    }

    fn check(&self) -> GhosthandResult<()> {
        if !(0.0..=1.0).contains(&self.planner.fuzzy_threshold) {
            return Err(GhosthandError::ConfigError {
                reason: format!(
                    "planner.fuzzy_threshold must be between 0 and 1, got {}",
                    self.planner.fuzzy_threshold
                ),
            });
        }
        if self.orchestrator.step_timeout_secs == Some(0) {
            return Err(GhosthandError::ConfigError {
                reason: "orchestrator.step_timeout_secs must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn goal_guard(&self) -> GoalGuard {
        GoalGuard::new(&self.guard.deny_phrases).with_allowed_users(&self.guard.allowed_users)
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            require_identity: self.orchestrator.require_identity,
            step_timeout: self.orchestrator.step_timeout_secs.map(Duration::from_secs),
            fuzzy_threshold: self.planner.fuzzy_threshold,
            max_hints: self.planner.hint_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = GhosthandConfig::from_toml_str("").unwrap();
        assert_eq!(config.history.path, "~/.ghosthand/history.jsonl");
        assert!(config.orchestrator.require_identity);
        assert!(config.planner.generative.is_none());
        assert_eq!(config.capabilities, CapabilityConfig::default());
    }

    #[test]
    fn sections_are_read() {
        let config = GhosthandConfig::from_toml_str(
            r#"
            [planner]
            hint_limit = 5

            [planner.generative]
            model = "local-model"

            [orchestrator]
            require_identity = false
            step_timeout_secs = 7

            [capabilities]
            speech_bin = "say"

            [preferences.william]
            default_recipient = "tutor@school.uk"
            "#,
        )
        .unwrap();

        let settings = config.orchestrator_settings();
        assert_eq!(settings.max_hints, 5);
        assert!(!settings.require_identity);
        assert_eq!(settings.step_timeout, Some(Duration::from_secs(7)));
        assert_eq!(config.planner.generative.unwrap().model, "local-model");
        assert_eq!(config.capabilities.speech_bin, "say");
        assert_eq!(
            config.preferences["william"].default_recipient.as_deref(),
            Some("tutor@school.uk")
        );
    }

    #[test]
    fn guard_defaults_to_the_standard_phrases() {
        let config = GhosthandConfig::from_toml_str("").unwrap();
        assert_eq!(config.queue.path, "~/.ghosthand/queue.jsonl");
        assert!(config.goal_guard().check_goal("shutdown now", "william").is_err());

        let config = GhosthandConfig::from_toml_str(
            r#"
            [guard]
            deny_phrases = []
            allowed_users = ["william"]
            "#,
        )
        .unwrap();
        let guard = config.goal_guard();
        guard.check_goal("shutdown now", "william").unwrap();
        assert!(guard.check_goal("say hi", "mallory").is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        match GhosthandConfig::from_toml_str("[history]\npaht = \"x\"\n") {
            Err(GhosthandError::ConfigError { reason }) => {
                assert!(reason.contains("paht"), "{reason}")
            }
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        assert!(GhosthandConfig::from_toml_str("[planner]\nfuzzy_threshold = 1.5\n").is_err());
        assert!(GhosthandConfig::from_toml_str("[orchestrator]\nstep_timeout_secs = 0\n").is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GhosthandConfig::load(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
