//! Per-user planning defaults.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Defaults the planner falls back on when a goal leaves something out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    /// Recipient used for `{email}` when the goal names no address.
    #[serde(default)]
    pub default_recipient: Option<String>,
}

/// Preferences keyed by user name.
///
/// In TOML this is a table of tables:
/// ```toml
/// [preferences.william]
/// default_recipient = "tutor@school.uk"
/// ```
pub type Preferences = BTreeMap<String, UserPreferences>;
