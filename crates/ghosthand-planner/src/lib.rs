//! # ghosthand-planner
//!
//! Turns goal text into a validated `Plan` for the Ghosthand runtime.
//!
//! ## Overview
//!
//! [`RulePlanner`] implements the [`Planner`](ghosthand_core::traits::Planner)
//! trait. Goals are matched against a TOML rule table of literal trigger
//! phrases; when nothing matches, an optional generative source (any
//! [`PlanGenerator`], e.g. [`HttpPlanGenerator`]) is asked instead. Every
//! proposal, whichever source made it, goes through the same validation as
//! authored plan text.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use ghosthand_planner::{RulePlanner, RuleTable};
//!
//! let planner = RulePlanner::new(&RuleTable::from_file(Path::new("rules.toml"))?)?;
//! // Pass `planner` to `ghosthand_core::Orchestrator::new(...)`.
//! ```
//!
//! ## Rule matching
//!
//! Patterns match case-insensitively on word boundaries. When matches
//! overlap, the longer phrase wins, then a rule whose kind appeared in a
//! similar past plan, then the rule declared first.

pub mod generator;
pub mod planner;
pub mod preferences;
pub mod rule;
pub mod source;
pub mod template;
pub mod validate;

pub use generator::{HttpGeneratorConfig, HttpPlanGenerator};
pub use planner::RulePlanner;
pub use preferences::{Preferences, UserPreferences};
pub use rule::{PlanRule, RuleTable};
pub use source::{CandidateStep, PlanGenerator, PlanSource};

// ── Tests ─────────────────────────────────────────────────────────────────────
