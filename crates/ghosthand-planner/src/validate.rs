//! Structural validation shared by every plan path.
//!
//! Two phases, the same for authored, heuristic and generated plans:
//!
//! 1. **Envelope**: plan text must be a non-empty JSON array of
//!    `{kind, parameters}` objects, checked with the `jsonschema` crate.
//! 2. **Schema**: every candidate must name a known kind and carry
//!    parameters that satisfy that kind's `ActionSchema`.

use std::sync::LazyLock;

use jsonschema::Validator;
use serde_json::{json, Value};

use ghosthand_contracts::{
    action::Action,
    error::{GhosthandError, GhosthandResult},
    plan::Plan,
};

use crate::source::CandidateStep;

static ENVELOPE: LazyLock<Result<Validator, String>> = LazyLock::new(|| {
    let schema = json!({
        "type": "array",
        "minItems": 1,
        "items": {
            "type": "object",
            "required": ["kind"],
            "properties": {
                "kind": { "type": "string", "minLength": 1 },
                "parameters": { "type": "object" },
                "is_privileged": { "type": "boolean" }
            },
            "additionalProperties": false
        }
    });
    jsonschema::validator_for(&schema).map_err(|e| e.to_string())
});

/// Parse plan text into unchecked candidates (phase 1 only).
pub fn parse_candidates(plan_text: &str) -> GhosthandResult<Vec<CandidateStep>> {
    let body = strip_code_fence(plan_text);
    let value: Value = serde_json::from_str(body).map_err(|e| GhosthandError::PlanParse {
        reason: format!("plan text is not valid JSON: {}", e),
    })?;

    let validator = ENVELOPE.as_ref().map_err(|e| GhosthandError::ConfigError {
        reason: format!("plan envelope schema is invalid: {}", e),
    })?;
    let violations: Vec<String> = validator
        .iter_errors(&value)
        .map(|error| format!("at '{}': {}", error.instance_path, error))
        .collect();
    if !violations.is_empty() {
        return Err(GhosthandError::PlanParse {
            reason: violations.join("; "),
        });
    }

    serde_json::from_value(value).map_err(|e| GhosthandError::PlanParse {
        reason: e.to_string(),
    })
}

/// Check candidates against the action schema and build a plan (phase 2).
pub fn candidates_to_plan(candidates: Vec<CandidateStep>) -> GhosthandResult<Plan> {
    let actions = candidates
        .into_iter()
        .map(|step| Action::parse(&step.kind, step.parameters))
        .collect::<GhosthandResult<Vec<_>>>()?;
    Plan::new(actions)
}

/// Both phases: plan text to a validated `Plan`.
pub fn parse_plan_text(plan_text: &str) -> GhosthandResult<Plan> {
    candidates_to_plan(parse_candidates(plan_text)?)
}

/// Drop a surrounding Markdown code fence, as language models like to add.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
