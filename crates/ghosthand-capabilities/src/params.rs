//! Typed access to already-validated action parameters.
//!
//! Parameters reaching an executor have passed the action schema, so these
//! lookups only fail if an executor is bound to the wrong kind.

use ghosthand_contracts::{
    action::Parameters,
    error::{GhosthandError, GhosthandResult},
};

fn missing(kind: &str, name: &str) -> GhosthandError {
    GhosthandError::executor(kind, format!("parameter '{}' missing or mistyped", name))
}

pub fn required_str<'p>(
    kind: &str,
    params: &'p Parameters,
    name: &str,
) -> GhosthandResult<&'p str> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| missing(kind, name))
}

pub fn optional_str<'p>(params: &'p Parameters, name: &str) -> Option<&'p str> {
    params.get(name).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

pub fn required_int(kind: &str, params: &Parameters, name: &str) -> GhosthandResult<i64> {
    params
        .get(name)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| missing(kind, name))
}

pub fn optional_str_list(params: &Parameters, name: &str) -> Vec<String> {
    params
        .get(name)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
