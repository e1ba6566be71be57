//! Tolerant identity-field lookup for login responses.
//!
//! Upstream login endpoints have moved fields around between deployments
//! (top level, under `data`, under `result`). Each field is described by an
//! ordered list of dotted paths; the first path holding a non-empty value wins.

use serde_json::Value;

/// Returns the first non-empty string (or number, stringified) found at any of
/// `paths`, tried in order.
pub fn first_non_empty(value: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().find_map(|path| lookup(value, path))
}

fn lookup(value: &Value, path: &str) -> Option<String> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }

    match current {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed == "null" {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
