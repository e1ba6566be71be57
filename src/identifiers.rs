use std::collections::HashSet;

/// Trims identifiers, drops blanks, and removes case-insensitive duplicates.
/// The first spelling of each identifier is kept, in input order.
pub fn normalize_identifiers<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter_map(|value| {
            let trimmed = value.as_ref().trim();
            if trimmed.is_empty() || !seen.insert(trimmed.to_uppercase()) {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

/// Trims a required parameter, naming it in the error when blank.
pub fn require_param(value: Option<&str>, name: &str) -> crate::error::Result<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(crate::error::BrokerError::Validation(format!(
            "missing {}",
            name
        ))),
    }
}
