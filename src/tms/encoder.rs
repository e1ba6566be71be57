//! Request builders for the TMS trace endpoint.
//!
//! `get_tms_trace.php` expects its complete filter form on every call, so every
//! trace starts from the configured `trace_fields` and overrides individual
//! fields. The session identity (`UserID`, `UserToken`) is never encoded here;
//! the session appends it at send time.

use reqwest::Method;
use serde_json::{json, Map, Value};

use crate::config::TmsConfig;
use crate::dispatch::{EncodedRequest, RequestBody};
use crate::error::{BrokerError, OperationKind, Result};
use crate::identifiers::{normalize_identifiers, require_param};
use crate::tms::session::FORM_CONTENT_TYPE;

pub const DEFAULT_PAGE: u32 = 1;

const IDENTITY_FIELDS: &[&str] = &["UserID", "UserToken"];

/// Shape returned for a lookup that had nothing to look up.
pub fn empty_trace_result() -> Value {
    json!({ "data": [] })
}

/// Flattens the row list out of whichever envelope the trace endpoint used:
/// `rows`, `result`, `data`, a bare array, or nothing.
pub fn normalize_trace_response(response: Value) -> Value {
    let rows = match response {
        Value::Array(rows) => Value::Array(rows),
        Value::Object(mut map) => ["rows", "result", "data"]
            .iter()
            .find_map(|key| map.remove(*key).filter(|v| !v.is_null()))
            .unwrap_or_else(|| Value::Array(Vec::new())),
        _ => Value::Array(Vec::new()),
    };
    json!({ "data": rows })
}

fn default_form(config: &TmsConfig, page: u32, rows: u32) -> Vec<(String, String)> {
    let mut form: Vec<(String, String)> = config
        .trace_fields
        .iter()
        .map(|field| (field.name.clone(), field.value.clone()))
        .collect();
    form.push(("page".to_string(), page.to_string()));
    form.push(("rows".to_string(), rows.to_string()));
    form.push(("pageName".to_string(), config.trace_page.clone()));
    form
}

fn set_field(form: &mut Vec<(String, String)>, name: &str, value: String) {
    match form.iter_mut().find(|(key, _)| key == name) {
        Some(slot) => slot.1 = value,
        None => form.push((name.to_string(), value)),
    }
}

fn trace_request(config: &TmsConfig, operation: OperationKind, form: Vec<(String, String)>) -> EncodedRequest {
    let origin = config.base_url.trim_end_matches('/').to_string();
    EncodedRequest {
        operation,
        method: Method::POST,
        path: config.trace_path.clone(),
        query: Vec::new(),
        headers: vec![
            ("Content-Type", FORM_CONTENT_TYPE.to_string()),
            ("X-Requested-With", "XMLHttpRequest".to_string()),
            ("Referer", format!("{}{}", origin, config.trace_page)),
            ("Origin", origin),
        ],
        body: RequestBody::Form(form),
    }
}

/// Trace filtered to one bill-to account.
pub fn trace_by_bill_to(
    config: &TmsConfig,
    bill_to: Option<&str>,
    page: Option<u32>,
    rows: Option<u32>,
) -> Result<EncodedRequest> {
    let bill_to = require_param(bill_to, "billTo")?;
    let mut form = default_form(
        config,
        page.unwrap_or(DEFAULT_PAGE),
        rows.unwrap_or(config.trace_rows),
    );
    set_field(&mut form, &config.bill_to_field, bill_to);
    Ok(trace_request(config, OperationKind::TraceByBillTo, form))
}

/// Trace over a set of PRO numbers. `None` when nothing is left after
/// normalization.
pub fn multi_identifier_lookup<S: AsRef<str>>(
    config: &TmsConfig,
    pros: &[S],
) -> Option<EncodedRequest> {
    let pros = normalize_identifiers(pros.iter());
    if pros.is_empty() {
        return None;
    }

    let rows = config.trace_rows.max(pros.len() as u32);
    let mut form = default_form(config, DEFAULT_PAGE, rows);
    set_field(&mut form, &config.pro_field, pros.join("\n"));
    Some(trace_request(config, OperationKind::MultiIdentifierLookup, form))
}

fn form_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        other => other.to_string(),
    }
}

/// Caller fields overlaid on the default trace form. Identity fields in the
/// overlay are ignored.
pub fn trace(config: &TmsConfig, fields: Option<&Map<String, Value>>) -> Result<EncodedRequest> {
    let mut form = default_form(config, DEFAULT_PAGE, config.trace_rows);
    if let Some(fields) = fields {
        for (name, value) in fields {
            if IDENTITY_FIELDS.contains(&name.as_str()) {
                continue;
            }
            if value.is_array() || value.is_object() {
                return Err(BrokerError::Validation(format!(
                    "trace field {} must be a scalar",
                    name
                )));
            }
            set_field(&mut form, name, form_value(value));
        }
    }
    Ok(trace_request(config, OperationKind::Trace, form))
}
