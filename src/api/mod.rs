//! Command endpoint.
//!
//! Each upstream service gets one `POST` route taking `{action, payload}`.
//! Handlers validate the payload, run the matching client operation, and map
//! [`BrokerError`] onto HTTP statuses with an `{"error": ...}` body.

mod fms;
mod tms;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

use crate::credentials::SessionStatus;
use crate::error::{BrokerError, Service};
use crate::fms::FmsClient;
use crate::tms::TmsClient;

#[cfg(test)]
mod tests;

/// Shared application state for the command API
#[derive(Clone)]
pub struct AppState {
    pub fms: Arc<FmsClient>,
    pub tms: Arc<TmsClient>,
}

/// Request body for `POST /api/fms` and `POST /api/tms`
#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

/// Response for GET /api/health
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub fms: SessionStatus,
    pub tms: SessionStatus,
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create command API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/fms", post(fms_command))
        .route("/api/tms", post(tms_command))
        .route("/api/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// POST /api/fms
async fn fms_command(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CommandRequest>,
) -> Result<Response, AppError> {
    let action = request.action.unwrap_or_default();
    let span = command_span(Service::Fms, &action);
    fms::handle(&state.fms, &action, &request.payload)
        .instrument(span)
        .await
}

/// POST /api/tms
async fn tms_command(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CommandRequest>,
) -> Result<Response, AppError> {
    let action = request.action.unwrap_or_default();
    let span = command_span(Service::Tms, &action);
    tms::handle(&state.tms, &action, &request.payload)
        .instrument(span)
        .await
}

/// GET /api/health - cached session state, no upstream calls
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        fms: state.fms.session_status().await,
        tms: state.tms.session_status().await,
    })
}

fn command_span(service: Service, action: &str) -> tracing::Span {
    info_span!(
        "command",
        request_id = %Uuid::new_v4(),
        service = %service,
        action = %action
    )
}

/// Reads a string or number parameter. Blank handling is left to the encoders.
fn text_param(payload: &Value, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reads an optional positive integer, accepting numeric strings.
fn number_param(payload: &Value, key: &str) -> Result<Option<u32>, AppError> {
    let parsed = match payload.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().parse::<u32>().ok(),
        Some(_) => None,
    };
    match parsed {
        Some(0) | None => Err(AppError::BadRequest(format!(
            "{} must be a positive integer",
            key
        ))),
        Some(n) => Ok(Some(n)),
    }
}

fn flag_param(payload: &Value, key: &str) -> bool {
    match payload.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim(), "true" | "1"),
        Some(Value::Number(n)) => n.as_u64() == Some(1),
        _ => false,
    }
}

/// Identifier list: an array of strings/numbers, or one string separated by
/// commas or whitespace.
fn list_param(payload: &Value, key: &str) -> Vec<String> {
    match payload.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => s
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// API error type
#[derive(Debug)]
enum AppError {
    BadRequest(String),
    InternalServerError(String),
    BadGateway(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}

impl From<BrokerError> for AppError {
    fn from(e: BrokerError) -> Self {
        match e {
            BrokerError::Validation(_) => AppError::BadRequest(e.to_string()),
            BrokerError::Configuration(_) => {
                warn!(error = %e, "Command failed on configuration");
                AppError::InternalServerError(e.to_string())
            }
            BrokerError::Authentication { .. } | BrokerError::Upstream { .. } => {
                warn!(error = %e, "Command failed upstream");
                AppError::BadGateway(e.to_string())
            }
        }
    }
}
