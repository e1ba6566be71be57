use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use super::{list_param, number_param, text_param, AppError};
use crate::tms::encoder::normalize_trace_response;
use crate::tms::TmsClient;

/// Response for the `login` action
#[derive(Serialize)]
struct LoginResponse {
    #[serde(rename = "UserID")]
    user_id: String,
    #[serde(rename = "UserToken")]
    user_token: String,
    #[serde(rename = "issuedAt")]
    issued_at: Option<DateTime<Utc>>,
}

pub(super) async fn handle(
    client: &TmsClient,
    action: &str,
    payload: &Value,
) -> Result<Response, AppError> {
    let response = match action {
        "login" => {
            let snapshot = client.login().await?;
            let status = client.session_status().await;
            info!("TMS login forced by command");
            return Ok(Json(LoginResponse {
                user_id: snapshot.user_id.clone(),
                user_token: snapshot.user_token.clone(),
                issued_at: status.issued_at,
            })
            .into_response());
        }
        "traceByBillTo" => {
            client
                .trace_by_bill_to(
                    text_param(payload, "billTo").as_deref(),
                    number_param(payload, "page")?,
                    number_param(payload, "rows")?,
                )
                .await?
        }
        "lookupPros" => client.lookup_pros(&list_param(payload, "pros")).await?,
        "trace" => {
            // Accepts `{fields: {...}}` or the field map itself
            let fields = match payload.get("fields") {
                Some(Value::Object(fields)) => Some(fields),
                Some(Value::Null) | None => payload.as_object(),
                Some(_) => {
                    return Err(AppError::BadRequest(
                        "fields must be an object".to_string(),
                    ))
                }
            };
            client.trace(fields).await?
        }
        _ => return Err(AppError::BadRequest("Unknown TMS action".to_string())),
    };

    Ok(Json(normalize_trace_response(response)).into_response())
}
