use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use super::{flag_param, list_param, number_param, text_param, AppError};
use crate::fms::{BillToOrderParams, FmsClient};

/// Response for the `login` action
#[derive(Serialize)]
struct LoginResponse {
    token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    authorization: Option<String>,
    #[serde(rename = "issuedAt")]
    issued_at: Option<DateTime<Utc>>,
}

pub(super) async fn handle(
    client: &FmsClient,
    action: &str,
    payload: &Value,
) -> Result<Response, AppError> {
    let response = match action {
        "login" => {
            let snapshot = client.login().await?;
            let status = client.session_status().await;
            info!("FMS login forced by command");
            return Ok(Json(LoginResponse {
                token: snapshot.session_token.clone(),
                authorization: snapshot.auth_token.clone(),
                issued_at: status.issued_at,
            })
            .into_response());
        }
        "searchBillTo" => {
            client
                .search_bill_to(text_param(payload, "code").as_deref())
                .await?
        }
        "searchOrders" | "searchOrdersRaw" => client.search_orders(payload.get("body")).await?,
        "searchOrdersByBillTo" => {
            let params = BillToOrderParams {
                bill_to: text_param(payload, "billToCode").unwrap_or_default(),
                page_number: number_param(payload, "page_number")?,
                page_size: number_param(payload, "page_size")?,
                active_only: flag_param(payload, "activeOnly"),
            };
            client.search_orders_by_bill_to(&params).await?
        }
        "lookupPros" => client.lookup_pros(&list_param(payload, "pros")).await?,
        "files" => client.files(text_param(payload, "orderNo").as_deref()).await?,
        "searchOrdersForPODCheck" => {
            client
                .search_orders_for_pod_check(text_param(payload, "pro").as_deref())
                .await?
        }
        _ => return Err(AppError::BadRequest("Unknown action".to_string())),
    };

    Ok(Json(response).into_response())
}
