use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::{FmsConfig, TokenMode};
use crate::credentials::extract::first_non_empty;
use crate::credentials::{CredentialSnapshot, SessionProvider};
use crate::dispatch::{apply_request, EncodedRequest, Upstream};
use crate::error::{BrokerError, Result, Service};

/// Session token locations, tried in order.
pub const SESSION_TOKEN_PATHS: &[&str] = &["data.token", "token", "result.token"];

/// Authorization token locations (dual-token deployments), tried in order.
pub const AUTH_TOKEN_PATHS: &[&str] = &[
    "data.authorization",
    "data.access_token",
    "authorization",
    "access_token",
    "result.authorization",
    "result.access_token",
];

/// FMS credentials for one authorized call.
#[derive(Debug, Clone, PartialEq)]
pub struct FmsSnapshot {
    pub session_token: String,
    /// Present only in dual-token deployments.
    pub auth_token: Option<String>,
}

impl CredentialSnapshot for FmsSnapshot {
    fn is_complete(&self) -> bool {
        !self.session_token.is_empty()
            && self.auth_token.as_ref().map_or(true, |t| !t.is_empty())
    }
}

/// `POST Auth/Login` exchange and header attachment for FMS.
pub struct FmsSession {
    http: Client,
    config: FmsConfig,
}

impl FmsSession {
    pub fn new(http: Client, config: FmsConfig) -> Self {
        Self { http, config }
    }

    fn login_url(&self) -> String {
        format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.login_path
        )
    }
}

#[async_trait]
impl SessionProvider for FmsSession {
    type Snapshot = FmsSnapshot;

    fn service(&self) -> Service {
        Service::Fms
    }

    async fn login(&self) -> Result<FmsSnapshot> {
        let (account, password) = self.config.login_credentials()?;

        let response = self
            .http
            .post(self.login_url())
            .header("fms-client", self.config.client_id.as_str())
            .header("Content-Type", "application/json")
            .body(json!({ "account": account, "password": password }).to_string())
            .send()
            .await
            .map_err(|e| {
                BrokerError::authentication(Service::Fms, format!("login request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BrokerError::authentication(
                Service::Fms,
                format!("login failed with HTTP {}", status.as_u16()),
            ));
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);

        let session_token = first_non_empty(&body, SESSION_TOKEN_PATHS).ok_or_else(|| {
            BrokerError::authentication(Service::Fms, "no token returned from Auth/Login")
        })?;

        let auth_token = match self.config.token_mode {
            TokenMode::Single => None,
            TokenMode::Dual => Some(first_non_empty(&body, AUTH_TOKEN_PATHS).ok_or_else(
                || {
                    BrokerError::authentication(
                        Service::Fms,
                        "no authorization token returned from Auth/Login",
                    )
                },
            )?),
        };

        debug!(dual = auth_token.is_some(), "FMS login response accepted");

        Ok(FmsSnapshot {
            session_token,
            auth_token,
        })
    }
}

impl Upstream for FmsSession {
    fn authorize(
        &self,
        builder: RequestBuilder,
        request: &EncodedRequest,
        snapshot: &FmsSnapshot,
    ) -> Result<RequestBuilder> {
        let mut builder = apply_request(builder, &request.headers, &request.body)?
            .header("fms-token", snapshot.session_token.as_str());
        if let Some(auth_token) = &snapshot.auth_token {
            builder = builder.header("authorization", auth_token.as_str());
        }
        Ok(builder)
    }

    /// HTTP 401, or a 401 code inside the JSON envelope.
    fn is_session_rejected(&self, status: StatusCode, body: &str) -> bool {
        if status == StatusCode::UNAUTHORIZED {
            return true;
        }
        serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.get("code").cloned())
            .map_or(false, |code| code == json!(401) || code == json!("401"))
    }
}
