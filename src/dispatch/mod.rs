//! Retrying request dispatcher.
//!
//! Sends one encoded operation to an upstream service with the current cached
//! session, and applies [`RetryPolicy`] sequentially: a session rejection
//! forces a re-login and rebuilds the request with the new credentials, a 429
//! waits a randomized backoff, anything else waits a short fixed delay. Only
//! one attempt is in flight per dispatch.

mod retry;

pub use retry::RetryPolicy;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::credentials::{CredentialManager, SessionProvider};
use crate::error::{BrokerError, OperationKind, Result};
use retry::{classify, Outcome};

/// Request payload as the upstream expects it on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// Ordered form fields. Session identity is appended at send time.
    Form(Vec<(String, String)>),
}

/// One logical operation encoded into its exact upstream request shape.
#[derive(Debug, Clone)]
pub struct EncodedRequest {
    pub operation: OperationKind,
    pub method: Method,
    /// Path relative to the service base URL, segments already escaped.
    pub path: String,
    pub query: Vec<(String, String)>,
    /// Operation headers, case preserved. Identity headers are added by the
    /// session's [`Upstream::authorize`].
    pub headers: Vec<(&'static str, String)>,
    pub body: RequestBody,
}

impl EncodedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn form_field(&self, name: &str) -> Option<&str> {
        match &self.body {
            RequestBody::Form(fields) => fields
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }
}

/// Raw upstream response, passed through to the caller unmodified.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: String,
}

impl UpstreamResponse {
    /// Body as JSON; a non-JSON body is returned as a JSON string.
    pub fn into_json(self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::String(self.body))
    }
}

/// Attaches session credentials to an outbound request.
pub trait Upstream: SessionProvider {
    /// Applies operation headers, identity, and body for one attempt.
    fn authorize(
        &self,
        builder: RequestBuilder,
        request: &EncodedRequest,
        snapshot: &Self::Snapshot,
    ) -> Result<RequestBuilder>;

    /// True when the response says the session is no longer valid.
    fn is_session_rejected(&self, status: StatusCode, _body: &str) -> bool {
        status == StatusCode::UNAUTHORIZED
    }
}

/// Applies operation headers and serializes the body.
pub fn apply_request(
    mut builder: RequestBuilder,
    headers: &[(&'static str, String)],
    body: &RequestBody,
) -> Result<RequestBuilder> {
    for (name, value) in headers {
        builder = builder.header(*name, value.as_str());
    }
    let builder = match body {
        RequestBody::Empty => builder,
        RequestBody::Json(value) => builder.body(serde_json::to_vec(value).map_err(|e| {
            BrokerError::Validation(format!("failed to encode JSON body: {}", e))
        })?),
        RequestBody::Form(fields) => builder.body(serde_urlencoded::to_string(fields).map_err(
            |e| BrokerError::Validation(format!("failed to encode form body: {}", e)),
        )?),
    };
    Ok(builder)
}

/// Builds the outbound client with the per-call safety timeout.
pub fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| BrokerError::Configuration(format!("failed to build HTTP client: {}", e)))
}

/// Sends encoded operations for one upstream service.
pub struct Dispatcher<U: Upstream> {
    http: Client,
    base_url: String,
    sessions: Arc<CredentialManager<U>>,
    policy: RetryPolicy,
}

impl<U: Upstream> Dispatcher<U> {
    pub fn new(
        http: Client,
        base_url: String,
        sessions: Arc<CredentialManager<U>>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            sessions,
            policy,
        }
    }

    pub fn sessions(&self) -> &Arc<CredentialManager<U>> {
        &self.sessions
    }

    /// Sends `request`, retrying per the policy.
    pub async fn dispatch(&self, request: &EncodedRequest) -> Result<UpstreamResponse> {
        let service = self.sessions.service();
        let operation = request.operation;
        let mut snapshot = self.sessions.acquire(false).await?;

        let mut session_retries = 0;
        let mut rate_limit_retries = 0;
        let mut transient_retries = 0;

        loop {
            let (outcome, status, body) = match self.send(request, &snapshot).await? {
                Ok(response) => {
                    let rejected = self
                        .sessions
                        .provider()
                        .is_session_rejected(response.status, &response.body);
                    match classify(response.status, rejected) {
                        Outcome::Success => {
                            debug!(
                                service = %service,
                                operation = %operation,
                                status = response.status.as_u16(),
                                "Upstream call succeeded"
                            );
                            return Ok(response);
                        }
                        // A rejection inside a 200 envelope is still reported as 401
                        Outcome::SessionRejected => (
                            Outcome::SessionRejected,
                            Some(StatusCode::UNAUTHORIZED.as_u16()),
                            response.body,
                        ),
                        outcome => (outcome, Some(response.status.as_u16()), response.body),
                    }
                }
                Err(e) => (Outcome::Transient, None, e.to_string()),
            };

            match outcome {
                Outcome::SessionRejected if session_retries < self.policy.max_session_retries => {
                    session_retries += 1;
                    warn!(
                        service = %service,
                        operation = %operation,
                        attempt = session_retries,
                        "Session rejected, re-authenticating"
                    );
                    snapshot = self.sessions.reauthenticate(&snapshot).await?;
                }
                Outcome::RateLimited if rate_limit_retries < self.policy.max_rate_limit_retries => {
                    rate_limit_retries += 1;
                    let delay = self.policy.rate_limit_delay();
                    warn!(
                        service = %service,
                        operation = %operation,
                        attempt = rate_limit_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Outcome::Transient if transient_retries < self.policy.max_transient_retries => {
                    transient_retries += 1;
                    warn!(
                        service = %service,
                        operation = %operation,
                        attempt = transient_retries,
                        status = ?status,
                        "Upstream call failed, retrying"
                    );
                    tokio::time::sleep(self.policy.transient_delay).await;
                }
                _ => {
                    error!(
                        service = %service,
                        operation = %operation,
                        status = ?status,
                        "Upstream call failed, retries exhausted"
                    );
                    return Err(BrokerError::Upstream {
                        service,
                        operation,
                        status,
                        body,
                    });
                }
            }
        }
    }

    /// One attempt. The outer error is a request we could not build; the inner
    /// one is a transport failure eligible for retry.
    async fn send(
        &self,
        request: &EncodedRequest,
        snapshot: &U::Snapshot,
    ) -> Result<std::result::Result<UpstreamResponse, reqwest::Error>> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.http.request(request.method.clone(), &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        let builder = self
            .sessions
            .provider()
            .authorize(builder, request, snapshot)?;

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return Ok(Err(e)),
        };
        let status = response.status();
        Ok(response
            .text()
            .await
            .map(|body| UpstreamResponse { status, body }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_into_json_passes_through() {
        let response = UpstreamResponse {
            status: StatusCode::OK,
            body: r#"{"code":200,"data":{"items":[1,2]}}"#.to_string(),
        };
        assert_eq!(
            response.into_json(),
            json!({"code": 200, "data": {"items": [1, 2]}})
        );
    }

    #[test]
    fn test_into_json_non_json_body() {
        let response = UpstreamResponse {
            status: StatusCode::OK,
            body: "OK".to_string(),
        };
        assert_eq!(response.into_json(), json!("OK"));
    }

    #[test]
    fn test_encoded_request_lookups() {
        let request = EncodedRequest {
            operation: OperationKind::Trace,
            method: Method::POST,
            path: "/trace.php".to_string(),
            query: Vec::new(),
            headers: vec![("X-Requested-With", "XMLHttpRequest".to_string())],
            body: RequestBody::Form(vec![("input_filter_pro".to_string(), "P1".to_string())]),
        };
        assert_eq!(request.header("X-Requested-With"), Some("XMLHttpRequest"));
        assert_eq!(request.header("x-requested-with"), None);
        assert_eq!(request.form_field("input_filter_pro"), Some("P1"));
        assert_eq!(request.form_field("missing"), None);
    }
}
