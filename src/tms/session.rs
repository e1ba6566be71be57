use async_trait::async_trait;
use base64::Engine;
use reqwest::header::SET_COOKIE;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::debug;

use crate::config::TmsConfig;
use crate::credentials::extract::first_non_empty;
use crate::credentials::{CredentialSnapshot, SessionProvider};
use crate::dispatch::{apply_request, EncodedRequest, RequestBody, Upstream};
use crate::error::{BrokerError, Result, Service};

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// `UserID` locations, tried in order.
pub const USER_ID_PATHS: &[&str] = &[
    "UserID",
    "UserId",
    "userId",
    "data.UserID",
    "data.UserId",
    "data.userId",
    "result.UserID",
    "result.UserId",
];

/// `UserToken` locations, tried in order.
pub const USER_TOKEN_PATHS: &[&str] = &[
    "UserToken",
    "userToken",
    "data.UserToken",
    "data.userToken",
    "result.UserToken",
    "result.userToken",
];

/// TMS credentials for one authorized call.
#[derive(Debug, Clone, PartialEq)]
pub struct TmsSnapshot {
    pub user_id: String,
    pub user_token: String,
    /// `name=value` pairs from the login `Set-Cookie` headers.
    pub session_cookie: String,
    /// Group the session was switched into.
    pub group_context: String,
}

impl CredentialSnapshot for TmsSnapshot {
    fn is_complete(&self) -> bool {
        !self.user_id.is_empty()
            && !self.user_token.is_empty()
            && !self.session_cookie.is_empty()
            && !self.group_context.is_empty()
    }
}

/// Login plus mandatory group switch for TMS.
pub struct TmsSession {
    http: Client,
    config: TmsConfig,
}

impl TmsSession {
    pub fn new(http: Client, config: TmsConfig) -> Self {
        Self { http, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn origin(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn login_password(&self, password: &str) -> String {
        if self.config.encode_password {
            base64::engine::general_purpose::STANDARD.encode(password)
        } else {
            password.to_string()
        }
    }

    async fn switch_group(&self, user_id: &str, user_token: &str, cookie: &str) -> Result<Response> {
        let form = [
            ("group_id", self.config.group_id.as_str()),
            ("UserID", user_id),
            ("UserToken", user_token),
            ("pageName", self.config.group_page.as_str()),
        ];
        let body = serde_urlencoded::to_string(form).map_err(|e| {
            BrokerError::authentication(Service::Tms, format!("failed to encode group switch: {}", e))
        })?;

        let response = self
            .http
            .post(self.url(&self.config.group_path))
            .header("Content-Type", FORM_CONTENT_TYPE)
            .header("X-Requested-With", "XMLHttpRequest")
            .header("Cookie", cookie)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                BrokerError::authentication(
                    Service::Tms,
                    format!("group switch request failed: {}", e),
                )
            })?;

        if !response.status().is_success() {
            return Err(BrokerError::authentication(
                Service::Tms,
                format!(
                    "group switch failed with HTTP {}",
                    response.status().as_u16()
                ),
            ));
        }
        Ok(response)
    }
}

/// Collects `name=value` pairs from `Set-Cookie` headers into a `Cookie`
/// header value, merging over `existing` by cookie name.
pub fn merge_set_cookies(existing: &str, response: &Response) -> String {
    let mut pairs: Vec<(String, String)> = existing
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            Some((name.to_string(), value.to_string()))
        })
        .collect();

    for header in response.headers().get_all(SET_COOKIE) {
        let Ok(raw) = header.to_str() else { continue };
        let first = raw.split(';').next().unwrap_or_default().trim();
        let Some((name, value)) = first.split_once('=') else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        match pairs.iter_mut().find(|(existing, _)| existing == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => pairs.push((name.to_string(), value.to_string())),
        }
    }

    pairs
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("; ")
}

#[async_trait]
impl SessionProvider for TmsSession {
    type Snapshot = TmsSnapshot;

    fn service(&self) -> Service {
        Service::Tms
    }

    async fn login(&self) -> Result<TmsSnapshot> {
        let (username, password) = self.config.login_credentials()?;
        let password = self.login_password(password);

        let form = [
            ("username", username),
            ("password", password.as_str()),
            ("UserID", "null"),
            ("UserToken", "null"),
            ("pageName", self.config.login_page.as_str()),
        ];
        let body = serde_urlencoded::to_string(form).map_err(|e| {
            BrokerError::authentication(Service::Tms, format!("failed to encode login: {}", e))
        })?;

        let response = self
            .http
            .post(self.url(&self.config.login_path))
            .header("Content-Type", FORM_CONTENT_TYPE)
            .header("X-Requested-With", "XMLHttpRequest")
            .header("Origin", self.origin())
            .header("Referer", format!("{}{}", self.origin(), self.config.login_page))
            .body(body)
            .send()
            .await
            .map_err(|e| {
                BrokerError::authentication(Service::Tms, format!("login request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(BrokerError::authentication(
                Service::Tms,
                format!("login failed with HTTP {}", response.status().as_u16()),
            ));
        }

        let cookie = merge_set_cookies("", &response);
        let text = response.text().await.unwrap_or_default();
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

        let user_id = first_non_empty(&body, USER_ID_PATHS);
        let user_token = first_non_empty(&body, USER_TOKEN_PATHS);
        let (user_id, user_token) = match (user_id, user_token) {
            (Some(id), Some(token)) => (id, token),
            _ => {
                return Err(BrokerError::authentication(
                    Service::Tms,
                    "login response missing UserID/UserToken",
                ))
            }
        };
        if cookie.is_empty() {
            return Err(BrokerError::authentication(
                Service::Tms,
                "login response carried no session cookie",
            ));
        }

        debug!(user_id = %user_id, "TMS login accepted, switching group");

        let group_response = self.switch_group(&user_id, &user_token, &cookie).await?;
        let session_cookie = merge_set_cookies(&cookie, &group_response);

        Ok(TmsSnapshot {
            user_id,
            user_token,
            session_cookie,
            group_context: self.config.group_id.clone(),
        })
    }
}

impl Upstream for TmsSession {
    fn authorize(
        &self,
        builder: RequestBuilder,
        request: &EncodedRequest,
        snapshot: &TmsSnapshot,
    ) -> Result<RequestBuilder> {
        let body = match &request.body {
            RequestBody::Form(fields) => {
                let mut fields: Vec<(String, String)> = fields
                    .iter()
                    .filter(|(name, _)| name != "UserID" && name != "UserToken")
                    .cloned()
                    .collect();
                fields.push(("UserID".to_string(), snapshot.user_id.clone()));
                fields.push(("UserToken".to_string(), snapshot.user_token.clone()));
                RequestBody::Form(fields)
            }
            other => other.clone(),
        };

        Ok(apply_request(builder, &request.headers, &body)?
            .header("Cookie", snapshot.session_cookie.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_requires_all_fields() {
        let full = TmsSnapshot {
            user_id: "42".to_string(),
            user_token: "tok".to_string(),
            session_cookie: "PHPSESSID=abc".to_string(),
            group_context: "28".to_string(),
        };
        assert!(full.is_complete());

        for broken in [
            TmsSnapshot {
                user_id: String::new(),
                ..full.clone()
            },
            TmsSnapshot {
                user_token: String::new(),
                ..full.clone()
            },
            TmsSnapshot {
                session_cookie: String::new(),
                ..full.clone()
            },
            TmsSnapshot {
                group_context: String::new(),
                ..full.clone()
            },
        ] {
            assert!(!broken.is_complete());
        }
    }

    #[test]
    fn test_password_encoding() {
        let plain = TmsSession::new(Client::new(), TmsConfig::default());
        assert_eq!(plain.login_password("UWF2NjUyODk="), "UWF2NjUyODk=");

        let encoding = TmsSession::new(
            Client::new(),
            TmsConfig {
                encode_password: true,
                ..TmsConfig::default()
            },
        );
        assert_eq!(encoding.login_password("hunter2"), "aHVudGVyMg==");
    }
}
