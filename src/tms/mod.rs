//! TMS (transportation-management) client.
//!
//! Form-encoded PHP endpoints. A usable session needs a login, a group switch,
//! and the session cookie from the login response; [`TmsSession`] produces all
//! of them as one snapshot. Responses are passed through unmodified; the
//! command layer flattens trace envelopes with
//! [`encoder::normalize_trace_response`].

pub mod encoder;
pub mod session;

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use crate::config::{HttpConfig, TmsConfig};
use crate::credentials::{CredentialManager, SessionStatus};
use crate::dispatch::{build_http_client, Dispatcher, RetryPolicy};
use crate::error::Result;

pub use session::{TmsSession, TmsSnapshot};

/// Logical TMS operations over a cached session.
pub struct TmsClient {
    config: TmsConfig,
    dispatcher: Dispatcher<TmsSession>,
}

impl TmsClient {
    pub fn new(config: TmsConfig, http: &HttpConfig) -> Result<Self> {
        Self::with_policy(config, http, RetryPolicy::default())
    }

    pub fn with_policy(config: TmsConfig, http: &HttpConfig, policy: RetryPolicy) -> Result<Self> {
        let client = build_http_client(http.timeout())?;
        let sessions = Arc::new(CredentialManager::new(
            TmsSession::new(client.clone(), config.clone()),
            config.ttl(),
        ));
        let dispatcher = Dispatcher::new(client, config.base_url.clone(), sessions, policy);
        Ok(Self { config, dispatcher })
    }

    pub fn sessions(&self) -> &Arc<CredentialManager<TmsSession>> {
        self.dispatcher.sessions()
    }

    /// Forces a fresh login and group switch.
    pub async fn login(&self) -> Result<Arc<TmsSnapshot>> {
        self.sessions().acquire(true).await
    }

    pub async fn session_status(&self) -> SessionStatus {
        self.sessions().status().await
    }

    pub async fn trace_by_bill_to(
        &self,
        bill_to: Option<&str>,
        page: Option<u32>,
        rows: Option<u32>,
    ) -> Result<Value> {
        let request = encoder::trace_by_bill_to(&self.config, bill_to, page, rows)?;
        Ok(self.dispatcher.dispatch(&request).await?.into_json())
    }

    /// Traces a set of PRO numbers; no call is made when none remain after
    /// trimming and de-duplication.
    pub async fn lookup_pros<S: AsRef<str>>(&self, pros: &[S]) -> Result<Value> {
        match encoder::multi_identifier_lookup(&self.config, pros) {
            Some(request) => Ok(self.dispatcher.dispatch(&request).await?.into_json()),
            None => {
                debug!("No PRO numbers to trace, skipping TMS call");
                Ok(encoder::empty_trace_result())
            }
        }
    }

    pub async fn trace(&self, fields: Option<&Map<String, Value>>) -> Result<Value> {
        let request = encoder::trace(&self.config, fields)?;
        Ok(self.dispatcher.dispatch(&request).await?.into_json())
    }
}
