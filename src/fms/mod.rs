//! FMS (order-management) client.
//!
//! JSON endpoints behind an `Auth/Login` session token. Every operation is
//! encoded by [`encoder`], authorized by [`FmsSession`], and sent through the
//! retrying [`Dispatcher`]. Responses are passed through unmodified.

pub mod encoder;
pub mod session;

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::config::{FmsConfig, HttpConfig};
use crate::credentials::{CredentialManager, SessionStatus};
use crate::dispatch::{build_http_client, Dispatcher, RetryPolicy};
use crate::error::Result;

pub use encoder::BillToOrderParams;
pub use session::{FmsSession, FmsSnapshot};

/// Logical FMS operations over a cached session.
pub struct FmsClient {
    config: FmsConfig,
    dispatcher: Dispatcher<FmsSession>,
}

impl FmsClient {
    pub fn new(config: FmsConfig, http: &HttpConfig) -> Result<Self> {
        Self::with_policy(config, http, RetryPolicy::default())
    }

    pub fn with_policy(config: FmsConfig, http: &HttpConfig, policy: RetryPolicy) -> Result<Self> {
        let client = build_http_client(http.timeout())?;
        let sessions = Arc::new(CredentialManager::new(
            FmsSession::new(client.clone(), config.clone()),
            config.ttl(),
        ));
        let dispatcher = Dispatcher::new(client, config.base_url.clone(), sessions, policy);
        Ok(Self { config, dispatcher })
    }

    pub fn sessions(&self) -> &Arc<CredentialManager<FmsSession>> {
        self.dispatcher.sessions()
    }

    /// Forces a fresh login.
    pub async fn login(&self) -> Result<Arc<FmsSnapshot>> {
        self.sessions().acquire(true).await
    }

    pub async fn session_status(&self) -> SessionStatus {
        self.sessions().status().await
    }

    pub async fn search_bill_to(&self, code: Option<&str>) -> Result<Value> {
        let request = encoder::bill_to_search(&self.config, code)?;
        Ok(self.dispatcher.dispatch(&request).await?.into_json())
    }

    pub async fn search_orders(&self, body: Option<&Value>) -> Result<Value> {
        let request = encoder::order_search(&self.config, body)?;
        Ok(self.dispatcher.dispatch(&request).await?.into_json())
    }

    pub async fn search_orders_by_bill_to(&self, params: &BillToOrderParams) -> Result<Value> {
        let request = encoder::order_search_by_bill_to(&self.config, params)?;
        Ok(self.dispatcher.dispatch(&request).await?.into_json())
    }

    /// Searches by tracking numbers; no call is made when none remain after
    /// trimming and de-duplication.
    pub async fn lookup_pros<S: AsRef<str>>(&self, pros: &[S]) -> Result<Value> {
        match encoder::multi_identifier_lookup(&self.config, pros)? {
            Some(request) => Ok(self.dispatcher.dispatch(&request).await?.into_json()),
            None => {
                debug!("No tracking numbers to look up, skipping FMS call");
                Ok(encoder::empty_order_result())
            }
        }
    }

    pub async fn search_orders_for_pod_check(&self, pro: Option<&str>) -> Result<Value> {
        let request = encoder::pod_check(&self.config, pro)?;
        Ok(self.dispatcher.dispatch(&request).await?.into_json())
    }

    pub async fn files(&self, order_no: Option<&str>) -> Result<Value> {
        let request = encoder::file_lookup(&self.config, order_no)?;
        Ok(self.dispatcher.dispatch(&request).await?.into_json())
    }
}
