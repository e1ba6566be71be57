//! Cached upstream sessions.
//!
//! Each upstream service gets one [`CredentialManager`] that exclusively owns
//! its cached [`CredentialSnapshot`]. The manager is the single writer: a
//! refresh builds a complete new snapshot and swaps it in only on success, so
//! callers holding the previous `Arc` keep a consistent copy for the rest of
//! their attempt.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       CredentialManager                  │
//! │  - TTL fast path (no I/O)                │
//! │  - Atomic replace-on-success             │
//! └─────────────────────────────────────────┘
//!          ↓                    ↑
//!       (login)          (snapshot or error)
//!          ↓                    ↑
//! ┌─────────────────────────────────────────┐
//! │       SessionProvider (per service)      │
//! │  - Login exchange                        │
//! │  - Group switch (TMS)                    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Sessions live in memory only and are gone after a restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{BrokerError, Result, Service};

pub mod extract;


/// Authentication artifacts needed for one authorized upstream call.
pub trait CredentialSnapshot: Send + Sync + 'static {
    /// True when every required field is present and non-empty.
    fn is_complete(&self) -> bool;
}

/// Performs the login exchange for one upstream service.
#[async_trait]
pub trait SessionProvider: Send + Sync + 'static {
    type Snapshot: CredentialSnapshot;

    fn service(&self) -> Service;

    /// Runs the full login exchange and returns a fresh snapshot.
    async fn login(&self) -> Result<Self::Snapshot>;
}

struct CachedSession<S> {
    snapshot: Arc<S>,
    issued_at: Instant,
    issued_at_wall: DateTime<Utc>,
}

/// Cache state reported without touching the network.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub cached: bool,
    pub expired: bool,
    pub issued_at: Option<DateTime<Utc>>,
}

/// Owns the cached session for one upstream service.
///
/// Two locks: `cached` is held only to read or swap the snapshot, never
/// across I/O; `login_gate` serializes logins so concurrent refreshes
/// coalesce without blocking cache hits.
pub struct CredentialManager<P: SessionProvider> {
    provider: P,
    ttl: Duration,
    cached: Mutex<Option<CachedSession<P::Snapshot>>>,
    login_gate: Mutex<()>,
}

impl<P: SessionProvider> CredentialManager<P> {
    /// `ttl` should be shorter than the real server-side session lifetime.
    pub fn new(provider: P, ttl: Duration) -> Self {
        Self {
            provider,
            ttl,
            cached: Mutex::new(None),
            login_gate: Mutex::new(()),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn service(&self) -> Service {
        self.provider.service()
    }

    /// Returns valid credentials, logging in when none are cached, the cached
    /// ones are older than the TTL, or `force` is set.
    pub async fn acquire(&self, force: bool) -> Result<Arc<P::Snapshot>> {
        if !force {
            if let Some(current) = self.fresh(None).await {
                debug!(service = %self.service(), "Using cached session");
                return Ok(current);
            }
        }

        let _gate = self.login_gate.lock().await;

        // Another caller may have logged in while we waited for the gate
        if !force {
            if let Some(current) = self.fresh(None).await {
                debug!(service = %self.service(), "Session refreshed by another caller");
                return Ok(current);
            }
        }

        self.login_and_store().await
    }

    /// Re-authenticates after `stale` was rejected upstream.
    ///
    /// If another caller already replaced `stale` with a newer session that is
    /// still within its TTL, that session is returned without logging in again.
    pub async fn reauthenticate(&self, stale: &Arc<P::Snapshot>) -> Result<Arc<P::Snapshot>> {
        let _gate = self.login_gate.lock().await;

        if let Some(current) = self.fresh(Some(stale)).await {
            debug!(service = %self.service(), "Session already refreshed by another caller");
            return Ok(current);
        }

        self.login_and_store().await
    }

    /// Drops the cached session; the next `acquire` logs in.
    pub async fn invalidate(&self) {
        let mut cached = self.cached.lock().await;
        if cached.take().is_some() {
            info!(service = %self.service(), "Cached session invalidated");
        }
    }

    pub async fn status(&self) -> SessionStatus {
        let cached = self.cached.lock().await;
        match cached.as_ref() {
            Some(current) => SessionStatus {
                cached: true,
                expired: current.issued_at.elapsed() >= self.ttl,
                issued_at: Some(current.issued_at_wall),
            },
            None => SessionStatus {
                cached: false,
                expired: false,
                issued_at: None,
            },
        }
    }

    /// Cached snapshot within its TTL, excluding `stale` when given.
    async fn fresh(&self, stale: Option<&Arc<P::Snapshot>>) -> Option<Arc<P::Snapshot>> {
        let cached = self.cached.lock().await;
        let current = cached.as_ref()?;
        if current.issued_at.elapsed() >= self.ttl {
            return None;
        }
        if stale.map_or(false, |stale| Arc::ptr_eq(&current.snapshot, stale)) {
            return None;
        }
        Some(Arc::clone(&current.snapshot))
    }

    /// Logs in without holding the cache lock, then swaps the result in.
    /// On failure the cached session is left untouched. Callers hold
    /// `login_gate`.
    async fn login_and_store(&self) -> Result<Arc<P::Snapshot>> {
        let service = self.service();
        let started = Instant::now();
        let issued_at_wall = Utc::now();

        info!(service = %service, "Logging in");

        let snapshot = self.provider.login().await.map_err(|e| {
            warn!(service = %service, error = %e, "Login failed, keeping previous session");
            e
        })?;

        if !snapshot.is_complete() {
            warn!(service = %service, "Login returned incomplete credentials");
            return Err(BrokerError::authentication(
                service,
                "login returned incomplete credentials",
            ));
        }

        let snapshot = Arc::new(snapshot);
        *self.cached.lock().await = Some(CachedSession {
            snapshot: Arc::clone(&snapshot),
            issued_at: started,
            issued_at_wall,
        });

        info!(
            service = %service,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Session established"
        );

        Ok(snapshot)
    }
}
