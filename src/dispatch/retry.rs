//! Fixed retry policy for upstream business calls.
//!
//! Each failure class has its own ceiling and counter, and every dispatch
//! starts its counters at zero. There is no cross-call budget.

use rand::Rng;
use reqwest::StatusCode;
use std::ops::Range;
use std::time::Duration;

/// Retry ceilings and delays per failure class.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Forced re-logins after the upstream rejected the session.
    pub max_session_retries: u32,
    /// Retries after HTTP 429, same credentials.
    pub max_rate_limit_retries: u32,
    /// Retries after any other failure (non-success status or transport error).
    pub max_transient_retries: u32,
    /// Randomized wait before a rate-limit retry, in milliseconds (end exclusive).
    pub rate_limit_backoff_ms: Range<u64>,
    /// Fixed wait before a transient retry.
    pub transient_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_session_retries: 2,
            max_rate_limit_retries: 4,
            max_transient_retries: 2,
            rate_limit_backoff_ms: 250..600,
            transient_delay: Duration::from_millis(150),
        }
    }
}

impl RetryPolicy {
    /// Picks a wait inside `rate_limit_backoff_ms`.
    pub fn rate_limit_delay(&self) -> Duration {
        let range = self.rate_limit_backoff_ms.clone();
        if range.is_empty() {
            return Duration::from_millis(range.start);
        }
        Duration::from_millis(rand::thread_rng().gen_range(range))
    }
}

/// What the dispatcher should do with one attempt's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Success,
    SessionRejected,
    RateLimited,
    Transient,
}

/// Session rejection is checked first: some upstreams report an invalid
/// session inside a 200 envelope.
pub(crate) fn classify(status: StatusCode, session_rejected: bool) -> Outcome {
    if session_rejected || status == StatusCode::UNAUTHORIZED {
        Outcome::SessionRejected
    } else if status.is_success() {
        Outcome::Success
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Outcome::RateLimited
    } else {
        Outcome::Transient
    }
}
