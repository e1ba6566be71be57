use std::fmt;

use thiserror::Error;

/// Upstream service a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Order-management service (JSON endpoints).
    Fms,
    /// Tracking service (form-encoded PHP endpoints).
    Tms,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Fms => write!(f, "FMS"),
            Service::Tms => write!(f, "TMS"),
        }
    }
}

/// Logical operations the broker knows how to encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Login,
    BillToSearch,
    OrderSearch,
    OrderSearchByBillTo,
    MultiIdentifierLookup,
    FileLookup,
    TraceByBillTo,
    Trace,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Login => "login",
            OperationKind::BillToSearch => "bill-to search",
            OperationKind::OrderSearch => "order search",
            OperationKind::OrderSearchByBillTo => "order search by bill-to",
            OperationKind::MultiIdentifierLookup => "multi-identifier lookup",
            OperationKind::FileLookup => "file lookup",
            OperationKind::TraceByBillTo => "trace by bill-to",
            OperationKind::Trace => "trace",
        };
        f.write_str(name)
    }
}

/// Terminal failures surfaced by the broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Required account settings are missing. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Login or group switch failed, or returned incomplete identity fields.
    #[error("{service} authentication failed: {message}")]
    Authentication { service: Service, message: String },

    /// Business endpoint still failing after the retry policy was exhausted.
    #[error("{service} {operation} failed{}: {body}", status_suffix(.status))]
    Upstream {
        service: Service,
        operation: OperationKind,
        status: Option<u16>,
        body: String,
    },

    /// Caller parameter missing or blank. Rejected before any network call.
    #[error("invalid request: {0}")]
    Validation(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" with HTTP {}", code),
        None => String::new(),
    }
}

impl BrokerError {
    pub fn authentication(service: Service, message: impl Into<String>) -> Self {
        BrokerError::Authentication {
            service,
            message: message.into(),
        }
    }

    /// Upstream HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            BrokerError::Upstream { status, .. } => *status,
            _ => None,
        }
    }
}

pub type Result<T, E = BrokerError> = std::result::Result<T, E>;
