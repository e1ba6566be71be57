// Typed failures shared by every layer
pub mod error;

// Deployment settings and env overrides
pub mod config;

// Session cache and refresh coalescing
pub mod credentials;

// Retrying request dispatcher
pub mod dispatch;

// Identifier normalization and parameter checks
pub mod identifiers;

// Order-management service (JSON)
pub mod fms;

// Tracking service (form-encoded PHP)
pub mod tms;

// HTTP command endpoint
pub mod api;
