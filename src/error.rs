//! Shared error taxonomy (see SPEC_FULL.md §7).
//!
//! Typed variants exist for the error kinds callers must branch on
//! (exchange API errors, decode errors, cancellation). Everything else
//! crosses component boundaries as `anyhow::Error` with `.context(...)`
//! breadcrumbs, the same split the pack uses (thiserror for library
//! edges, anyhow everywhere a caller just wants to log and move on).

use thiserror::Error;

/// A structured `{code, msg}` error body returned by the exchange.
#[derive(Debug, Clone, Error)]
#[error("binance api error {code}: {msg}")]
pub struct ApiError {
    pub code: i64,
    pub msg: String,
}

/// A non-200 response whose body did not parse as [`ApiError`].
#[derive(Debug, Clone, Error)]
#[error("binance http error {status}: {body_prefix}")]
pub struct HttpStatusError {
    pub status: u16,
    pub body_prefix: String,
}

/// Kind 3 — a malformed exchange message. Always logged and dropped,
/// never propagated as fatal.
#[derive(Debug, Clone, Error)]
#[error("decode error in {context}: {reason}")]
pub struct DecodeError {
    pub context: String,
    pub reason: String,
}

impl DecodeError {
    pub fn new(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            reason: reason.into(),
        }
    }
}

/// Kind 6 — the root cancellation token fired while a suspension point
/// was pending.
#[derive(Debug, Clone, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Kind 5 — fatal, process exits with code 1.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("missing required configuration: {0}")]
    MissingConfig(String),
    #[error("no active symbols configured")]
    NoActiveSymbols,
    #[error("external service unreachable: {0}")]
    ServiceUnreachable(String),
}
