//! Engine error model.
//!
//! Splits permanent client errors (invalid requests, unresolved
//! documents — never retried) from infrastructure errors (store
//! failures — reported upward for the caller's retry policy).

use kernscope_store::StoreError;

/// Errors produced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid request: missing mandatory fields, empty compare list,
    /// bisecting a passing result. Permanent, detected before any
    /// store write.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A baseline or compare target does not exist. Permanent; aborts
    /// the whole request with nothing persisted.
    #[error("not found: {0}")]
    NotFound(String),

    /// Document store failure. Infrastructure-level; the engine
    /// performs no internal retries.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A stored document failed to decode into its model type.
    #[error("document codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl EngineError {
    /// Permanent client error (never retried by callers).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::BadRequest(_) | Self::NotFound(_))
    }

    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, EngineError>;
