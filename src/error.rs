//! Error types for each layer of the agent core.
//!
//! Only the model client retries, and only on transient failures; every
//! other layer propagates errors upward untouched.

use std::time::Duration;

use thiserror::Error;

/// Errors from the conversation store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("database query failed: {0}")]
    Query(#[from] tokio_postgres::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] refinery::Error),

    #[error("unexpected row data: {0}")]
    Decode(String),
}

impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        StoreError::Pool(e.to_string())
    }
}

impl From<deadpool_postgres::CreatePoolError> for StoreError {
    fn from(e: deadpool_postgres::CreatePoolError) -> Self {
        StoreError::Pool(e.to_string())
    }
}

/// Errors from the model endpoint, classified for retry decisions.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model authentication failed")]
    AuthFailed,

    #[error("model endpoint throttled the request")]
    RateLimited { retry_after: Option<Duration> },

    #[error("model request rejected: {reason}")]
    BadRequest { reason: String },

    #[error("model request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("model returned an invalid response: {reason}")]
    InvalidResponse { reason: String },

    #[error("model call timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("model unavailable after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<ModelError>,
    },
}

impl ModelError {
    /// Whether a retry could plausibly succeed. Throttling, timeouts and
    /// transport failures are transient; auth and malformed requests are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ModelError::RateLimited { .. }
                | ModelError::RequestFailed { .. }
                | ModelError::Timeout { .. }
        )
    }
}

/// Terminal errors of a single agent request.
///
/// A model refusal and a persistence failure after a successful model call
/// are NOT errors; both are carried on [`crate::agent::Reply`].
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid tenant: {reason}")]
    InvalidTenant { reason: String },

    #[error("conversation history unavailable")]
    HistoryUnavailable(#[source] StoreError),

    #[error("model unavailable")]
    ModelUnavailable(#[source] ModelError),
}

/// Startup configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {name}")]
    Missing { name: &'static str },

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
