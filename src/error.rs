//! Error taxonomy for the ingestion pipeline.
//!
//! Shaped like `opentelemetry_sdk::trace::TraceError` / `opentelemetry_otlp::Error`:
//! a single `#[non_exhaustive]` enum derived with `thiserror`, with `From`
//! impls at the transport boundary so callers rarely need to construct
//! variants by hand.

use std::time::Duration;
use thiserror::Error;

/// A specialized `Result` type used throughout the crate.
pub type Result<T> = std::result::Result<T, LangfuseError>;

/// Errors surfaced by the builder surface, the ingestion queue, the
/// dispatcher, and the coordinator.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LangfuseError {
    /// A record failed structural validation before it could be enqueued.
    #[error("validation failed for field `{field}`: {message}")]
    Validation { field: &'static str, message: String },

    /// The coordinator could not be constructed from the given configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The ingestion endpoint rejected credentials (HTTP 401/403).
    #[error("authentication rejected by ingestion endpoint (HTTP {status})")]
    Auth { status: u16 },

    /// The ingestion endpoint returned HTTP 404.
    #[error("ingestion endpoint not found (HTTP {status})")]
    NotFound { status: u16 },

    /// The ingestion endpoint is throttling the client (HTTP 429).
    #[error("rate limited by ingestion endpoint{}", retry_after.map(|d| format!(", retry after {d:?}")).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },

    /// The ingestion endpoint failed with a 5xx status.
    #[error("ingestion endpoint server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// A transport-level failure: connection refused, TLS handshake, I/O
    /// timeout, or similar.
    #[error("network error: {0}")]
    Network(String),

    /// Some other non-retryable 4xx response.
    #[error("ingestion endpoint rejected the request (HTTP {status}): {message}")]
    BadRequest { status: u16, message: String },

    /// `Enqueue` failed because the queue was at capacity under a policy
    /// that does not tolerate overflow.
    #[error("ingestion queue is full")]
    QueueFull,

    /// A second terminal operation (`Submit`/`Update`/`End`) was invoked on
    /// a builder that had already submitted.
    #[error("builder has already been submitted")]
    AlreadySubmitted,

    /// A blocking operation (`Flush`, `Shutdown`, block-with-timeout
    /// `Enqueue`) was cancelled or timed out before completion.
    #[error("operation was cancelled or timed out")]
    Cancelled,

    /// Catch-all for errors propagated from a `RestTransport` implementation
    /// that don't fit the taxonomy above.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl LangfuseError {
    /// Whether the dispatcher should retry a batch that failed with this
    /// error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LangfuseError::RateLimited { .. }
                | LangfuseError::ServerError { .. }
                | LangfuseError::Network(_)
        )
    }

    /// The `Retry-After` hint, if this error carries one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            LangfuseError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    pub(crate) fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => LangfuseError::Auth { status },
            404 => LangfuseError::NotFound { status },
            429 => LangfuseError::RateLimited { retry_after: None },
            500..=599 => LangfuseError::ServerError { status, message },
            _ => LangfuseError::BadRequest { status, message },
        }
    }
}

impl From<reqwest::Error> for LangfuseError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            LangfuseError::Network(err.to_string())
        } else if let Some(status) = err.status() {
            LangfuseError::from_status(status.as_u16(), err.to_string())
        } else {
            LangfuseError::Network(err.to_string())
        }
    }
}

impl From<url::ParseError> for LangfuseError {
    fn from(err: url::ParseError) -> Self {
        LangfuseError::Configuration(format!("invalid host URL: {err}"))
    }
}
