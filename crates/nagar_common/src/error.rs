//! Error types for the enrichment core.

use thiserror::Error;
use uuid::Uuid;

/// Errors from a single AI subsystem call.
///
/// The client never retries; retry policy belongs to the caller, which
/// decides based on [`AiClientError::is_retryable`].
#[derive(Error, Debug, Clone)]
pub enum AiClientError {
    /// No response at all: connection refused, DNS, timeout.
    #[error("AI subsystem unreachable: {0}")]
    Network(String),

    /// The subsystem rejected the request as malformed (4xx). Retrying the
    /// same request will fail the same way.
    #[error("AI subsystem rejected request: {0}")]
    Client(String),

    /// Remote-side fault (5xx or an undecodable body).
    #[error("AI subsystem error: {0}")]
    Server(String),
}

impl AiClientError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AiClientError::Client(_))
    }
}

/// Errors surfaced by the enrichment core.
#[derive(Error, Debug)]
pub enum EnrichError {
    /// No viable runtime found to host the AI subsystem. Fatal to AI
    /// features, not to the host service.
    #[error("no usable AI runtime found: {0}")]
    NoRuntime(String),

    #[error(transparent)]
    Ai(#[from] AiClientError),

    #[error("complaint store error: {0}")]
    Store(String),

    #[error("complaint {0} not found")]
    NotFound(Uuid),

    /// Operator asked for a reset/retry the state machine does not allow.
    #[error("illegal AI-status transition: {from} -> {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}
