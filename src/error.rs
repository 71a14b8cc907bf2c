//! Unified error taxonomy
//!
//! Upstream-provider failures are classified at the gateway boundary so raw
//! reqwest/transport errors never reach a subscriber.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures from the upstream model provider, classified by recoverability.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Connection or transport failure before any token arrived. Retryable.
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// Stream dropped after partial output. Partial text is preserved.
    #[error("upstream interrupted: {0}")]
    Interrupted(String),

    /// The request itself was refused (4xx). Not retryable as-is.
    #[error("upstream rejected request: {0}")]
    Rejected(String),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_))
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed caller input, rejected before any execution exists.
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    /// An event arrived after the execution reached a terminal state.
    /// Logged and dropped by callers on the streaming path, never surfaced.
    #[error("stale event for execution {id} (already {status})")]
    StaleExecution { id: String, status: &'static str },

    #[error(transparent)]
    Upstream(#[from] GatewayError),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::StaleExecution { .. } => StatusCode::CONFLICT,
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
            Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "detail": self.to_string() }));
        (status, body).into_response()
    }
}
