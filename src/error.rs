//! Errors produced by the forwarding pipeline itself.
//!
//! Each variant maps to exactly one client-facing status code. Errors from
//! the health checker never reach this type; see [`crate::health::ProbeError`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// Client exceeded its request budget for the current window.
    #[error("rate limit exceeded for client {client}")]
    RateLimitExceeded { client: String },

    /// Every backend is currently marked down.
    #[error("no backends available")]
    NoBackendsAvailable,

    /// The selected backend refused, reset or timed out before sending headers.
    #[error("backend {backend} unreachable: {reason}")]
    BackendUnreachable { backend: String, reason: String },

    /// The upstream request could not be constructed from the client request.
    #[error("failed to build upstream request: {0}")]
    UpstreamRequest(#[from] axum::http::Error),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ProxyError::NoBackendsAvailable => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::BackendUnreachable { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamRequest(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn client_message(&self) -> &'static str {
        match self {
            ProxyError::RateLimitExceeded { .. } => "Too Many Requests! Please wait a moment.",
            ProxyError::NoBackendsAvailable => "Critical Error: All backend servers are down!",
            ProxyError::BackendUnreachable { .. } => "Bad Gateway",
            ProxyError::UpstreamRequest(_) => "Internal Server Error",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status_code(), self.client_message()).into_response()
    }
}
