//! Error types for the proxy pipeline.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::proxy::rewrite::RewriteError;
use crate::proxy::upstream::UpstreamError;

/// Failure while forwarding a request.
///
/// Every variant is answered with 502 Bad Gateway.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The configured base URL cannot be combined with the request path.
    #[error("invalid upstream target: {0}")]
    InvalidTarget(String),

    /// The request body could not be drained.
    #[error(transparent)]
    Body(#[from] RewriteError),

    /// The upstream call failed.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// The call was aborted by shutdown.
    #[error("request cancelled")]
    Cancelled,
}

impl ProxyError {
    /// Label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::InvalidTarget(_) => "invalid_target",
            ProxyError::Body(_) => "body",
            ProxyError::Upstream(e) => e.kind(),
            ProxyError::Cancelled => "cancelled",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_GATEWAY,
            [(header::CONTENT_TYPE, "text/plain")],
            format!("Upstream request failed: {}", self),
        )
            .into_response()
    }
}
