//! Outbound HTTP client.
//!
//! # Responsibilities
//! - Send exactly one request per call, never following redirects
//! - Hand the response body back as a stream
//!
//! # Design Decisions
//! - `Upstream` is a trait so the pipeline can run against a recording
//!   double in tests
//! - Timeouts are distinct from transport errors
//! - Dropping the returned body drops the upstream connection

use std::future::Future;
use std::time::Duration;

use axum::body::Body;
use hyper::ext::ReasonPhrase;
use reqwest::redirect::Policy;
use thiserror::Error;

use crate::config::TimeoutConfig;
use crate::proxy::{OutboundBody, OutboundRequest, UpstreamResponse};

/// Failure to obtain a response from the upstream.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream timed out")]
    Timeout,

    #[error("{0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl UpstreamError {
    /// Label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Timeout => "timeout",
            UpstreamError::Transport(_) => "transport",
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else {
            UpstreamError::Transport(Box::new(e))
        }
    }
}

/// Something that can perform the outbound call.
pub trait Upstream: Send + Sync + 'static {
    fn send(
        &self,
        request: OutboundRequest,
    ) -> impl Future<Output = Result<UpstreamResponse, UpstreamError>> + Send;
}

/// `reqwest`-backed upstream client.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new(timeouts: &TimeoutConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()?;

        Ok(Self { client })
    }
}

impl Upstream for HttpUpstream {
    async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, UpstreamError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);

        builder = match request.body {
            OutboundBody::Empty => builder,
            OutboundBody::Stream(body) => {
                builder.body(reqwest::Body::wrap_stream(body.into_data_stream()))
            }
            OutboundBody::Buffered(bytes) => builder.body(bytes),
        };

        let response = builder.send().await?;

        let status = response.status();
        let reason = response.extensions().get::<ReasonPhrase>().cloned();
        let headers = response.headers().clone();
        let body = Body::from_stream(response.bytes_stream());

        Ok(UpstreamResponse {
            status,
            reason,
            headers,
            body,
        })
    }
}
