//! Request/response transformation pipeline.
//!
//! # Data Flow
//! ```text
//! InboundRequest
//!     → forward.rs (target URL from configured base + inbound path/query)
//!     → headers.rs (strip hop-by-hop, rewrite Host) + custom headers + X-Forwarded-For
//!     → rewrite.rs (optional system prompt rewrite of the JSON body)
//!     → upstream.rs (single outbound call, redirects not followed)
//!     → headers.rs (strip hop-by-hop from the response)
//!     → streamed back to the client
//! ```
//!
//! # Design Decisions
//! - Request bodies are owned values; whoever consumes one moves it
//! - Response bodies are relayed as streams, never buffered
//! - Every failure before the upstream answers becomes 502 Bad Gateway

pub mod forward;
pub mod headers;
pub mod rewrite;
pub mod upstream;

use std::fmt;
use std::net::SocketAddr;

use axum::body::{Body, Bytes, HttpBody};
use axum::http::{HeaderMap, Method, Request, StatusCode, Uri};
use hyper::ext::ReasonPhrase;
use url::Url;

pub use forward::Forwarder;
pub use rewrite::{RewriteOutcome, SkipReason};
pub use upstream::{HttpUpstream, Upstream, UpstreamError};

/// A request body that can be read at most once.
pub enum RequestBody {
    Absent,
    Present(Body),
}

impl RequestBody {
    /// Wrap a body, treating a body that is already at its end as absent.
    pub fn from_body(body: Body) -> Self {
        if body.is_end_stream() {
            RequestBody::Absent
        } else {
            RequestBody::Present(body)
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, RequestBody::Present(_))
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Absent => f.write_str("Absent"),
            RequestBody::Present(_) => f.write_str("Present(..)"),
        }
    }
}

/// A client request as seen by the proxy.
#[derive(Debug)]
pub struct InboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: RequestBody,
    /// Socket address of the connecting client, when known.
    pub peer: Option<SocketAddr>,
}

impl InboundRequest {
    pub fn from_http(request: Request<Body>, peer: Option<SocketAddr>) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body: RequestBody::from_body(body),
            peer,
        }
    }
}

/// Body sent upstream.
pub enum OutboundBody {
    Empty,
    /// The client's body stream, relayed without buffering.
    Stream(Body),
    /// A body that was drained for inspection.
    Buffered(Bytes),
}

impl fmt::Debug for OutboundBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutboundBody::Empty => f.write_str("Empty"),
            OutboundBody::Stream(_) => f.write_str("Stream(..)"),
            OutboundBody::Buffered(bytes) => write!(f, "Buffered({} bytes)", bytes.len()),
        }
    }
}

/// The single call made to the upstream for one inbound request.
#[derive(Debug)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: OutboundBody,
}

/// What the upstream answered.
pub struct UpstreamResponse {
    pub status: StatusCode,
    /// Reason phrase, only when it differs from the canonical one.
    pub reason: Option<ReasonPhrase>,
    pub headers: HeaderMap,
    pub body: Body,
}

impl fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}
