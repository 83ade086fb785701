//! Forwarding of a single request to the upstream.
//!
//! # Responsibilities
//! - Build the target URL from the configured origin and the inbound path
//! - Assemble outbound headers (filtered, custom, X-Forwarded-For)
//! - Pick the outbound body from the rewrite outcome
//! - Issue the upstream call and relay its response as a stream
//!
//! # Design Decisions
//! - One upstream call per request; no retries, no redirect following
//! - Upstream calls are bounded by a timeout and abort on shutdown
//! - Failures map to 502 through `ProxyError`

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::header::HeaderName;
use axum::http::{HeaderMap, HeaderValue, Uri};
use axum::response::{IntoResponse, Response};
use url::Url;

use crate::config::{CustomHeaders, ProxyConfig};
use crate::error::ProxyError;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::proxy::headers::{filter_request_headers, filter_response_headers};
use crate::proxy::rewrite::{process_body, RewriteOutcome};
use crate::proxy::upstream::{Upstream, UpstreamError};
use crate::proxy::{InboundRequest, OutboundBody, OutboundRequest, RequestBody};

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Client IP used when nothing identifies the caller.
const UNKNOWN_CLIENT: &str = "unknown";

/// Forwards inbound requests to the configured upstream.
pub struct Forwarder<U> {
    base_url: String,
    replacement: Option<String>,
    custom_headers: CustomHeaders,
    client_ip_header: HeaderName,
    max_body_bytes: usize,
    upstream_timeout: Duration,
    upstream: U,
    shutdown: Arc<Shutdown>,
}

impl<U: Upstream> Forwarder<U> {
    pub fn new(config: &ProxyConfig, upstream: U, shutdown: Arc<Shutdown>) -> Self {
        let client_ip_header = HeaderName::from_bytes(config.upstream.client_ip_header.as_bytes())
            .unwrap_or_else(|_| HeaderName::from_static("cf-connecting-ip"));
        let replacement = config.rewrite.replacement().map(str::to_owned);

        tracing::info!(
            base_url = %config.upstream.base_url,
            rewrite_enabled = replacement.is_some(),
            "Forwarder configured"
        );

        Self {
            base_url: config.upstream.base_url.clone(),
            replacement,
            custom_headers: CustomHeaders::parse(config.headers.custom.as_deref()),
            client_ip_header,
            max_body_bytes: config.rewrite.max_body_bytes,
            upstream_timeout: Duration::from_secs(config.timeouts.upstream_secs),
            upstream,
            shutdown,
        }
    }

    /// Override the time allowed for the upstream to answer.
    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    pub fn upstream(&self) -> &U {
        &self.upstream
    }

    /// Forward one request and produce the response for the client.
    pub async fn handle(&self, inbound: InboundRequest) -> Response {
        let start = Instant::now();
        let method = inbound.method.to_string();

        match self.forward(inbound).await {
            Ok(response) => {
                metrics::record_request(&method, response.status().as_u16(), start);
                response
            }
            Err(e) => {
                tracing::error!(error = %e, kind = e.kind(), "Proxy error");
                metrics::record_upstream_error(e.kind());
                metrics::record_request(&method, 502, start);
                e.into_response()
            }
        }
    }

    async fn forward(&self, inbound: InboundRequest) -> Result<Response, ProxyError> {
        let target = target_url(&self.base_url, &inbound.uri)?;
        let host = target_host(&target)?;

        tracing::info!(
            method = %inbound.method,
            path = %inbound.uri.path(),
            target = %target,
            "Proxying request"
        );

        let client_ip = client_ip(&inbound.headers, inbound.peer, &self.client_ip_header);

        let mut headers = filter_request_headers(&inbound.headers, host);
        self.custom_headers.apply(&mut headers);
        append_forwarded_for(&mut headers, &client_ip);

        let body = self.outbound_body(inbound.body).await?;

        let outbound = OutboundRequest {
            method: inbound.method,
            url: target,
            headers,
            body,
        };

        let mut shutdown = self.shutdown.subscribe();
        let upstream = tokio::select! {
            result = tokio::time::timeout(self.upstream_timeout, self.upstream.send(outbound)) => {
                match result {
                    Ok(response) => response?,
                    Err(_) => return Err(UpstreamError::Timeout.into()),
                }
            }
            _ = shutdown.recv() => return Err(ProxyError::Cancelled),
        };

        tracing::debug!(status = %upstream.status, "Upstream responded");

        let mut response = Response::new(upstream.body);
        *response.status_mut() = upstream.status;
        *response.headers_mut() = filter_response_headers(&upstream.headers);
        if let Some(reason) = upstream.reason {
            response.extensions_mut().insert(reason);
        }

        Ok(response)
    }

    async fn outbound_body(&self, body: RequestBody) -> Result<OutboundBody, ProxyError> {
        let outcome = process_body(body, self.replacement.as_deref(), self.max_body_bytes).await;
        if !matches!(outcome, RewriteOutcome::Passthrough(_)) {
            metrics::record_rewrite(outcome.label());
        }

        let body = match outcome {
            RewriteOutcome::Passthrough(RequestBody::Absent) => OutboundBody::Empty,
            RewriteOutcome::Passthrough(RequestBody::Present(stream)) => OutboundBody::Stream(stream),
            RewriteOutcome::Rewritten(bytes) => OutboundBody::Buffered(bytes),
            RewriteOutcome::Unchanged { original, .. } => OutboundBody::Buffered(original),
            RewriteOutcome::Fallback { original, .. } => OutboundBody::Buffered(original),
            RewriteOutcome::Unreadable(e) => return Err(e.into()),
        };

        Ok(body)
    }
}

/// Combine the configured origin with the inbound path and query.
///
/// Scheme, host and port always come from `base`; any path or query on
/// `base` is replaced.
pub fn target_url(base: &str, uri: &Uri) -> Result<Url, ProxyError> {
    let mut url =
        Url::parse(base).map_err(|e| ProxyError::InvalidTarget(format!("{}: {}", base, e)))?;

    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(ProxyError::InvalidTarget(format!("{}: not an origin", base)));
    }

    url.set_path(uri.path());
    url.set_query(uri.query());
    url.set_fragment(None);
    Ok(url)
}

/// `host[:port]` of the target, port only when non-default.
pub fn target_host(url: &Url) -> Result<HeaderValue, ProxyError> {
    let host = url
        .host_str()
        .ok_or_else(|| ProxyError::InvalidTarget(format!("{}: no host", url)))?;

    let authority = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_owned(),
    };

    HeaderValue::from_str(&authority)
        .map_err(|_| ProxyError::InvalidTarget(format!("{}: invalid host", url)))
}

/// Identify the caller: connecting-IP header, socket peer, inbound
/// X-Forwarded-For, then "unknown".
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, ip_header: &HeaderName) -> String {
    header_text(headers, ip_header)
        .or_else(|| peer.map(|peer| peer.ip().to_string()))
        .or_else(|| header_text(headers, &X_FORWARDED_FOR))
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_owned())
}

/// Append `ip` to X-Forwarded-For, or set it when absent.
pub fn append_forwarded_for(headers: &mut HeaderMap, ip: &str) {
    let value = match header_text(headers, &X_FORWARDED_FOR) {
        Some(existing) => format!("{}, {}", existing, ip),
        None => ip.to_owned(),
    };

    match HeaderValue::from_str(&value) {
        Ok(value) => {
            headers.insert(X_FORWARDED_FOR, value);
        }
        Err(_) => tracing::warn!("Dropping unrepresentable X-Forwarded-For value"),
    }
}

/// All values of `name` joined with ", ", if any are non-empty text.
fn header_text(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(values.join(", "))
    }
}
