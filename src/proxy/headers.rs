//! Header sanitization for both directions of the proxy.
//!
//! Hop-by-hop headers describe a single connection and are never
//! forwarded. On the request side `host` is always rewritten to the
//! upstream and `content-length` is dropped because the body may change.

use axum::http::header::{CONTENT_LENGTH, HOST};
use axum::http::{HeaderMap, HeaderName, HeaderValue};

/// Hop-by-hop headers (RFC 7230 section 6.1).
pub const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Returns true if `name` must not cross the proxy.
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    // HeaderName is always lowercase.
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

/// Sanitize inbound request headers for the upstream.
///
/// `target_host` is the upstream authority (`host[:port]`) and always ends
/// up as the only `host` value.
pub fn filter_request_headers(headers: &HeaderMap, target_host: HeaderValue) -> HeaderMap {
    let mut filtered = HeaderMap::with_capacity(headers.len());

    for (name, value) in headers {
        if is_hop_by_hop(name) || name == HOST || name == CONTENT_LENGTH {
            continue;
        }
        filtered.append(name.clone(), value.clone());
    }

    filtered.insert(HOST, target_host);
    filtered
}

/// Sanitize upstream response headers for the client.
///
/// `transfer-encoding` is dropped as well: the server re-frames the relayed
/// body on its own connection.
pub fn filter_response_headers(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::with_capacity(headers.len());

    for (name, value) in headers {
        if !is_hop_by_hop(name) {
            filtered.append(name.clone(), value.clone());
        }
    }

    filtered
}
