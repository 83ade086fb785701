//! Transparent forwarding proxy for an HTTP API.
//!
//! Requests are forwarded verbatim to a configured upstream origin, with
//! hop-by-hop headers stripped, custom headers injected, and optionally the
//! `system[0].text` field of JSON bodies replaced. Responses are streamed
//! back untouched apart from hop-by-hop headers.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use proxy::Forwarder;
