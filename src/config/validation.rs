//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, body limit > 0)
//! - Check that addresses and header names parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - A malformed upstream base URL is a warning, not an error: it is
//!   reported per request as 502 Bad Gateway

use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("upstream.client_ip_header '{0}' is not a valid header name")]
    ClientIpHeader(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if HeaderName::from_bytes(config.upstream.client_ip_header.as_bytes()).is_err() {
        errors.push(ValidationError::ClientIpHeader(
            config.upstream.client_ip_header.clone(),
        ));
    }

    if config.rewrite.max_body_bytes == 0 {
        errors.push(ValidationError::Zero("rewrite.max_body_bytes"));
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.connect_secs"));
    }
    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.upstream_secs"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Non-fatal findings worth logging at startup.
pub fn config_warnings(config: &ProxyConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    match Url::parse(&config.upstream.base_url) {
        Ok(url) if !matches!(url.scheme(), "http" | "https") => warnings.push(format!(
            "upstream.base_url '{}' uses unsupported scheme '{}'",
            config.upstream.base_url,
            url.scheme()
        )),
        Ok(url) if url.host_str().is_none() => warnings.push(format!(
            "upstream.base_url '{}' has no host",
            config.upstream.base_url
        )),
        Ok(url) if url.path() != "/" || url.query().is_some() => warnings.push(format!(
            "upstream.base_url '{}' has a path or query, only the origin is used",
            config.upstream.base_url
        )),
        Ok(_) => {}
        Err(e) => warnings.push(format!(
            "upstream.base_url '{}' is invalid: {}",
            config.upstream.base_url, e
        )),
    }

    warnings
}
