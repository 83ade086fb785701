//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Upstream used when none is configured.
pub const DEFAULT_BASE_URL: &str = "https://anyrouter.top";

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Where requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// Request body rewriting.
    pub rewrite: RewriteConfig,

    /// Headers injected into every upstream request.
    pub headers: HeadersConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base origin, e.g. "https://api.example.com". Only scheme, host and
    /// port are used; path and query come from the inbound request.
    pub base_url: String,

    /// Header carrying the client IP set by a fronting platform.
    pub client_ip_header: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client_ip_header: "cf-connecting-ip".to_string(),
        }
    }
}

/// Body rewrite configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Replacement for `system[0].text`. Unset or empty disables rewriting.
    pub system_prompt_replacement: Option<String>,

    /// Largest request body buffered for rewriting.
    pub max_body_bytes: usize,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            system_prompt_replacement: None,
            max_body_bytes: 32 * 1024 * 1024,
        }
    }
}

impl RewriteConfig {
    /// The replacement text, if rewriting is enabled.
    pub fn replacement(&self) -> Option<&str> {
        self.system_prompt_replacement
            .as_deref()
            .filter(|text| !text.is_empty())
    }
}

/// Custom header configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HeadersConfig {
    /// JSON object mapping header names to string values.
    pub custom: Option<String>,
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed until upstream response headers arrive, in seconds.
    /// Streaming of the response body is not bounded.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            upstream_secs: 300,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
