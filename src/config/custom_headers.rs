//! Custom outbound headers.
//!
//! Parsed from a JSON object such as
//! `{"__comment": "ignored", "x-api-key": "secret"}`.
//! Keys starting with `__` are comments; non-string values are skipped.
//! A malformed document degrades to an empty set, never an error.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

/// Prefix marking a key as a comment rather than a header.
pub const COMMENT_PREFIX: &str = "__";

/// Ordered set of headers injected into every upstream request.
#[derive(Debug, Clone, Default)]
pub struct CustomHeaders {
    entries: Vec<(HeaderName, HeaderValue)>,
}

impl CustomHeaders {
    /// Parse the raw JSON configuration value.
    pub fn parse(raw: Option<&str>) -> Self {
        let raw = match raw.map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Self::default(),
        };

        let object = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(object)) => object,
            Ok(_) => {
                tracing::warn!("Custom headers value is not a JSON object, ignoring it");
                return Self::default();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse custom headers JSON, ignoring it");
                return Self::default();
            }
        };

        let mut entries = Vec::with_capacity(object.len());
        for (key, value) in object {
            if key.starts_with(COMMENT_PREFIX) {
                continue;
            }
            let Value::String(value) = value else {
                continue;
            };

            let name = match HeaderName::from_bytes(key.as_bytes()) {
                Ok(name) => name,
                Err(_) => {
                    tracing::warn!(header = %key, "Skipping custom header with invalid name");
                    continue;
                }
            };
            // Values can carry credentials, only the name is logged.
            let value = match HeaderValue::from_str(&value) {
                Ok(value) => value,
                Err(_) => {
                    tracing::warn!(header = %key, "Skipping custom header with invalid value");
                    continue;
                }
            };
            entries.push((name, value));
        }

        let custom = Self { entries };
        tracing::info!(count = custom.len(), "Custom headers loaded");
        if !custom.is_empty() {
            tracing::info!(headers = %custom.names().join(", "), "Custom header names");
        }
        custom
    }

    /// Overlay every entry onto `headers`, replacing existing values.
    pub fn apply(&self, headers: &mut HeaderMap) {
        for (name, value) in &self.entries {
            headers.insert(name.clone(), value.clone());
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
