//! System prompt rewriting for JSON request bodies.
//!
//! # Responsibilities
//! - Decide whether a body needs to be inspected at all
//! - Drain the body once, bounded by a size limit
//! - Replace `system[0].text` and re-serialize compactly
//!
//! # Design Decisions
//! - Bodies that are not inspected are handed back untouched, never buffered
//! - Once drained, the buffered bytes are forwarded on every non-rewrite path;
//!   a consumed stream is never reused
//! - Key order is preserved on re-serialization (`serde_json/preserve_order`)

use axum::body::{Body, Bytes};
use serde_json::Value;
use thiserror::Error;

use crate::proxy::RequestBody;

/// Longest prefix of a prompt written to the logs.
const LOG_PREVIEW_CHARS: usize = 100;

/// Why a rewrite failed.
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("failed to read request body: {0}")]
    Read(#[source] axum::Error),

    #[error("request body is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("request body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a drained body was forwarded as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No non-empty `system` array at the top level.
    NoSystemArray,
    /// `system[0]` is not an object with a non-empty `text`.
    NoTextField,
}

impl SkipReason {
    fn as_str(self) -> &'static str {
        match self {
            SkipReason::NoSystemArray => "no valid system array",
            SkipReason::NoTextField => "first system element has no text field",
        }
    }
}

/// Result of running a request body through the rewriter.
#[derive(Debug)]
pub enum RewriteOutcome {
    /// Not inspected; the original body, unread.
    Passthrough(RequestBody),
    /// Modified JSON.
    Rewritten(Bytes),
    /// Inspected and left alone; the drained bytes, unmodified.
    Unchanged { original: Bytes, reason: SkipReason },
    /// Inspection failed after draining; the drained bytes, unmodified.
    Fallback { original: Bytes, error: RewriteError },
    /// The body could not be drained; nothing left to forward.
    Unreadable(RewriteError),
}

impl RewriteOutcome {
    /// Label used for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            RewriteOutcome::Passthrough(_) => "passthrough",
            RewriteOutcome::Rewritten(_) => "rewritten",
            RewriteOutcome::Unchanged { .. } => "unchanged",
            RewriteOutcome::Fallback { .. } => "fallback",
            RewriteOutcome::Unreadable(_) => "unreadable",
        }
    }
}

/// Result of inspecting an already buffered body.
#[derive(Debug, PartialEq, Eq)]
pub enum Rewrite {
    Replaced(Bytes),
    Skipped(SkipReason),
}

/// Run `body` through the rewriter.
///
/// Without a body or a non-empty replacement the body is returned untouched.
/// Otherwise it is drained (at most `limit` bytes) and inspected.
pub async fn process_body(
    body: RequestBody,
    replacement: Option<&str>,
    limit: usize,
) -> RewriteOutcome {
    let (stream, replacement) = match (body, replacement) {
        (RequestBody::Present(stream), Some(replacement)) if !replacement.is_empty() => {
            (stream, replacement)
        }
        (body, None) => {
            tracing::debug!("System prompt replacement not configured, keeping original body");
            return RewriteOutcome::Passthrough(body);
        }
        (body, _) => return RewriteOutcome::Passthrough(body),
    };

    let original = match drain(stream, limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "Failed to drain request body");
            return RewriteOutcome::Unreadable(e);
        }
    };

    match rewrite_system_prompt(&original, replacement) {
        Ok(Rewrite::Replaced(bytes)) => {
            tracing::info!(
                original_bytes = original.len(),
                new_bytes = bytes.len(),
                "System prompt replaced"
            );
            RewriteOutcome::Rewritten(bytes)
        }
        Ok(Rewrite::Skipped(reason)) => {
            tracing::info!(
                bytes = original.len(),
                reason = reason.as_str(),
                "Keeping original body"
            );
            RewriteOutcome::Unchanged { original, reason }
        }
        Err(error) => {
            tracing::warn!(
                bytes = original.len(),
                error = %error,
                "Failed to process body, forwarding original bytes"
            );
            RewriteOutcome::Fallback { original, error }
        }
    }
}

async fn drain(body: Body, limit: usize) -> Result<Bytes, RewriteError> {
    axum::body::to_bytes(body, limit)
        .await
        .map_err(RewriteError::Read)
}

/// Replace `system[0].text` in a JSON document with `replacement`.
///
/// Documents without a usable `system[0].text` are reported as skipped so
/// the caller can forward the input bytes exactly.
pub fn rewrite_system_prompt(body: &[u8], replacement: &str) -> Result<Rewrite, RewriteError> {
    let text = std::str::from_utf8(body)?;
    let mut document: Value = serde_json::from_str(text)?;

    tracing::debug!(bytes = body.len(), "Parsed JSON body");

    let Some(first) = document
        .get_mut("system")
        .and_then(Value::as_array_mut)
        .and_then(|system| system.first_mut())
    else {
        return Ok(Rewrite::Skipped(SkipReason::NoSystemArray));
    };

    let Some(slot) = first
        .as_object_mut()
        .and_then(|element| element.get_mut("text"))
        .filter(|text| is_truthy(text))
    else {
        return Ok(Rewrite::Skipped(SkipReason::NoTextField));
    };

    let previous = std::mem::replace(slot, Value::String(replacement.to_owned()));
    let previous_text = match &previous {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    tracing::info!(original = %preview(&previous_text), "Original system[0].text");
    tracing::info!(replacement = %preview(replacement), "Replaced system[0].text");
    tracing::debug!(identical = previous_text == replacement, "Replacement compared to original");

    let bytes = serde_json::to_vec(&document)?;
    Ok(Rewrite::Replaced(Bytes::from(bytes)))
}

/// JSON values that count as present: not null, false, 0 or "".
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// First characters of `text`, with an ellipsis when truncated.
fn preview(text: &str) -> String {
    match text.char_indices().nth(LOG_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_owned(),
    }
}
