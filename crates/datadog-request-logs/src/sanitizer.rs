// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Redaction of sensitive request/response content.
//!
//! Everything here is pure and total: any input produces an output and nothing
//! panics, so sanitization can run on the host's request path.
//!
//! # Headers
//!
//! Header names are matched case-insensitively against [`SENSITIVE_HEADERS`].
//! Multi-valued headers are joined with `", "`.
//!
//! # Bodies
//!
//! ```text
//!   body ──> serialize ──> len > 10,000 chars? ──yes──> truncation marker
//!                               │
//!                               no
//!                               v
//!                     recursive key redaction
//! ```
//!
//! Size takes priority over fidelity: an oversized body is never walked.

use reqwest::header::HeaderMap;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Replacement for any redacted header or field value.
pub const REDACTED: &str = "[REDACTED]";

/// Replacement for values nested deeper than [`MAX_DEPTH`].
pub const DEPTH_EXCEEDED: &str = "[MAX_DEPTH_EXCEEDED]";

/// Bodies whose canonical JSON is longer than this are replaced by a
/// truncation marker.
pub const MAX_BODY_CHARS: usize = 10_000;

/// Length of the preview kept for truncated and unparsable bodies.
pub const PREVIEW_CHARS: usize = 500;

/// Nesting depth at which the redaction walk stops descending.
pub const MAX_DEPTH: usize = 64;

/// Header names (lowercase) whose values are always redacted.
pub const SENSITIVE_HEADERS: [&str; 5] = [
    "authorization",
    "cookie",
    "x-api-key",
    "x-auth-token",
    "api-key",
];

/// Substrings (lowercase) that mark an object key as sensitive.
///
/// The match is a substring match, so `user_password_hash` and `accessToken`
/// are both redacted.
pub const SENSITIVE_FIELDS: [&str; 12] = [
    "password",
    "token",
    "apikey",
    "api_key",
    "secret",
    "auth",
    "authorization",
    "creditcard",
    "credit_card",
    "ssn",
    "privatekey",
    "private_key",
];

const ELLIPSIS: &str = "...";

/// A header value as seen by a framework adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawHeaderValue {
    Single(String),
    Multiple(Vec<String>),
}

impl RawHeaderValue {
    fn into_joined(self) -> String {
        match self {
            Self::Single(value) => value,
            Self::Multiple(values) => values.join(", "),
        }
    }
}

impl From<String> for RawHeaderValue {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<&str> for RawHeaderValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<Vec<String>> for RawHeaderValue {
    fn from(values: Vec<String>) -> Self {
        Self::Multiple(values)
    }
}

impl From<Vec<&str>> for RawHeaderValue {
    fn from(values: Vec<&str>) -> Self {
        Self::Multiple(values.into_iter().map(str::to_string).collect())
    }
}

fn is_sensitive_header(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|sensitive| name.eq_ignore_ascii_case(sensitive))
}

fn is_sensitive_field(key: &str) -> bool {
    let key = key.to_lowercase();
    SENSITIVE_FIELDS.iter().any(|field| key.contains(field))
}

/// Redacts denylisted headers and flattens the rest to strings.
///
/// Header names keep their original spelling; only the denylist check is
/// case-insensitive.
pub fn sanitize_headers<I, K, V>(headers: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<RawHeaderValue>,
{
    headers
        .into_iter()
        .map(|(name, value)| {
            let name = name.into();
            let value = if is_sensitive_header(&name) {
                REDACTED.to_string()
            } else {
                value.into().into_joined()
            };
            (name, value)
        })
        .collect()
}

/// [`sanitize_headers`] for an `http` header map.
///
/// Repeated headers are grouped into a single multi-valued entry. Values that
/// are not visible ASCII are decoded lossily.
#[must_use]
pub fn sanitize_header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let grouped = headers.keys().map(|name| {
        let values: Vec<String> = headers
            .get_all(name)
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .collect();
        (name.as_str().to_string(), values)
    });
    sanitize_headers(grouped)
}

/// Redacts sensitive fields in a structured body.
///
/// Returns `None` for a missing or `null` body. Bodies whose serialized form
/// exceeds [`MAX_BODY_CHARS`] come back as
/// `{"truncated": true, "originalSize": n, "preview": "..."}`.
#[must_use]
pub fn sanitize_body(body: Option<&Value>) -> Option<Value> {
    let body = match body {
        None | Some(Value::Null) => return None,
        Some(body) => body,
    };

    // Serializing a `Value` only fails on non-string map keys, which a
    // `Value` cannot hold; fall back to the text form anyway.
    let serialized = match serde_json::to_string(body) {
        Ok(serialized) => serialized,
        Err(_) => return Some(Value::String(preview(&body.to_string()))),
    };

    let original_size = serialized.chars().count();
    if original_size > MAX_BODY_CHARS {
        return Some(json!({
            "truncated": true,
            "originalSize": original_size,
            "preview": preview(&serialized),
        }));
    }

    Some(redact(body, 0))
}

/// Sanitizes a raw body as captured off the wire.
///
/// JSON payloads go through [`sanitize_body`]; anything else is kept as text,
/// cut to [`PREVIEW_CHARS`] characters with an ellipsis appended.
#[must_use]
pub fn sanitize_raw_body(raw: &[u8]) -> Option<Value> {
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_slice::<Value>(raw) {
        Ok(value) => sanitize_body(Some(&value)),
        Err(_) => Some(Value::String(preview(&String::from_utf8_lossy(
            raw,
        )))),
    }
}

fn preview(text: &str) -> String {
    let mut preview: String = text.chars().take(PREVIEW_CHARS).collect();
    preview.push_str(ELLIPSIS);
    preview
}

fn redact(value: &Value, depth: usize) -> Value {
    if depth >= MAX_DEPTH {
        return Value::String(DEPTH_EXCEEDED.to_string());
    }
    match value {
        Value::Object(map) => {
            let redacted: Map<String, Value> = map
                .iter()
                .map(|(key, value)| {
                    let value = if is_sensitive_field(key) {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact(value, depth + 1)
                    };
                    (key.clone(), value)
                })
                .collect();
            Value::Object(redacted)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| redact(item, depth + 1)).collect())
        }
        scalar => scalar.clone(),
    }
}
