// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Request log events and the batches that carry them.
//!
//! A [`LogEvent`] is built once through [`LogEventBuilder`], which sanitizes
//! headers and bodies as they are attached, and is never mutated afterwards.
//! Events are serialized with camelCase field names and optional fields are
//! omitted when absent:
//!
//! ```json
//! {
//!   "traceId": "5f0c...",
//!   "timestamp": "2025-01-01T12:00:00Z",
//!   "method": "POST",
//!   "path": "/login",
//!   "statusCode": 200,
//!   "duration": 12,
//!   "requestBody": {"user": "alice", "password": "[REDACTED]"}
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::sanitizer::{self, RawHeaderValue};

/// Error attached to a request that failed inside the host application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

/// One observed request/response cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    trace_id: String,
    timestamp: DateTime<Utc>,
    method: String,
    path: String,
    status_code: u16,
    /// Milliseconds.
    duration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<BTreeMap<String, Value>>,
}

impl LogEvent {
    /// Starts an event for `method path`, stamped with the current time and a
    /// fresh trace id.
    pub fn builder(method: impl Into<String>, path: impl Into<String>) -> LogEventBuilder {
        LogEventBuilder::new(method, path)
    }

    #[must_use]
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.duration
    }

    #[must_use]
    pub fn request_headers(&self) -> Option<&BTreeMap<String, String>> {
        self.request_headers.as_ref()
    }

    #[must_use]
    pub fn response_headers(&self) -> Option<&BTreeMap<String, String>> {
        self.response_headers.as_ref()
    }

    #[must_use]
    pub fn request_body(&self) -> Option<&Value> {
        self.request_body.as_ref()
    }

    #[must_use]
    pub fn response_body(&self) -> Option<&Value> {
        self.response_body.as_ref()
    }

    #[must_use]
    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }

    #[must_use]
    pub fn metadata(&self) -> Option<&BTreeMap<String, Value>> {
        self.metadata.as_ref()
    }
}

/// Builder for [`LogEvent`].
///
/// Headers and bodies are sanitized when they are set, so the finished event
/// never holds unredacted content.
#[derive(Debug, Clone)]
#[must_use]
pub struct LogEventBuilder {
    event: LogEvent,
}

impl LogEventBuilder {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            event: LogEvent {
                trace_id: Uuid::new_v4().to_string(),
                timestamp: Utc::now(),
                method: method.into(),
                path: path.into(),
                status_code: 0,
                duration: 0,
                request_headers: None,
                response_headers: None,
                request_body: None,
                response_body: None,
                error: None,
                metadata: None,
            },
        }
    }

    /// Overrides the generated trace id, e.g. with an incoming request id.
    pub fn trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.event.trace_id = trace_id.into();
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.event.timestamp = timestamp;
        self
    }

    pub fn status_code(mut self, status_code: u16) -> Self {
        self.event.status_code = status_code;
        self
    }

    pub fn duration_ms(mut self, duration: u64) -> Self {
        self.event.duration = duration;
        self
    }

    pub fn request_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RawHeaderValue>,
    {
        self.event.request_headers = Some(sanitizer::sanitize_headers(headers));
        self
    }

    pub fn response_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RawHeaderValue>,
    {
        self.event.response_headers = Some(sanitizer::sanitize_headers(headers));
        self
    }

    pub fn request_header_map(mut self, headers: &reqwest::header::HeaderMap) -> Self {
        self.event.request_headers = Some(sanitizer::sanitize_header_map(headers));
        self
    }

    pub fn response_header_map(mut self, headers: &reqwest::header::HeaderMap) -> Self {
        self.event.response_headers = Some(sanitizer::sanitize_header_map(headers));
        self
    }

    pub fn request_body(mut self, body: &Value) -> Self {
        self.event.request_body = sanitizer::sanitize_body(Some(body));
        self
    }

    pub fn response_body(mut self, body: &Value) -> Self {
        self.event.response_body = sanitizer::sanitize_body(Some(body));
        self
    }

    /// Attaches a body captured as raw bytes; non-JSON payloads are kept as a
    /// short text preview.
    pub fn raw_request_body(mut self, body: &[u8]) -> Self {
        self.event.request_body = sanitizer::sanitize_raw_body(body);
        self
    }

    pub fn raw_response_body(mut self, body: &[u8]) -> Self {
        self.event.response_body = sanitizer::sanitize_raw_body(body);
        self
    }

    pub fn error(mut self, error: ErrorInfo) -> Self {
        self.event.error = Some(error);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.event
            .metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn build(self) -> LogEvent {
        self.event
    }
}

/// A delivery unit: between one and `batch_size` events, in queue order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    logs: Vec<LogEvent>,
    batch_id: String,
    sent_at: DateTime<Utc>,
}

impl Batch {
    /// Wraps `logs` in a batch with a fresh id, or returns `None` if there is
    /// nothing to send.
    #[must_use]
    pub fn new(logs: Vec<LogEvent>) -> Option<Self> {
        if logs.is_empty() {
            return None;
        }
        Some(Self {
            logs,
            batch_id: Uuid::new_v4().to_string(),
            sent_at: Utc::now(),
        })
    }

    #[must_use]
    pub fn logs(&self) -> &[LogEvent] {
        &self.logs
    }

    #[must_use]
    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    #[must_use]
    pub fn sent_at(&self) -> DateTime<Utc> {
        self.sent_at
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.logs.len()
    }

    /// Always `false`; kept for API symmetry with [`Batch::len`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
