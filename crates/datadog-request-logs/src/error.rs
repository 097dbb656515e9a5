// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Errors produced inside the request logs pipeline.
///
/// None of these ever reach the caller of [`crate::PipelineClient::log`]; they
/// are logged and either retried or dropped.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Transport failure or a non-2xx answer from the intake.
    #[error("Network error{}: {message}", status_suffix(.status))]
    Network {
        status: Option<u16>,
        message: String,
    },

    #[error("Send timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to serialize batch: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

impl PipelineError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            status: None,
            message: message.into(),
        }
    }

    /// Whether another delivery attempt can succeed.
    ///
    /// A payload that failed to serialize will fail the same way every time.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = PipelineError::Configuration("batch size must be positive".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid configuration: batch size must be positive"
        );
    }

    #[test]
    fn test_network_error_display_with_status() {
        let error = PipelineError::Network {
            status: Some(503),
            message: "Service Unavailable".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Network error (status 503): Service Unavailable"
        );
    }

    #[test]
    fn test_network_error_display_without_status() {
        let error = PipelineError::network("connection refused");
        assert_eq!(error.to_string(), "Network error: connection refused");
    }

    #[test]
    fn test_timeout_display() {
        let error = PipelineError::Timeout(Duration::from_millis(250));
        assert_eq!(error.to_string(), "Send timed out after 250ms");
    }

    #[test]
    fn test_retryable() {
        assert!(PipelineError::network("reset").is_retryable());
        assert!(PipelineError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!PipelineError::Configuration("bad".into()).is_retryable());

        let serde_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!PipelineError::from(serde_error).is_retryable());
    }
}
