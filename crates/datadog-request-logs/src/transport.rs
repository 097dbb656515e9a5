// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of serialized batches to the request logs intake.
//!
//! The dispatcher only knows the [`Transport`] trait. [`HttpTransport`] is the
//! production implementation: one JSON `POST` per batch, bearer authenticated,
//! over a pooled rustls `reqwest` client.

use std::env;
use std::error::Error;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tokio::sync::OnceCell;
use tracing::{debug, error};

use crate::error::PipelineError;
use crate::event::Batch;
use crate::CLIENT_VERSION;

pub const VERSION_HEADER: &str = "DD-REQUEST-LOGS-VERSION";

/// Sends one batch to its destination.
///
/// Implementations report any failure as an error; the caller owns retries.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, batch: &Batch) -> Result<(), PipelineError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTransportConfig {
    /// Full intake URL batches are posted to.
    pub endpoint: String,
    pub api_key: String,
    pub proxy_https: Option<String>,
    /// Extra bound on the HTTP request itself. `None` leaves the attempt
    /// bounded only by the pipeline's `send_timeout`.
    pub timeout: Option<Duration>,
}

impl HttpTransportConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            proxy_https: None,
            timeout: None,
        }
    }

    /// Reads `DD_REQUEST_LOGS_URL`, `DD_API_KEY` and the HTTPS proxy settings.
    pub fn from_env() -> Result<Self, PipelineError> {
        let endpoint = non_empty_var("DD_REQUEST_LOGS_URL").ok_or_else(|| {
            PipelineError::Configuration("DD_REQUEST_LOGS_URL is not set".to_string())
        })?;
        let api_key = non_empty_var("DD_API_KEY")
            .ok_or_else(|| PipelineError::Configuration("DD_API_KEY is not set".to_string()))?;
        let proxy_https = non_empty_var("DD_PROXY_HTTPS").or_else(|| non_empty_var("HTTPS_PROXY"));

        Ok(Self {
            endpoint,
            api_key,
            proxy_https,
            timeout: None,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

pub struct HttpTransport {
    client: reqwest::Client,
    config: HttpTransportConfig,
    headers: OnceCell<HeaderMap>,
}

impl HttpTransport {
    #[must_use]
    pub fn new(config: HttpTransportConfig) -> Self {
        let client = get_client(&config);
        HttpTransport {
            client,
            config,
            headers: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    async fn get_headers(&self) -> Result<&HeaderMap, PipelineError> {
        self.headers
            .get_or_try_init(|| async {
                let mut headers = HeaderMap::new();
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                let mut auth = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
                    .map_err(|e| {
                        PipelineError::Configuration(format!("Invalid API key header: {e}"))
                    })?;
                auth.set_sensitive(true);
                headers.insert(AUTHORIZATION, auth);
                headers.insert(VERSION_HEADER, HeaderValue::from_static(CLIENT_VERSION));
                Ok::<_, PipelineError>(headers)
            })
            .await
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, batch: &Batch) -> Result<(), PipelineError> {
        let body = batch.to_json()?;
        let headers = self.get_headers().await?;

        debug!(
            "REQUEST_LOGS | Sending batch {} ({} events, {} bytes)",
            batch.batch_id(),
            batch.len(),
            body.len()
        );

        let mut request = self
            .client
            .post(&self.config.endpoint)
            .headers(headers.clone())
            .body(body);
        if let Some(timeout) = self.config.timeout {
            request = request.timeout(timeout);
        }

        let resp = request.send().await.map_err(|e| match self.config.timeout {
            Some(timeout) if e.is_timeout() => PipelineError::Timeout(timeout),
            _ => PipelineError::network(e.to_string()),
        })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        // Only read the body on failure
        let message = resp.text().await.unwrap_or_default();
        Err(PipelineError::Network {
            status: Some(status.as_u16()),
            message: if message.is_empty() {
                status.to_string()
            } else {
                message
            },
        })
    }
}

/// Builds the pooled client, falling back to a direct connection if the proxy
/// is unusable and to reqwest defaults if even that fails.
fn get_client(config: &HttpTransportConfig) -> reqwest::Client {
    match build_client(config, true) {
        Ok(client) => client,
        Err(e) => {
            error!(
                "REQUEST_LOGS | Unable to parse proxy configuration: {}, falling back to direct connection",
                e
            );
            match build_client(config, false) {
                Ok(client) => client,
                Err(inner) => {
                    error!(
                        "REQUEST_LOGS | Failed to build HTTP client: {}, using reqwest defaults",
                        inner
                    );
                    reqwest::Client::new()
                }
            }
        }
    }
}

fn build_client(
    config: &HttpTransportConfig,
    allow_proxy: bool,
) -> Result<reqwest::Client, Box<dyn Error>> {
    let mut client = reqwest::Client::builder()
        .use_rustls_tls()
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        .tcp_keepalive(Some(Duration::from_secs(120)));

    if allow_proxy {
        if let Some(https_uri) = &config.proxy_https {
            client = client.proxy(reqwest::Proxy::https(https_uri)?);
        }
    }
    Ok(client.build()?)
}

/// In-memory transport for exercising the dispatcher and client.
#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[derive(Default)]
    pub(crate) struct MockTransport {
        /// Scripted results, consumed one per call; success once exhausted.
        results: Mutex<VecDeque<Result<(), PipelineError>>>,
        /// Artificial latency applied to every call.
        delay: Option<Duration>,
        delivered: Mutex<Vec<Batch>>,
        attempts: Mutex<Vec<Instant>>,
    }

    impl MockTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn with_results(results: Vec<Result<(), PipelineError>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                ..Self::default()
            }
        }

        pub(crate) fn always_failing(count: usize) -> Self {
            Self::with_results(
                (0..count)
                    .map(|_| {
                        Err(PipelineError::Network {
                            status: Some(500),
                            message: "Internal Server Error".to_string(),
                        })
                    })
                    .collect(),
            )
        }

        pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub(crate) fn delivered(&self) -> Vec<Batch> {
            self.delivered.lock().unwrap().clone()
        }

        pub(crate) fn attempts(&self) -> Vec<Instant> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, batch: &Batch) -> Result<(), PipelineError> {
            self.attempts.lock().unwrap().push(Instant::now());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let result = self.results.lock().unwrap().pop_front().unwrap_or(Ok(()));
            if result.is_ok() {
                self.delivered.lock().unwrap().push(batch.clone());
            }
            result
        }
    }
}
