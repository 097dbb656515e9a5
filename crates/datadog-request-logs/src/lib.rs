// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Datadog Request Logs
//!
//! Captures request/response events from a host application, redacts sensitive
//! content and ships them in batches to a remote intake without blocking the
//! caller.
//!
//! ## Pipeline
//!
//! ```text
//!   host request ──> PipelineClient::log ──> sample ──> EventQueue (bounded)
//!                                                           │
//!                          size trigger / interval tick     v
//!                                                    BatchDispatcher
//!                                                           │ timeout + backoff
//!                                                           v
//!                                                      Transport (HTTP)
//! ```
//!
//! - [`sanitizer`]: header and body redaction, oversized body truncation
//! - [`event`]: the immutable [`event::LogEvent`] and the [`event::Batch`] wire unit
//! - [`queue`]: bounded FIFO with drop-oldest eviction
//! - [`dispatcher`]: batching, delivery, retry and the background flush task
//! - [`client`]: sampling and lifecycle, the only producer-facing API
//! - [`transport`]: the delivery seam and its `reqwest` implementation
//! - [`config`], [`error`], [`logger`]: settings, the crate error type and an
//!   optional log subscriber for hosts without one

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]
#![deny(unused_extern_crates)]
#![deny(unreachable_pub)]

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod logger;
pub mod queue;
pub mod sanitizer;
pub mod transport;

pub use client::{PipelineClient, PipelineStats};
pub use config::PipelineConfig;
pub use error::PipelineError;
pub use event::{Batch, ErrorInfo, LogEvent, LogEventBuilder};
pub use transport::{HttpTransport, HttpTransportConfig, Transport};

/// Maximum number of delivery attempts for a single batch.
///
/// After this many failed attempts the batch is dropped; it is never requeued.
pub const FLUSH_RETRY_COUNT: u32 = 3;

/// Delay before the second attempt. Each later attempt doubles it.
pub const RETRY_BASE_DELAY: std::time::Duration = std::time::Duration::from_secs(1);

/// Client version sent with every batch.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");
