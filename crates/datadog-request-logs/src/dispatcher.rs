// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batching and delivery of queued events.
//!
//! # Triggers
//!
//! A single background task, started by the client, performs every flush:
//! - **Size**: the client wakes the task once the queue holds a full batch; the
//!   task then flushes until less than a full batch remains
//! - **Interval**: every `batch_interval` one (possibly partial) batch is flushed
//! - **Shutdown**: on cancellation one final batch is flushed and whatever is
//!   still queued is discarded
//!
//! # Delivery
//!
//! Each batch walks the [`SendState`] machine:
//!
//! ```text
//!   Pending ──> Sending ──> Succeeded
//!                  │  ^
//!                  v  │
//!               Retrying        (at most FLUSH_RETRY_COUNT attempts)
//!                  │
//!                  v
//!                Failed         (batch dropped, never requeued)
//! ```
//!
//! Every attempt is bounded by `send_timeout`. Retries back off 1s, then 2s.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::event::Batch;
use crate::queue::EventQueue;
use crate::transport::Transport;
use crate::{FLUSH_RETRY_COUNT, RETRY_BASE_DELAY};

/// Where a batch is in its delivery.
#[derive(Debug)]
pub enum SendState {
    Pending,
    Sending { attempt: u32 },
    /// Attempt `attempt` failed with a retryable error; wait `delay` first.
    Retrying { attempt: u32, delay: Duration },
    Succeeded { attempts: u32 },
    Failed { attempts: u32, error: PipelineError },
}

/// Final result of delivering one batch.
#[derive(Debug)]
pub enum DeliveryOutcome {
    Delivered {
        batch_id: String,
        events: usize,
        attempts: u32,
    },
    Dropped {
        batch_id: String,
        events: usize,
        attempts: u32,
        error: PipelineError,
    },
}

impl DeliveryOutcome {
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Delivered { attempts, .. } | Self::Dropped { attempts, .. } => *attempts,
        }
    }

    #[must_use]
    pub fn events(&self) -> usize {
        match self {
            Self::Delivered { events, .. } | Self::Dropped { events, .. } => *events,
        }
    }
}

/// Delay after failed attempt `attempt` (1-based): 1s, 2s, 4s, ...
#[must_use]
pub fn retry_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    RETRY_BASE_DELAY.saturating_mul(1 << exponent)
}

#[allow(clippy::module_name_repetitions)]
pub struct BatchDispatcher {
    queue: Arc<Mutex<EventQueue>>,
    transport: Arc<dyn Transport>,
    batch_size: usize,
    batch_interval: Duration,
    send_timeout: Duration,
    debug: bool,
    notify: Notify,
    batches_delivered: AtomicU64,
    batches_dropped: AtomicU64,
}

impl BatchDispatcher {
    #[must_use]
    pub fn new(
        queue: Arc<Mutex<EventQueue>>,
        transport: Arc<dyn Transport>,
        config: &PipelineConfig,
    ) -> Self {
        BatchDispatcher {
            queue,
            transport,
            batch_size: config.batch_size.max(1),
            batch_interval: config.batch_interval,
            send_timeout: config.send_timeout,
            debug: config.debug,
            notify: Notify::new(),
            batches_delivered: AtomicU64::new(0),
            batches_dropped: AtomicU64::new(0),
        }
    }

    /// Wakes the background task to flush full batches.
    ///
    /// A wake-up sent while the task is busy is remembered, not lost.
    pub fn notify(&self) {
        self.notify.notify_one();
    }

    #[must_use]
    pub fn batches_delivered(&self) -> u64 {
        self.batches_delivered.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn batches_dropped(&self) -> u64 {
        self.batches_dropped.load(Ordering::Relaxed)
    }

    pub fn reset_stats(&self) {
        self.batches_delivered.store(0, Ordering::Relaxed);
        self.batches_dropped.store(0, Ordering::Relaxed);
    }

    fn queue_len(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Delivers up to one batch from the front of the queue.
    ///
    /// Returns `None` without touching the transport when the queue is empty.
    pub async fn flush(&self) -> Option<DeliveryOutcome> {
        let events = {
            let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            queue.dequeue(self.batch_size)
        };
        let batch = Batch::new(events)?;

        let outcome = self.send_batch(&batch).await;
        match &outcome {
            DeliveryOutcome::Delivered { .. } => {
                self.batches_delivered.fetch_add(1, Ordering::Relaxed);
            }
            DeliveryOutcome::Dropped {
                batch_id,
                events,
                attempts,
                error,
            } => {
                self.batches_dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "REQUEST_LOGS | Dropping batch {} ({} events) after {} attempts: {}",
                    batch_id, events, attempts, error
                );
            }
        }
        Some(outcome)
    }

    /// Flushes until less than a full batch is queued.
    pub async fn flush_full_batches(&self) -> usize {
        let mut flushed = 0;
        while self.queue_len() >= self.batch_size {
            if self.flush().await.is_none() {
                break;
            }
            flushed += 1;
        }
        flushed
    }

    /// Delivers `batch`, retrying retryable failures with backoff.
    pub async fn send_batch(&self, batch: &Batch) -> DeliveryOutcome {
        let mut state = SendState::Pending;
        loop {
            state = match state {
                SendState::Pending => SendState::Sending { attempt: 1 },
                SendState::Sending { attempt } => match self.attempt(batch).await {
                    Ok(()) => SendState::Succeeded { attempts: attempt },
                    Err(error) if error.is_retryable() && attempt < FLUSH_RETRY_COUNT => {
                        let delay = retry_delay(attempt);
                        if self.debug {
                            debug!(
                                "REQUEST_LOGS | Attempt {} for batch {} failed: {}, retrying in {:?}",
                                attempt,
                                batch.batch_id(),
                                error,
                                delay
                            );
                        }
                        SendState::Retrying { attempt, delay }
                    }
                    Err(error) => SendState::Failed {
                        attempts: attempt,
                        error,
                    },
                },
                SendState::Retrying { attempt, delay } => {
                    tokio::time::sleep(delay).await;
                    SendState::Sending {
                        attempt: attempt + 1,
                    }
                }
                SendState::Succeeded { attempts } => {
                    if self.debug {
                        debug!(
                            "REQUEST_LOGS | Delivered batch {} ({} events) in {} attempts",
                            batch.batch_id(),
                            batch.len(),
                            attempts
                        );
                    }
                    return DeliveryOutcome::Delivered {
                        batch_id: batch.batch_id().to_string(),
                        events: batch.len(),
                        attempts,
                    };
                }
                SendState::Failed { attempts, error } => {
                    return DeliveryOutcome::Dropped {
                        batch_id: batch.batch_id().to_string(),
                        events: batch.len(),
                        attempts,
                        error,
                    };
                }
            };
        }
    }

    async fn attempt(&self, batch: &Batch) -> Result<(), PipelineError> {
        match tokio::time::timeout(self.send_timeout, self.transport.send(batch)).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout(self.send_timeout)),
        }
    }

    /// Background flush loop. Returns once `cancel` fires and the final flush
    /// is done.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut flush_interval = tokio::time::interval(self.batch_interval);
        flush_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        flush_interval.tick().await; // discard first tick

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    self.shutdown().await;
                    break;
                }
                () = self.notify.notified() => {
                    self.flush_full_batches().await;
                }
                _ = flush_interval.tick() => {
                    self.flush().await;
                }
            }
        }
    }

    async fn shutdown(&self) {
        self.flush().await;

        let discarded = {
            let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            let remaining = queue.len();
            queue.clear();
            remaining
        };
        if discarded > 0 {
            warn!(
                "REQUEST_LOGS | Shutting down with {} queued events, discarding them",
                discarded
            );
        }
        debug!("REQUEST_LOGS | Dispatcher stopped");
    }
}
