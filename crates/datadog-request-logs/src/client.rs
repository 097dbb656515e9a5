// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Producer-facing handle of the pipeline.
//!
//! [`PipelineClient::log`] is synchronous and never waits on I/O: it samples,
//! pushes onto the bounded queue and, when a full batch is waiting, wakes the
//! dispatcher task. Everything else happens on that task.
//!
//! A client that cannot start, because its configuration is invalid or no
//! tokio runtime is running, is built *disabled*: it accepts calls and ignores
//! them.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::config::PipelineConfig;
use crate::dispatcher::BatchDispatcher;
use crate::event::LogEvent;
use crate::queue::EventQueue;
use crate::transport::{HttpTransport, HttpTransportConfig, Transport};

/// Point-in-time view of the pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub events_accepted: u64,
    pub events_sampled_out: u64,
    pub events_evicted: u64,
    pub events_queued: usize,
    pub batches_delivered: u64,
    pub batches_dropped: u64,
}

#[derive(Clone)]
pub struct PipelineClient {
    inner: Option<Arc<Inner>>,
}

struct Inner {
    config: PipelineConfig,
    queue: Arc<Mutex<EventQueue>>,
    dispatcher: Arc<BatchDispatcher>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    destroyed: AtomicBool,
    accepted: AtomicU64,
    sampled_out: AtomicU64,
}

impl std::fmt::Debug for PipelineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineClient")
            .field("enabled", &self.is_enabled())
            .field("stats", &self.stats())
            .finish()
    }
}

impl PipelineClient {
    /// Starts a client delivering through `transport`.
    ///
    /// Must be called from within a tokio runtime; the dispatcher task is
    /// spawned on it.
    #[must_use]
    pub fn new(config: PipelineConfig, transport: Arc<dyn Transport>) -> Self {
        if let Err(e) = config.validate() {
            error!("REQUEST_LOGS | {}, request logging disabled", e);
            return Self::disabled();
        }
        let Ok(runtime) = Handle::try_current() else {
            error!("REQUEST_LOGS | No tokio runtime available, request logging disabled");
            return Self::disabled();
        };

        let queue = Arc::new(Mutex::new(EventQueue::new(config.max_queue_size)));
        let dispatcher = Arc::new(BatchDispatcher::new(
            Arc::clone(&queue),
            transport,
            &config,
        ));
        let cancel = CancellationToken::new();
        let task = runtime.spawn(Arc::clone(&dispatcher).run(cancel.clone()));

        debug!(
            "REQUEST_LOGS | Pipeline started (batch size {}, interval {:?}, sample rate {})",
            config.batch_size, config.batch_interval, config.sample_rate
        );

        PipelineClient {
            inner: Some(Arc::new(Inner {
                config,
                queue,
                dispatcher,
                cancel,
                task: Mutex::new(Some(task)),
                destroyed: AtomicBool::new(false),
                accepted: AtomicU64::new(0),
                sampled_out: AtomicU64::new(0),
            })),
        }
    }

    /// Starts a client from `DD_REQUEST_LOGS_*`, `DD_API_KEY` and proxy
    /// environment variables, delivering over HTTP.
    #[must_use]
    pub fn from_env() -> Self {
        let config = match PipelineConfig::from_env() {
            Ok(config) => config,
            Err(e) => {
                error!("REQUEST_LOGS | {}, request logging disabled", e);
                return Self::disabled();
            }
        };
        let transport_config = match HttpTransportConfig::from_env() {
            Ok(transport_config) => transport_config,
            Err(e) => {
                error!("REQUEST_LOGS | {}, request logging disabled", e);
                return Self::disabled();
            }
        };
        Self::new(config, Arc::new(HttpTransport::new(transport_config)))
    }

    /// A client that drops everything it is given.
    #[must_use]
    pub fn disabled() -> Self {
        PipelineClient { inner: None }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|inner| !inner.destroyed.load(Ordering::Acquire))
    }

    /// Records one event. Never blocks and never fails.
    pub fn log(&self, event: LogEvent) {
        let Some(inner) = &self.inner else {
            return;
        };
        if inner.destroyed.load(Ordering::Acquire) {
            return;
        }

        if fastrand::f64() >= inner.config.sample_rate {
            inner.sampled_out.fetch_add(1, Ordering::Relaxed);
            if inner.config.debug {
                debug!(
                    "REQUEST_LOGS | Event {} {} sampled out",
                    event.method(),
                    event.path()
                );
            }
            return;
        }

        let queued = {
            let mut queue = inner.queue.lock().unwrap_or_else(PoisonError::into_inner);
            // destroy() flips the flag under this lock
            if inner.destroyed.load(Ordering::Acquire) {
                return;
            }
            queue.enqueue(event)
        };
        inner.accepted.fetch_add(1, Ordering::Relaxed);

        if queued >= inner.config.batch_size {
            inner.dispatcher.notify();
        }
    }

    /// Stops the dispatcher after one final flush and discards anything left.
    ///
    /// Later calls to [`PipelineClient::log`] are ignored. Calling it again is
    /// a no-op.
    pub async fn destroy(&self) {
        let Some(inner) = &self.inner else {
            return;
        };
        let already_destroyed = {
            let _queue = inner.queue.lock().unwrap_or_else(PoisonError::into_inner);
            inner.destroyed.swap(true, Ordering::AcqRel)
        };
        if already_destroyed {
            return;
        }

        inner.cancel.cancel();
        let task = inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("REQUEST_LOGS | Dispatcher task failed: {}", e);
            }
        }
    }

    /// Empties the queue and zeroes every counter.
    pub fn reset(&self) {
        let Some(inner) = &self.inner else {
            return;
        };
        inner
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
        inner.accepted.store(0, Ordering::Relaxed);
        inner.sampled_out.store(0, Ordering::Relaxed);
        inner.dispatcher.reset_stats();
    }

    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        let Some(inner) = &self.inner else {
            return PipelineStats::default();
        };
        let (events_evicted, events_queued) = {
            let queue = inner.queue.lock().unwrap_or_else(PoisonError::into_inner);
            (queue.dropped(), queue.len())
        };
        PipelineStats {
            events_accepted: inner.accepted.load(Ordering::Relaxed),
            events_sampled_out: inner.sampled_out.load(Ordering::Relaxed),
            events_evicted,
            events_queued,
            batches_delivered: inner.dispatcher.batches_delivered(),
            batches_dropped: inner.dispatcher.batches_dropped(),
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Last handle gone without destroy(): stop the task, skip the flush
        let task = self
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}
