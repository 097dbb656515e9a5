// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded FIFO buffer of events waiting to be batched.
//!
//! # Eviction Policy
//!
//! The queue never blocks its producer. When it is at capacity and a new event
//! arrives:
//! 1. The oldest event (front of queue) is removed and dropped
//! 2. The overflow counter is incremented and a warning is logged
//! 3. The new event is added to the back of the queue
//!
//! Both ends are O(1) on a `VecDeque`, so steady-state enqueue and dequeue
//! never scan the buffer.
//!
//! The queue itself is not synchronized; the client keeps it behind a single
//! mutex shared by producers and the dispatcher.

use std::collections::VecDeque;
use tracing::warn;

use crate::event::LogEvent;

#[derive(Debug, Clone)]
pub struct EventQueue {
    /// Pending events, oldest first.
    events: VecDeque<LogEvent>,
    /// Maximum number of pending events. Always positive.
    capacity: usize,
    /// Events evicted by overflow since creation or the last reset.
    dropped: u64,
}

impl EventQueue {
    /// Creates an empty queue holding at most `capacity` events.
    ///
    /// A zero capacity is raised to one so the bound stays meaningful.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        EventQueue {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            dropped: 0,
        }
    }

    /// Appends `event`, evicting the oldest one first if the queue is full.
    ///
    /// Returns the queue length after the insert.
    pub fn enqueue(&mut self, event: LogEvent) -> usize {
        if self.events.len() >= self.capacity {
            self.events.pop_front();
            self.dropped += 1;
            warn!(
                "REQUEST_LOGS | Queue full ({} items), dropping oldest event",
                self.capacity
            );
        }
        self.events.push_back(event);
        self.events.len()
    }

    /// Removes and returns up to `max_count` of the oldest events, in order.
    pub fn dequeue(&mut self, max_count: usize) -> Vec<LogEvent> {
        let count = max_count.min(self.events.len());
        self.events.drain(..count).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events evicted because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Drops every pending event. The overflow counter is kept.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Drops every pending event and zeroes the overflow counter.
    pub fn reset(&mut self) {
        self.events.clear();
        self.dropped = 0;
    }
}
