//! Batch queue
//!
//! Buffers parsed events with two independent, racing flush triggers: an
//! item-count threshold checked on every enqueue, and a recurring timer.
//! Both route through the same lock-guarded swap, so every enqueued event
//! lands in exactly one flushed batch regardless of which trigger fires
//! first.
//!
//! The swap hands the captured batch to the publisher over an unbounded
//! channel; enqueue never waits for a publish in progress.

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use siphon_protocol::SyslogEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// An ordered set of events captured atomically at one flush
pub type Batch = Vec<SyslogEvent>;

/// Thread-safe event queue with size and timer flush triggers
pub struct BatchQueue {
    /// Active queue; swapped wholesale at flush, never drained in place
    events: Mutex<Vec<SyslogEvent>>,

    /// Queue length that triggers a synchronous flush on enqueue
    size_trigger: usize,

    /// Handoff to the publisher task
    tx: mpsc::UnboundedSender<Batch>,
}

impl BatchQueue {
    /// Create a queue flushing at `size_trigger` events, handing batches to `tx`
    pub fn new(size_trigger: usize, tx: mpsc::UnboundedSender<Batch>) -> Self {
        Self {
            events: Mutex::new(Vec::with_capacity(size_trigger)),
            size_trigger,
            tx,
        }
    }

    /// Append an event; flushes when the size trigger is reached
    ///
    /// Safe to call from many connections concurrently. The lock is held
    /// only for the push and (at the trigger) the swap - never across the
    /// channel send.
    pub fn enqueue(&self, event: SyslogEvent) {
        let full = {
            let mut events = self.events.lock();
            events.push(event);
            if events.len() >= self.size_trigger {
                Some(mem::replace(
                    &mut *events,
                    Vec::with_capacity(self.size_trigger),
                ))
            } else {
                None
            }
        };

        if let Some(batch) = full {
            self.dispatch(batch);
        }
    }

    /// Flush whatever is queued right now
    ///
    /// Called by the timer on every tick and at shutdown. An empty queue is
    /// a no-op.
    pub fn flush(&self) {
        let batch = {
            let mut events = self.events.lock();
            if events.is_empty() {
                None
            } else {
                Some(mem::replace(
                    &mut *events,
                    Vec::with_capacity(self.size_trigger),
                ))
            }
        };

        match batch {
            Some(batch) => self.dispatch(batch),
            None => tracing::trace!("queue is empty, not publishing"),
        }
    }

    /// Number of events currently queued
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether the queue is currently empty
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Spawn the recurring timer flush task
    ///
    /// Ticks every `interval` until cancelled, flushing regardless of queue
    /// size. A final flush runs on cancellation.
    pub fn spawn_timer(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick of tokio's interval fires immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        queue.flush();
                        break;
                    }
                    _ = ticker.tick() => {
                        queue.flush();
                    }
                }
            }
        })
    }

    fn dispatch(&self, batch: Batch) {
        let count = batch.len();
        tracing::info!(events = count, "publishing {} events", count);
        if self.tx.send(batch).is_err() {
            tracing::warn!(events = count, "publisher stopped, dropping batch");
        }
    }
}

#[cfg(test)]
#[path = "queue_test.rs"]
mod queue_test;
