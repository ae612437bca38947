//! Thread-safe control message queue
//!
//! Implements the WebCodecs "control message queue" abstraction shared by
//! the decoder and encoder classes. Messages are processed FIFO by a single
//! worker; the queue itself is just a channel, and blocked-on-configure and
//! saturation semantics live worker-side.
//!
//! Thread model:
//! - caller thread: `enqueue`
//! - worker thread: `dequeue_for` and process
//!
//! See: https://www.w3.org/TR/webcodecs/#control-message-queue

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Tagged control message
///
/// `C` is the deep-copied configure payload, `W` one work item (an encoded
/// chunk's refcounted data for decoders, a frame's for encoders).
pub enum ControlMessage<C, W> {
    /// Configure the codec; blocks further processing until the worker
    /// reports open or failure
    Configure(C),
    /// One queued work item
    Work(W),
    /// Drain the codec, then resolve the identified flush promise
    Flush(u32),
    /// Discard worker-side codec state
    Reset,
    /// Release the backend and exit the worker loop
    Close,
}

struct QueueInner<C, W> {
    messages: VecDeque<ControlMessage<C, W>>,
    shutdown: bool,
}

/// FIFO control message queue, single producer / single consumer
pub struct ControlQueue<C, W> {
    inner: Mutex<QueueInner<C, W>>,
    cv: Condvar,
}

impl<C, W> ControlQueue<C, W> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                messages: VecDeque::new(),
                shutdown: false,
            }),
            cv: Condvar::new(),
        }
    }

    // ==========================================================================
    // Producer API (caller thread)
    // ==========================================================================

    /// Enqueue a message for processing
    ///
    /// Returns false if the queue has been shut down.
    pub fn enqueue(&self, msg: ControlMessage<C, W>) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.shutdown {
            return false;
        }
        inner.messages.push_back(msg);
        self.cv.notify_one();
        true
    }

    // ==========================================================================
    // Consumer API (worker thread)
    // ==========================================================================

    /// Dequeue, blocking until a message arrives or the queue shuts down
    pub fn dequeue(&self) -> Option<ControlMessage<C, W>> {
        let inner = self.inner.lock().unwrap();
        let mut inner = self
            .cv
            .wait_while(inner, |i| i.messages.is_empty() && !i.shutdown)
            .unwrap();
        inner.messages.pop_front()
    }

    /// Dequeue with timeout
    ///
    /// Returns `None` on timeout or shutdown so the worker can observe its
    /// exit flag periodically.
    pub fn dequeue_for(&self, timeout: Duration) -> Option<ControlMessage<C, W>> {
        let inner = self.inner.lock().unwrap();
        let (mut inner, result) = self
            .cv
            .wait_timeout_while(inner, timeout, |i| i.messages.is_empty() && !i.shutdown)
            .unwrap();
        if result.timed_out() && inner.messages.is_empty() {
            return None;
        }
        inner.messages.pop_front()
    }

    /// Try to dequeue without blocking
    pub fn try_dequeue(&self) -> Option<ControlMessage<C, W>> {
        self.inner.lock().unwrap().messages.pop_front()
    }

    // ==========================================================================
    // Reset / Shutdown
    // ==========================================================================

    /// Clear all pending messages (for reset)
    ///
    /// Returns the dropped work payloads so their refcounts can be released
    /// by the caller.
    pub fn drain_pending(&self) -> Vec<W> {
        let mut inner = self.inner.lock().unwrap();
        let mut dropped = Vec::new();
        while let Some(msg) = inner.messages.pop_front() {
            if let ControlMessage::Work(payload) = msg {
                dropped.push(payload);
            }
        }
        dropped
    }

    /// Shut the queue down permanently
    ///
    /// Wakes all waiters; subsequent `enqueue` calls return false.
    pub fn shutdown(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.shutdown = true;
        }
        self.cv.notify_all();
    }

    // ==========================================================================
    // Query
    // ==========================================================================

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.lock().unwrap().shutdown
    }
}

impl<C, W> Default for ControlQueue<C, W> {
    fn default() -> Self {
        Self::new()
    }
}
