//! Cross-thread result delivery
//!
//! Marshals worker-produced events back to the caller thread and invokes
//! the per-codec handler there. The channel is a lifecycle-safe wrapper
//! around a caller-thread dispatcher:
//!
//! - `post()` can be called from any thread
//! - `release()` is idempotent; after it, `post()` returns false and the
//!   worker drops the payload itself
//! - delivery is FIFO per channel, so outputs never reorder against the
//!   flush completion that follows them

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};

use crate::webcodecs::WebCodecsError;

/// Schedules closures onto the caller thread
///
/// The engine requires FIFO execution: two tasks dispatched in order must
/// run in that order. Granularity of "a task" is host-defined; with
/// [`InlineDispatcher`] tasks run immediately on the posting thread, which
/// preserves every ordering guarantee but runs caller callbacks on the
/// worker.
pub trait CallerDispatcher: Send + Sync {
    /// Schedule a task; returns false if the dispatcher no longer accepts work
    fn dispatch(&self, task: Box<dyn FnOnce() + Send>) -> bool;
}

/// Runs every task immediately on the posting thread
pub struct InlineDispatcher;

impl CallerDispatcher for InlineDispatcher {
    fn dispatch(&self, task: Box<dyn FnOnce() + Send>) -> bool {
        task();
        true
    }
}

/// Queues tasks for a thread that pumps them explicitly
///
/// Models the host event loop: the worker posts from its thread, the caller
/// invokes [`EventLoopDispatcher::run_until_idle`] to run everything that
/// has arrived, in order.
pub struct EventLoopDispatcher {
    tx: Sender<Box<dyn FnOnce() + Send>>,
    rx: Receiver<Box<dyn FnOnce() + Send>>,
}

impl EventLoopDispatcher {
    pub fn new() -> Self {
        let (tx, rx) = channel::unbounded();
        Self { tx, rx }
    }

    /// Run queued tasks until the queue is momentarily empty
    ///
    /// Returns the number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            match self.rx.try_recv() {
                Ok(task) => {
                    task();
                    ran += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return ran,
            }
        }
    }
}

impl Default for EventLoopDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl CallerDispatcher for EventLoopDispatcher {
    fn dispatch(&self, task: Box<dyn FnOnce() + Send>) -> bool {
        self.tx.send(task).is_ok()
    }
}

/// Event kinds every streaming codec delivers to the caller thread
pub enum CodecEvent<O> {
    /// One decoded frame / encoded chunk, in production order
    Output(O),
    /// Fatal codec error; triggers close-with-error on the caller side
    Error(WebCodecsError),
    /// A flush finished draining
    FlushComplete {
        flush_id: u32,
        result: Result<(), WebCodecsError>,
    },
    /// Queue size dropped; coalesced via the scheduled flag
    Dequeue { new_size: u32 },
}

/// Lifecycle-safe delivery endpoint
///
/// Owns the caller-side handler and dispatches events to it through the
/// dispatcher. Releasing drops the handler exactly once and rejects further
/// posts so the worker can clean up payloads itself.
pub struct DeliveryChannel<E> {
    dispatcher: Arc<dyn CallerDispatcher>,
    handler: Mutex<Option<Arc<dyn Fn(E) + Send + Sync>>>,
    released: AtomicBool,
}

impl<E: Send + 'static> DeliveryChannel<E> {
    pub fn new(
        dispatcher: Arc<dyn CallerDispatcher>,
        handler: impl Fn(E) + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            dispatcher,
            handler: Mutex::new(Some(Arc::new(handler))),
            released: AtomicBool::new(false),
        })
    }

    /// Post an event to the caller thread
    ///
    /// Returns false if the channel was released; the caller keeps ownership
    /// of the payload in that case and must drop it.
    pub fn post(&self, event: E) -> bool {
        if self.released.load(Ordering::Acquire) {
            return false;
        }
        let Some(handler) = self.handler.lock().unwrap().clone() else {
            return false;
        };
        self.dispatcher.dispatch(Box::new(move || handler(event)))
    }

    /// Release the channel
    ///
    /// Idempotent. Already-dispatched events still run; new posts fail.
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            *self.handler.lock().unwrap() = None;
        }
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_dispatcher_runs_immediately() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        assert!(InlineDispatcher.dispatch(Box::new(move || flag.store(true, Ordering::SeqCst))));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_event_loop_dispatcher_fifo() {
        let dispatcher = EventLoopDispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = Arc::clone(&order);
            dispatcher.dispatch(Box::new(move || order.lock().unwrap().push(i)));
        }
        assert_eq!(dispatcher.run_until_idle(), 3);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_channel_posts_through_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let channel: Arc<DeliveryChannel<u32>> =
            DeliveryChannel::new(Arc::new(InlineDispatcher), move |v| {
                sink.lock().unwrap().push(v)
            });

        assert!(channel.post(1));
        assert!(channel.post(2));
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_release_blocks_posts() {
        let channel: Arc<DeliveryChannel<u32>> =
            DeliveryChannel::new(Arc::new(InlineDispatcher), |_| {});
        channel.release();
        channel.release(); // idempotent
        assert!(!channel.post(1));
        assert!(channel.is_released());
    }

    #[test]
    fn test_queued_events_survive_release() {
        // Events dispatched before release still run when the loop is pumped
        let dispatcher = Arc::new(EventLoopDispatcher::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let channel: Arc<DeliveryChannel<u32>> =
            DeliveryChannel::new(Arc::clone(&dispatcher) as Arc<dyn CallerDispatcher>, move |v| {
                sink.lock().unwrap().push(v)
            });

        assert!(channel.post(1));
        channel.release();
        assert!(!channel.post(2));
        dispatcher.run_until_idle();
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }
}
