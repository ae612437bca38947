//! Codec control engine
//!
//! The asynchronous machinery shared by every codec façade: the atomic
//! state machine, the control message queue, the per-instance worker
//! thread, the caller-thread delivery channel, and the promise plumbing for
//! flush and the other future-returning operations.

pub mod delivery;
pub mod queue;
pub mod state;
pub mod worker;

pub use delivery::{
    CallerDispatcher, CodecEvent, DeliveryChannel, EventLoopDispatcher, InlineDispatcher,
};
pub use queue::{ControlMessage, ControlQueue};
pub use state::{AtomicCodecState, CodecState};
pub use worker::{CodecWorker, WorkerHandler};

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use tokio::sync::oneshot;

use crate::webcodecs::error::{abort_error, WebCodecsError, WebCodecsResult};

// ============================================================================
// Promise plumbing
// ============================================================================

/// Future for a single pending resolution
///
/// Wraps the receiving half of a oneshot; if the sender is dropped without
/// resolving (instance torn down), the promise rejects with `AbortError`.
pub struct PromiseHandle<T> {
    rx: oneshot::Receiver<WebCodecsResult<T>>,
}

impl<T> PromiseHandle<T> {
    /// A promise that is already resolved or rejected
    pub fn settled(result: WebCodecsResult<T>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx }
    }
}

impl<T> Future for PromiseHandle<T> {
    type Output = WebCodecsResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(abort_error("codec was torn down"))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Flush promises resolve with no payload
pub type FlushPromise = PromiseHandle<()>;

/// Map of pending promises keyed by request id
///
/// Backs `[[pending flush promises]]` and the image decoder's pending
/// decode requests. The façade registers on the caller thread; the delivery
/// handler resolves as completions arrive.
pub struct PromiseMap<T> {
    pending: Mutex<HashMap<u32, oneshot::Sender<WebCodecsResult<T>>>>,
    next_id: AtomicU32,
}

impl<T> PromiseMap<T> {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(0),
        }
    }

    /// Allocate an id and register its promise
    pub fn register(&self) -> (u32, PromiseHandle<T>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(id, tx);
        (id, PromiseHandle { rx })
    }

    /// Resolve or reject one pending promise
    ///
    /// Returns false if the id was unknown (already settled by reset/close).
    pub fn settle(&self, id: u32, result: WebCodecsResult<T>) -> bool {
        let Some(tx) = self.pending.lock().unwrap().remove(&id) else {
            return false;
        };
        let _ = tx.send(result);
        true
    }

    /// Reject every pending promise with the same error
    pub fn reject_all(&self, err: &WebCodecsError) {
        let drained: Vec<_> = {
            let mut pending = self.pending.lock().unwrap();
            pending.drain().collect()
        };
        for (_, tx) in drained {
            let _ = tx.send(Err(err.clone()));
        }
    }

    pub fn len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for PromiseMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Clonable one-shot promise with any number of awaiters
///
/// Backs attribute-style promises (`tracks.ready`, `completed`) where the
/// caller may grab the future more than once.
pub struct SharedPromise<T: Clone> {
    inner: Arc<Mutex<SharedPromiseState<T>>>,
}

struct SharedPromiseState<T> {
    result: Option<WebCodecsResult<T>>,
    wakers: Vec<Waker>,
}

impl<T: Clone> SharedPromise<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SharedPromiseState {
                result: None,
                wakers: Vec::new(),
            })),
        }
    }

    /// Settle the promise; the first resolution wins
    pub fn complete(&self, result: WebCodecsResult<T>) {
        let wakers = {
            let mut state = self.inner.lock().unwrap();
            if state.result.is_some() {
                return;
            }
            state.result = Some(result);
            std::mem::take(&mut state.wakers)
        };
        for waker in wakers {
            waker.wake();
        }
    }

    /// Non-blocking view of the settled value
    pub fn peek(&self) -> Option<WebCodecsResult<T>> {
        self.inner.lock().unwrap().result.clone()
    }

    pub fn is_settled(&self) -> bool {
        self.inner.lock().unwrap().result.is_some()
    }
}

impl<T: Clone> Clone for SharedPromise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> Default for SharedPromise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Future for SharedPromise<T> {
    type Output = WebCodecsResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.inner.lock().unwrap();
        if let Some(result) = &state.result {
            return Poll::Ready(result.clone());
        }
        if !state.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            state.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

// ============================================================================
// Shared engine state
// ============================================================================

/// Atomic state shared between the façade, the worker, and the delivery
/// handler of one codec instance
pub struct EngineShared {
    pub state: AtomicCodecState,
    queue_size: AtomicU32,
    pub key_chunk_required: AtomicBool,
    pub codec_saturated: AtomicBool,
    dequeue_event_scheduled: AtomicBool,
    flushes: PromiseMap<()>,
}

impl EngineShared {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: AtomicCodecState::new(),
            queue_size: AtomicU32::new(0),
            key_chunk_required: AtomicBool::new(true),
            codec_saturated: AtomicBool::new(false),
            dequeue_event_scheduled: AtomicBool::new(false),
            flushes: PromiseMap::new(),
        })
    }

    // --- queue size -----------------------------------------------------------

    pub fn queue_size(&self) -> u32 {
        self.queue_size.load(Ordering::Acquire)
    }

    /// Increment on admit; returns the new size
    pub fn increment_queue_size(&self) -> u32 {
        self.queue_size.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrement when the worker consumes a work item; returns the new size
    ///
    /// Saturating: a reset may have already zeroed the counter while this
    /// work item was in flight, and the observable value never goes negative.
    pub fn decrement_queue_size(&self) -> u32 {
        let mut current = self.queue_size.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return 0;
            }
            match self.queue_size.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return current - 1,
                Err(observed) => current = observed,
            }
        }
    }

    /// Zero the counter (reset/close drain)
    pub fn clear_queue_size(&self) {
        self.queue_size.store(0, Ordering::Release);
    }

    // --- dequeue event coalescing --------------------------------------------

    /// Try to claim the dequeue event slot
    ///
    /// Returns true if the caller should post a `Dequeue` event; false means
    /// one is already pending and this burst coalesces into it.
    pub fn schedule_dequeue_event(&self) -> bool {
        self
            .dequeue_event_scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Clear the slot after the caller-side handler ran
    pub fn clear_dequeue_event(&self) {
        self.dequeue_event_scheduled.store(false, Ordering::Release);
    }

    // --- pending flushes ------------------------------------------------------

    pub fn register_flush(&self) -> (u32, FlushPromise) {
        self.flushes.register()
    }

    pub fn settle_flush(&self, flush_id: u32, result: WebCodecsResult<()>) -> bool {
        self.flushes.settle(flush_id, result)
    }

    /// Reject every pending flush with `AbortError` (reset/close path)
    pub fn abort_pending_flushes(&self, message: &str) {
        self.flushes.reject_all(&abort_error(message));
    }

    pub fn pending_flush_count(&self) -> usize {
        self.flushes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webcodecs::error::ErrorKind;
    use futures::executor::block_on;

    #[test]
    fn test_queue_size_never_negative() {
        let shared = EngineShared::new();
        assert_eq!(shared.decrement_queue_size(), 0);
        shared.increment_queue_size();
        assert_eq!(shared.queue_size(), 1);
        shared.clear_queue_size();
        assert_eq!(shared.decrement_queue_size(), 0);
    }

    #[test]
    fn test_dequeue_event_coalesces() {
        let shared = EngineShared::new();
        assert!(shared.schedule_dequeue_event());
        assert!(!shared.schedule_dequeue_event());
        assert!(!shared.schedule_dequeue_event());
        shared.clear_dequeue_event();
        assert!(shared.schedule_dequeue_event());
    }

    #[test]
    fn test_flush_promise_resolves() {
        let shared = EngineShared::new();
        let (id, promise) = shared.register_flush();
        assert!(shared.settle_flush(id, Ok(())));
        assert!(block_on(promise).is_ok());
        // Settling twice reports the promise as gone
        assert!(!shared.settle_flush(id, Ok(())));
    }

    #[test]
    fn test_abort_pending_flushes() {
        let shared = EngineShared::new();
        let (_, p1) = shared.register_flush();
        let (_, p2) = shared.register_flush();
        shared.abort_pending_flushes("reset");
        assert_eq!(block_on(p1).unwrap_err().kind(), ErrorKind::AbortError);
        assert_eq!(block_on(p2).unwrap_err().kind(), ErrorKind::AbortError);
        assert_eq!(shared.pending_flush_count(), 0);
    }

    #[test]
    fn test_dropped_sender_rejects_with_abort() {
        let map: PromiseMap<u32> = PromiseMap::new();
        let (id, promise) = map.register();
        map.pending.lock().unwrap().remove(&id);
        assert_eq!(block_on(promise).unwrap_err().kind(), ErrorKind::AbortError);
    }

    #[test]
    fn test_shared_promise_multiple_awaiters() {
        let promise: SharedPromise<u32> = SharedPromise::new();
        let a = promise.clone();
        let b = promise.clone();
        promise.complete(Ok(7));
        promise.complete(Ok(9)); // first resolution wins
        assert_eq!(block_on(a).unwrap(), 7);
        assert_eq!(block_on(b).unwrap(), 7);
        assert!(promise.is_settled());
    }
}
