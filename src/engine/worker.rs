//! Codec worker thread
//!
//! One dedicated worker per codec instance:
//! - owns the backend handle exclusively (no mutex needed for codec ops)
//! - processes control messages in FIFO order
//! - guarantees output ordering (single consumer)
//!
//! The worker dequeues with a short timeout so lifecycle flags are observed
//! even when the queue is idle.
//!
//! See: https://www.w3.org/TR/webcodecs/#codec-processing-model

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, warn};

use super::queue::{ControlMessage, ControlQueue};

/// Poll interval for the worker's exit flag while the queue is idle
const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(100);

/// Per-codec message handlers, run on the worker thread
///
/// Implementations hold the backend handle and the delivery endpoint;
/// everything they touch is exclusive to the worker thread.
pub trait WorkerHandler: Send {
    type Config: Send + 'static;
    type Work: Send + 'static;

    /// Open the backend from a deep-copied configuration
    fn on_configure(&mut self, config: Self::Config);

    /// Process one admitted work item
    fn on_work(&mut self, work: Self::Work);

    /// Drain the backend and report flush completion
    fn on_flush(&mut self, flush_id: u32);

    /// Quiesce the backend; the queue has already been drained caller-side
    fn on_reset(&mut self);

    /// Release the backend before the loop exits
    fn on_close(&mut self) {}
}

/// Handle to a running codec worker thread
pub struct CodecWorker {
    thread: Option<thread::JoinHandle<()>>,
    should_exit: Arc<AtomicBool>,
    shutdown_queue: Box<dyn Fn() + Send>,
}

impl CodecWorker {
    /// Spawn a worker consuming `queue` through `handler`
    pub fn spawn<H>(
        name: &str,
        queue: Arc<ControlQueue<H::Config, H::Work>>,
        mut handler: H,
    ) -> std::io::Result<Self>
    where
        H: WorkerHandler + 'static,
    {
        let should_exit = Arc::new(AtomicBool::new(false));
        let exit_flag = Arc::clone(&should_exit);
        let loop_queue = Arc::clone(&queue);

        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!("codec worker started");
                while !exit_flag.load(Ordering::Acquire) {
                    let Some(msg) = loop_queue.dequeue_for(DEQUEUE_TIMEOUT) else {
                        if loop_queue.is_shutdown() {
                            break;
                        }
                        continue;
                    };

                    match msg {
                        ControlMessage::Configure(config) => handler.on_configure(config),
                        ControlMessage::Work(work) => handler.on_work(work),
                        ControlMessage::Flush(flush_id) => handler.on_flush(flush_id),
                        ControlMessage::Reset => handler.on_reset(),
                        ControlMessage::Close => {
                            handler.on_close();
                            exit_flag.store(true, Ordering::Release);
                        }
                    }
                }
                debug!("codec worker exited");
            })?;

        Ok(Self {
            thread: Some(thread),
            should_exit,
            shutdown_queue: Box::new(move || queue.shutdown()),
        })
    }

    /// Whether the worker thread has not yet been joined
    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Signal shutdown and join the worker
    ///
    /// Shuts the queue down (waking a blocked dequeue), then waits for the
    /// thread to finish its in-flight handler. Idempotent.
    pub fn stop(&mut self) {
        self.should_exit.store(true, Ordering::Release);
        (self.shutdown_queue)();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("codec worker panicked during shutdown");
            }
        }
    }
}

impl Drop for CodecWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
