//! Shared codec runtime handle
//!
//! The process-wide collaborators every codec instance needs: the backend
//! provider, the caller-thread dispatcher, and the buffer pools. Obtained
//! once at startup and cloned into each codec, so tests can substitute
//! in-memory stand-ins for all of them.

use std::sync::Arc;

use crate::codec::{BackendProvider, FramePool, PacketPool};
use crate::engine::CallerDispatcher;

#[derive(Clone)]
pub struct CodecRuntime {
    inner: Arc<RuntimeInner>,
}

struct RuntimeInner {
    backends: Arc<dyn BackendProvider>,
    dispatcher: Arc<dyn CallerDispatcher>,
    frame_pool: Arc<FramePool>,
    packet_pool: Arc<PacketPool>,
}

impl CodecRuntime {
    pub fn new(backends: Arc<dyn BackendProvider>, dispatcher: Arc<dyn CallerDispatcher>) -> Self {
        Self::with_pools(
            backends,
            dispatcher,
            Arc::new(FramePool::new()),
            Arc::new(PacketPool::new()),
        )
    }

    pub fn with_pools(
        backends: Arc<dyn BackendProvider>,
        dispatcher: Arc<dyn CallerDispatcher>,
        frame_pool: Arc<FramePool>,
        packet_pool: Arc<PacketPool>,
    ) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                backends,
                dispatcher,
                frame_pool,
                packet_pool,
            }),
        }
    }

    pub fn backends(&self) -> &Arc<dyn BackendProvider> {
        &self.inner.backends
    }

    pub fn dispatcher(&self) -> &Arc<dyn CallerDispatcher> {
        &self.inner.dispatcher
    }

    pub fn frame_pool(&self) -> &Arc<FramePool> {
        &self.inner.frame_pool
    }

    pub fn packet_pool(&self) -> &Arc<PacketPool> {
        &self.inner.packet_pool
    }
}
