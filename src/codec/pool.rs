//! Process-wide media buffer pools with observability
//!
//! High-rate decode paths allocate one frame per output; at 1080p60 that is
//! 3MB per frame, 180MB/sec of allocation pressure per stream. The pools
//! cache plane and packet storage so steady-state operation recycles
//! buffers instead of hitting the allocator.
//!
//! - Frame storage is keyed by (format, coded size) so 720p, 1080p and 4K
//!   streams draw from separate buckets.
//! - Packet storage is a single free list; buffers grow to fit.
//! - Growth is bounded; overflow is freed rather than cached.
//! - Statistics can be read lock-free for production observability.
//!
//! Pooling is an optimization only: callers that allocate fresh buffers
//! observe identical behavior.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::webcodecs::VideoPixelFormat;

/// Maximum cached frame buffer sets per (format, size) bucket
const FRAME_BUCKET_CAP: usize = 32;

/// Maximum cached packet buffers across all sizes
const PACKET_POOL_CAP: usize = 64;

/// Lock-free pool counters
#[derive(Default)]
struct PoolStats {
    acquires: AtomicU64,
    releases: AtomicU64,
    misses: AtomicU64,
    outstanding: AtomicU64,
    high_water: AtomicU64,
}

impl PoolStats {
    fn on_acquire(&self, miss: bool) {
        self.acquires.fetch_add(1, Ordering::Relaxed);
        if miss {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        let now = self.outstanding.fetch_add(1, Ordering::Relaxed) + 1;
        self.high_water.fetch_max(now, Ordering::Relaxed);
    }

    fn on_release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
        // Saturating: a release without a matching tracked acquire must not wrap
        let _ = self
            .outstanding
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            acquires: self.acquires.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            high_water: self.high_water.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of pool counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatsSnapshot {
    pub acquires: u64,
    pub releases: u64,
    pub misses: u64,
    pub high_water: u64,
}

#[derive(PartialEq, Eq, Hash, Clone, Copy)]
struct FrameKey {
    format: VideoPixelFormat,
    width: u32,
    height: u32,
}

/// Dimension-bucketed pool of frame plane storage
pub struct FramePool {
    buckets: Mutex<HashMap<FrameKey, Vec<Vec<Vec<u8>>>>>,
    stats: PoolStats,
}

impl FramePool {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            stats: PoolStats::default(),
        }
    }

    /// Draw plane buffers for the given format and coded size
    ///
    /// Returns one buffer per plane, each sized exactly for the plane layout.
    /// Misses allocate fresh zeroed storage.
    pub fn acquire(&self, format: VideoPixelFormat, width: u32, height: u32) -> Vec<Vec<u8>> {
        let key = FrameKey {
            format,
            width,
            height,
        };
        let cached = {
            let mut buckets = self.buckets.lock().unwrap();
            buckets.get_mut(&key).and_then(|bucket| bucket.pop())
        };

        match cached {
            Some(buffers) => {
                self.stats.on_acquire(false);
                buffers
            }
            None => {
                self.stats.on_acquire(true);
                (0..format.plane_count())
                    .map(|i| {
                        let stride = format.plane_row_bytes(i, width);
                        let rows = format.plane_rows(i, height);
                        vec![0u8; stride * rows]
                    })
                    .collect()
            }
        }
    }

    /// Return plane buffers to their bucket; overflow beyond the cap is freed
    pub fn release(
        &self,
        format: VideoPixelFormat,
        width: u32,
        height: u32,
        buffers: Vec<Vec<u8>>,
    ) {
        self.stats.on_release();
        let key = FrameKey {
            format,
            width,
            height,
        };
        let mut buckets = self.buckets.lock().unwrap();
        let bucket = buckets.entry(key).or_default();
        if bucket.len() < FRAME_BUCKET_CAP {
            bucket.push(buffers);
        }
    }

    pub fn stats(&self) -> PoolStatsSnapshot {
        self.stats.snapshot()
    }

    /// Cached buffer sets for one bucket (observability/testing)
    pub fn bucket_len(&self, format: VideoPixelFormat, width: u32, height: u32) -> usize {
        let key = FrameKey {
            format,
            width,
            height,
        };
        self
            .buckets
            .lock()
            .unwrap()
            .get(&key)
            .map_or(0, |b| b.len())
    }
}

impl Default for FramePool {
    fn default() -> Self {
        Self::new()
    }
}

/// Size-class-agnostic pool of packet byte storage
pub struct PacketPool {
    free: Mutex<Vec<Vec<u8>>>,
    stats: PoolStats,
}

impl PacketPool {
    pub fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            stats: PoolStats::default(),
        }
    }

    /// Draw an empty buffer with at least `min_capacity` reserved
    pub fn acquire(&self, min_capacity: usize) -> Vec<u8> {
        let cached = self.free.lock().unwrap().pop();
        match cached {
            Some(mut buf) => {
                self.stats.on_acquire(false);
                buf.clear();
                if buf.capacity() < min_capacity {
                    buf.reserve(min_capacity - buf.capacity());
                }
                buf
            }
            None => {
                self.stats.on_acquire(true);
                Vec::with_capacity(min_capacity)
            }
        }
    }

    /// Return a buffer; overflow beyond the cap is freed
    pub fn release(&self, buf: Vec<u8>) {
        self.stats.on_release();
        let mut free = self.free.lock().unwrap();
        if free.len() < PACKET_POOL_CAP {
            free.push(buf);
        }
    }

    pub fn stats(&self) -> PoolStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn len(&self) -> usize {
        self.free.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PacketPool {
    fn default() -> Self {
        Self::new()
    }
}
