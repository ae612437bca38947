//! Owned storage for one encoded media unit
//!
//! The backend-facing counterpart of an encoded chunk: a byte buffer plus
//! the timing and keyframe metadata a codec needs. Replaces direct packet
//! allocation with optional draw-from-pool storage.

use std::sync::Weak;

use super::pool::PacketPool;

/// Owned encoded-data buffer with timing metadata
///
/// The buffer may be drawn from a [`PacketPool`]; dropping the packet
/// returns the storage to the pool if the pool is still alive.
pub struct PacketBuffer {
    data: Vec<u8>,
    pts: i64,
    dts: i64,
    duration: Option<i64>,
    key: bool,
    pool: Option<Weak<PacketPool>>,
}

impl PacketBuffer {
    /// Create a packet owning a copy of `data`
    pub fn from_slice(data: &[u8]) -> Self {
        Self::from_vec(data.to_vec())
    }

    /// Create a packet taking ownership of `data`
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            data,
            pts: 0,
            dts: 0,
            duration: None,
            key: false,
            pool: None,
        }
    }

    /// Create a packet whose storage is drawn from `pool`
    pub fn from_pool(pool: &std::sync::Arc<PacketPool>, data: &[u8]) -> Self {
        let mut buf = pool.acquire(data.len());
        buf.extend_from_slice(data);
        Self {
            data: buf,
            pts: 0,
            dts: 0,
            duration: None,
            key: false,
            pool: Some(std::sync::Arc::downgrade(pool)),
        }
    }

    // ========================================================================
    // Data Access
    // ========================================================================

    /// Get packet data as a slice
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get packet size in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if packet has data
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Copy packet data to a new Vec
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.clone()
    }

    // ========================================================================
    // Timestamps
    // ========================================================================

    /// Get presentation timestamp (microseconds)
    #[inline]
    pub fn pts(&self) -> i64 {
        self.pts
    }

    /// Set presentation timestamp
    #[inline]
    pub fn set_pts(&mut self, pts: i64) {
        self.pts = pts;
    }

    /// Get decoding timestamp (microseconds)
    #[inline]
    pub fn dts(&self) -> i64 {
        self.dts
    }

    /// Set decoding timestamp
    #[inline]
    pub fn set_dts(&mut self, dts: i64) {
        self.dts = dts;
    }

    /// Get duration (microseconds)
    #[inline]
    pub fn duration(&self) -> Option<i64> {
        self.duration
    }

    /// Set duration
    #[inline]
    pub fn set_duration(&mut self, duration: Option<i64>) {
        self.duration = duration;
    }

    // ========================================================================
    // Flags
    // ========================================================================

    /// Check if this is a key frame packet
    #[inline]
    pub fn is_key(&self) -> bool {
        self.key
    }

    /// Mark this packet as a key frame
    #[inline]
    pub fn set_key(&mut self, key: bool) {
        self.key = key;
    }
}

impl Drop for PacketBuffer {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take().and_then(|w| w.upgrade()) {
            pool.release(std::mem::take(&mut self.data));
        }
    }
}

impl std::fmt::Debug for PacketBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketBuffer")
            .field("size", &self.data.len())
            .field("pts", &self.pts)
            .field("dts", &self.dts)
            .field("is_key", &self.key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_from_slice() {
        let pkt = PacketBuffer::from_slice(&[1, 2, 3]);
        assert_eq!(pkt.len(), 3);
        assert_eq!(pkt.as_slice(), &[1, 2, 3]);
        assert!(!pkt.is_key());
    }

    #[test]
    fn test_packet_metadata() {
        let mut pkt = PacketBuffer::from_vec(vec![0u8; 16]);
        pkt.set_pts(33_333);
        pkt.set_dts(33_000);
        pkt.set_duration(Some(33_333));
        pkt.set_key(true);
        assert_eq!(pkt.pts(), 33_333);
        assert_eq!(pkt.dts(), 33_000);
        assert_eq!(pkt.duration(), Some(33_333));
        assert!(pkt.is_key());
    }

    #[test]
    fn test_empty_packet() {
        let pkt = PacketBuffer::from_vec(Vec::new());
        assert!(pkt.is_empty());
    }
}
