//! Owned storage for one decoded picture
//!
//! The backend-facing counterpart of a video frame: per-plane byte buffers
//! plus geometry, timing and colour metadata. The outer `VideoFrame` handle
//! wraps this in an atomic refcount; the buffer itself is exclusive to its
//! current owner.

use std::sync::{Arc, Weak};

use super::pool::FramePool;
use crate::webcodecs::{VideoColorSpace, VideoPixelFormat};

/// One image plane: pixel rows at a fixed stride
pub struct Plane {
    pub data: Vec<u8>,
    pub stride: usize,
}

/// Owned decoded-picture buffer
pub struct FrameBuffer {
    format: VideoPixelFormat,
    coded_width: u32,
    coded_height: u32,
    pts: i64,
    duration: Option<i64>,
    color_space: VideoColorSpace,
    planes: Vec<Plane>,
    pool: Option<Weak<FramePool>>,
}

impl FrameBuffer {
    /// Allocate a zeroed frame for the given format and coded size
    pub fn alloc(format: VideoPixelFormat, coded_width: u32, coded_height: u32) -> Self {
        let planes = (0..format.plane_count())
            .map(|i| {
                let stride = format.plane_row_bytes(i, coded_width);
                let rows = format.plane_rows(i, coded_height);
                Plane {
                    data: vec![0u8; stride * rows],
                    stride,
                }
            })
            .collect();

        Self {
            format,
            coded_width,
            coded_height,
            pts: 0,
            duration: None,
            color_space: VideoColorSpace::default(),
            planes,
            pool: None,
        }
    }

    /// Allocate a frame whose plane storage is drawn from `pool`
    pub fn from_pool(
        pool: &Arc<FramePool>,
        format: VideoPixelFormat,
        coded_width: u32,
        coded_height: u32,
    ) -> Self {
        let buffers = pool.acquire(format, coded_width, coded_height);
        let planes = buffers
            .into_iter()
            .enumerate()
            .map(|(i, data)| Plane {
                data,
                stride: format.plane_row_bytes(i, coded_width),
            })
            .collect();

        Self {
            format,
            coded_width,
            coded_height,
            pts: 0,
            duration: None,
            color_space: VideoColorSpace::default(),
            planes,
            pool: Some(Arc::downgrade(pool)),
        }
    }

    /// Build a frame from caller-supplied planes
    ///
    /// Plane count and sizes must match the format layout for the coded size.
    pub fn from_planes(
        format: VideoPixelFormat,
        coded_width: u32,
        coded_height: u32,
        planes: Vec<Plane>,
    ) -> Option<Self> {
        if planes.len() != format.plane_count() {
            return None;
        }
        for (i, plane) in planes.iter().enumerate() {
            let rows = format.plane_rows(i, coded_height);
            if plane.stride < format.plane_row_bytes(i, coded_width)
                || plane.data.len() < plane.stride * rows
            {
                return None;
            }
        }

        Some(Self {
            format,
            coded_width,
            coded_height,
            pts: 0,
            duration: None,
            color_space: VideoColorSpace::default(),
            planes,
            pool: None,
        })
    }

    // ========================================================================
    // Geometry and Format
    // ========================================================================

    #[inline]
    pub fn format(&self) -> VideoPixelFormat {
        self.format
    }

    #[inline]
    pub fn coded_width(&self) -> u32 {
        self.coded_width
    }

    #[inline]
    pub fn coded_height(&self) -> u32 {
        self.coded_height
    }

    // ========================================================================
    // Timestamps
    // ========================================================================

    /// Presentation timestamp (microseconds)
    #[inline]
    pub fn pts(&self) -> i64 {
        self.pts
    }

    #[inline]
    pub fn set_pts(&mut self, pts: i64) {
        self.pts = pts;
    }

    /// Duration (microseconds)
    #[inline]
    pub fn duration(&self) -> Option<i64> {
        self.duration
    }

    #[inline]
    pub fn set_duration(&mut self, duration: Option<i64>) {
        self.duration = duration;
    }

    // ========================================================================
    // Colour
    // ========================================================================

    pub fn color_space(&self) -> &VideoColorSpace {
        &self.color_space
    }

    pub fn set_color_space(&mut self, color_space: VideoColorSpace) {
        self.color_space = color_space;
    }

    // ========================================================================
    // Plane Access
    // ========================================================================

    /// Number of planes in this frame
    #[inline]
    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    pub fn plane(&self, index: usize) -> Option<&Plane> {
        self.planes.get(index)
    }

    /// Get plane data as a slice (read-only)
    pub fn plane_data(&self, index: usize) -> Option<&[u8]> {
        self.planes.get(index).map(|p| p.data.as_slice())
    }

    /// Get mutable plane data as a slice
    pub fn plane_data_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        self.planes.get_mut(index).map(|p| p.data.as_mut_slice())
    }

    /// Get line size (stride) for a plane
    #[inline]
    pub fn stride(&self, index: usize) -> usize {
        self.planes.get(index).map_or(0, |p| p.stride)
    }
}

impl Drop for FrameBuffer {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take().and_then(|w| w.upgrade()) {
            let buffers = std::mem::take(&mut self.planes)
                .into_iter()
                .map(|p| p.data)
                .collect();
            pool.release(self.format, self.coded_width, self.coded_height, buffers);
        }
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("format", &self.format)
            .field("coded_width", &self.coded_width)
            .field("coded_height", &self.coded_height)
            .field("pts", &self.pts)
            .field("planes", &self.planes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_i420() {
        let frame = FrameBuffer::alloc(VideoPixelFormat::I420, 4, 4);
        assert_eq!(frame.plane_count(), 3);
        // Luma is full resolution, chroma half in both dimensions
        assert_eq!(frame.plane_data(0).unwrap().len(), 16);
        assert_eq!(frame.plane_data(1).unwrap().len(), 4);
        assert_eq!(frame.plane_data(2).unwrap().len(), 4);
    }

    #[test]
    fn test_alloc_rgba() {
        let frame = FrameBuffer::alloc(VideoPixelFormat::RGBA, 2, 2);
        assert_eq!(frame.plane_count(), 1);
        assert_eq!(frame.plane_data(0).unwrap().len(), 16);
        assert_eq!(frame.stride(0), 8);
    }

    #[test]
    fn test_from_planes_rejects_bad_layout() {
        let planes = vec![Plane {
            data: vec![0u8; 4],
            stride: 4,
        }];
        // I420 needs three planes
        assert!(FrameBuffer::from_planes(VideoPixelFormat::I420, 2, 2, planes).is_none());
    }

    #[test]
    fn test_odd_dimensions_round_up() {
        let frame = FrameBuffer::alloc(VideoPixelFormat::NV12, 3, 3);
        // Luma 3x3, chroma plane is interleaved UV at ceil(3/2) rows of ceil(3/2)*2 bytes
        assert_eq!(frame.plane_data(0).unwrap().len(), 9);
        assert_eq!(frame.plane_data(1).unwrap().len(), 8);
    }
}
