//! VideoFrame - WebCodecs API implementation
//!
//! Represents a frame of video data that can be displayed or encoded.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/VideoFrame
//!
//! The outer `VideoFrame` is a refcounted handle over an exclusive
//! [`FrameBuffer`]: `clone()` adds a reference, `close()` detaches this
//! handle, `transfer()` moves the reference into a fresh handle and
//! detaches the source in one step.

use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::future::ready;

use crate::codec::FrameBuffer;
use crate::webcodecs::error::{invalid_state_error, type_error, WebCodecsResult};

/// Video pixel format (WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)] // variant names mirror the spec enum strings
pub enum VideoPixelFormat {
    /// Planar YUV 4:2:0, 12bpp (1 Cr & Cb sample per 2x2 Y samples)
    I420,
    /// Planar YUV 4:2:0, 12bpp, with alpha plane
    I420A,
    /// Planar YUV 4:2:2, 16bpp
    I422,
    /// Planar YUV 4:2:2, 16bpp, with alpha plane
    I422A,
    /// Planar YUV 4:4:4, 24bpp
    I444,
    /// Planar YUV 4:4:4, 24bpp, with alpha plane
    I444A,
    /// Semi-planar YUV 4:2:0, 12bpp (Y plane + interleaved UV)
    NV12,
    /// Semi-planar YUV 4:2:0, 12bpp (Y plane + interleaved VU)
    NV21,
    /// RGBA 32bpp
    RGBA,
    /// RGBX 32bpp (alpha ignored)
    RGBX,
    /// BGRA 32bpp
    BGRA,
    /// BGRX 32bpp (alpha ignored)
    BGRX,
}

impl VideoPixelFormat {
    /// Parse the WebCodecs enum string; unknown values are rejected
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "I420" => Some(VideoPixelFormat::I420),
            "I420A" => Some(VideoPixelFormat::I420A),
            "I422" => Some(VideoPixelFormat::I422),
            "I422A" => Some(VideoPixelFormat::I422A),
            "I444" => Some(VideoPixelFormat::I444),
            "I444A" => Some(VideoPixelFormat::I444A),
            "NV12" => Some(VideoPixelFormat::NV12),
            "NV21" => Some(VideoPixelFormat::NV21),
            "RGBA" => Some(VideoPixelFormat::RGBA),
            "RGBX" => Some(VideoPixelFormat::RGBX),
            "BGRA" => Some(VideoPixelFormat::BGRA),
            "BGRX" => Some(VideoPixelFormat::BGRX),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoPixelFormat::I420 => "I420",
            VideoPixelFormat::I420A => "I420A",
            VideoPixelFormat::I422 => "I422",
            VideoPixelFormat::I422A => "I422A",
            VideoPixelFormat::I444 => "I444",
            VideoPixelFormat::I444A => "I444A",
            VideoPixelFormat::NV12 => "NV12",
            VideoPixelFormat::NV21 => "NV21",
            VideoPixelFormat::RGBA => "RGBA",
            VideoPixelFormat::RGBX => "RGBX",
            VideoPixelFormat::BGRA => "BGRA",
            VideoPixelFormat::BGRX => "BGRX",
        }
    }

    /// Number of planes in this format's layout
    pub fn plane_count(&self) -> usize {
        match self {
            VideoPixelFormat::I420 | VideoPixelFormat::I422 | VideoPixelFormat::I444 => 3,
            VideoPixelFormat::I420A | VideoPixelFormat::I422A | VideoPixelFormat::I444A => 4,
            VideoPixelFormat::NV12 | VideoPixelFormat::NV21 => 2,
            VideoPixelFormat::RGBA
            | VideoPixelFormat::RGBX
            | VideoPixelFormat::BGRA
            | VideoPixelFormat::BGRX => 1,
        }
    }

    /// Horizontal subsampling factor of a plane (samples per pixel column)
    pub fn plane_horizontal_subsampling(&self, plane: usize) -> u32 {
        match self {
            VideoPixelFormat::I420 | VideoPixelFormat::I420A | VideoPixelFormat::I422
            | VideoPixelFormat::I422A => {
                if plane == 1 || plane == 2 {
                    2
                } else {
                    1
                }
            }
            // The interleaved UV plane has half the columns but two bytes each
            VideoPixelFormat::NV12 | VideoPixelFormat::NV21 => 1,
            _ => 1,
        }
    }

    /// Vertical subsampling factor of a plane (rows per pixel row)
    pub fn plane_vertical_subsampling(&self, plane: usize) -> u32 {
        match self {
            VideoPixelFormat::I420 | VideoPixelFormat::I420A | VideoPixelFormat::NV12
            | VideoPixelFormat::NV21 => {
                if plane == 1 || plane == 2 {
                    2
                } else {
                    1
                }
            }
            _ => 1,
        }
    }

    /// Tight row size in bytes of a plane for `width` pixels
    pub fn plane_row_bytes(&self, plane: usize, width: u32) -> usize {
        let w = width as usize;
        match self {
            VideoPixelFormat::RGBA
            | VideoPixelFormat::RGBX
            | VideoPixelFormat::BGRA
            | VideoPixelFormat::BGRX => w * 4,
            VideoPixelFormat::NV12 | VideoPixelFormat::NV21 => {
                if plane == 0 {
                    w
                } else {
                    w.div_ceil(2) * 2
                }
            }
            _ => {
                let sub = self.plane_horizontal_subsampling(plane) as usize;
                w.div_ceil(sub)
            }
        }
    }

    /// Number of rows of a plane for `height` pixel rows
    pub fn plane_rows(&self, plane: usize, height: u32) -> usize {
        let sub = self.plane_vertical_subsampling(plane) as usize;
        (height as usize).div_ceil(sub)
    }

    /// Whether this format carries an alpha plane or channel
    pub fn has_alpha(&self) -> bool {
        matches!(
            self,
            VideoPixelFormat::I420A
                | VideoPixelFormat::I422A
                | VideoPixelFormat::I444A
                | VideoPixelFormat::RGBA
                | VideoPixelFormat::BGRA
        )
    }
}

/// Video color primaries (W3C WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoColorPrimaries {
    /// BT.709 / sRGB primaries
    Bt709,
    /// BT.470 BG (PAL)
    Bt470bg,
    /// SMPTE 170M (NTSC)
    Smpte170m,
    /// BT.2020 (UHD)
    Bt2020,
}

impl VideoColorPrimaries {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bt709" => Some(VideoColorPrimaries::Bt709),
            "bt470bg" => Some(VideoColorPrimaries::Bt470bg),
            "smpte170m" => Some(VideoColorPrimaries::Smpte170m),
            "bt2020" => Some(VideoColorPrimaries::Bt2020),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoColorPrimaries::Bt709 => "bt709",
            VideoColorPrimaries::Bt470bg => "bt470bg",
            VideoColorPrimaries::Smpte170m => "smpte170m",
            VideoColorPrimaries::Bt2020 => "bt2020",
        }
    }
}

/// Video transfer characteristics (W3C WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoTransferCharacteristics {
    Bt709,
    Smpte170m,
    /// IEC 61966-2-1 (sRGB)
    Iec6196621,
    /// SMPTE 2084 perceptual quantizer (HDR)
    Pq,
    /// ARIB STD-B67 hybrid log-gamma (HDR)
    Hlg,
}

impl VideoTransferCharacteristics {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bt709" => Some(VideoTransferCharacteristics::Bt709),
            "smpte170m" => Some(VideoTransferCharacteristics::Smpte170m),
            "iec61966-2-1" => Some(VideoTransferCharacteristics::Iec6196621),
            "pq" => Some(VideoTransferCharacteristics::Pq),
            "hlg" => Some(VideoTransferCharacteristics::Hlg),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoTransferCharacteristics::Bt709 => "bt709",
            VideoTransferCharacteristics::Smpte170m => "smpte170m",
            VideoTransferCharacteristics::Iec6196621 => "iec61966-2-1",
            VideoTransferCharacteristics::Pq => "pq",
            VideoTransferCharacteristics::Hlg => "hlg",
        }
    }
}

/// Video matrix coefficients (W3C WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoMatrixCoefficients {
    Rgb,
    Bt709,
    Smpte170m,
    Bt2020Ncl,
}

impl VideoMatrixCoefficients {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "rgb" => Some(VideoMatrixCoefficients::Rgb),
            "bt709" => Some(VideoMatrixCoefficients::Bt709),
            "smpte170m" => Some(VideoMatrixCoefficients::Smpte170m),
            "bt2020-ncl" => Some(VideoMatrixCoefficients::Bt2020Ncl),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoMatrixCoefficients::Rgb => "rgb",
            VideoMatrixCoefficients::Bt709 => "bt709",
            VideoMatrixCoefficients::Smpte170m => "smpte170m",
            VideoMatrixCoefficients::Bt2020Ncl => "bt2020-ncl",
        }
    }
}

/// VideoColorSpace - pure value describing frame colour interpretation
///
/// See: https://developer.mozilla.org/en-US/docs/Web/API/VideoColorSpace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoColorSpace {
    pub primaries: Option<VideoColorPrimaries>,
    pub transfer: Option<VideoTransferCharacteristics>,
    pub matrix: Option<VideoMatrixCoefficients>,
    pub full_range: Option<bool>,
}

impl VideoColorSpace {
    pub fn new(
        primaries: Option<VideoColorPrimaries>,
        transfer: Option<VideoTransferCharacteristics>,
        matrix: Option<VideoMatrixCoefficients>,
        full_range: Option<bool>,
    ) -> Self {
        Self {
            primaries,
            transfer,
            matrix,
            full_range,
        }
    }

    /// BT.709 SDR, the common default for modern content
    pub fn rec709() -> Self {
        Self {
            primaries: Some(VideoColorPrimaries::Bt709),
            transfer: Some(VideoTransferCharacteristics::Bt709),
            matrix: Some(VideoMatrixCoefficients::Bt709),
            full_range: Some(false),
        }
    }

    /// The toJSON() serialization: a copy of every member
    pub fn to_json(&self) -> VideoColorSpace {
        self.clone()
    }
}

/// Rectangle in pixels (DOMRectReadOnly stand-in)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFrameRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Offset and stride of one plane in a destination buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    pub offset: usize,
    pub stride: usize,
}

/// Options for allocationSize() / copyTo()
#[derive(Debug, Clone, Default)]
pub struct VideoFrameCopyToOptions {
    /// Source rectangle; defaults to the visible rectangle
    pub rect: Option<VideoFrameRect>,
    /// Explicit destination layout; defaults to tight sequential packing
    pub layout: Option<Vec<PlaneLayout>>,
}

/// Init dictionary for building a VideoFrame from raw bytes
#[derive(Debug, Clone)]
pub struct VideoFrameBufferInit {
    pub format: VideoPixelFormat,
    pub coded_width: u32,
    pub coded_height: u32,
    /// Presentation timestamp in microseconds
    pub timestamp: i64,
    pub duration: Option<i64>,
    pub visible_rect: Option<VideoFrameRect>,
    pub display_width: Option<u32>,
    pub display_height: Option<u32>,
    /// Clockwise rotation to apply for display: 0, 90, 180 or 270
    pub rotation: u32,
    /// Horizontal mirror applied after rotation
    pub flip: bool,
    pub color_space: Option<VideoColorSpace>,
}

impl VideoFrameBufferInit {
    pub fn new(
        format: VideoPixelFormat,
        coded_width: u32,
        coded_height: u32,
        timestamp: i64,
    ) -> Self {
        Self {
            format,
            coded_width,
            coded_height,
            timestamp,
            duration: None,
            visible_rect: None,
            display_width: None,
            display_height: None,
            rotation: 0,
            flip: false,
            color_space: None,
        }
    }
}

/// VideoFrame - one decoded picture
///
/// Geometry, orientation, timing and colour metadata are copied into the
/// handle at construction and stay readable until `close()`.
pub struct VideoFrame {
    inner: Mutex<Option<Arc<FrameBuffer>>>,
    format: VideoPixelFormat,
    coded_width: u32,
    coded_height: u32,
    visible_rect: VideoFrameRect,
    display_width: u32,
    display_height: u32,
    rotation: u32,
    flip: bool,
    timestamp: i64,
    duration: Option<i64>,
    color_space: VideoColorSpace,
}

impl VideoFrame {
    /// Build a frame by copying tightly packed plane data out of `data`
    pub fn from_buffer_init(
        data: &[u8],
        init: VideoFrameBufferInit,
    ) -> WebCodecsResult<VideoFrame> {
        if init.coded_width == 0 || init.coded_height == 0 {
            return Err(type_error("codedWidth and codedHeight must be nonzero"));
        }
        if !matches!(init.rotation, 0 | 90 | 180 | 270) {
            return Err(type_error("rotation must be 0, 90, 180 or 270"));
        }
        if let Some(rect) = &init.visible_rect {
            validate_rect(rect, init.coded_width, init.coded_height)?;
        }

        let format = init.format;
        let mut required = 0usize;
        for plane in 0..format.plane_count() {
            required += format.plane_row_bytes(plane, init.coded_width)
                * format.plane_rows(plane, init.coded_height);
        }
        if data.len() < required {
            return Err(type_error("data is smaller than the frame layout requires"));
        }

        let mut buffer = FrameBuffer::alloc(format, init.coded_width, init.coded_height);
        buffer.set_pts(init.timestamp);
        buffer.set_duration(init.duration);
        if let Some(cs) = &init.color_space {
            buffer.set_color_space(cs.clone());
        }

        let mut offset = 0;
        for plane in 0..format.plane_count() {
            let row_bytes = format.plane_row_bytes(plane, init.coded_width);
            let rows = format.plane_rows(plane, init.coded_height);
            let stride = buffer.stride(plane);
            let dst = buffer.plane_data_mut(plane).ok_or_else(|| {
                type_error("frame layout mismatch")
            })?;
            for row in 0..rows {
                dst[row * stride..row * stride + row_bytes]
                    .copy_from_slice(&data[offset..offset + row_bytes]);
                offset += row_bytes;
            }
        }

        Ok(Self::from_parts(Arc::new(buffer), &init))
    }

    /// Wrap a decoded buffer in a caller-facing handle
    pub(crate) fn from_decoded(buffer: Arc<FrameBuffer>, rotation: u32, flip: bool) -> VideoFrame {
        let coded_width = buffer.coded_width();
        let coded_height = buffer.coded_height();
        VideoFrame {
            format: buffer.format(),
            coded_width,
            coded_height,
            visible_rect: VideoFrameRect {
                x: 0,
                y: 0,
                width: coded_width,
                height: coded_height,
            },
            display_width: coded_width,
            display_height: coded_height,
            rotation,
            flip,
            timestamp: buffer.pts(),
            duration: buffer.duration(),
            color_space: buffer.color_space().clone(),
            inner: Mutex::new(Some(buffer)),
        }
    }

    fn from_parts(buffer: Arc<FrameBuffer>, init: &VideoFrameBufferInit) -> VideoFrame {
        let visible_rect = init.visible_rect.unwrap_or(VideoFrameRect {
            x: 0,
            y: 0,
            width: init.coded_width,
            height: init.coded_height,
        });
        VideoFrame {
            format: init.format,
            coded_width: init.coded_width,
            coded_height: init.coded_height,
            visible_rect,
            display_width: init.display_width.unwrap_or(visible_rect.width),
            display_height: init.display_height.unwrap_or(visible_rect.height),
            rotation: init.rotation,
            flip: init.flip,
            timestamp: init.timestamp,
            duration: init.duration,
            color_space: init.color_space.clone().unwrap_or_default(),
            inner: Mutex::new(Some(buffer)),
        }
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    /// Pixel format; `None` once the frame is closed
    pub fn format(&self) -> Option<VideoPixelFormat> {
        self.with_inner(|_| self.format)
    }

    pub fn coded_width(&self) -> u32 {
        self.with_inner(|_| self.coded_width).unwrap_or(0)
    }

    pub fn coded_height(&self) -> u32 {
        self.with_inner(|_| self.coded_height).unwrap_or(0)
    }

    pub fn visible_rect(&self) -> Option<VideoFrameRect> {
        self.with_inner(|_| self.visible_rect)
    }

    pub fn display_width(&self) -> u32 {
        self.with_inner(|_| self.display_width).unwrap_or(0)
    }

    pub fn display_height(&self) -> u32 {
        self.with_inner(|_| self.display_height).unwrap_or(0)
    }

    /// Clockwise display rotation in degrees
    pub fn rotation(&self) -> u32 {
        self.rotation
    }

    /// Horizontal mirror applied after rotation
    pub fn flip(&self) -> bool {
        self.flip
    }

    /// Presentation timestamp in microseconds; survives close
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn duration(&self) -> Option<i64> {
        self.duration
    }

    pub fn color_space(&self) -> &VideoColorSpace {
        &self.color_space
    }

    /// Whether this handle has been closed or transferred away
    pub fn is_detached(&self) -> bool {
        self.inner.lock().unwrap().is_none()
    }

    // ========================================================================
    // Data Access
    // ========================================================================

    /// Bytes needed by copyTo() for the given options
    pub fn allocation_size(&self, options: &VideoFrameCopyToOptions) -> WebCodecsResult<usize> {
        let _ = self.require_inner()?;
        let rect = self.resolve_rect(options)?;
        let mut total = 0usize;
        for plane in 0..self.format.plane_count() {
            total += self.format.plane_row_bytes(plane, rect.width)
                * self.format.plane_rows(plane, rect.height);
        }
        Ok(total)
    }

    /// Copy the frame's pixels into `dest`
    ///
    /// Resolves with the layout of each plane in the destination. The copy is
    /// performed before the returned future is polled.
    pub fn copy_to(
        &self,
        dest: &mut [u8],
        options: &VideoFrameCopyToOptions,
    ) -> impl Future<Output = WebCodecsResult<Vec<PlaneLayout>>> {
        ready(self.copy_to_sync(dest, options))
    }

    fn copy_to_sync(
        &self,
        dest: &mut [u8],
        options: &VideoFrameCopyToOptions,
    ) -> WebCodecsResult<Vec<PlaneLayout>> {
        let buffer = self.require_inner()?;
        let rect = self.resolve_rect(options)?;

        // Resolve destination layout: explicit, or tight sequential packing
        let mut layouts = Vec::with_capacity(self.format.plane_count());
        match &options.layout {
            Some(explicit) => {
                if explicit.len() != self.format.plane_count() {
                    return Err(type_error("layout plane count mismatch"));
                }
                layouts.extend_from_slice(explicit);
            }
            None => {
                let mut offset = 0;
                for plane in 0..self.format.plane_count() {
                    let stride = self.format.plane_row_bytes(plane, rect.width);
                    layouts.push(PlaneLayout { offset, stride });
                    offset += stride * self.format.plane_rows(plane, rect.height);
                }
            }
        }

        for (plane, layout) in layouts.iter().enumerate() {
            let row_bytes = self.format.plane_row_bytes(plane, rect.width);
            let rows = self.format.plane_rows(plane, rect.height);
            if layout.stride < row_bytes {
                return Err(type_error("layout stride too small for rect"));
            }
            let end = layout.offset + layout.stride * rows.saturating_sub(1) + row_bytes;
            if end > dest.len() {
                return Err(type_error("destination buffer too small"));
            }

            let src_stride = buffer.stride(plane);
            let src = buffer
                .plane_data(plane)
                .ok_or_else(|| type_error("frame layout mismatch"))?;
            let h_sub = self.format.plane_horizontal_subsampling(plane) as usize;
            let v_sub = self.format.plane_vertical_subsampling(plane) as usize;
            let src_x = match self.format {
                VideoPixelFormat::RGBA
                | VideoPixelFormat::RGBX
                | VideoPixelFormat::BGRA
                | VideoPixelFormat::BGRX => rect.x as usize * 4,
                // Interleaved UV: two bytes per chroma column
                VideoPixelFormat::NV12 | VideoPixelFormat::NV21 if plane == 1 => {
                    (rect.x as usize / 2) * 2
                }
                _ => rect.x as usize / h_sub,
            };
            let src_y = rect.y as usize / v_sub;

            for row in 0..rows {
                let src_start = (src_y + row) * src_stride + src_x;
                let dst_start = layout.offset + row * layout.stride;
                dest[dst_start..dst_start + row_bytes]
                    .copy_from_slice(&src[src_start..src_start + row_bytes]);
            }
        }

        Ok(layouts)
    }

    fn resolve_rect(&self, options: &VideoFrameCopyToOptions) -> WebCodecsResult<VideoFrameRect> {
        let rect = options.rect.unwrap_or(self.visible_rect);
        validate_rect(&rect, self.coded_width, self.coded_height)?;
        Ok(rect)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Create an independent handle referencing the same pixel data
    pub fn try_clone(&self) -> WebCodecsResult<VideoFrame> {
        let inner = self.inner.lock().unwrap();
        let Some(buffer) = inner.as_ref() else {
            return Err(invalid_state_error("VideoFrame is closed"));
        };
        Ok(VideoFrame {
            inner: Mutex::new(Some(Arc::clone(buffer))),
            format: self.format,
            coded_width: self.coded_width,
            coded_height: self.coded_height,
            visible_rect: self.visible_rect,
            display_width: self.display_width,
            display_height: self.display_height,
            rotation: self.rotation,
            flip: self.flip,
            timestamp: self.timestamp,
            duration: self.duration,
            color_space: self.color_space.clone(),
        })
    }

    /// Move the underlying reference into a fresh handle, detaching this one
    pub fn transfer(&self) -> WebCodecsResult<VideoFrame> {
        let buffer = {
            let mut inner = self.inner.lock().unwrap();
            inner
                .take()
                .ok_or_else(|| invalid_state_error("VideoFrame is closed"))?
        };
        Ok(VideoFrame {
            inner: Mutex::new(Some(buffer)),
            format: self.format,
            coded_width: self.coded_width,
            coded_height: self.coded_height,
            visible_rect: self.visible_rect,
            display_width: self.display_width,
            display_height: self.display_height,
            rotation: self.rotation,
            flip: self.flip,
            timestamp: self.timestamp,
            duration: self.duration,
            color_space: self.color_space.clone(),
        })
    }

    /// Release this handle's reference; idempotent
    pub fn close(&self) {
        self.inner.lock().unwrap().take();
    }

    /// Inner buffer reference for the encode path (refcount bump, no copy)
    pub(crate) fn buffer_ref(&self) -> WebCodecsResult<Arc<FrameBuffer>> {
        self.require_inner()
    }

    fn require_inner(&self) -> WebCodecsResult<Arc<FrameBuffer>> {
        self
            .inner
            .lock()
            .unwrap()
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| invalid_state_error("VideoFrame is closed"))
    }

    fn with_inner<T>(&self, f: impl FnOnce(&Arc<FrameBuffer>) -> T) -> Option<T> {
        self.inner.lock().unwrap().as_ref().map(f)
    }
}

impl std::fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFrame")
            .field("format", &self.format)
            .field("coded_width", &self.coded_width)
            .field("coded_height", &self.coded_height)
            .field("timestamp", &self.timestamp)
            .field("detached", &self.is_detached())
            .finish()
    }
}

fn validate_rect(
    rect: &VideoFrameRect,
    coded_width: u32,
    coded_height: u32,
) -> WebCodecsResult<()> {
    if rect.width == 0 || rect.height == 0 {
        return Err(type_error("rect must have nonzero size"));
    }
    let right = rect.x.checked_add(rect.width);
    let bottom = rect.y.checked_add(rect.height);
    match (right, bottom) {
        (Some(r), Some(b)) if r <= coded_width && b <= coded_height => Ok(()),
        _ => Err(type_error("rect exceeds coded size")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn test_frame() -> VideoFrame {
        // 4x2 RGBA ramp
        let data: Vec<u8> = (0..32).collect();
        VideoFrame::from_buffer_init(
            &data,
            VideoFrameBufferInit::new(VideoPixelFormat::RGBA, 4, 2, 1000),
        )
        .unwrap()
    }

    #[test]
    fn test_attributes() {
        let frame = test_frame();
        assert_eq!(frame.format(), Some(VideoPixelFormat::RGBA));
        assert_eq!(frame.coded_width(), 4);
        assert_eq!(frame.coded_height(), 2);
        assert_eq!(frame.timestamp(), 1000);
        assert_eq!(frame.rotation(), 0);
        assert!(!frame.flip());
    }

    #[test]
    fn test_clone_is_independent() {
        let frame = test_frame();
        let copy = frame.try_clone().unwrap();
        frame.close();
        // Closing one handle leaves the other usable
        assert!(frame.is_detached());
        assert_eq!(copy.coded_width(), 4);
        assert!(copy.try_clone().is_ok());
    }

    #[test]
    fn test_close_is_idempotent_and_detaches() {
        let frame = test_frame();
        frame.close();
        frame.close();
        assert!(frame.format().is_none());
        assert_eq!(frame.coded_width(), 0);
        assert_eq!(
            frame.try_clone().unwrap_err().kind(),
            crate::webcodecs::error::ErrorKind::InvalidStateError
        );
        // Timestamp survives close
        assert_eq!(frame.timestamp(), 1000);
    }

    #[test]
    fn test_transfer_detaches_source() {
        let frame = test_frame();
        let moved = frame.transfer().unwrap();
        assert!(frame.is_detached());
        assert!(!moved.is_detached());
        assert!(frame.transfer().is_err());
    }

    #[test]
    fn test_allocation_size_and_copy_to() {
        let frame = test_frame();
        let options = VideoFrameCopyToOptions::default();
        let size = frame.allocation_size(&options).unwrap();
        assert_eq!(size, 32);

        let mut dest = vec![0u8; size];
        let layout = block_on(frame.copy_to(&mut dest, &options)).unwrap();
        assert_eq!(layout, vec![PlaneLayout { offset: 0, stride: 16 }]);
        let expected: Vec<u8> = (0..32).collect();
        assert_eq!(dest, expected);
    }

    #[test]
    fn test_copy_to_rect() {
        let frame = test_frame();
        let options = VideoFrameCopyToOptions {
            rect: Some(VideoFrameRect {
                x: 2,
                y: 1,
                width: 2,
                height: 1,
            }),
            layout: None,
        };
        let mut dest = vec![0u8; frame.allocation_size(&options).unwrap()];
        block_on(frame.copy_to(&mut dest, &options)).unwrap();
        // Bottom row, pixels 2..4 of the ramp
        assert_eq!(dest, vec![24, 25, 26, 27, 28, 29, 30, 31]);
    }

    #[test]
    fn test_copy_to_small_buffer_fails() {
        let frame = test_frame();
        let mut dest = vec![0u8; 4];
        let err =
            block_on(frame.copy_to(&mut dest, &VideoFrameCopyToOptions::default())).unwrap_err();
        assert_eq!(err.kind(), crate::webcodecs::error::ErrorKind::TypeError);
    }

    #[test]
    fn test_invalid_rect_rejected() {
        let frame = test_frame();
        let options = VideoFrameCopyToOptions {
            rect: Some(VideoFrameRect {
                x: 3,
                y: 0,
                width: 2,
                height: 2,
            }),
            layout: None,
        };
        assert!(frame.allocation_size(&options).is_err());
    }

    #[test]
    fn test_bad_rotation_rejected() {
        let data = vec![0u8; 16];
        let mut init = VideoFrameBufferInit::new(VideoPixelFormat::RGBA, 2, 2, 0);
        init.rotation = 45;
        assert!(VideoFrame::from_buffer_init(&data, init).is_err());
    }

    #[test]
    fn test_i420_plane_math() {
        assert_eq!(VideoPixelFormat::I420.plane_count(), 3);
        assert_eq!(VideoPixelFormat::I420.plane_row_bytes(0, 7), 7);
        assert_eq!(VideoPixelFormat::I420.plane_row_bytes(1, 7), 4);
        assert_eq!(VideoPixelFormat::I420.plane_rows(1, 7), 4);
        assert_eq!(VideoPixelFormat::NV12.plane_row_bytes(1, 7), 8);
    }
}
