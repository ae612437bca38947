//! EncodedVideoChunk - WebCodecs API implementation
//!
//! Immutable container for one encoded video unit, plus the video decoder
//! and encoder configuration dictionaries.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/EncodedVideoChunk

use std::sync::Arc;

use crate::codec::PacketBuffer;
use crate::webcodecs::error::{type_error, WebCodecsResult};
use crate::webcodecs::VideoColorSpace;

/// Chunk type per WebCodecs spec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodedVideoChunkType {
    /// Decoding can start independently from this chunk
    Key,
    /// Depends on prior decoder state
    Delta,
}

impl EncodedVideoChunkType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "key" => Some(EncodedVideoChunkType::Key),
            "delta" => Some(EncodedVideoChunkType::Delta),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EncodedVideoChunkType::Key => "key",
            EncodedVideoChunkType::Delta => "delta",
        }
    }
}

/// Init dictionary for EncodedVideoChunk
#[derive(Debug, Clone)]
pub struct EncodedVideoChunkInit<'a> {
    pub chunk_type: EncodedVideoChunkType,
    /// Presentation timestamp in microseconds
    pub timestamp: i64,
    pub duration: Option<i64>,
    pub data: &'a [u8],
}

/// EncodedVideoChunk - immutable encoded video data
///
/// The payload is copied out of the init source once; afterwards the chunk
/// is shared by refcount only, so handing it to a decoder never copies.
pub struct EncodedVideoChunk {
    inner: Arc<PacketBuffer>,
    chunk_type: EncodedVideoChunkType,
}

impl EncodedVideoChunk {
    pub fn new(init: EncodedVideoChunkInit<'_>) -> WebCodecsResult<Self> {
        if init.data.is_empty() {
            return Err(type_error("chunk data must not be empty"));
        }
        let mut packet = PacketBuffer::from_slice(init.data);
        packet.set_pts(init.timestamp);
        packet.set_dts(init.timestamp);
        packet.set_duration(init.duration);
        packet.set_key(init.chunk_type == EncodedVideoChunkType::Key);
        Ok(Self {
            inner: Arc::new(packet),
            chunk_type: init.chunk_type,
        })
    }

    /// Wrap an encoder-produced packet
    pub(crate) fn from_packet(packet: Arc<PacketBuffer>) -> Self {
        let chunk_type = if packet.is_key() {
            EncodedVideoChunkType::Key
        } else {
            EncodedVideoChunkType::Delta
        };
        Self {
            inner: packet,
            chunk_type,
        }
    }

    pub fn chunk_type(&self) -> EncodedVideoChunkType {
        self.chunk_type
    }

    /// Presentation timestamp in microseconds
    pub fn timestamp(&self) -> i64 {
        self.inner.pts()
    }

    pub fn duration(&self) -> Option<i64> {
        self.inner.duration()
    }

    pub fn byte_length(&self) -> usize {
        self.inner.len()
    }

    /// Copy the payload into `dest`
    pub fn copy_to(&self, dest: &mut [u8]) -> WebCodecsResult<()> {
        let data = self.inner.as_slice();
        if dest.len() < data.len() {
            return Err(type_error("destination buffer too small"));
        }
        dest[..data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Refcounted payload for the decode path (no copy)
    pub(crate) fn packet_ref(&self) -> Arc<PacketBuffer> {
        Arc::clone(&self.inner)
    }
}

impl std::fmt::Debug for EncodedVideoChunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedVideoChunk")
            .field("type", &self.chunk_type)
            .field("timestamp", &self.timestamp())
            .field("byte_length", &self.byte_length())
            .finish()
    }
}

// ============================================================================
// Configuration dictionaries
// ============================================================================

/// Hardware acceleration preference (WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HardwareAcceleration {
    #[default]
    NoPreference,
    PreferHardware,
    PreferSoftware,
}

impl HardwareAcceleration {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "no-preference" => Some(HardwareAcceleration::NoPreference),
            "prefer-hardware" => Some(HardwareAcceleration::PreferHardware),
            "prefer-software" => Some(HardwareAcceleration::PreferSoftware),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HardwareAcceleration::NoPreference => "no-preference",
            HardwareAcceleration::PreferHardware => "prefer-hardware",
            HardwareAcceleration::PreferSoftware => "prefer-software",
        }
    }
}

/// Encoder bitrate mode (WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitrateMode {
    Constant,
    #[default]
    Variable,
    Quantizer,
}

impl BitrateMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "constant" => Some(BitrateMode::Constant),
            "variable" => Some(BitrateMode::Variable),
            "quantizer" => Some(BitrateMode::Quantizer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BitrateMode::Constant => "constant",
            BitrateMode::Variable => "variable",
            BitrateMode::Quantizer => "quantizer",
        }
    }
}

/// Encoder latency mode (WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatencyMode {
    #[default]
    Quality,
    Realtime,
}

impl LatencyMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "quality" => Some(LatencyMode::Quality),
            "realtime" => Some(LatencyMode::Realtime),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LatencyMode::Quality => "quality",
            LatencyMode::Realtime => "realtime",
        }
    }
}

/// VideoDecoder configuration
#[derive(Debug, Clone)]
pub struct VideoDecoderConfig {
    pub codec: String,
    pub coded_width: Option<u32>,
    pub coded_height: Option<u32>,
    pub display_aspect_width: Option<u32>,
    pub display_aspect_height: Option<u32>,
    pub color_space: Option<VideoColorSpace>,
    pub hardware_acceleration: HardwareAcceleration,
    pub optimize_for_latency: Option<bool>,
    /// Clockwise rotation to stamp on output frames
    pub rotation: u32,
    /// Horizontal mirror to stamp on output frames
    pub flip: bool,
    /// Codec-specific setup payload (e.g. avcC SPS/PPS)
    pub description: Option<Vec<u8>>,
}

impl VideoDecoderConfig {
    pub fn new(codec: impl Into<String>) -> Self {
        Self {
            codec: codec.into(),
            coded_width: None,
            coded_height: None,
            display_aspect_width: None,
            display_aspect_height: None,
            color_space: None,
            hardware_acceleration: HardwareAcceleration::default(),
            optimize_for_latency: None,
            rotation: 0,
            flip: false,
            description: None,
        }
    }

    /// Shape validation: a config that fails here throws synchronously
    pub fn validate(&self) -> WebCodecsResult<()> {
        if self.codec.trim().is_empty() {
            return Err(type_error("codec is required"));
        }
        if self.coded_width == Some(0) || self.coded_height == Some(0) {
            return Err(type_error("coded dimensions must be nonzero"));
        }
        if self.coded_width.is_some() != self.coded_height.is_some() {
            return Err(type_error(
                "codedWidth and codedHeight must be specified together",
            ));
        }
        if !matches!(self.rotation, 0 | 90 | 180 | 270) {
            return Err(type_error("rotation must be 0, 90, 180 or 270"));
        }
        Ok(())
    }
}

/// VideoEncoder configuration
#[derive(Debug, Clone)]
pub struct VideoEncoderConfig {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub display_width: Option<u32>,
    pub display_height: Option<u32>,
    /// Target bitrate in bits per second
    pub bitrate: Option<u64>,
    pub framerate: Option<f64>,
    pub hardware_acceleration: HardwareAcceleration,
    pub bitrate_mode: BitrateMode,
    pub latency_mode: LatencyMode,
}

impl VideoEncoderConfig {
    pub fn new(codec: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            codec: codec.into(),
            width,
            height,
            display_width: None,
            display_height: None,
            bitrate: None,
            framerate: None,
            hardware_acceleration: HardwareAcceleration::default(),
            bitrate_mode: BitrateMode::default(),
            latency_mode: LatencyMode::default(),
        }
    }

    /// Shape validation: a config that fails here throws synchronously
    pub fn validate(&self) -> WebCodecsResult<()> {
        if self.codec.trim().is_empty() {
            return Err(type_error("codec is required"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(type_error("width and height must be nonzero"));
        }
        if self.framerate == Some(0.0) {
            return Err(type_error("framerate must be nonzero"));
        }
        Ok(())
    }
}
