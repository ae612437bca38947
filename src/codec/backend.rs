//! Codec backend capability
//!
//! The engine drives a codec through the narrow send/receive surface below.
//! A production implementation wraps a codec library's per-codec object; the
//! tests drive scripted stand-ins. The worker thread owns the backend handle
//! exclusively, so implementations need `Send` but never `Sync`.

use std::sync::Arc;

use super::{CodecResult, FrameBuffer, PacketBuffer, SampleBuffer};
use crate::webcodecs::codec_string::CodecDescriptor;
use crate::webcodecs::{
    AudioDecoderConfig, AudioEncoderConfig, VideoDecoderConfig, VideoEncoderConfig,
};

/// Outcome of handing one input to the backend
///
/// `WouldBlock` returns the input to the caller: the backend is saturated
/// and must emit output before it can accept more.
pub enum SendStatus<I> {
    Accepted,
    WouldBlock(I),
}

/// Outcome of asking the backend for one output
pub enum ReceiveStatus<O> {
    /// One output, in presentation order
    Output(O),
    /// Backend needs more input before it can produce output
    Again,
    /// Stream complete (only while draining)
    Eof,
}

/// The send/receive surface of one opened codec instance
///
/// Decoders consume encoded packets and produce raw media; encoders the
/// reverse. Decoder implementations must emit outputs in presentation
/// order; a library that emits in decode order wraps its receive path in a
/// [`ReorderBuffer`].
pub trait CodecBackend: Send {
    type Input: Send;
    type Output: Send;

    /// Hand one input to the codec
    fn send_input(&mut self, input: Self::Input) -> CodecResult<SendStatus<Self::Input>>;

    /// Ask the codec for the next output
    fn receive_output(&mut self) -> CodecResult<ReceiveStatus<Self::Output>>;

    /// Switch into no-more-input mode; subsequent receives run to `Eof`
    fn drain(&mut self) -> CodecResult<()>;

    /// Discard buffered codec state (reset); the instance stays usable
    fn flush_buffers(&mut self);

    /// Codec configuration payload generated by an encoder (e.g. SPS/PPS,
    /// AudioSpecificConfig); `None` where the codec has none
    fn description(&self) -> Option<Vec<u8>> {
        None
    }
}

/// One video frame submitted for encoding
pub struct VideoEncodeRequest {
    pub frame: Arc<FrameBuffer>,
    /// Caller asked for a key frame at this position
    pub force_key: bool,
}

/// One audio buffer submitted for encoding
pub struct AudioEncodeRequest {
    pub samples: Arc<SampleBuffer>,
}

pub type BoxVideoDecoderBackend =
    Box<dyn CodecBackend<Input = Arc<PacketBuffer>, Output = FrameBuffer>>;
pub type BoxVideoEncoderBackend =
    Box<dyn CodecBackend<Input = VideoEncodeRequest, Output = PacketBuffer>>;
pub type BoxAudioDecoderBackend =
    Box<dyn CodecBackend<Input = Arc<PacketBuffer>, Output = SampleBuffer>>;
pub type BoxAudioEncoderBackend =
    Box<dyn CodecBackend<Input = AudioEncodeRequest, Output = PacketBuffer>>;
pub type BoxImageBackend = Box<dyn ImageBackend>;

/// Factory for opened codec instances
///
/// Obtained once at startup and shared; each configure opens a fresh
/// backend so a reconfigure never reuses stale codec state.
pub trait BackendProvider: Send + Sync {
    /// Backend-level support answer for a parsed codec descriptor
    fn supports(&self, descriptor: &CodecDescriptor) -> bool;

    fn open_video_decoder(
        &self,
        descriptor: &CodecDescriptor,
        config: &VideoDecoderConfig,
    ) -> CodecResult<BoxVideoDecoderBackend>;

    fn open_video_encoder(
        &self,
        descriptor: &CodecDescriptor,
        config: &VideoEncoderConfig,
    ) -> CodecResult<BoxVideoEncoderBackend>;

    fn open_audio_decoder(
        &self,
        descriptor: &CodecDescriptor,
        config: &AudioDecoderConfig,
    ) -> CodecResult<BoxAudioDecoderBackend>;

    fn open_audio_encoder(
        &self,
        descriptor: &CodecDescriptor,
        config: &AudioEncoderConfig,
    ) -> CodecResult<BoxAudioEncoderBackend>;

    /// Open a combined demux+decode backend for an image MIME type
    fn open_image_decoder(&self, mime_type: &str) -> CodecResult<BoxImageBackend>;
}

// ============================================================================
// Image backend
// ============================================================================

/// Track information extracted from an image file
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTrackInfo {
    pub animated: bool,
    pub frame_count: u32,
    /// Number of times an animated track repeats; `f32::INFINITY` for forever
    pub repetition_count: f32,
}

/// One decoded image frame
pub struct DecodedImage {
    pub frame: FrameBuffer,
    /// False for partial progressive output
    pub complete: bool,
}

/// Combined demuxer+decoder capability for image formats
///
/// Unlike the streaming codecs, image formats fold container and codec into
/// one: the backend receives raw file bytes (possibly incrementally), parses
/// the track structure, and decodes frames by index.
pub trait ImageBackend: Send {
    /// Feed more file bytes
    fn append_data(&mut self, data: Vec<u8>) -> CodecResult<()>;

    /// Signal that no further bytes will arrive
    fn end_of_data(&mut self);

    /// Parse tracks if enough data has arrived; `None` means keep feeding
    fn probe_tracks(&mut self) -> CodecResult<Option<Vec<ImageTrackInfo>>>;

    /// Switch decoding to another track
    fn select_track(&mut self, index: u32) -> CodecResult<()>;

    /// Whether the final frame count of the selected track is established
    fn frame_count_stable(&self) -> bool;

    /// Decode the frame at `index` on the selected track
    ///
    /// `Again` means the bytes for that frame have not arrived yet.
    fn decode_frame(&mut self, index: u32, complete_frames_only: bool)
        -> CodecResult<ReceiveStatus<DecodedImage>>;
}

// ============================================================================
// Presentation-order reorder buffer
// ============================================================================

/// Reorders decode-order frames into presentation order
///
/// Holds up to `depth` frames (derived from the codec's decoded-picture
/// buffer size) and releases the lowest-timestamp frame once full. Backends
/// whose library emits in decode order run every received frame through
/// this before returning it.
pub struct ReorderBuffer {
    depth: usize,
    held: Vec<FrameBuffer>,
}

impl ReorderBuffer {
    pub fn new(depth: usize) -> Self {
        Self {
            depth: depth.max(1),
            held: Vec::new(),
        }
    }

    /// Insert a frame; returns the earliest held frame once the buffer is full
    pub fn push(&mut self, frame: FrameBuffer) -> Option<FrameBuffer> {
        let pos = self
            .held
            .iter()
            .position(|f| f.pts() > frame.pts())
            .unwrap_or(self.held.len());
        self.held.insert(pos, frame);

        if self.held.len() > self.depth {
            Some(self.held.remove(0))
        } else {
            None
        }
    }

    /// Release all held frames in presentation order (end of stream)
    pub fn drain(&mut self) -> Vec<FrameBuffer> {
        std::mem::take(&mut self.held)
    }

    /// Discard held frames without releasing them (reset)
    pub fn clear(&mut self) {
        self.held.clear();
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webcodecs::VideoPixelFormat;

    fn frame_at(pts: i64) -> FrameBuffer {
        let mut f = FrameBuffer::alloc(VideoPixelFormat::I420, 2, 2);
        f.set_pts(pts);
        f
    }

    #[test]
    fn test_reorder_buffer_sorts_by_pts() {
        let mut buf = ReorderBuffer::new(2);
        assert!(buf.push(frame_at(66)).is_none());
        assert!(buf.push(frame_at(0)).is_none());
        // Third push overflows: the earliest (pts 0) comes out first
        let out = buf.push(frame_at(33)).unwrap();
        assert_eq!(out.pts(), 0);

        let rest: Vec<i64> = buf.drain().iter().map(|f| f.pts()).collect();
        assert_eq!(rest, vec![33, 66]);
    }

    #[test]
    fn test_reorder_buffer_clear() {
        let mut buf = ReorderBuffer::new(4);
        buf.push(frame_at(1));
        buf.push(frame_at(2));
        buf.clear();
        assert!(buf.is_empty());
    }
}
