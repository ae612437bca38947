//! Scripted codec backends for engine tests
//!
//! Deterministic stand-ins for a real codec library. Behavior knobs cover
//! the paths the engine has to handle: output latency (frames held until
//! drain), saturation, mid-stream failure, and configure rejection.

use std::sync::Arc;

use super::backend::{
    AudioEncodeRequest, BackendProvider, BoxAudioDecoderBackend, BoxAudioEncoderBackend,
    BoxImageBackend, BoxVideoDecoderBackend, BoxVideoEncoderBackend, CodecBackend, DecodedImage,
    ImageBackend, ImageTrackInfo, ReceiveStatus, SendStatus, VideoEncodeRequest,
};
use super::{CodecError, CodecResult, FrameBuffer, PacketBuffer, SampleBuffer};
use crate::webcodecs::codec_string::{CodecDescriptor, CodecKind};
use crate::webcodecs::{
    AudioDecoderConfig, AudioEncoderConfig, AudioSampleFormat, VideoDecoderConfig,
    VideoEncoderConfig, VideoPixelFormat,
};

/// Behavior script shared by every backend a [`MockProvider`] opens
#[derive(Clone, Default)]
pub struct MockScript {
    /// Fail every `open_*` call (exercises the NotSupported path)
    pub fail_open: bool,
    /// Hold this many outputs inside the codec until drain (B-frame latency)
    pub hold_outputs: usize,
    /// Report `WouldBlock` on the Nth `send_input` (1-based), once
    pub would_block_at: Option<usize>,
    /// Fail the Nth `send_input` (1-based) with a backend error
    pub fail_send_at: Option<usize>,
    /// Codec kinds the provider reports as unsupported
    pub unsupported: Vec<CodecKind>,
    /// Tracks the image backend reports once probed
    pub image_tracks: Vec<ImageTrackInfo>,
    /// Bytes required per image frame before it decodes
    pub image_bytes_per_frame: usize,
    /// Artificial latency per send, to pin down races in cancellation tests
    pub send_delay_ms: u64,
}

impl MockScript {
    fn delay(&self) {
        if self.send_delay_ms > 0 {
            std::thread::sleep(std::time::Duration::from_millis(self.send_delay_ms));
        }
    }
}

pub struct MockProvider {
    pub script: MockScript,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            script: MockScript::default(),
        })
    }

    pub fn with_script(script: MockScript) -> Arc<Self> {
        Arc::new(Self { script })
    }
}

impl BackendProvider for MockProvider {
    fn supports(&self, descriptor: &CodecDescriptor) -> bool {
        !self.script.unsupported.contains(&descriptor.kind)
    }

    fn open_video_decoder(
        &self,
        descriptor: &CodecDescriptor,
        _config: &VideoDecoderConfig,
    ) -> CodecResult<BoxVideoDecoderBackend> {
        if self.script.fail_open || !self.supports(descriptor) {
            return Err(CodecError::DecoderNotFound(descriptor.kind));
        }
        Ok(Box::new(MockVideoDecoder {
            script: self.script.clone(),
            buffered: Vec::new(),
            draining: false,
            sends: 0,
        }))
    }

    fn open_video_encoder(
        &self,
        descriptor: &CodecDescriptor,
        _config: &VideoEncoderConfig,
    ) -> CodecResult<BoxVideoEncoderBackend> {
        if self.script.fail_open || !self.supports(descriptor) {
            return Err(CodecError::EncoderNotFound(descriptor.kind));
        }
        Ok(Box::new(MockVideoEncoder {
            script: self.script.clone(),
            buffered: Vec::new(),
            draining: false,
            sends: 0,
            frames_encoded: 0,
        }))
    }

    fn open_audio_decoder(
        &self,
        descriptor: &CodecDescriptor,
        config: &AudioDecoderConfig,
    ) -> CodecResult<BoxAudioDecoderBackend> {
        if self.script.fail_open || !self.supports(descriptor) {
            return Err(CodecError::DecoderNotFound(descriptor.kind));
        }
        Ok(Box::new(MockAudioDecoder {
            script: self.script.clone(),
            buffered: Vec::new(),
            draining: false,
            sends: 0,
            sample_rate: config.sample_rate,
            channels: config.number_of_channels,
        }))
    }

    fn open_audio_encoder(
        &self,
        descriptor: &CodecDescriptor,
        _config: &AudioEncoderConfig,
    ) -> CodecResult<BoxAudioEncoderBackend> {
        if self.script.fail_open || !self.supports(descriptor) {
            return Err(CodecError::EncoderNotFound(descriptor.kind));
        }
        Ok(Box::new(MockAudioEncoder {
            script: self.script.clone(),
            buffered: Vec::new(),
            draining: false,
            sends: 0,
        }))
    }

    fn open_image_decoder(&self, mime_type: &str) -> CodecResult<BoxImageBackend> {
        if self.script.fail_open {
            return Err(CodecError::CodecNotFound(mime_type.to_string()));
        }
        Ok(Box::new(MockImageDecoder {
            script: self.script.clone(),
            data: Vec::new(),
            ended: false,
            probed: false,
            selected: 0,
        }))
    }
}

// ============================================================================
// Video decoder
// ============================================================================

/// Scripted decoder: one frame per packet, same timestamp
struct MockVideoDecoder {
    script: MockScript,
    buffered: Vec<FrameBuffer>,
    draining: bool,
    sends: usize,
}

impl MockVideoDecoder {
    fn decode_packet(&self, packet: &PacketBuffer) -> FrameBuffer {
        let mut frame = FrameBuffer::alloc(VideoPixelFormat::I420, 16, 16);
        frame.set_pts(packet.pts());
        frame.set_duration(packet.duration());
        frame
    }
}

impl CodecBackend for MockVideoDecoder {
    type Input = Arc<PacketBuffer>;
    type Output = FrameBuffer;

    fn send_input(&mut self, input: Self::Input) -> CodecResult<SendStatus<Self::Input>> {
        self.script.delay();
        self.sends += 1;
        if self.script.would_block_at == Some(self.sends) {
            return Ok(SendStatus::WouldBlock(input));
        }
        if self.script.fail_send_at == Some(self.sends) {
            return Err(CodecError::InvalidData("corrupt packet".into()));
        }
        let frame = self.decode_packet(&input);
        self.buffered.push(frame);
        Ok(SendStatus::Accepted)
    }

    fn receive_output(&mut self) -> CodecResult<ReceiveStatus<FrameBuffer>> {
        if self.draining {
            if self.buffered.is_empty() {
                return Ok(ReceiveStatus::Eof);
            }
            return Ok(ReceiveStatus::Output(self.buffered.remove(0)));
        }
        if self.buffered.len() > self.script.hold_outputs {
            return Ok(ReceiveStatus::Output(self.buffered.remove(0)));
        }
        Ok(ReceiveStatus::Again)
    }

    fn drain(&mut self) -> CodecResult<()> {
        self.draining = true;
        Ok(())
    }

    fn flush_buffers(&mut self) {
        self.buffered.clear();
        self.draining = false;
    }
}

// ============================================================================
// Video encoder
// ============================================================================

/// Scripted encoder: one packet per frame; first packet (and forced ones) key
struct MockVideoEncoder {
    script: MockScript,
    buffered: Vec<PacketBuffer>,
    draining: bool,
    sends: usize,
    frames_encoded: u64,
}

impl CodecBackend for MockVideoEncoder {
    type Input = VideoEncodeRequest;
    type Output = PacketBuffer;

    fn send_input(&mut self, input: Self::Input) -> CodecResult<SendStatus<Self::Input>> {
        self.script.delay();
        self.sends += 1;
        if self.script.would_block_at == Some(self.sends) {
            return Ok(SendStatus::WouldBlock(input));
        }
        if self.script.fail_send_at == Some(self.sends) {
            return Err(CodecError::InvalidData("encode failed".into()));
        }
        let mut packet = PacketBuffer::from_vec(vec![0xEC; 16]);
        packet.set_pts(input.frame.pts());
        packet.set_duration(input.frame.duration());
        packet.set_key(input.force_key || self.frames_encoded == 0);
        self.frames_encoded += 1;
        self.buffered.push(packet);
        Ok(SendStatus::Accepted)
    }

    fn receive_output(&mut self) -> CodecResult<ReceiveStatus<PacketBuffer>> {
        if self.draining {
            if self.buffered.is_empty() {
                return Ok(ReceiveStatus::Eof);
            }
            return Ok(ReceiveStatus::Output(self.buffered.remove(0)));
        }
        if self.buffered.len() > self.script.hold_outputs {
            return Ok(ReceiveStatus::Output(self.buffered.remove(0)));
        }
        Ok(ReceiveStatus::Again)
    }

    fn drain(&mut self) -> CodecResult<()> {
        self.draining = true;
        Ok(())
    }

    fn flush_buffers(&mut self) {
        self.buffered.clear();
        self.draining = false;
        self.frames_encoded = 0;
    }

    fn description(&self) -> Option<Vec<u8>> {
        Some(vec![0x01, 0x42, 0x00, 0x1E])
    }
}

// ============================================================================
// Audio decoder / encoder
// ============================================================================

struct MockAudioDecoder {
    script: MockScript,
    buffered: Vec<SampleBuffer>,
    draining: bool,
    sends: usize,
    sample_rate: u32,
    channels: u32,
}

impl CodecBackend for MockAudioDecoder {
    type Input = Arc<PacketBuffer>;
    type Output = SampleBuffer;

    fn send_input(&mut self, input: Self::Input) -> CodecResult<SendStatus<Self::Input>> {
        self.script.delay();
        self.sends += 1;
        if self.script.would_block_at == Some(self.sends) {
            return Ok(SendStatus::WouldBlock(input));
        }
        if self.script.fail_send_at == Some(self.sends) {
            return Err(CodecError::InvalidData("corrupt packet".into()));
        }
        let mut samples =
            SampleBuffer::alloc(AudioSampleFormat::F32Planar, self.sample_rate, self.channels, 480);
        samples.set_pts(input.pts());
        self.buffered.push(samples);
        Ok(SendStatus::Accepted)
    }

    fn receive_output(&mut self) -> CodecResult<ReceiveStatus<SampleBuffer>> {
        if self.draining {
            if self.buffered.is_empty() {
                return Ok(ReceiveStatus::Eof);
            }
            return Ok(ReceiveStatus::Output(self.buffered.remove(0)));
        }
        if self.buffered.len() > self.script.hold_outputs {
            return Ok(ReceiveStatus::Output(self.buffered.remove(0)));
        }
        Ok(ReceiveStatus::Again)
    }

    fn drain(&mut self) -> CodecResult<()> {
        self.draining = true;
        Ok(())
    }

    fn flush_buffers(&mut self) {
        self.buffered.clear();
        self.draining = false;
    }
}

struct MockAudioEncoder {
    script: MockScript,
    buffered: Vec<PacketBuffer>,
    draining: bool,
    sends: usize,
}

impl CodecBackend for MockAudioEncoder {
    type Input = AudioEncodeRequest;
    type Output = PacketBuffer;

    fn send_input(&mut self, input: Self::Input) -> CodecResult<SendStatus<Self::Input>> {
        self.script.delay();
        self.sends += 1;
        if self.script.would_block_at == Some(self.sends) {
            return Ok(SendStatus::WouldBlock(input));
        }
        if self.script.fail_send_at == Some(self.sends) {
            return Err(CodecError::InvalidData("encode failed".into()));
        }
        let mut packet = PacketBuffer::from_vec(vec![0xAE; 8]);
        packet.set_pts(input.samples.pts());
        packet.set_duration(Some(input.samples.duration_us()));
        packet.set_key(true);
        self.buffered.push(packet);
        Ok(SendStatus::Accepted)
    }

    fn receive_output(&mut self) -> CodecResult<ReceiveStatus<PacketBuffer>> {
        if self.draining {
            if self.buffered.is_empty() {
                return Ok(ReceiveStatus::Eof);
            }
            return Ok(ReceiveStatus::Output(self.buffered.remove(0)));
        }
        if self.buffered.len() > self.script.hold_outputs {
            return Ok(ReceiveStatus::Output(self.buffered.remove(0)));
        }
        Ok(ReceiveStatus::Again)
    }

    fn drain(&mut self) -> CodecResult<()> {
        self.draining = true;
        Ok(())
    }

    fn flush_buffers(&mut self) {
        self.buffered.clear();
        self.draining = false;
    }

    fn description(&self) -> Option<Vec<u8>> {
        Some(vec![0x11, 0x90])
    }
}

// ============================================================================
// Image decoder
// ============================================================================

/// Header bytes the mock demuxer needs before tracks are established
const MOCK_IMAGE_HEADER: usize = 4;

struct MockImageDecoder {
    script: MockScript,
    data: Vec<u8>,
    ended: bool,
    probed: bool,
    selected: u32,
}

impl MockImageDecoder {
    fn selected_frame_count(&self) -> u32 {
        self
            .script
            .image_tracks
            .get(self.selected as usize)
            .map_or(0, |t| t.frame_count)
    }
}

impl ImageBackend for MockImageDecoder {
    fn append_data(&mut self, data: Vec<u8>) -> CodecResult<()> {
        self.data.extend_from_slice(&data);
        Ok(())
    }

    fn end_of_data(&mut self) {
        self.ended = true;
    }

    fn probe_tracks(&mut self) -> CodecResult<Option<Vec<ImageTrackInfo>>> {
        if self.data.len() < MOCK_IMAGE_HEADER {
            if self.ended {
                return Err(CodecError::InvalidData("truncated image header".into()));
            }
            return Ok(None);
        }
        self.probed = true;
        Ok(Some(self.script.image_tracks.clone()))
    }

    fn select_track(&mut self, index: u32) -> CodecResult<()> {
        if index as usize >= self.script.image_tracks.len() {
            return Err(CodecError::InvalidConfig("track index out of range".into()));
        }
        self.selected = index;
        Ok(())
    }

    fn frame_count_stable(&self) -> bool {
        self.ended
    }

    fn decode_frame(
        &mut self,
        index: u32,
        _complete_frames_only: bool,
    ) -> CodecResult<ReceiveStatus<DecodedImage>> {
        if !self.probed {
            return Ok(ReceiveStatus::Again);
        }
        if index >= self.selected_frame_count() {
            return Err(CodecError::InvalidData("frame index out of range".into()));
        }
        let needed = MOCK_IMAGE_HEADER + (index as usize + 1) * self.script.image_bytes_per_frame;
        if self.data.len() < needed {
            if self.ended {
                return Err(CodecError::InvalidData("truncated image data".into()));
            }
            return Ok(ReceiveStatus::Again);
        }
        let mut frame = FrameBuffer::alloc(VideoPixelFormat::RGBA, 8, 8);
        frame.set_pts(index as i64 * 40_000);
        frame.set_duration(Some(40_000));
        Ok(ReceiveStatus::Output(DecodedImage {
            frame,
            complete: true,
        }))
    }
}
