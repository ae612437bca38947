//! VideoEncoder - WebCodecs API implementation
//!
//! Encodes VideoFrame objects into EncodedVideoChunk objects on a dedicated
//! worker thread.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/VideoEncoder

use std::sync::{Arc, Mutex, Weak};

use crate::codec::{
    BackendProvider, BoxVideoEncoderBackend, ReceiveStatus, SendStatus, VideoEncodeRequest,
};
use crate::engine::{
    CodecEvent, CodecState, CodecWorker, ControlMessage, ControlQueue, DeliveryChannel,
    EngineShared, FlushPromise, PromiseHandle, WorkerHandler,
};
use crate::runtime::CodecRuntime;
use crate::webcodecs::codec_string::{self, CodecDescriptor};
use crate::webcodecs::error::{
    data_error, encoding_error, invalid_state_error, not_supported_error, type_error,
    WebCodecsError, WebCodecsResult,
};
use crate::webcodecs::{
    EncodedVideoChunk, VideoColorSpace, VideoEncoderConfig, VideoFrame,
};

/// Result of isConfigSupported
#[derive(Debug, Clone)]
pub struct VideoEncoderSupport {
    pub supported: bool,
    pub config: VideoEncoderConfig,
}

/// Decoder configuration emitted alongside the first chunk
///
/// Enough for a receiver to configure a matching VideoDecoder.
#[derive(Debug, Clone)]
pub struct VideoDecoderConfigOutput {
    pub codec: String,
    pub coded_width: u32,
    pub coded_height: u32,
    pub color_space: Option<VideoColorSpace>,
    /// Codec-generated setup payload (e.g. avcC)
    pub description: Option<Vec<u8>>,
}

/// Metadata delivered with each encoded chunk
#[derive(Debug, Clone, Default)]
pub struct EncodedVideoChunkMetadata {
    /// Present on the first chunk after (re)configure
    pub decoder_config: Option<VideoDecoderConfigOutput>,
}

/// Per-encode options
#[derive(Debug, Clone, Copy, Default)]
pub struct VideoEncoderEncodeOptions {
    /// Force this frame to encode as a key frame
    pub key_frame: bool,
}

/// Constructor callbacks
pub struct VideoEncoderInit {
    /// Invoked once per encoded chunk, in production order
    pub output: Box<dyn Fn(EncodedVideoChunk, EncodedVideoChunkMetadata) + Send + Sync>,
    /// Invoked once on fatal error; the encoder is closed afterwards
    pub error: Box<dyn Fn(WebCodecsError) + Send + Sync>,
}

struct ConfigureRequest {
    descriptor: CodecDescriptor,
    config: VideoEncoderConfig,
}

type EncoderOutput = (EncodedVideoChunk, EncodedVideoChunkMetadata);
type EncoderQueue = ControlQueue<ConfigureRequest, VideoEncodeRequest>;
type EncoderDelivery = DeliveryChannel<CodecEvent<EncoderOutput>>;

struct EncoderCore {
    shared: Arc<EngineShared>,
    queue: Arc<EncoderQueue>,
    init: VideoEncoderInit,
    ondequeue: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
    /// Orientation locked in by the first admitted frame after configure
    active_orientation: Mutex<Option<(u32, bool)>>,
}

impl EncoderCore {
    fn close_with_error(&self, err: WebCodecsError) {
        if !self.shared.state.close() {
            return;
        }
        self.queue.drain_pending();
        self.shared.clear_queue_size();
        self.queue.shutdown();
        self.shared.abort_pending_flushes("encoder closed with error");
        (self.init.error)(err);
    }

    fn handle_event(&self, event: CodecEvent<EncoderOutput>) {
        match event {
            CodecEvent::Output((chunk, metadata)) => {
                if self.shared.state.load() == CodecState::Configured {
                    (self.init.output)(chunk, metadata);
                }
            }
            CodecEvent::Error(err) => self.close_with_error(err),
            CodecEvent::FlushComplete { flush_id, result } => {
                self.shared.settle_flush(flush_id, result);
            }
            CodecEvent::Dequeue { .. } => {
                if self.shared.state.load() != CodecState::Closed {
                    if let Some(callback) = &*self.ondequeue.lock().unwrap() {
                        callback();
                    }
                }
                self.shared.clear_dequeue_event();
            }
        }
    }
}

/// VideoEncoder - WebCodecs-compliant video encoder
pub struct VideoEncoder {
    core: Arc<EncoderCore>,
    delivery: Arc<EncoderDelivery>,
    worker: Mutex<Option<CodecWorker>>,
}

impl VideoEncoder {
    /// Create a new VideoEncoder with output and error callbacks
    pub fn new(runtime: &CodecRuntime, init: VideoEncoderInit) -> WebCodecsResult<Self> {
        let core = Arc::new(EncoderCore {
            shared: EngineShared::new(),
            queue: Arc::new(EncoderQueue::new()),
            init,
            ondequeue: Mutex::new(None),
            active_orientation: Mutex::new(None),
        });

        let weak: Weak<EncoderCore> = Arc::downgrade(&core);
        let delivery = DeliveryChannel::new(Arc::clone(runtime.dispatcher()), move |event| {
            if let Some(core) = weak.upgrade() {
                core.handle_event(event);
            }
        });

        let handler = EncoderWorker {
            provider: Arc::clone(runtime.backends()),
            shared: Arc::clone(&core.shared),
            delivery: Arc::clone(&delivery),
            backend: None,
            config: None,
            needs_decoder_config: true,
        };
        let worker = CodecWorker::spawn("video-encoder", Arc::clone(&core.queue), handler)
            .map_err(|e| encoding_error(&format!("failed to start encoder worker: {e}")))?;

        Ok(Self {
            core,
            delivery,
            worker: Mutex::new(Some(worker)),
        })
    }

    // ==========================================================================
    // Attributes
    // ==========================================================================

    pub fn state(&self) -> CodecState {
        self.core.shared.state.load()
    }

    /// Number of admitted encodes not yet consumed by the worker
    pub fn encode_queue_size(&self) -> u32 {
        self.core.shared.queue_size()
    }

    /// Install or clear the dequeue-event handler
    pub fn set_ondequeue(&self, callback: Option<Box<dyn Fn() + Send + Sync>>) {
        *self.core.ondequeue.lock().unwrap() = callback;
    }

    // ==========================================================================
    // Methods
    // ==========================================================================

    /// Configure the encoder
    pub fn configure(&self, config: VideoEncoderConfig) -> WebCodecsResult<()> {
        if self.state() == CodecState::Closed {
            return Err(invalid_state_error("encoder is closed"));
        }
        config.validate()?;
        let descriptor = codec_string::parse_codec_string(&config.codec)
            .ok_or_else(|| type_error("unrecognized codec string"))?;
        if !descriptor.kind.is_video() {
            return Err(type_error("not a video codec"));
        }

        if !self.core.shared.state.set_configured() {
            return Err(invalid_state_error("encoder is closed"));
        }
        *self.core.active_orientation.lock().unwrap() = None;
        self
            .core
            .shared
            .codec_saturated
            .store(false, std::sync::atomic::Ordering::Release);

        let enqueued = self.core.queue.enqueue(ControlMessage::Configure(ConfigureRequest {
            descriptor,
            config,
        }));
        if !enqueued {
            return Err(invalid_state_error("encoder is closed"));
        }
        Ok(())
    }

    /// Encode a video frame
    pub fn encode(
        &self,
        frame: &VideoFrame,
        options: VideoEncoderEncodeOptions,
    ) -> WebCodecsResult<()> {
        if self.state() != CodecState::Configured {
            return Err(invalid_state_error("encoder is not configured"));
        }
        // Takes an inner refcount; rejects a detached frame before admission
        let buffer = frame
            .buffer_ref()
            .map_err(|_| type_error("frame is closed"))?;

        let orientation = (frame.rotation(), frame.flip());
        {
            let mut active = self.core.active_orientation.lock().unwrap();
            match *active {
                Some(locked) if locked != orientation => {
                    return Err(data_error(
                        "frame orientation does not match the first encoded frame",
                    ));
                }
                Some(_) => {}
                None => *active = Some(orientation),
            }
        }

        self.core.shared.increment_queue_size();
        let work = VideoEncodeRequest {
            frame: buffer,
            force_key: options.key_frame,
        };
        if !self.core.queue.enqueue(ControlMessage::Work(work)) {
            self.core.shared.decrement_queue_size();
            return Err(invalid_state_error("encoder is closed"));
        }
        Ok(())
    }

    /// Complete all queued work and emit every pending chunk
    pub fn flush(&self) -> FlushPromise {
        if self.state() != CodecState::Configured {
            return PromiseHandle::settled(Err(invalid_state_error("encoder is not configured")));
        }
        let (flush_id, promise) = self.core.shared.register_flush();
        if !self.core.queue.enqueue(ControlMessage::Flush(flush_id)) {
            self
                .core
                .shared
                .settle_flush(flush_id, Err(invalid_state_error("encoder is closed")));
        }
        promise
    }

    /// Discard all queued work and pending callbacks
    pub fn reset(&self) -> WebCodecsResult<()> {
        if self.state() == CodecState::Closed {
            return Err(invalid_state_error("encoder is closed"));
        }
        self.core.shared.state.set_unconfigured();
        drop(self.core.queue.drain_pending());
        *self.core.active_orientation.lock().unwrap() = None;
        self.core.queue.enqueue(ControlMessage::Reset);
        self.core.shared.abort_pending_flushes("encoder reset");
        self.core.shared.clear_queue_size();
        Ok(())
    }

    /// Close the encoder permanently; idempotent
    pub fn close(&self) {
        if self.core.shared.state.close() {
            self.core.queue.drain_pending();
            self.core.shared.clear_queue_size();
            self.core.queue.enqueue(ControlMessage::Close);
            self.core.shared.abort_pending_flushes("encoder closed");
        }
        self.delivery.release();
        if let Some(mut worker) = self.worker.lock().unwrap().take() {
            worker.stop();
        }
    }

    /// Check if a configuration is supported
    pub fn is_config_supported(
        runtime: &CodecRuntime,
        config: &VideoEncoderConfig,
    ) -> PromiseHandle<VideoEncoderSupport> {
        if let Err(err) = config.validate() {
            return PromiseHandle::settled(Err(err));
        }
        let supported = match codec_string::parse_codec_string(&config.codec) {
            Some(descriptor) => {
                descriptor.kind.is_video()
                    && codec_string::is_supported(&descriptor)
                    && runtime.backends().supports(&descriptor)
            }
            None => false,
        };
        PromiseHandle::settled(Ok(VideoEncoderSupport {
            supported,
            config: config.clone(),
        }))
    }
}

impl Drop for VideoEncoder {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Worker
// ============================================================================

struct EncoderWorker {
    provider: Arc<dyn BackendProvider>,
    shared: Arc<EngineShared>,
    delivery: Arc<EncoderDelivery>,
    backend: Option<BoxVideoEncoderBackend>,
    config: Option<VideoEncoderConfig>,
    needs_decoder_config: bool,
}

impl EncoderWorker {
    fn build_metadata(&mut self) -> EncodedVideoChunkMetadata {
        if !self.needs_decoder_config {
            return EncodedVideoChunkMetadata::default();
        }
        self.needs_decoder_config = false;
        let decoder_config = self.config.as_ref().map(|config| VideoDecoderConfigOutput {
            codec: config.codec.clone(),
            coded_width: config.width,
            coded_height: config.height,
            color_space: None,
            description: self.backend.as_ref().and_then(|b| b.description()),
        });
        EncodedVideoChunkMetadata { decoder_config }
    }

    fn pump_outputs(&mut self) -> Result<usize, WebCodecsError> {
        let mut emitted = 0;
        loop {
            let status = match self.backend.as_mut() {
                Some(backend) => backend.receive_output(),
                None => return Ok(emitted),
            };
            match status {
                Ok(ReceiveStatus::Output(packet)) => {
                    let metadata = self.build_metadata();
                    let chunk = EncodedVideoChunk::from_packet(Arc::new(packet));
                    if !self.delivery.post(CodecEvent::Output((chunk, metadata))) {
                        return Ok(emitted);
                    }
                    emitted += 1;
                }
                Ok(ReceiveStatus::Again) | Ok(ReceiveStatus::Eof) => return Ok(emitted),
                Err(e) => return Err(encoding_error(&format!("encode failed: {e}"))),
            }
        }
    }
}

impl WorkerHandler for EncoderWorker {
    type Config = ConfigureRequest;
    type Work = VideoEncodeRequest;

    fn on_configure(&mut self, request: ConfigureRequest) {
        self.backend = None;
        self.needs_decoder_config = true;
        match self
            .provider
            .open_video_encoder(&request.descriptor, &request.config)
        {
            Ok(backend) => {
                self.backend = Some(backend);
                self.config = Some(request.config);
            }
            Err(e) => {
                self
                    .delivery
                    .post(CodecEvent::Error(not_supported_error(&format!(
                        "configuration rejected: {e}"
                    ))));
            }
        }
    }

    fn on_work(&mut self, request: VideoEncodeRequest) {
        let new_size = self.shared.decrement_queue_size();
        if self.shared.schedule_dequeue_event() {
            self.delivery.post(CodecEvent::Dequeue { new_size });
        }
        if self.backend.is_none() {
            return;
        }

        let mut pending = request;
        let mut retried = false;
        loop {
            let status = match self.backend.as_mut() {
                Some(backend) => backend.send_input(pending),
                None => return,
            };
            match status {
                Ok(SendStatus::Accepted) => break,
                Ok(SendStatus::WouldBlock(returned)) => {
                    self
                        .shared
                        .codec_saturated
                        .store(true, std::sync::atomic::Ordering::Release);
                    let drained = match self.pump_outputs() {
                        Ok(n) => n,
                        Err(err) => {
                            self.delivery.post(CodecEvent::Error(err));
                            return;
                        }
                    };
                    self
                        .shared
                        .codec_saturated
                        .store(false, std::sync::atomic::Ordering::Release);
                    if retried && drained == 0 {
                        self.delivery.post(CodecEvent::Error(encoding_error(
                            "codec rejected input while producing no output",
                        )));
                        return;
                    }
                    pending = returned;
                    retried = true;
                }
                Err(e) => {
                    self
                        .delivery
                        .post(CodecEvent::Error(encoding_error(&format!(
                            "encode failed: {e}"
                        ))));
                    return;
                }
            }
        }

        if let Err(err) = self.pump_outputs() {
            self.delivery.post(CodecEvent::Error(err));
        }
    }

    fn on_flush(&mut self, flush_id: u32) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        if let Err(e) = backend.drain() {
            self.delivery.post(CodecEvent::FlushComplete {
                flush_id,
                result: Err(encoding_error(&format!("flush failed: {e}"))),
            });
            return;
        }

        let result = match self.pump_outputs() {
            Ok(_) => {
                if let Some(backend) = self.backend.as_mut() {
                    backend.flush_buffers();
                }
                Ok(())
            }
            Err(err) => Err(err),
        };
        self.delivery.post(CodecEvent::FlushComplete { flush_id, result });
    }

    fn on_reset(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            backend.flush_buffers();
        }
        self.needs_decoder_config = true;
    }

    fn on_close(&mut self) {
        self.backend = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::mock::{MockProvider, MockScript};
    use crate::engine::InlineDispatcher;
    use crate::webcodecs::error::ErrorKind;
    use crate::webcodecs::{
        EncodedVideoChunkType, VideoFrameBufferInit, VideoPixelFormat,
    };
    use futures::executor::block_on;

    fn frame(timestamp: i64, rotation: u32, flip: bool) -> VideoFrame {
        let data = vec![0u8; 16 * 16 * 4];
        let mut init = VideoFrameBufferInit::new(VideoPixelFormat::RGBA, 16, 16, timestamp);
        init.rotation = rotation;
        init.flip = flip;
        VideoFrame::from_buffer_init(&data, init).unwrap()
    }

    type RecordedChunk = (i64, EncodedVideoChunkType, Option<VideoDecoderConfigOutput>);

    struct Harness {
        encoder: VideoEncoder,
        outputs: Arc<Mutex<Vec<RecordedChunk>>>,
        errors: Arc<Mutex<Vec<WebCodecsError>>>,
    }

    fn harness(script: MockScript) -> Harness {
        let runtime =
            CodecRuntime::new(MockProvider::with_script(script), Arc::new(InlineDispatcher));
        let outputs = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let out = Arc::clone(&outputs);
        let errs = Arc::clone(&errors);
        let encoder = VideoEncoder::new(
            &runtime,
            VideoEncoderInit {
                output: Box::new(move |chunk, metadata| {
                    out
                        .lock()
                        .unwrap()
                        .push((chunk.timestamp(), chunk.chunk_type(), metadata.decoder_config));
                }),
                error: Box::new(move |e| errs.lock().unwrap().push(e)),
            },
        )
        .unwrap();
        Harness {
            encoder,
            outputs,
            errors,
        }
    }

    #[test]
    fn test_encode_two_frames_flush() {
        let h = harness(MockScript::default());
        h.encoder
            .configure(VideoEncoderConfig::new("vp8", 16, 16))
            .unwrap();
        h.encoder
            .encode(&frame(0, 0, false), VideoEncoderEncodeOptions::default())
            .unwrap();
        h.encoder
            .encode(&frame(33_333, 0, false), VideoEncoderEncodeOptions::default())
            .unwrap();
        block_on(h.encoder.flush()).unwrap();

        let outputs = h.outputs.lock().unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].0, 0);
        assert_eq!(outputs[0].1, EncodedVideoChunkType::Key);
        assert_eq!(outputs[1].0, 33_333);
        assert_eq!(outputs[1].1, EncodedVideoChunkType::Delta);

        // Decoder config rides only on the first chunk
        let config = outputs[0].2.as_ref().unwrap();
        assert_eq!(config.codec, "vp8");
        assert_eq!(config.coded_width, 16);
        assert!(config.description.is_some());
        assert!(outputs[1].2.is_none());
    }

    #[test]
    fn test_orientation_locked_by_first_frame() {
        let h = harness(MockScript::default());
        h.encoder
            .configure(VideoEncoderConfig::new("vp8", 16, 16))
            .unwrap();

        h.encoder
            .encode(&frame(0, 90, false), VideoEncoderEncodeOptions::default())
            .unwrap();
        let err = h
            .encoder
            .encode(&frame(33_333, 0, false), VideoEncoderEncodeOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataError);

        // Matching orientation still admits; the first frame still encodes
        h.encoder
            .encode(&frame(66_667, 90, false), VideoEncoderEncodeOptions::default())
            .unwrap();
        block_on(h.encoder.flush()).unwrap();
        let outputs = h.outputs.lock().unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].0, 0);
    }

    #[test]
    fn test_orientation_unlocked_by_reconfigure() {
        let h = harness(MockScript::default());
        h.encoder
            .configure(VideoEncoderConfig::new("vp8", 16, 16))
            .unwrap();
        h.encoder
            .encode(&frame(0, 90, true), VideoEncoderEncodeOptions::default())
            .unwrap();

        h.encoder
            .configure(VideoEncoderConfig::new("vp8", 16, 16))
            .unwrap();
        h.encoder
            .encode(&frame(0, 180, false), VideoEncoderEncodeOptions::default())
            .unwrap();
    }

    #[test]
    fn test_detached_frame_rejected() {
        let h = harness(MockScript::default());
        h.encoder
            .configure(VideoEncoderConfig::new("vp8", 16, 16))
            .unwrap();
        let f = frame(0, 0, false);
        f.close();
        let err = h
            .encoder
            .encode(&f, VideoEncoderEncodeOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeError);
        assert_eq!(h.encoder.encode_queue_size(), 0);
    }

    #[test]
    fn test_forced_key_frame() {
        let h = harness(MockScript::default());
        h.encoder
            .configure(VideoEncoderConfig::new("vp8", 16, 16))
            .unwrap();
        h.encoder
            .encode(&frame(0, 0, false), VideoEncoderEncodeOptions::default())
            .unwrap();
        h.encoder
            .encode(&frame(33_333, 0, false), VideoEncoderEncodeOptions { key_frame: true })
            .unwrap();
        block_on(h.encoder.flush()).unwrap();

        let outputs = h.outputs.lock().unwrap();
        assert_eq!(outputs[1].1, EncodedVideoChunkType::Key);
    }

    #[test]
    fn test_encode_before_configure_fails() {
        let h = harness(MockScript::default());
        let err = h
            .encoder
            .encode(&frame(0, 0, false), VideoEncoderEncodeOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStateError);
        assert!(h.errors.lock().unwrap().is_empty());
    }

    #[test]
    fn test_metadata_returns_after_reconfigure() {
        let h = harness(MockScript::default());
        h.encoder
            .configure(VideoEncoderConfig::new("vp8", 16, 16))
            .unwrap();
        h.encoder
            .encode(&frame(0, 0, false), VideoEncoderEncodeOptions::default())
            .unwrap();
        block_on(h.encoder.flush()).unwrap();

        h.encoder
            .configure(VideoEncoderConfig::new("vp8", 16, 16))
            .unwrap();
        h.encoder
            .encode(&frame(100, 0, false), VideoEncoderEncodeOptions::default())
            .unwrap();
        block_on(h.encoder.flush()).unwrap();

        let outputs = h.outputs.lock().unwrap();
        assert_eq!(outputs.len(), 2);
        assert!(outputs[0].2.is_some());
        assert!(outputs[1].2.is_some());
    }

    #[test]
    fn test_is_config_supported() {
        let runtime = CodecRuntime::new(MockProvider::new(), Arc::new(InlineDispatcher));
        let support = block_on(VideoEncoder::is_config_supported(
            &runtime,
            &VideoEncoderConfig::new("av01.0.04M.08", 640, 480),
        ))
        .unwrap();
        assert!(support.supported);

        let err = block_on(VideoEncoder::is_config_supported(
            &runtime,
            &VideoEncoderConfig::new("vp8", 0, 480),
        ))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeError);
    }
}
