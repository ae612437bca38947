//! AudioEncoder - WebCodecs API implementation
//!
//! Encodes AudioData objects into EncodedAudioChunk objects on a dedicated
//! worker thread.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/AudioEncoder

use std::sync::{Arc, Mutex, Weak};

use crate::codec::{
    AudioEncodeRequest, BackendProvider, BoxAudioEncoderBackend, ReceiveStatus, SendStatus,
};
use crate::engine::{
    CodecEvent, CodecState, CodecWorker, ControlMessage, ControlQueue, DeliveryChannel,
    EngineShared, FlushPromise, PromiseHandle, WorkerHandler,
};
use crate::runtime::CodecRuntime;
use crate::webcodecs::codec_string::{self, CodecDescriptor};
use crate::webcodecs::error::{
    encoding_error, invalid_state_error, not_supported_error, type_error, WebCodecsError,
    WebCodecsResult,
};
use crate::webcodecs::{AudioData, AudioEncoderConfig, EncodedAudioChunk};

/// Result of isConfigSupported
#[derive(Debug, Clone)]
pub struct AudioEncoderSupport {
    pub supported: bool,
    pub config: AudioEncoderConfig,
}

/// Decoder configuration emitted alongside the first chunk
#[derive(Debug, Clone)]
pub struct AudioDecoderConfigOutput {
    pub codec: String,
    pub sample_rate: u32,
    pub number_of_channels: u32,
    /// Codec-generated setup payload (e.g. AudioSpecificConfig)
    pub description: Option<Vec<u8>>,
}

/// Metadata delivered with each encoded chunk
#[derive(Debug, Clone, Default)]
pub struct EncodedAudioChunkMetadata {
    /// Present on the first chunk after (re)configure
    pub decoder_config: Option<AudioDecoderConfigOutput>,
}

/// Constructor callbacks
pub struct AudioEncoderInit {
    /// Invoked once per encoded chunk, in production order
    pub output: Box<dyn Fn(EncodedAudioChunk, EncodedAudioChunkMetadata) + Send + Sync>,
    /// Invoked once on fatal error; the encoder is closed afterwards
    pub error: Box<dyn Fn(WebCodecsError) + Send + Sync>,
}

struct ConfigureRequest {
    descriptor: CodecDescriptor,
    config: AudioEncoderConfig,
}

type AudioEncoderOutput = (EncodedAudioChunk, EncodedAudioChunkMetadata);
type AudioEncoderQueue = ControlQueue<ConfigureRequest, AudioEncodeRequest>;
type AudioEncoderDelivery = DeliveryChannel<CodecEvent<AudioEncoderOutput>>;

struct AudioEncoderCore {
    shared: Arc<EngineShared>,
    queue: Arc<AudioEncoderQueue>,
    init: AudioEncoderInit,
    ondequeue: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl AudioEncoderCore {
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

    fn handle_event(&self, event: CodecEvent<AudioEncoderOutput>) {
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

/// AudioEncoder - WebCodecs-compliant audio encoder
pub struct AudioEncoder {
    core: Arc<AudioEncoderCore>,
    delivery: Arc<AudioEncoderDelivery>,
    worker: Mutex<Option<CodecWorker>>,
}

impl AudioEncoder {
    /// Create a new AudioEncoder with output and error callbacks
    pub fn new(runtime: &CodecRuntime, init: AudioEncoderInit) -> WebCodecsResult<Self> {
        let core = Arc::new(AudioEncoderCore {
            shared: EngineShared::new(),
            queue: Arc::new(AudioEncoderQueue::new()),
            init,
            ondequeue: Mutex::new(None),
        });

        let weak: Weak<AudioEncoderCore> = Arc::downgrade(&core);
        let delivery = DeliveryChannel::new(Arc::clone(runtime.dispatcher()), move |event| {
            if let Some(core) = weak.upgrade() {
                core.handle_event(event);
            }
        });

        let handler = AudioEncoderWorker {
            provider: Arc::clone(runtime.backends()),
            shared: Arc::clone(&core.shared),
            delivery: Arc::clone(&delivery),
            backend: None,
            config: None,
            needs_decoder_config: true,
        };
        let worker = CodecWorker::spawn("audio-encoder", Arc::clone(&core.queue), handler)
            .map_err(|e| encoding_error(&format!("failed to start encoder worker: {e}")))?;

        Ok(Self {
            core,
            delivery,
            worker: Mutex::new(Some(worker)),
        })
    }

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

    /// Configure the encoder
    pub fn configure(&self, config: AudioEncoderConfig) -> WebCodecsResult<()> {
        if self.state() == CodecState::Closed {
            return Err(invalid_state_error("encoder is closed"));
        }
        config.validate()?;
        let descriptor = codec_string::parse_codec_string(&config.codec)
            .ok_or_else(|| type_error("unrecognized codec string"))?;
        if !descriptor.kind.is_audio() {
            return Err(type_error("not an audio codec"));
        }

        if !self.core.shared.state.set_configured() {
            return Err(invalid_state_error("encoder is closed"));
        }

        let enqueued = self.core.queue.enqueue(ControlMessage::Configure(ConfigureRequest {
            descriptor,
            config,
        }));
        if !enqueued {
            return Err(invalid_state_error("encoder is closed"));
        }
        Ok(())
    }

    /// Encode an audio buffer
    pub fn encode(&self, data: &AudioData) -> WebCodecsResult<()> {
        if self.state() != CodecState::Configured {
            return Err(invalid_state_error("encoder is not configured"));
        }
        // Takes an inner refcount; rejects a detached buffer before admission
        let samples = data
            .buffer_ref()
            .map_err(|_| type_error("audio data is closed"))?;

        self.core.shared.increment_queue_size();
        if !self
            .core
            .queue
            .enqueue(ControlMessage::Work(AudioEncodeRequest { samples }))
        {
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
        config: &AudioEncoderConfig,
    ) -> PromiseHandle<AudioEncoderSupport> {
        if let Err(err) = config.validate() {
            return PromiseHandle::settled(Err(err));
        }
        let supported = match codec_string::parse_codec_string(&config.codec) {
            Some(descriptor) => {
                descriptor.kind.is_audio()
                    && codec_string::is_supported(&descriptor)
                    && runtime.backends().supports(&descriptor)
            }
            None => false,
        };
        PromiseHandle::settled(Ok(AudioEncoderSupport {
            supported,
            config: config.clone(),
        }))
    }
}

impl Drop for AudioEncoder {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Worker
// ============================================================================

struct AudioEncoderWorker {
    provider: Arc<dyn BackendProvider>,
    shared: Arc<EngineShared>,
    delivery: Arc<AudioEncoderDelivery>,
    backend: Option<BoxAudioEncoderBackend>,
    config: Option<AudioEncoderConfig>,
    needs_decoder_config: bool,
}

impl AudioEncoderWorker {
    fn build_metadata(&mut self) -> EncodedAudioChunkMetadata {
        if !self.needs_decoder_config {
            return EncodedAudioChunkMetadata::default();
        }
        self.needs_decoder_config = false;
        let decoder_config = self.config.as_ref().map(|config| AudioDecoderConfigOutput {
            codec: config.codec.clone(),
            sample_rate: config.sample_rate,
            number_of_channels: config.number_of_channels,
            description: self.backend.as_ref().and_then(|b| b.description()),
        });
        EncodedAudioChunkMetadata { decoder_config }
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
                    let chunk = EncodedAudioChunk::from_packet(Arc::new(packet));
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

impl WorkerHandler for AudioEncoderWorker {
    type Config = ConfigureRequest;
    type Work = AudioEncodeRequest;

    fn on_configure(&mut self, request: ConfigureRequest) {
        self.backend = None;
        self.needs_decoder_config = true;
        match self
            .provider
            .open_audio_encoder(&request.descriptor, &request.config)
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

    fn on_work(&mut self, request: AudioEncodeRequest) {
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
    use crate::webcodecs::{AudioDataInit, AudioSampleFormat};
    use futures::executor::block_on;

    fn audio(timestamp: i64) -> AudioData {
        AudioData::from_init(AudioDataInit {
            format: AudioSampleFormat::F32Planar,
            sample_rate: 48_000,
            number_of_frames: 480,
            number_of_channels: 2,
            timestamp,
            data: vec![0u8; 480 * 4 * 2],
        })
        .unwrap()
    }

    struct Harness {
        encoder: AudioEncoder,
        outputs: Arc<Mutex<Vec<(i64, Option<AudioDecoderConfigOutput>)>>>,
        errors: Arc<Mutex<Vec<WebCodecsError>>>,
    }

    fn harness(script: MockScript) -> Harness {
        let runtime =
            CodecRuntime::new(MockProvider::with_script(script), Arc::new(InlineDispatcher));
        let outputs = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let out = Arc::clone(&outputs);
        let errs = Arc::clone(&errors);
        let encoder = AudioEncoder::new(
            &runtime,
            AudioEncoderInit {
                output: Box::new(move |chunk, metadata| {
                    out
                        .lock()
                        .unwrap()
                        .push((chunk.timestamp(), metadata.decoder_config));
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
    fn test_encode_and_flush() {
        let h = harness(MockScript::default());
        h.encoder
            .configure(AudioEncoderConfig::new("opus", 48_000, 2))
            .unwrap();
        h.encoder.encode(&audio(0)).unwrap();
        h.encoder.encode(&audio(10_000)).unwrap();
        block_on(h.encoder.flush()).unwrap();

        let outputs = h.outputs.lock().unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].0, 0);
        assert_eq!(outputs[1].0, 10_000);

        let config = outputs[0].1.as_ref().unwrap();
        assert_eq!(config.codec, "opus");
        assert_eq!(config.sample_rate, 48_000);
        assert!(outputs[1].1.is_none());
        assert!(h.errors.lock().unwrap().is_empty());
    }

    #[test]
    fn test_detached_audio_rejected() {
        let h = harness(MockScript::default());
        h.encoder
            .configure(AudioEncoderConfig::new("opus", 48_000, 2))
            .unwrap();
        let a = audio(0);
        a.close();
        assert_eq!(
            h.encoder.encode(&a).unwrap_err().kind(),
            ErrorKind::TypeError
        );
    }

    #[test]
    fn test_encode_error_closes() {
        let script = MockScript {
            fail_send_at: Some(1),
            ..Default::default()
        };
        let h = harness(script);
        h.encoder
            .configure(AudioEncoderConfig::new("mp4a.40.2", 44_100, 2))
            .unwrap();
        h.encoder.encode(&audio(0)).unwrap();

        for _ in 0..1000 {
            if !h.errors.lock().unwrap().is_empty() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        assert_eq!(
            h.errors.lock().unwrap()[0].kind(),
            ErrorKind::EncodingError
        );
        assert_eq!(h.encoder.state(), CodecState::Closed);
    }

    #[test]
    fn test_is_config_supported() {
        let runtime = CodecRuntime::new(MockProvider::new(), Arc::new(InlineDispatcher));
        let support = block_on(AudioEncoder::is_config_supported(
            &runtime,
            &AudioEncoderConfig::new("flac", 44_100, 2),
        ))
        .unwrap();
        assert!(support.supported);

        let support = block_on(AudioEncoder::is_config_supported(
            &runtime,
            &AudioEncoderConfig::new("av01.0.04M.08", 44_100, 2),
        ))
        .unwrap();
        assert!(!support.supported);
    }
}
