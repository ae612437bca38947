//! AudioDecoder - WebCodecs API implementation
//!
//! Decodes EncodedAudioChunk objects into AudioData objects on a dedicated
//! worker thread.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/AudioDecoder

use std::sync::{Arc, Mutex, Weak};

use crate::codec::{
    BackendProvider, BoxAudioDecoderBackend, PacketBuffer, ReceiveStatus, SendStatus,
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
    AudioData, AudioDecoderConfig, EncodedAudioChunk, EncodedAudioChunkType,
};

/// Result of isConfigSupported
#[derive(Debug, Clone)]
pub struct AudioDecoderSupport {
    pub supported: bool,
    pub config: AudioDecoderConfig,
}

/// Constructor callbacks
pub struct AudioDecoderInit {
    /// Invoked once per decoded buffer, in presentation order
    pub output: Box<dyn Fn(AudioData) + Send + Sync>,
    /// Invoked once on fatal error; the decoder is closed afterwards
    pub error: Box<dyn Fn(WebCodecsError) + Send + Sync>,
}

struct ConfigureRequest {
    descriptor: CodecDescriptor,
    config: AudioDecoderConfig,
}

type AudioDecoderQueue = ControlQueue<ConfigureRequest, Arc<PacketBuffer>>;
type AudioDecoderDelivery = DeliveryChannel<CodecEvent<AudioData>>;

struct AudioDecoderCore {
    shared: Arc<EngineShared>,
    queue: Arc<AudioDecoderQueue>,
    init: AudioDecoderInit,
    ondequeue: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl AudioDecoderCore {
    fn close_with_error(&self, err: WebCodecsError) {
        if !self.shared.state.close() {
            return;
        }
        self.queue.drain_pending();
        self.shared.clear_queue_size();
        self.queue.shutdown();
        self.shared.abort_pending_flushes("decoder closed with error");
        (self.init.error)(err);
    }

    fn handle_event(&self, event: CodecEvent<AudioData>) {
        match event {
            CodecEvent::Output(audio) => {
                if self.shared.state.load() == CodecState::Configured {
                    (self.init.output)(audio);
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

/// AudioDecoder - WebCodecs-compliant audio decoder
pub struct AudioDecoder {
    core: Arc<AudioDecoderCore>,
    delivery: Arc<AudioDecoderDelivery>,
    worker: Mutex<Option<CodecWorker>>,
}

impl AudioDecoder {
    /// Create a new AudioDecoder with output and error callbacks
    pub fn new(runtime: &CodecRuntime, init: AudioDecoderInit) -> WebCodecsResult<Self> {
        let core = Arc::new(AudioDecoderCore {
            shared: EngineShared::new(),
            queue: Arc::new(AudioDecoderQueue::new()),
            init,
            ondequeue: Mutex::new(None),
        });

        let weak: Weak<AudioDecoderCore> = Arc::downgrade(&core);
        let delivery = DeliveryChannel::new(Arc::clone(runtime.dispatcher()), move |event| {
            if let Some(core) = weak.upgrade() {
                core.handle_event(event);
            }
        });

        let handler = AudioDecoderWorker {
            provider: Arc::clone(runtime.backends()),
            shared: Arc::clone(&core.shared),
            delivery: Arc::clone(&delivery),
            backend: None,
        };
        let worker = CodecWorker::spawn("audio-decoder", Arc::clone(&core.queue), handler)
            .map_err(|e| encoding_error(&format!("failed to start decoder worker: {e}")))?;

        Ok(Self {
            core,
            delivery,
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn state(&self) -> CodecState {
        self.core.shared.state.load()
    }

    /// Number of admitted decodes not yet consumed by the worker
    pub fn decode_queue_size(&self) -> u32 {
        self.core.shared.queue_size()
    }

    /// Install or clear the dequeue-event handler
    pub fn set_ondequeue(&self, callback: Option<Box<dyn Fn() + Send + Sync>>) {
        *self.core.ondequeue.lock().unwrap() = callback;
    }

    /// Configure the decoder
    pub fn configure(&self, config: AudioDecoderConfig) -> WebCodecsResult<()> {
        if self.state() == CodecState::Closed {
            return Err(invalid_state_error("decoder is closed"));
        }
        config.validate()?;
        let descriptor = codec_string::parse_codec_string(&config.codec)
            .ok_or_else(|| type_error("unrecognized codec string"))?;
        if !descriptor.kind.is_audio() {
            return Err(type_error("not an audio codec"));
        }

        if !self.core.shared.state.set_configured() {
            return Err(invalid_state_error("decoder is closed"));
        }
        self
            .core
            .shared
            .key_chunk_required
            .store(true, std::sync::atomic::Ordering::Release);

        let enqueued = self.core.queue.enqueue(ControlMessage::Configure(ConfigureRequest {
            descriptor,
            config,
        }));
        if !enqueued {
            return Err(invalid_state_error("decoder is closed"));
        }
        Ok(())
    }

    /// Decode an encoded audio chunk
    pub fn decode(&self, chunk: &EncodedAudioChunk) -> WebCodecsResult<()> {
        if self.state() != CodecState::Configured {
            return Err(invalid_state_error("decoder is not configured"));
        }
        if self
            .core
            .shared
            .key_chunk_required
            .load(std::sync::atomic::Ordering::Acquire)
        {
            if chunk.chunk_type() != EncodedAudioChunkType::Key {
                return Err(data_error("a key chunk is required after configure or reset"));
            }
            self
                .core
                .shared
                .key_chunk_required
                .store(false, std::sync::atomic::Ordering::Release);
        }

        self.core.shared.increment_queue_size();
        if !self.core.queue.enqueue(ControlMessage::Work(chunk.packet_ref())) {
            self.core.shared.decrement_queue_size();
            return Err(invalid_state_error("decoder is closed"));
        }
        Ok(())
    }

    /// Complete all queued work and emit every pending output
    pub fn flush(&self) -> FlushPromise {
        if self.state() != CodecState::Configured {
            return PromiseHandle::settled(Err(invalid_state_error("decoder is not configured")));
        }
        self
            .core
            .shared
            .key_chunk_required
            .store(true, std::sync::atomic::Ordering::Release);

        let (flush_id, promise) = self.core.shared.register_flush();
        if !self.core.queue.enqueue(ControlMessage::Flush(flush_id)) {
            self
                .core
                .shared
                .settle_flush(flush_id, Err(invalid_state_error("decoder is closed")));
        }
        promise
    }

    /// Discard all queued work and pending callbacks
    pub fn reset(&self) -> WebCodecsResult<()> {
        if self.state() == CodecState::Closed {
            return Err(invalid_state_error("decoder is closed"));
        }
        self.core.shared.state.set_unconfigured();
        drop(self.core.queue.drain_pending());
        self
            .core
            .shared
            .key_chunk_required
            .store(true, std::sync::atomic::Ordering::Release);
        self.core.queue.enqueue(ControlMessage::Reset);
        self.core.shared.abort_pending_flushes("decoder reset");
        self.core.shared.clear_queue_size();
        Ok(())
    }

    /// Close the decoder permanently; idempotent
    pub fn close(&self) {
        if self.core.shared.state.close() {
            self.core.queue.drain_pending();
            self.core.shared.clear_queue_size();
            self.core.queue.enqueue(ControlMessage::Close);
            self.core.shared.abort_pending_flushes("decoder closed");
        }
        self.delivery.release();
        if let Some(mut worker) = self.worker.lock().unwrap().take() {
            worker.stop();
        }
    }

    /// Check if a configuration is supported
    pub fn is_config_supported(
        runtime: &CodecRuntime,
        config: &AudioDecoderConfig,
    ) -> PromiseHandle<AudioDecoderSupport> {
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
        PromiseHandle::settled(Ok(AudioDecoderSupport {
            supported,
            config: config.clone(),
        }))
    }
}

impl Drop for AudioDecoder {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Worker
// ============================================================================

struct AudioDecoderWorker {
    provider: Arc<dyn BackendProvider>,
    shared: Arc<EngineShared>,
    delivery: Arc<AudioDecoderDelivery>,
    backend: Option<BoxAudioDecoderBackend>,
}

impl AudioDecoderWorker {
    fn pump_outputs(&mut self) -> Result<usize, WebCodecsError> {
        let mut emitted = 0;
        loop {
            let status = match self.backend.as_mut() {
                Some(backend) => backend.receive_output(),
                None => return Ok(emitted),
            };
            match status {
                Ok(ReceiveStatus::Output(samples)) => {
                    let audio = AudioData::from_decoded(Arc::new(samples));
                    if !self.delivery.post(CodecEvent::Output(audio)) {
                        return Ok(emitted);
                    }
                    emitted += 1;
                }
                Ok(ReceiveStatus::Again) | Ok(ReceiveStatus::Eof) => return Ok(emitted),
                Err(e) => return Err(encoding_error(&format!("decode failed: {e}"))),
            }
        }
    }
}

impl WorkerHandler for AudioDecoderWorker {
    type Config = ConfigureRequest;
    type Work = Arc<PacketBuffer>;

    fn on_configure(&mut self, request: ConfigureRequest) {
        self.backend = None;
        match self
            .provider
            .open_audio_decoder(&request.descriptor, &request.config)
        {
            Ok(backend) => self.backend = Some(backend),
            Err(e) => {
                self
                    .delivery
                    .post(CodecEvent::Error(not_supported_error(&format!(
                        "configuration rejected: {e}"
                    ))));
            }
        }
    }

    fn on_work(&mut self, packet: Arc<PacketBuffer>) {
        let new_size = self.shared.decrement_queue_size();
        if self.shared.schedule_dequeue_event() {
            self.delivery.post(CodecEvent::Dequeue { new_size });
        }
        if self.backend.is_none() {
            return;
        }

        let mut pending = packet;
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
                            "decode failed: {e}"
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
    }

    fn on_close(&mut self) {
        self.backend = None;
    }
}
