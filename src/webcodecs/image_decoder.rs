//! ImageDecoder - WebCodecs API implementation
//!
//! Decodes image files (still or animated) into VideoFrame objects.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/ImageDecoder
//!
//! Structurally like the streaming codecs, with image-specific differences:
//! the encoded input arrives at construction (whole buffer or streamed
//! bytes), decoding is frame-index addressed and promise-returning, and a
//! track list with its `ready` promise is populated once the demuxer has
//! parsed the container.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::codec::{
    BackendProvider, BoxImageBackend, FrameBuffer, ImageTrackInfo, ReceiveStatus,
};
use crate::engine::{
    CodecState, CodecWorker, ControlMessage, ControlQueue, DeliveryChannel, EngineShared,
    PromiseHandle, PromiseMap, SharedPromise, WorkerHandler,
};
use crate::runtime::CodecRuntime;
use crate::webcodecs::error::{
    abort_error, encoding_error, invalid_state_error, not_supported_error, type_error,
    WebCodecsError, WebCodecsResult,
};
use crate::webcodecs::VideoFrame;

/// Color space conversion mode (W3C WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpaceConversion {
    /// Apply default color space conversion
    #[default]
    Default,
    /// No color space conversion
    None,
}

/// Encoded image source supplied at construction
pub enum ImageSource {
    /// The whole file up front
    Buffer(Vec<u8>),
    /// Bytes arrive later via `append_data` / `end_of_data`
    Stream,
}

/// ImageDecoder init options
pub struct ImageDecoderInit {
    /// MIME type of the image (e.g. "image/png", "image/gif")
    pub mime_type: String,
    pub data: ImageSource,
    pub color_space_conversion: ColorSpaceConversion,
    /// Desired output size (must be paired)
    pub desired_width: Option<u32>,
    pub desired_height: Option<u32>,
    /// Prefer the animated track when the container has several
    pub prefer_animation: Option<bool>,
}

impl ImageDecoderInit {
    pub fn new(mime_type: impl Into<String>, data: ImageSource) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
            color_space_conversion: ColorSpaceConversion::default(),
            desired_width: None,
            desired_height: None,
            prefer_animation: None,
        }
    }
}

/// Options for decode()
#[derive(Debug, Clone, Copy)]
pub struct ImageDecodeOptions {
    pub frame_index: u32,
    pub complete_frames_only: bool,
}

impl Default for ImageDecodeOptions {
    fn default() -> Self {
        Self {
            frame_index: 0,
            complete_frames_only: true,
        }
    }
}

/// Result of decode()
pub struct ImageDecodeResult {
    pub image: VideoFrame,
    /// False for partial progressive output
    pub complete: bool,
}

impl std::fmt::Debug for ImageDecodeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageDecodeResult")
            .field("complete", &self.complete)
            .finish()
    }
}

/// One track of an image file
#[derive(Debug, Clone)]
pub struct ImageTrack {
    pub animated: bool,
    pub frame_count: u32,
    /// `f32::INFINITY` for loop-forever animations
    pub repetition_count: f32,
    pub selected: bool,
}

struct TrackListState {
    tracks: Vec<ImageTrack>,
    selected_index: Option<u32>,
}

/// ImageTrackList - live list of tracks with a readiness promise
#[derive(Clone)]
pub struct ImageTrackList {
    state: Arc<Mutex<TrackListState>>,
    ready: SharedPromise<()>,
    core: Weak<ImageCore>,
}

impl ImageTrackList {
    /// Resolves once the track list has been established
    pub fn ready(&self) -> SharedPromise<()> {
        self.ready.clone()
    }

    pub fn length(&self) -> usize {
        self.state.lock().unwrap().tracks.len()
    }

    pub fn get(&self, index: usize) -> Option<ImageTrack> {
        self.state.lock().unwrap().tracks.get(index).cloned()
    }

    pub fn selected_index(&self) -> Option<u32> {
        self.state.lock().unwrap().selected_index
    }

    pub fn selected_track(&self) -> Option<ImageTrack> {
        let state = self.state.lock().unwrap();
        let index = state.selected_index?;
        state.tracks.get(index as usize).cloned()
    }

    /// Switch decoding to another track
    ///
    /// Pending decode promises are rejected with `AbortError`.
    pub fn select_track(&self, index: u32) -> WebCodecsResult<()> {
        let Some(core) = self.core.upgrade() else {
            return Err(invalid_state_error("decoder is closed"));
        };
        if core.shared.state.load() == CodecState::Closed {
            return Err(invalid_state_error("decoder is closed"));
        }
        {
            let mut state = self.state.lock().unwrap();
            if index as usize >= state.tracks.len() {
                return Err(type_error("track index out of range"));
            }
            let previous = state.selected_index;
            if previous == Some(index) {
                return Ok(());
            }
            for (i, track) in state.tracks.iter_mut().enumerate() {
                track.selected = i as u32 == index;
            }
            state.selected_index = Some(index);
        }
        core.decodes.reject_all(&abort_error("track changed"));
        core.queue.enqueue(ControlMessage::Work(ImageWorkItem::UpdateTrack(index)));
        Ok(())
    }
}

// ============================================================================
// Messages and events
// ============================================================================

struct ImageConfigureRequest {
    mime_type: String,
    prefer_animation: Option<bool>,
    initial_data: Vec<u8>,
    data_complete: bool,
}

enum ImageWorkItem {
    Decode {
        request_id: u32,
        frame_index: u32,
        complete_frames_only: bool,
    },
    AppendData(Vec<u8>),
    EndOfData,
    UpdateTrack(u32),
}

enum ImageEvent {
    TracksReady {
        tracks: Vec<ImageTrackInfo>,
        selected: u32,
    },
    DecodeDone {
        request_id: u32,
        result: WebCodecsResult<(Arc<FrameBuffer>, bool)>,
    },
    Completed,
    Error(WebCodecsError),
}

type ImageQueue = ControlQueue<ImageConfigureRequest, ImageWorkItem>;
type ImageDelivery = DeliveryChannel<ImageEvent>;

struct ImageCore {
    shared: Arc<EngineShared>,
    queue: Arc<ImageQueue>,
    decodes: PromiseMap<ImageDecodeResult>,
    track_state: Arc<Mutex<TrackListState>>,
    ready: SharedPromise<()>,
    completed: SharedPromise<()>,
}

impl ImageCore {
    fn close_with_error(&self, err: WebCodecsError) {
        if !self.shared.state.close() {
            return;
        }
        self.queue.shutdown();
        self.decodes.reject_all(&err);
        self.ready.complete(Err(err.clone()));
        self.completed.complete(Err(err));
    }

    fn handle_event(&self, event: ImageEvent) {
        match event {
            ImageEvent::TracksReady { tracks, selected } => {
                {
                    let mut state = self.track_state.lock().unwrap();
                    state.tracks = tracks
                        .iter()
                        .enumerate()
                        .map(|(i, info)| ImageTrack {
                            animated: info.animated,
                            frame_count: info.frame_count,
                            repetition_count: info.repetition_count,
                            selected: i as u32 == selected,
                        })
                        .collect();
                    state.selected_index = Some(selected);
                }
                self.ready.complete(Ok(()));
            }
            ImageEvent::DecodeDone { request_id, result } => {
                let result = result.map(|(buffer, complete)| ImageDecodeResult {
                    image: VideoFrame::from_decoded(buffer, 0, false),
                    complete,
                });
                self.decodes.settle(request_id, result);
            }
            ImageEvent::Completed => {
                self.completed.complete(Ok(()));
            }
            ImageEvent::Error(err) => self.close_with_error(err),
        }
    }
}

/// ImageDecoder - WebCodecs-compliant image decoder
pub struct ImageDecoder {
    core: Arc<ImageCore>,
    delivery: Arc<ImageDelivery>,
    worker: Mutex<Option<CodecWorker>>,
    mime_type: String,
    /// All encoded bytes have been received
    complete: AtomicBool,
}

impl std::fmt::Debug for ImageDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageDecoder")
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

impl ImageDecoder {
    pub fn new(runtime: &CodecRuntime, init: ImageDecoderInit) -> WebCodecsResult<Self> {
        if !init.mime_type.starts_with("image/") {
            return Err(type_error("type must be an image MIME type"));
        }
        if init.desired_width.is_some() != init.desired_height.is_some() {
            return Err(type_error(
                "desiredWidth and desiredHeight must be specified together",
            ));
        }

        let core = Arc::new(ImageCore {
            shared: EngineShared::new(),
            queue: Arc::new(ImageQueue::new()),
            decodes: PromiseMap::new(),
            track_state: Arc::new(Mutex::new(TrackListState {
                tracks: Vec::new(),
                selected_index: None,
            })),
            ready: SharedPromise::new(),
            completed: SharedPromise::new(),
        });

        let weak: Weak<ImageCore> = Arc::downgrade(&core);
        let delivery = DeliveryChannel::new(Arc::clone(runtime.dispatcher()), move |event| {
            if let Some(core) = weak.upgrade() {
                core.handle_event(event);
            }
        });

        let handler = ImageWorker {
            provider: Arc::clone(runtime.backends()),
            delivery: Arc::clone(&delivery),
            backend: None,
            tracks: Vec::new(),
            tracks_ready: false,
            pending: Vec::new(),
            ended: false,
            completed_posted: false,
            prefer_animation: init.prefer_animation,
            selected: 0,
        };
        let worker = CodecWorker::spawn("image-decoder", Arc::clone(&core.queue), handler)
            .map_err(|e| encoding_error(&format!("failed to start image worker: {e}")))?;

        let (initial_data, data_complete) = match init.data {
            ImageSource::Buffer(data) => (data, true),
            ImageSource::Stream => (Vec::new(), false),
        };

        core.shared.state.set_configured();
        core.queue.enqueue(ControlMessage::Configure(ImageConfigureRequest {
            mime_type: init.mime_type.clone(),
            prefer_animation: init.prefer_animation,
            initial_data,
            data_complete,
        }));

        Ok(Self {
            core,
            delivery,
            worker: Mutex::new(Some(worker)),
            mime_type: init.mime_type,
            complete: AtomicBool::new(data_complete),
        })
    }

    // ==========================================================================
    // Attributes
    // ==========================================================================

    /// The MIME type this decoder was constructed for
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Whether all encoded bytes have been received
    pub fn complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    /// Resolves once the encoded data is fully buffered and the final frame
    /// count is established
    pub fn completed(&self) -> SharedPromise<()> {
        self.core.completed.clone()
    }

    /// The track list, live once `tracks().ready()` resolves
    pub fn tracks(&self) -> ImageTrackList {
        ImageTrackList {
            state: Arc::clone(&self.core.track_state),
            ready: self.core.ready.clone(),
            core: Arc::downgrade(&self.core),
        }
    }

    // ==========================================================================
    // Methods
    // ==========================================================================

    /// Decode the frame at `options.frame_index` of the selected track
    pub fn decode(&self, options: ImageDecodeOptions) -> PromiseHandle<ImageDecodeResult> {
        if self.core.shared.state.load() == CodecState::Closed {
            return PromiseHandle::settled(Err(invalid_state_error("decoder is closed")));
        }
        let (request_id, promise) = self.core.decodes.register();
        let enqueued = self.core.queue.enqueue(ControlMessage::Work(ImageWorkItem::Decode {
            request_id,
            frame_index: options.frame_index,
            complete_frames_only: options.complete_frames_only,
        }));
        if !enqueued {
            self
                .core
                .decodes
                .settle(request_id, Err(invalid_state_error("decoder is closed")));
        }
        promise
    }

    /// Feed more bytes into a stream-constructed decoder
    pub fn append_data(&self, data: &[u8]) -> WebCodecsResult<()> {
        if self.core.shared.state.load() == CodecState::Closed {
            return Err(invalid_state_error("decoder is closed"));
        }
        if self.complete() {
            return Err(invalid_state_error("image data is already complete"));
        }
        self
            .core
            .queue
            .enqueue(ControlMessage::Work(ImageWorkItem::AppendData(data.to_vec())));
        Ok(())
    }

    /// Signal that no further bytes will arrive
    pub fn end_of_data(&self) -> WebCodecsResult<()> {
        if self.core.shared.state.load() == CodecState::Closed {
            return Err(invalid_state_error("decoder is closed"));
        }
        if self.complete.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self
            .core
            .queue
            .enqueue(ControlMessage::Work(ImageWorkItem::EndOfData));
        Ok(())
    }

    /// Abort pending decode requests; track state and buffered data survive
    pub fn reset(&self) {
        self.core.decodes.reject_all(&abort_error("decoder reset"));
        self.core.queue.enqueue(ControlMessage::Reset);
    }

    /// Close the decoder permanently; idempotent
    pub fn close(&self) {
        if self.core.shared.state.close() {
            self.core.queue.enqueue(ControlMessage::Close);
            self.core.decodes.reject_all(&abort_error("decoder closed"));
            self.core.ready.complete(Err(abort_error("decoder closed")));
            self.core.completed.complete(Err(abort_error("decoder closed")));
        }
        self.delivery.release();
        if let Some(mut worker) = self.worker.lock().unwrap().take() {
            worker.stop();
        }
    }

    /// Whether the runtime can decode this MIME type at all
    pub fn is_type_supported(runtime: &CodecRuntime, mime_type: &str) -> PromiseHandle<bool> {
        if !mime_type.starts_with("image/") {
            return PromiseHandle::settled(Ok(false));
        }
        let supported = runtime.backends().open_image_decoder(mime_type).is_ok();
        PromiseHandle::settled(Ok(supported))
    }
}

impl Drop for ImageDecoder {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Worker
// ============================================================================

struct PendingDecode {
    request_id: u32,
    frame_index: u32,
    complete_frames_only: bool,
}

/// Worker-thread half: owns the demux+decode backend exclusively
struct ImageWorker {
    provider: Arc<dyn BackendProvider>,
    delivery: Arc<ImageDelivery>,
    backend: Option<BoxImageBackend>,
    tracks: Vec<ImageTrackInfo>,
    tracks_ready: bool,
    /// Decode requests waiting for track info or more bytes
    pending: Vec<PendingDecode>,
    ended: bool,
    completed_posted: bool,
    prefer_animation: Option<bool>,
    selected: u32,
}

impl ImageWorker {
    /// Parse tracks once enough bytes have arrived
    fn try_probe(&mut self) {
        if self.tracks_ready {
            return;
        }
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        match backend.probe_tracks() {
            Ok(Some(tracks)) => {
                let selected = choose_track(&tracks, self.prefer_animation);
                if let Err(e) = backend.select_track(selected) {
                    self.delivery.post(ImageEvent::Error(encoding_error(&format!(
                        "track selection failed: {e}"
                    ))));
                    return;
                }
                self.tracks = tracks.clone();
                self.tracks_ready = true;
                self.selected = selected;
                self.delivery.post(ImageEvent::TracksReady { tracks, selected });
            }
            Ok(None) => {}
            Err(e) => {
                self
                    .delivery
                    .post(ImageEvent::Error(encoding_error(&format!(
                        "image parse failed: {e}"
                    ))));
            }
        }
    }

    /// Retry every held decode request against the current data
    fn try_pending_decodes(&mut self) {
        if !self.tracks_ready {
            return;
        }
        let mut still_pending = Vec::new();
        for request in std::mem::take(&mut self.pending) {
            if !self.try_decode(&request) {
                still_pending.push(request);
            }
        }
        self.pending = still_pending;
    }

    /// Attempt one decode; false means it stays pending
    fn try_decode(&mut self, request: &PendingDecode) -> bool {
        let frame_count = self
            .tracks
            .get(self.selected as usize)
            .map_or(0, |t| t.frame_count);
        let stable = self
            .backend
            .as_ref()
            .is_some_and(|b| b.frame_count_stable());
        if stable && request.frame_index >= frame_count {
            self.delivery.post(ImageEvent::DecodeDone {
                request_id: request.request_id,
                result: Err(type_error("frameIndex out of range")),
            });
            return true;
        }

        let Some(backend) = self.backend.as_mut() else {
            return true;
        };
        match backend.decode_frame(request.frame_index, request.complete_frames_only) {
            Ok(ReceiveStatus::Output(decoded)) => {
                self.delivery.post(ImageEvent::DecodeDone {
                    request_id: request.request_id,
                    result: Ok((Arc::new(decoded.frame), decoded.complete)),
                });
                true
            }
            Ok(ReceiveStatus::Again) | Ok(ReceiveStatus::Eof) => false,
            Err(e) => {
                self.delivery.post(ImageEvent::DecodeDone {
                    request_id: request.request_id,
                    result: Err(encoding_error(&format!("image decode failed: {e}"))),
                });
                true
            }
        }
    }

    fn check_completed(&mut self) {
        if self.completed_posted || !self.ended || !self.tracks_ready {
            return;
        }
        let stable = self
            .backend
            .as_ref()
            .is_some_and(|b| b.frame_count_stable());
        if stable {
            self.completed_posted = true;
            self.delivery.post(ImageEvent::Completed);
        }
    }
}

/// Track selection: honor the animation preference, else the first track
fn choose_track(tracks: &[ImageTrackInfo], prefer_animation: Option<bool>) -> u32 {
    match prefer_animation {
        Some(true) => tracks.iter().position(|t| t.animated),
        Some(false) => tracks.iter().position(|t| !t.animated),
        None => None,
    }
    .unwrap_or(0) as u32
}

impl WorkerHandler for ImageWorker {
    type Config = ImageConfigureRequest;
    type Work = ImageWorkItem;

    fn on_configure(&mut self, request: ImageConfigureRequest) {
        self.prefer_animation = request.prefer_animation;
        match self.provider.open_image_decoder(&request.mime_type) {
            Ok(mut backend) => {
                let appended = if request.initial_data.is_empty() {
                    Ok(())
                } else {
                    backend.append_data(request.initial_data)
                };
                if let Err(e) = appended {
                    self
                        .delivery
                        .post(ImageEvent::Error(encoding_error(&format!(
                            "image parse failed: {e}"
                        ))));
                    return;
                }
                if request.data_complete {
                    self.ended = true;
                    backend.end_of_data();
                }
                self.backend = Some(backend);
                self.try_probe();
                self.try_pending_decodes();
                self.check_completed();
            }
            Err(e) => {
                self
                    .delivery
                    .post(ImageEvent::Error(not_supported_error(&format!(
                        "unsupported image type: {e}"
                    ))));
            }
        }
    }

    fn on_work(&mut self, work: ImageWorkItem) {
        match work {
            ImageWorkItem::Decode {
                request_id,
                frame_index,
                complete_frames_only,
            } => {
                let request = PendingDecode {
                    request_id,
                    frame_index,
                    complete_frames_only,
                };
                if !self.tracks_ready || !self.try_decode(&request) {
                    self.pending.push(request);
                }
            }
            ImageWorkItem::AppendData(data) => {
                let appended = match self.backend.as_mut() {
                    Some(backend) => backend.append_data(data),
                    None => Ok(()),
                };
                if let Err(e) = appended {
                    self
                        .delivery
                        .post(ImageEvent::Error(encoding_error(&format!(
                            "image parse failed: {e}"
                        ))));
                    return;
                }
                self.try_probe();
                self.try_pending_decodes();
                self.check_completed();
            }
            ImageWorkItem::EndOfData => {
                self.ended = true;
                if let Some(backend) = self.backend.as_mut() {
                    backend.end_of_data();
                }
                self.try_probe();
                self.try_pending_decodes();
                self.check_completed();
            }
            ImageWorkItem::UpdateTrack(index) => {
                self.selected = index;
                let selected = match self.backend.as_mut() {
                    Some(backend) => backend.select_track(index),
                    None => Ok(()),
                };
                if let Err(e) = selected {
                    self
                        .delivery
                        .post(ImageEvent::Error(encoding_error(&format!(
                            "track selection failed: {e}"
                        ))));
                    return;
                }
                // Promises for the old track were rejected caller-side
                self.pending.clear();
            }
        }
    }

    fn on_flush(&mut self, _flush_id: u32) {}

    fn on_reset(&mut self) {
        self.pending.clear();
    }

    fn on_close(&mut self) {
        self.backend = None;
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::mock::{MockProvider, MockScript};
    use crate::engine::InlineDispatcher;
    use crate::webcodecs::error::ErrorKind;
    use futures::executor::block_on;

    fn animated_script() -> MockScript {
        MockScript {
            image_tracks: vec![
                ImageTrackInfo {
                    animated: false,
                    frame_count: 1,
                    repetition_count: 0.0,
                },
                ImageTrackInfo {
                    animated: true,
                    frame_count: 3,
                    repetition_count: f32::INFINITY,
                },
            ],
            image_bytes_per_frame: 4,
            ..Default::default()
        }
    }

    fn runtime(script: MockScript) -> CodecRuntime {
        CodecRuntime::new(MockProvider::with_script(script), Arc::new(InlineDispatcher))
    }

    /// Header plus `frames` frames worth of mock bytes
    fn image_bytes(frames: usize) -> Vec<u8> {
        vec![0u8; 4 + frames * 4]
    }

    #[test]
    fn test_full_buffer_decode() {
        let rt = runtime(animated_script());
        let mut init = ImageDecoderInit::new("image/gif", ImageSource::Buffer(image_bytes(3)));
        init.prefer_animation = Some(true);
        let decoder = ImageDecoder::new(&rt, init).unwrap();

        block_on(decoder.tracks().ready()).unwrap();
        assert_eq!(decoder.tracks().length(), 2);
        assert!(decoder.complete());

        let result = block_on(decoder.decode(ImageDecodeOptions::default())).unwrap();
        assert!(result.complete);
        assert_eq!(result.image.timestamp(), 0);

        let result = block_on(decoder.decode(ImageDecodeOptions {
            frame_index: 1,
            complete_frames_only: true,
        }))
        .unwrap();
        assert_eq!(result.image.timestamp(), 40_000);

        block_on(decoder.completed()).unwrap();
    }

    #[test]
    fn test_prefer_animation_selects_animated_track() {
        let rt = runtime(animated_script());
        let mut init = ImageDecoderInit::new("image/gif", ImageSource::Buffer(image_bytes(3)));
        init.prefer_animation = Some(true);
        let decoder = ImageDecoder::new(&rt, init).unwrap();

        block_on(decoder.tracks().ready()).unwrap();
        assert_eq!(decoder.tracks().selected_index(), Some(1));
        assert!(decoder.tracks().selected_track().unwrap().animated);
    }

    #[test]
    fn test_streaming_decode_waits_for_bytes() {
        let rt = runtime(animated_script());
        let mut init = ImageDecoderInit::new("image/gif", ImageSource::Stream);
        init.prefer_animation = Some(true);
        let decoder = ImageDecoder::new(&rt, init).unwrap();
        assert!(!decoder.complete());

        // Second frame needs 4 + 2*4 = 12 bytes; only the header is there yet
        decoder.append_data(&[0u8; 4]).unwrap();
        block_on(decoder.tracks().ready()).unwrap();

        let pending = decoder.decode(ImageDecodeOptions {
            frame_index: 1,
            complete_frames_only: true,
        });
        decoder.append_data(&[0u8; 8]).unwrap();
        let result = block_on(pending).unwrap();
        assert_eq!(result.image.timestamp(), 40_000);

        decoder.end_of_data().unwrap();
        assert!(decoder.complete());
        block_on(decoder.completed()).unwrap();
    }

    #[test]
    fn test_frame_index_out_of_range() {
        let rt = runtime(animated_script());
        let decoder = ImageDecoder::new(
            &rt,
            ImageDecoderInit::new("image/gif", ImageSource::Buffer(image_bytes(3))),
        )
        .unwrap();
        block_on(decoder.tracks().ready()).unwrap();

        // The default selected track is the still one with a single frame
        let err = block_on(decoder.decode(ImageDecodeOptions {
            frame_index: 5,
            complete_frames_only: true,
        }))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeError);
    }

    #[test]
    fn test_select_track_aborts_pending() {
        let rt = runtime(animated_script());
        let decoder = ImageDecoder::new(
            &rt,
            ImageDecoderInit::new("image/gif", ImageSource::Stream),
        )
        .unwrap();
        decoder.append_data(&[0u8; 4]).unwrap();
        block_on(decoder.tracks().ready()).unwrap();

        // Move onto the animated track, then request a frame whose bytes are
        // not there yet so the decode stays pending
        decoder.tracks().select_track(1).unwrap();
        let pending = decoder.decode(ImageDecodeOptions {
            frame_index: 2,
            complete_frames_only: true,
        });
        decoder.tracks().select_track(0).unwrap();
        assert_eq!(block_on(pending).unwrap_err().kind(), ErrorKind::AbortError);
        assert_eq!(decoder.tracks().selected_index(), Some(0));

        assert!(decoder.tracks().select_track(7).is_err());
    }

    #[test]
    fn test_reset_aborts_pending_decodes() {
        let rt = runtime(animated_script());
        let decoder = ImageDecoder::new(
            &rt,
            ImageDecoderInit::new("image/gif", ImageSource::Stream),
        )
        .unwrap();
        decoder.append_data(&[0u8; 4]).unwrap();
        block_on(decoder.tracks().ready()).unwrap();

        let pending = decoder.decode(ImageDecodeOptions {
            frame_index: 0,
            complete_frames_only: true,
        });
        // Frame 0 needs 8 bytes; still short, so the request is held
        decoder.reset();
        assert_eq!(block_on(pending).unwrap_err().kind(), ErrorKind::AbortError);

        // Data and tracks survive reset
        decoder.append_data(&[0u8; 8]).unwrap();
        let result = block_on(decoder.decode(ImageDecodeOptions::default())).unwrap();
        assert_eq!(result.image.timestamp(), 0);
    }

    #[test]
    fn test_close_rejects_everything() {
        let rt = runtime(animated_script());
        let decoder = ImageDecoder::new(
            &rt,
            ImageDecoderInit::new("image/gif", ImageSource::Stream),
        )
        .unwrap();
        decoder.close();
        decoder.close();

        let err = block_on(decoder.decode(ImageDecodeOptions::default())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStateError);
        assert!(decoder.append_data(&[0u8; 4]).is_err());
        assert_eq!(
            block_on(decoder.completed()).unwrap_err().kind(),
            ErrorKind::AbortError
        );
    }

    #[test]
    fn test_bad_mime_type_rejected() {
        let rt = runtime(MockScript::default());
        let err = ImageDecoder::new(
            &rt,
            ImageDecoderInit::new("video/mp4", ImageSource::Buffer(Vec::new())),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeError);
    }

    #[test]
    fn test_is_type_supported() {
        let rt = runtime(MockScript::default());
        assert!(block_on(ImageDecoder::is_type_supported(&rt, "image/png")).unwrap());
        assert!(!block_on(ImageDecoder::is_type_supported(&rt, "text/html")).unwrap());

        let failing = runtime(MockScript {
            fail_open: true,
            ..Default::default()
        });
        assert!(!block_on(ImageDecoder::is_type_supported(&failing, "image/png")).unwrap());
    }
}
