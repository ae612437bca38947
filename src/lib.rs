#![deny(clippy::all)]

//! WebCodecs codec control engine
//!
//! This crate implements the W3C WebCodecs control surface - the
//! asynchronous state machine that turns a caller's configure / decode /
//! encode / flush / reset / close requests into ordered, backpressured work
//! on a dedicated codec worker thread, delivering outputs back to the
//! caller thread in presentation order.
//!
//! The codec library itself is an injected capability: implement
//! [`codec::CodecBackend`] and [`codec::BackendProvider`] over your codec
//! stack, build a [`runtime::CodecRuntime`], and construct codec instances
//! from it.

// Codec backend capability and owned media buffers
pub mod codec;

// Control engine: queue, worker, delivery, state, promises
pub mod engine;

// Shared runtime handle (backends, dispatcher, pools)
pub mod runtime;

// WebCodecs API surface
pub mod webcodecs;

pub use runtime::CodecRuntime;

// Re-export WebCodecs types at crate root
pub use webcodecs::{
    // Video types
    CodecState, EncodedVideoChunk, EncodedVideoChunkInit, EncodedVideoChunkMetadata,
    EncodedVideoChunkType, VideoColorSpace, VideoDecoder, VideoDecoderConfig,
    VideoDecoderConfigOutput, VideoDecoderInit, VideoDecoderSupport, VideoEncoder,
    VideoEncoderConfig,
    VideoEncoderEncodeOptions, VideoEncoderInit, VideoEncoderSupport, VideoFrame,
    VideoFrameBufferInit, VideoFrameCopyToOptions, VideoFrameRect, VideoPixelFormat,
    // Audio types
    AudioData, AudioDataCopyToOptions, AudioDataInit, AudioDecoder, AudioDecoderConfig,
    AudioDecoderConfigOutput, AudioDecoderInit, AudioDecoderSupport, AudioEncoder,
    AudioEncoderConfig, AudioEncoderInit, AudioEncoderSupport, AudioSampleFormat,
    EncodedAudioChunk, EncodedAudioChunkInit, EncodedAudioChunkMetadata, EncodedAudioChunkType,
    // Image types
    ImageDecodeOptions, ImageDecodeResult, ImageDecoder, ImageDecoderInit, ImageSource, ImageTrack,
    ImageTrackList,
    // Errors
    ErrorKind, WebCodecsError, WebCodecsResult,
};
