//! WebCodecs API implementation
//!
//! Provides the spec-compliant WebCodecs API surface over the control
//! engine and a pluggable codec backend.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/WebCodecs_API

mod audio_data;
mod audio_decoder;
mod audio_encoder;
pub mod codec_string;
mod encoded_audio_chunk;
mod encoded_video_chunk;
pub mod error;
mod image_decoder;
mod video_decoder;
mod video_encoder;
mod video_frame;

pub use audio_data::{AudioData, AudioDataCopyToOptions, AudioDataInit, AudioSampleFormat};
pub use audio_decoder::{AudioDecoder, AudioDecoderInit, AudioDecoderSupport};
pub use audio_encoder::{
    AudioDecoderConfigOutput, AudioEncoder, AudioEncoderInit, AudioEncoderSupport,
    EncodedAudioChunkMetadata,
};
pub use encoded_audio_chunk::{
    AudioDecoderConfig, AudioEncoderConfig, EncodedAudioChunk, EncodedAudioChunkInit,
    EncodedAudioChunkType,
};
pub use encoded_video_chunk::{
    BitrateMode, EncodedVideoChunk, EncodedVideoChunkInit, EncodedVideoChunkType,
    HardwareAcceleration, LatencyMode, VideoDecoderConfig, VideoEncoderConfig,
};
pub use error::{ErrorKind, WebCodecsError, WebCodecsResult};
pub use image_decoder::{
    ColorSpaceConversion, ImageDecodeOptions, ImageDecodeResult, ImageDecoder, ImageDecoderInit,
    ImageSource, ImageTrack, ImageTrackList,
};
pub use video_decoder::{VideoDecoder, VideoDecoderInit, VideoDecoderSupport};
pub use video_encoder::{
    EncodedVideoChunkMetadata, VideoDecoderConfigOutput, VideoEncoder, VideoEncoderEncodeOptions,
    VideoEncoderInit, VideoEncoderSupport,
};
pub use video_frame::{
    PlaneLayout, VideoColorPrimaries, VideoColorSpace, VideoFrame, VideoFrameBufferInit,
    VideoFrameCopyToOptions, VideoFrameRect, VideoMatrixCoefficients, VideoPixelFormat,
    VideoTransferCharacteristics,
};

pub use crate::engine::CodecState;
