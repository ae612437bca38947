//! Codec backend layer
//!
//! This module defines the capability boundary between the control engine
//! and whatever codec library actually transforms encoded data to raw media
//! and back. The engine never talks to a codec library directly; it talks to
//! the traits in [`backend`], and it moves media through the owned buffer
//! types defined here.

pub mod audio_buffer;
pub mod backend;
pub mod frame;
#[cfg(test)]
pub mod mock;
pub mod packet;
pub mod pool;

pub use audio_buffer::SampleBuffer;
pub use backend::{
    AudioEncodeRequest, BackendProvider, BoxAudioDecoderBackend, BoxAudioEncoderBackend,
    BoxImageBackend, BoxVideoDecoderBackend, BoxVideoEncoderBackend, CodecBackend, DecodedImage,
    ImageBackend, ImageTrackInfo, ReceiveStatus, ReorderBuffer, SendStatus, VideoEncodeRequest,
};
pub use frame::{FrameBuffer, Plane};
pub use packet::PacketBuffer;
pub use pool::{FramePool, PacketPool, PoolStatsSnapshot};

use crate::webcodecs::codec_string::CodecKind;

/// Codec error type
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("codec not found: {0}")]
    CodecNotFound(String),

    #[error("encoder not found for codec: {0:?}")]
    EncoderNotFound(CodecKind),

    #[error("decoder not found for codec: {0:?}")]
    DecoderNotFound(CodecKind),

    #[error("failed to allocate {0}")]
    AllocationFailed(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("codec not configured")]
    NotConfigured,

    #[error("invalid data: {0}")]
    InvalidData(String),
}

pub type CodecResult<T> = Result<T, CodecError>;
