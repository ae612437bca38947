//! EncodedAudioChunk - WebCodecs API implementation
//!
//! Immutable container for one encoded audio unit, plus the audio decoder
//! and encoder configuration dictionaries.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/EncodedAudioChunk

use std::sync::Arc;

use crate::codec::PacketBuffer;
use crate::webcodecs::error::{type_error, WebCodecsResult};
use crate::webcodecs::BitrateMode;

/// Chunk type per WebCodecs spec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodedAudioChunkType {
    Key,
    Delta,
}

impl EncodedAudioChunkType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "key" => Some(EncodedAudioChunkType::Key),
            "delta" => Some(EncodedAudioChunkType::Delta),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EncodedAudioChunkType::Key => "key",
            EncodedAudioChunkType::Delta => "delta",
        }
    }
}

/// Init dictionary for EncodedAudioChunk
#[derive(Debug, Clone)]
pub struct EncodedAudioChunkInit<'a> {
    pub chunk_type: EncodedAudioChunkType,
    /// Presentation timestamp in microseconds
    pub timestamp: i64,
    pub duration: Option<i64>,
    pub data: &'a [u8],
}

/// EncodedAudioChunk - immutable encoded audio data
pub struct EncodedAudioChunk {
    inner: Arc<PacketBuffer>,
    chunk_type: EncodedAudioChunkType,
}

impl EncodedAudioChunk {
    pub fn new(init: EncodedAudioChunkInit<'_>) -> WebCodecsResult<Self> {
        if init.data.is_empty() {
            return Err(type_error("chunk data must not be empty"));
        }
        let mut packet = PacketBuffer::from_slice(init.data);
        packet.set_pts(init.timestamp);
        packet.set_dts(init.timestamp);
        packet.set_duration(init.duration);
        packet.set_key(init.chunk_type == EncodedAudioChunkType::Key);
        Ok(Self {
            inner: Arc::new(packet),
            chunk_type: init.chunk_type,
        })
    }

    /// Wrap an encoder-produced packet
    pub(crate) fn from_packet(packet: Arc<PacketBuffer>) -> Self {
        let chunk_type = if packet.is_key() {
            EncodedAudioChunkType::Key
        } else {
            EncodedAudioChunkType::Delta
        };
        Self {
            inner: packet,
            chunk_type,
        }
    }

    pub fn chunk_type(&self) -> EncodedAudioChunkType {
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

impl std::fmt::Debug for EncodedAudioChunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedAudioChunk")
            .field("type", &self.chunk_type)
            .field("timestamp", &self.timestamp())
            .field("byte_length", &self.byte_length())
            .finish()
    }
}

// ============================================================================
// Configuration dictionaries
// ============================================================================

/// AudioDecoder configuration
#[derive(Debug, Clone)]
pub struct AudioDecoderConfig {
    pub codec: String,
    pub sample_rate: u32,
    pub number_of_channels: u32,
    /// Codec-specific setup payload (e.g. AudioSpecificConfig for AAC)
    pub description: Option<Vec<u8>>,
}

impl AudioDecoderConfig {
    pub fn new(codec: impl Into<String>, sample_rate: u32, number_of_channels: u32) -> Self {
        Self {
            codec: codec.into(),
            sample_rate,
            number_of_channels,
            description: None,
        }
    }

    /// Shape validation: a config that fails here throws synchronously
    pub fn validate(&self) -> WebCodecsResult<()> {
        if self.codec.trim().is_empty() {
            return Err(type_error("codec is required"));
        }
        if self.sample_rate == 0 {
            return Err(type_error("sampleRate must be nonzero"));
        }
        if self.number_of_channels == 0 {
            return Err(type_error("numberOfChannels must be nonzero"));
        }
        Ok(())
    }
}

/// AudioEncoder configuration
#[derive(Debug, Clone)]
pub struct AudioEncoderConfig {
    pub codec: String,
    pub sample_rate: u32,
    pub number_of_channels: u32,
    /// Target bitrate in bits per second
    pub bitrate: Option<u64>,
    pub bitrate_mode: BitrateMode,
}

impl AudioEncoderConfig {
    pub fn new(codec: impl Into<String>, sample_rate: u32, number_of_channels: u32) -> Self {
        Self {
            codec: codec.into(),
            sample_rate,
            number_of_channels,
            bitrate: None,
            bitrate_mode: BitrateMode::default(),
        }
    }

    /// Shape validation: a config that fails here throws synchronously
    pub fn validate(&self) -> WebCodecsResult<()> {
        if self.codec.trim().is_empty() {
            return Err(type_error("codec is required"));
        }
        if self.sample_rate == 0 {
            return Err(type_error("sampleRate must be nonzero"));
        }
        if self.number_of_channels == 0 {
            return Err(type_error("numberOfChannels must be nonzero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_roundtrip() {
        let chunk = EncodedAudioChunk::new(EncodedAudioChunkInit {
            chunk_type: EncodedAudioChunkType::Key,
            timestamp: 21_333,
            duration: Some(21_333),
            data: &[9, 8, 7],
        })
        .unwrap();
        assert_eq!(chunk.byte_length(), 3);
        assert_eq!(chunk.duration(), Some(21_333));

        let mut out = vec![0u8; 3];
        chunk.copy_to(&mut out).unwrap();
        assert_eq!(out, vec![9, 8, 7]);
    }

    #[test]
    fn test_audio_decoder_config_validation() {
        assert!(AudioDecoderConfig::new("opus", 48_000, 2).validate().is_ok());
        assert!(AudioDecoderConfig::new("opus", 0, 2).validate().is_err());
        assert!(AudioDecoderConfig::new("opus", 48_000, 0).validate().is_err());
        assert!(AudioDecoderConfig::new("", 48_000, 2).validate().is_err());
    }

    #[test]
    fn test_audio_encoder_config_validation() {
        assert!(AudioEncoderConfig::new("opus", 48_000, 2).validate().is_ok());
        assert!(AudioEncoderConfig::new(" ", 48_000, 2).validate().is_err());
    }
}
