//! AudioData - WebCodecs API implementation
//!
//! Represents a buffer of decoded audio samples.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/AudioData

use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::future::ready;

use crate::codec::SampleBuffer;
use crate::webcodecs::error::{invalid_state_error, type_error, WebCodecsResult};

/// Audio sample format (WebCodecs spec)
///
/// The base formats are interleaved; the `-planar` variants store one
/// buffer per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)] // variant names mirror the spec enum strings
pub enum AudioSampleFormat {
    U8,
    S16,
    S32,
    F32,
    U8Planar,
    S16Planar,
    S32Planar,
    F32Planar,
}

impl AudioSampleFormat {
    /// Parse the WebCodecs enum string; unknown values are rejected
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "u8" => Some(AudioSampleFormat::U8),
            "s16" => Some(AudioSampleFormat::S16),
            "s32" => Some(AudioSampleFormat::S32),
            "f32" => Some(AudioSampleFormat::F32),
            "u8-planar" => Some(AudioSampleFormat::U8Planar),
            "s16-planar" => Some(AudioSampleFormat::S16Planar),
            "s32-planar" => Some(AudioSampleFormat::S32Planar),
            "f32-planar" => Some(AudioSampleFormat::F32Planar),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioSampleFormat::U8 => "u8",
            AudioSampleFormat::S16 => "s16",
            AudioSampleFormat::S32 => "s32",
            AudioSampleFormat::F32 => "f32",
            AudioSampleFormat::U8Planar => "u8-planar",
            AudioSampleFormat::S16Planar => "s16-planar",
            AudioSampleFormat::S32Planar => "s32-planar",
            AudioSampleFormat::F32Planar => "f32-planar",
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        match self {
            AudioSampleFormat::U8 | AudioSampleFormat::U8Planar => 1,
            AudioSampleFormat::S16 | AudioSampleFormat::S16Planar => 2,
            AudioSampleFormat::S32
            | AudioSampleFormat::S32Planar
            | AudioSampleFormat::F32
            | AudioSampleFormat::F32Planar => 4,
        }
    }

    pub fn is_planar(&self) -> bool {
        matches!(
            self,
            AudioSampleFormat::U8Planar
                | AudioSampleFormat::S16Planar
                | AudioSampleFormat::S32Planar
                | AudioSampleFormat::F32Planar
        )
    }
}

/// Init dictionary for building AudioData from raw samples
#[derive(Debug, Clone)]
pub struct AudioDataInit {
    pub format: AudioSampleFormat,
    pub sample_rate: u32,
    pub number_of_frames: u32,
    pub number_of_channels: u32,
    /// Presentation timestamp in microseconds
    pub timestamp: i64,
    /// Sample data: planar formats expect channel-major concatenation
    pub data: Vec<u8>,
}

/// Options for allocationSize() / copyTo()
#[derive(Debug, Clone, Default)]
pub struct AudioDataCopyToOptions {
    /// Which plane to copy (channel for planar formats; must be 0 otherwise)
    pub plane_index: u32,
    /// First frame to copy
    pub frame_offset: u32,
    /// Number of frames to copy; defaults to the rest of the buffer
    pub frame_count: Option<u32>,
}

/// AudioData - one buffer of decoded audio
///
/// A refcounted handle over an exclusive [`SampleBuffer`], with the same
/// clone/close/transfer semantics as `VideoFrame`.
pub struct AudioData {
    inner: Mutex<Option<Arc<SampleBuffer>>>,
    format: AudioSampleFormat,
    sample_rate: u32,
    number_of_frames: u32,
    number_of_channels: u32,
    timestamp: i64,
}

impl AudioData {
    /// Build from caller-supplied samples (deep copy)
    pub fn from_init(init: AudioDataInit) -> WebCodecsResult<AudioData> {
        if init.number_of_frames == 0 || init.number_of_channels == 0 {
            return Err(type_error(
                "numberOfFrames and numberOfChannels must be nonzero",
            ));
        }
        if init.sample_rate == 0 {
            return Err(type_error("sampleRate must be nonzero"));
        }

        let bytes = init.format.bytes_per_sample();
        let per_channel = init.number_of_frames as usize * bytes;
        let total = per_channel * init.number_of_channels as usize;
        if init.data.len() < total {
            return Err(type_error("data is smaller than the sample layout requires"));
        }

        let planes = if init.format.is_planar() {
            (0..init.number_of_channels as usize)
                .map(|ch| init.data[ch * per_channel..(ch + 1) * per_channel].to_vec())
                .collect()
        } else {
            vec![init.data[..total].to_vec()]
        };

        let mut buffer = SampleBuffer::from_planes(
            init.format,
            init.sample_rate,
            init.number_of_channels,
            init.number_of_frames,
            planes,
        )
        .ok_or_else(|| type_error("sample layout mismatch"))?;
        buffer.set_pts(init.timestamp);

        Ok(Self::from_decoded(Arc::new(buffer)))
    }

    /// Wrap a decoded buffer in a caller-facing handle
    pub(crate) fn from_decoded(buffer: Arc<SampleBuffer>) -> AudioData {
        AudioData {
            format: buffer.format(),
            sample_rate: buffer.sample_rate(),
            number_of_frames: buffer.frames(),
            number_of_channels: buffer.channels(),
            timestamp: buffer.pts(),
            inner: Mutex::new(Some(buffer)),
        }
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    /// Sample format; `None` once closed
    pub fn format(&self) -> Option<AudioSampleFormat> {
        self.with_inner(|_| self.format)
    }

    pub fn sample_rate(&self) -> u32 {
        self.with_inner(|_| self.sample_rate).unwrap_or(0)
    }

    pub fn number_of_frames(&self) -> u32 {
        self.with_inner(|_| self.number_of_frames).unwrap_or(0)
    }

    pub fn number_of_channels(&self) -> u32 {
        self.with_inner(|_| self.number_of_channels).unwrap_or(0)
    }

    /// Presentation timestamp in microseconds; survives close
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Duration in microseconds, derived from frame count and sample rate
    pub fn duration(&self) -> i64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.number_of_frames as i64 * 1_000_000) / self.sample_rate as i64
    }

    pub fn is_detached(&self) -> bool {
        self.inner.lock().unwrap().is_none()
    }

    // ========================================================================
    // Data Access
    // ========================================================================

    /// Bytes needed by copyTo() for the given options
    pub fn allocation_size(&self, options: &AudioDataCopyToOptions) -> WebCodecsResult<usize> {
        let _ = self.require_inner()?;
        let (frames, _) = self.resolve_range(options)?;
        let per_frame = if self.format.is_planar() {
            self.format.bytes_per_sample()
        } else {
            self.format.bytes_per_sample() * self.number_of_channels as usize
        };
        Ok(frames as usize * per_frame)
    }

    /// Copy samples from one plane into `dest`
    pub fn copy_to(
        &self,
        dest: &mut [u8],
        options: &AudioDataCopyToOptions,
    ) -> impl Future<Output = WebCodecsResult<()>> {
        ready(self.copy_to_sync(dest, options))
    }

    fn copy_to_sync(
        &self,
        dest: &mut [u8],
        options: &AudioDataCopyToOptions,
    ) -> WebCodecsResult<()> {
        let buffer = self.require_inner()?;
        let (frames, offset_frames) = self.resolve_range(options)?;

        let per_frame = if self.format.is_planar() {
            self.format.bytes_per_sample()
        } else {
            self.format.bytes_per_sample() * self.number_of_channels as usize
        };
        let needed = frames as usize * per_frame;
        if dest.len() < needed {
            return Err(type_error("destination buffer too small"));
        }

        let src = buffer
            .plane_data(options.plane_index as usize)
            .ok_or_else(|| type_error("planeIndex out of range"))?;
        let start = offset_frames as usize * per_frame;
        dest[..needed].copy_from_slice(&src[start..start + needed]);
        Ok(())
    }

    fn resolve_range(&self, options: &AudioDataCopyToOptions) -> WebCodecsResult<(u32, u32)> {
        let plane_count = if self.format.is_planar() {
            self.number_of_channels
        } else {
            1
        };
        if options.plane_index >= plane_count {
            return Err(type_error("planeIndex out of range"));
        }
        if options.frame_offset >= self.number_of_frames {
            return Err(type_error("frameOffset out of range"));
        }
        let available = self.number_of_frames - options.frame_offset;
        let frames = options.frame_count.unwrap_or(available);
        if frames > available {
            return Err(type_error("frameCount out of range"));
        }
        Ok((frames, options.frame_offset))
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Create an independent handle referencing the same samples
    pub fn try_clone(&self) -> WebCodecsResult<AudioData> {
        let inner = self.inner.lock().unwrap();
        let Some(buffer) = inner.as_ref() else {
            return Err(invalid_state_error("AudioData is closed"));
        };
        Ok(AudioData {
            inner: Mutex::new(Some(Arc::clone(buffer))),
            format: self.format,
            sample_rate: self.sample_rate,
            number_of_frames: self.number_of_frames,
            number_of_channels: self.number_of_channels,
            timestamp: self.timestamp,
        })
    }

    /// Move the underlying reference into a fresh handle, detaching this one
    pub fn transfer(&self) -> WebCodecsResult<AudioData> {
        let buffer = {
            let mut inner = self.inner.lock().unwrap();
            inner
                .take()
                .ok_or_else(|| invalid_state_error("AudioData is closed"))?
        };
        Ok(AudioData {
            inner: Mutex::new(Some(buffer)),
            format: self.format,
            sample_rate: self.sample_rate,
            number_of_frames: self.number_of_frames,
            number_of_channels: self.number_of_channels,
            timestamp: self.timestamp,
        })
    }

    /// Release this handle's reference; idempotent
    pub fn close(&self) {
        self.inner.lock().unwrap().take();
    }

    /// Inner buffer reference for the encode path (refcount bump, no copy)
    pub(crate) fn buffer_ref(&self) -> WebCodecsResult<Arc<SampleBuffer>> {
        self.require_inner()
    }

    fn require_inner(&self) -> WebCodecsResult<Arc<SampleBuffer>> {
        self
            .inner
            .lock()
            .unwrap()
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| invalid_state_error("AudioData is closed"))
    }

    fn with_inner<T>(&self, f: impl FnOnce(&Arc<SampleBuffer>) -> T) -> Option<T> {
        self.inner.lock().unwrap().as_ref().map(f)
    }
}

impl std::fmt::Debug for AudioData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioData")
            .field("format", &self.format)
            .field("sample_rate", &self.sample_rate)
            .field("number_of_frames", &self.number_of_frames)
            .field("number_of_channels", &self.number_of_channels)
            .field("timestamp", &self.timestamp)
            .field("detached", &self.is_detached())
            .finish()
    }
}
