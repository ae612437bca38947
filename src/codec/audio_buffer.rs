//! Owned storage for one decoded audio buffer
//!
//! The backend-facing counterpart of `AudioData`: per-channel (planar) or
//! single interleaved sample storage plus rate/channel/timing metadata.
//!
//! Different audio codecs emit different frame sizes per buffer:
//! - AAC: 1024 samples
//! - MP3: 1152 samples
//! - Opus: 120, 240, 480, 960, 1920, or 2880 samples
//! - FLAC/Vorbis: variable

use crate::webcodecs::AudioSampleFormat;

/// Owned decoded-audio buffer
pub struct SampleBuffer {
    format: AudioSampleFormat,
    sample_rate: u32,
    channels: u32,
    frames: u32,
    pts: i64,
    /// One buffer per channel for planar formats, a single interleaved buffer otherwise
    planes: Vec<Vec<u8>>,
}

impl SampleBuffer {
    /// Allocate a zeroed buffer for `frames` samples per channel
    pub fn alloc(format: AudioSampleFormat, sample_rate: u32, channels: u32, frames: u32) -> Self {
        let bytes = format.bytes_per_sample();
        let planes = if format.is_planar() {
            (0..channels)
                .map(|_| vec![0u8; frames as usize * bytes])
                .collect()
        } else {
            vec![vec![0u8; frames as usize * channels as usize * bytes]]
        };

        Self {
            format,
            sample_rate,
            channels,
            frames,
            pts: 0,
            planes,
        }
    }

    /// Build a buffer from caller-supplied plane storage
    ///
    /// Plane count must match the format layout (`channels` planes for planar
    /// formats, exactly one otherwise) and every plane must hold `frames`
    /// samples.
    pub fn from_planes(
        format: AudioSampleFormat,
        sample_rate: u32,
        channels: u32,
        frames: u32,
        planes: Vec<Vec<u8>>,
    ) -> Option<Self> {
        let bytes = format.bytes_per_sample();
        if format.is_planar() {
            if planes.len() != channels as usize {
                return None;
            }
            if planes.iter().any(|p| p.len() < frames as usize * bytes) {
                return None;
            }
        } else {
            if planes.len() != 1 {
                return None;
            }
            if planes[0].len() < frames as usize * channels as usize * bytes {
                return None;
            }
        }

        Some(Self {
            format,
            sample_rate,
            channels,
            frames,
            pts: 0,
            planes,
        })
    }

    #[inline]
    pub fn format(&self) -> AudioSampleFormat {
        self.format
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// Samples per channel
    #[inline]
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Presentation timestamp (microseconds)
    #[inline]
    pub fn pts(&self) -> i64 {
        self.pts
    }

    #[inline]
    pub fn set_pts(&mut self, pts: i64) {
        self.pts = pts;
    }

    /// Duration in microseconds, derived from frame count and sample rate
    pub fn duration_us(&self) -> i64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.frames as i64 * 1_000_000) / self.sample_rate as i64
    }

    /// Number of storage planes (channels for planar formats, 1 otherwise)
    #[inline]
    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    pub fn plane_data(&self, index: usize) -> Option<&[u8]> {
        self.planes.get(index).map(|p| p.as_slice())
    }

    pub fn plane_data_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        self.planes.get_mut(index).map(|p| p.as_mut_slice())
    }
}

impl std::fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("format", &self.format)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("frames", &self.frames)
            .field("pts", &self.pts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_planar() {
        let buf = SampleBuffer::alloc(AudioSampleFormat::F32Planar, 48_000, 2, 960);
        assert_eq!(buf.plane_count(), 2);
        assert_eq!(buf.plane_data(0).unwrap().len(), 960 * 4);
        assert_eq!(buf.duration_us(), 20_000);
    }

    #[test]
    fn test_alloc_interleaved() {
        let buf = SampleBuffer::alloc(AudioSampleFormat::S16, 44_100, 2, 1024);
        assert_eq!(buf.plane_count(), 1);
        assert_eq!(buf.plane_data(0).unwrap().len(), 1024 * 2 * 2);
    }

    #[test]
    fn test_from_planes_plane_count_mismatch() {
        let planes = vec![vec![0u8; 960 * 4]];
        assert!(
            SampleBuffer::from_planes(AudioSampleFormat::F32Planar, 48_000, 2, 960, planes)
                .is_none()
        );
    }
}
