//! Media frame - one chunk of PCM audio

use bytes::Bytes;

/// PCM audio format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Sample rate in Hz (e.g., 8000, 16000, 24000)
    pub sample_rate: u32,
    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Bits per sample
    pub bits_per_sample: u16,
}

impl AudioFormat {
    /// Format of every frame written to the telephony connection
    pub const OUTBOUND: AudioFormat = AudioFormat {
        sample_rate: 16_000,
        channels: 1,
        bits_per_sample: 16,
    };

    /// Samples per outbound frame (20 ms at 16 kHz)
    pub const OUTBOUND_FRAME_SAMPLES: usize = 320;

    pub fn pcm16(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample: 16,
        }
    }

    /// Get bytes per sample
    pub fn bytes_per_sample(&self) -> usize {
        (self.bits_per_sample / 8) as usize
    }

    /// Get bytes per frame (all channels)
    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_sample() * self.channels as usize
    }

    /// Byte length of one fixed-size outbound frame
    pub fn outbound_frame_bytes() -> usize {
        Self::OUTBOUND_FRAME_SAMPLES * Self::OUTBOUND.bytes_per_frame()
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::OUTBOUND
    }
}

/// Media frame
///
/// Inbound frame size is whatever the transport delivered; outbound frames are
/// cut to [`AudioFormat::OUTBOUND_FRAME_SAMPLES`] by the chunker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFrame {
    pub format: AudioFormat,
    /// Little-endian PCM
    pub payload: Bytes,
}

impl MediaFrame {
    pub fn new(format: AudioFormat, payload: impl Into<Bytes>) -> Self {
        Self {
            format,
            payload: payload.into(),
        }
    }

    /// Number of samples per channel
    pub fn sample_count(&self) -> usize {
        let per_frame = self.format.bytes_per_frame();
        if per_frame == 0 {
            0
        } else {
            self.payload.len() / per_frame
        }
    }

    /// Duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.format.sample_rate == 0 {
            return 0;
        }
        (self.sample_count() as u64 * 1000) / self.format.sample_rate as u64
    }

    /// Get audio data as signed 16-bit samples (`None` for other bit depths)
    pub fn samples_i16(&self) -> Option<Vec<i16>> {
        if self.format.bits_per_sample != 16 {
            return None;
        }
        Some(
            self.payload
                .chunks_exact(2)
                .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
                .collect(),
        )
    }

    /// Build a frame from signed 16-bit samples
    pub fn from_samples(format: AudioFormat, samples: &[i16]) -> Self {
        let mut data = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            data.extend_from_slice(&sample.to_le_bytes());
        }
        Self::new(format, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_frame_bytes() {
        assert_eq!(AudioFormat::outbound_frame_bytes(), 640);
    }

    #[test]
    fn test_sample_count_and_duration() {
        let frame = MediaFrame::new(AudioFormat::OUTBOUND, vec![0u8; 640]);
        assert_eq!(frame.sample_count(), 320);
        assert_eq!(frame.duration_ms(), 20);
    }

    #[test]
    fn test_samples_round_trip() {
        let frame = MediaFrame::from_samples(AudioFormat::OUTBOUND, &[1, -2, i16::MAX]);
        assert_eq!(frame.payload.len(), 6);
        assert_eq!(frame.samples_i16().unwrap(), vec![1, -2, i16::MAX]);
    }

    #[test]
    fn test_samples_require_16_bit() {
        let format = AudioFormat {
            sample_rate: 8_000,
            channels: 1,
            bits_per_sample: 8,
        };
        let frame = MediaFrame::new(format, vec![0u8; 160]);
        assert!(frame.samples_i16().is_none());
    }
}
