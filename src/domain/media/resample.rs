//! Outbound format conversion
//!
//! Pipeline audio arrives in whatever 16-bit PCM format the synthesizer emits
//! and is split into frames of arbitrary length. Conversion is stateful: the
//! resampler keeps its fractional read position and the last input sample
//! across frames, so frame boundaries do not shift or drop samples.

use super::frame::{AudioFormat, MediaFrame};

/// Linear interpolation resampler over a continuous sample stream
#[derive(Debug, Clone)]
pub struct LinearResampler {
    /// Input samples advanced per output sample
    step: f64,
    /// Read position relative to the first buffered sample
    position: f64,
    /// Last sample of the previous chunk
    carry: Option<i16>,
}

impl LinearResampler {
    pub fn new(from_rate: u32, to_rate: u32) -> Self {
        Self {
            step: from_rate as f64 / to_rate as f64,
            position: 0.0,
            carry: None,
        }
    }

    /// Resample the next chunk of the stream
    pub fn process(&mut self, input: &[i16]) -> Vec<i16> {
        if self.step == 1.0 {
            return input.to_vec();
        }
        if input.is_empty() {
            return Vec::new();
        }

        let mut buffer = Vec::with_capacity(input.len() + 1);
        buffer.extend(self.carry);
        buffer.extend_from_slice(input);

        // An output sample needs both of its neighbours, so the last input
        // sample is held back until the next chunk arrives
        let last = (buffer.len() - 1) as f64;
        let mut output = Vec::with_capacity((input.len() as f64 / self.step) as usize + 1);
        while self.position < last {
            let index = self.position as usize;
            let frac = self.position - index as f64;
            let a = buffer[index] as f64;
            let b = buffer[index + 1] as f64;
            output.push((a + (b - a) * frac) as i16);
            self.position += self.step;
        }

        self.position -= last;
        self.carry = buffer.last().copied();
        output
    }
}

/// Converts pipeline output to [`AudioFormat::OUTBOUND`] for one session
#[derive(Debug, Default)]
pub struct OutboundConverter {
    source: Option<AudioFormat>,
    resampler: Option<LinearResampler>,
}

impl OutboundConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Downmix to mono and resample to 16 kHz
    ///
    /// Returns `None` for frames that are not 16-bit PCM or carry no sample rate.
    /// A change of source format restarts the resampler.
    pub fn convert(&mut self, frame: &MediaFrame) -> Option<MediaFrame> {
        if frame.format.bits_per_sample != 16 || frame.format.sample_rate == 0 {
            return None;
        }
        if frame.format == AudioFormat::OUTBOUND {
            self.source = Some(frame.format);
            self.resampler = None;
            return Some(frame.clone());
        }

        if self.source != Some(frame.format) {
            self.source = Some(frame.format);
            self.resampler = Some(LinearResampler::new(
                frame.format.sample_rate,
                AudioFormat::OUTBOUND.sample_rate,
            ));
        }

        let samples = frame.samples_i16()?;
        let mono = downmix(&samples, frame.format.channels);
        let resampled = match self.resampler.as_mut() {
            Some(resampler) => resampler.process(&mono),
            None => mono,
        };

        Some(MediaFrame::from_samples(AudioFormat::OUTBOUND, &resampled))
    }
}

/// Average interleaved channels into one
fn downmix(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|chunk| {
            let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}
