//! Audio Buffer Management
//!
//! Planar 32-bit float audio buffers used for every block that moves
//! through a node tree. A buffer keeps its channel count even when it
//! holds zero frames, so empty blocks still describe their shape.

use crate::error::{PedalError, Result};

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Non-interleaved audio buffer
///
/// The outer Vec is channels, the inner Vec is samples. All channels
/// always have the same length.
///
/// # Example
/// ```
/// use pedalchain::AudioBuffer;
///
/// let buffer = AudioBuffer::new(2, 512);
/// assert_eq!(buffer.num_channels(), 2);
/// assert_eq!(buffer.num_samples(), 512);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AudioBuffer {
    samples: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Create a silent buffer
    pub fn new(num_channels: usize, num_samples: usize) -> Self {
        Self {
            samples: vec![vec![0.0_f32; num_samples]; num_channels],
        }
    }

    /// Create a buffer from per-channel sample vectors
    ///
    /// Fails if the channels have different lengths.
    pub fn from_channels(samples: Vec<Vec<f32>>) -> Result<Self> {
        if let Some(first) = samples.first() {
            let len = first.len();
            if let Some((index, channel)) = samples
                .iter()
                .enumerate()
                .find(|(_, channel)| channel.len() != len)
            {
                return Err(PedalError::ShapeMismatch {
                    details: format!(
                        "channel {} has {} samples but channel 0 has {}",
                        index,
                        channel.len(),
                        len
                    ),
                });
            }
        }
        Ok(Self { samples })
    }

    /// Create a buffer from interleaved sample data (L, R, L, R, ...)
    pub fn from_interleaved(interleaved: &[f32], num_channels: usize) -> Result<Self> {
        if num_channels == 0 || interleaved.len() % num_channels != 0 {
            return Err(PedalError::ShapeMismatch {
                details: format!(
                    "interleaved data length {} is not divisible by channel count {}",
                    interleaved.len(),
                    num_channels
                ),
            });
        }

        let num_samples = interleaved.len() / num_channels;
        let mut samples = vec![Vec::with_capacity(num_samples); num_channels];
        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }
        Ok(Self { samples })
    }

    /// Convert the buffer to interleaved format
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut interleaved = Vec::with_capacity(self.num_channels() * self.num_samples());
        for i in 0..self.num_samples() {
            for channel in &self.samples {
                interleaved.push(channel[i]);
            }
        }
        interleaved
    }

    /// Number of channels
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.samples.len()
    }

    /// Number of samples per channel
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// True when the buffer holds no frames
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_samples() == 0
    }

    /// Immutable access to one channel
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Mutable access to one channel
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.samples[index]
    }

    /// Iterate over channels
    pub fn channels(&self) -> impl Iterator<Item = &[f32]> {
        self.samples.iter().map(|ch| ch.as_slice())
    }

    /// Iterate mutably over channels
    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        self.samples.iter_mut().map(|ch| ch.as_mut_slice())
    }

    /// Get a sample, or None if out of bounds
    #[inline]
    pub fn get_sample(&self, channel: usize, index: usize) -> Option<f32> {
        self.samples
            .get(channel)
            .and_then(|ch| ch.get(index).copied())
    }

    /// Set a sample; returns false if out of bounds
    #[inline]
    pub fn set_sample(&mut self, channel: usize, index: usize, value: f32) -> bool {
        if let Some(sample) = self.samples.get_mut(channel).and_then(|ch| ch.get_mut(index)) {
            *sample = value;
            return true;
        }
        false
    }

    /// Copy `len` frames starting at `start` into a new buffer
    ///
    /// The range is clamped to the available frames.
    pub fn slice(&self, start: usize, len: usize) -> AudioBuffer {
        let start = start.min(self.num_samples());
        let end = start.saturating_add(len).min(self.num_samples());
        AudioBuffer {
            samples: self
                .samples
                .iter()
                .map(|ch| ch[start..end].to_vec())
                .collect(),
        }
    }

    /// Append the frames of another buffer with the same channel count
    pub fn append(&mut self, other: &AudioBuffer) -> Result<()> {
        if self.num_channels() == 0 && self.is_empty() {
            self.samples = vec![Vec::new(); other.num_channels()];
        }
        if other.num_channels() != self.num_channels() {
            return Err(PedalError::ShapeMismatch {
                details: format!(
                    "cannot append {}-channel audio to a {}-channel buffer",
                    other.num_channels(),
                    self.num_channels()
                ),
            });
        }
        for (dst, src) in self.samples.iter_mut().zip(&other.samples) {
            dst.extend_from_slice(src);
        }
        Ok(())
    }

    /// Remove the first `frames` frames
    pub fn discard_front(&mut self, frames: usize) {
        let frames = frames.min(self.num_samples());
        for ch in &mut self.samples {
            ch.drain(..frames);
        }
    }

    /// Shorten the buffer to at most `frames` frames
    pub fn truncate(&mut self, frames: usize) {
        for ch in &mut self.samples {
            ch.truncate(frames);
        }
    }

    /// Add another buffer sample-by-sample
    ///
    /// Channels missing on either side count as silence; frames past the
    /// end of `self` are ignored.
    pub fn add_from(&mut self, other: &AudioBuffer) {
        for (dst, src) in self.samples.iter_mut().zip(&other.samples) {
            for (d, s) in dst.iter_mut().zip(src) {
                *d += *s;
            }
        }
    }

    /// Multiply every sample by a linear gain
    pub fn scale(&mut self, gain: f32) {
        for ch in &mut self.samples {
            for sample in ch.iter_mut() {
                *sample *= gain;
            }
        }
    }

    /// Fill every channel with silence
    pub fn clear(&mut self) {
        for ch in &mut self.samples {
            ch.fill(0.0);
        }
    }

    /// Peak absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .flat_map(|ch| ch.iter())
            .map(|s| s.abs())
            .fold(0.0_f32, f32::max)
    }

    /// RMS level in dB across all channels
    ///
    /// Returns -f32::INFINITY for empty or silent buffers.
    pub fn rms_db(&self) -> f32 {
        let total = self.num_channels() * self.num_samples();
        if total == 0 {
            return f32::NEG_INFINITY;
        }
        let sum_squares: f64 = self
            .samples
            .iter()
            .flat_map(|ch| ch.iter())
            .map(|&s| (s as f64) * (s as f64))
            .sum();
        linear_to_db((sum_squares / total as f64).sqrt() as f32)
    }

    /// True when no sample exceeds `epsilon` in magnitude
    pub fn is_silent(&self, epsilon: f32) -> bool {
        self.peak() <= epsilon
    }

    /// True when every sample is finite
    pub fn is_finite(&self) -> bool {
        self.samples.iter().flat_map(|ch| ch.iter()).all(|s| s.is_finite())
    }
}

// ============================================================================
// Tests
// ============================================================================
