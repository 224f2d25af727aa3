//! Delay Effect
//!
//! Pure integer-sample delay that reports its delay as latency. Inside a
//! tree the engine compensates for it, so a delayed branch lines up with
//! undelayed siblings and the top-level output lines up with the input.

use crate::dsp::plugin::{Plugin, ProcessSpec};
use crate::engine::AudioBuffer;
use crate::error::Result;
use crate::impl_plugin_common;

/// Fixed sample delay with one circular buffer per channel
#[derive(Debug, Clone)]
pub struct Delay {
    /// Delay in samples; also the reported latency
    delay_samples: usize,
    /// Circular buffers, one per channel, each `delay_samples` long
    buffers: Vec<Vec<f32>>,
    /// Shared read/write position in the circular buffers
    write_pos: usize,
}

impl Delay {
    /// Create a delay of `delay_samples` samples
    pub fn new(delay_samples: usize) -> Self {
        Self {
            delay_samples,
            buffers: Vec::new(),
            write_pos: 0,
        }
    }

    /// Create a delay from a time in milliseconds at a given sample rate
    pub fn from_ms(delay_ms: f64, sample_rate: f64) -> Self {
        let samples = (delay_ms.max(0.0) * sample_rate / 1000.0).round() as usize;
        Self::new(samples)
    }

    /// Delay in samples
    pub fn delay_samples(&self) -> usize {
        self.delay_samples
    }

    /// Change the delay; clears the delay line
    pub fn set_delay_samples(&mut self, delay_samples: usize) {
        self.delay_samples = delay_samples;
        let num_channels = self.buffers.len();
        self.resize_buffers(num_channels);
    }

    fn resize_buffers(&mut self, num_channels: usize) {
        self.buffers = vec![vec![0.0; self.delay_samples]; num_channels];
        self.write_pos = 0;
    }
}

impl Plugin for Delay {
    impl_plugin_common!("Delay");

    fn latency_samples(&self) -> usize {
        self.delay_samples
    }

    fn prepare(&mut self, spec: &ProcessSpec) -> Result<()> {
        self.resize_buffers(spec.num_channels);
        Ok(())
    }

    fn process(&mut self, buffer: &mut AudioBuffer) -> Result<()> {
        if self.delay_samples == 0 {
            return Ok(());
        }
        if self.buffers.len() < buffer.num_channels() {
            self.buffers
                .resize(buffer.num_channels(), vec![0.0; self.delay_samples]);
        }

        let size = self.delay_samples;
        let start = self.write_pos;
        for (channel, line) in buffer.channels_mut().zip(self.buffers.iter_mut()) {
            let mut pos = start;
            for sample in channel.iter_mut() {
                let delayed = line[pos];
                line[pos] = *sample;
                *sample = delayed;
                pos += 1;
                if pos == size {
                    pos = 0;
                }
            }
        }
        self.write_pos = (start + buffer.num_samples()) % size;
        Ok(())
    }

    fn reset(&mut self) {
        for line in &mut self.buffers {
            line.fill(0.0);
        }
        self.write_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared(delay: usize, channels: usize) -> Delay {
        let mut d = Delay::new(delay);
        d.prepare(&ProcessSpec {
            sample_rate: 44100.0,
            num_channels: channels,
            max_block_size: 64,
        })
        .unwrap();
        d
    }

    #[test]
    fn test_delay_shifts_signal() {
        let mut delay = prepared(3, 1);
        let mut buffer = AudioBuffer::from_channels(vec![vec![1.0, 2.0, 3.0, 4.0, 5.0]]).unwrap();
        delay.process(&mut buffer).unwrap();
        assert_eq!(buffer.channel(0), &[0.0, 0.0, 0.0, 1.0, 2.0]);

        let mut next = AudioBuffer::new(1, 3);
        delay.process(&mut next).unwrap();
        assert_eq!(next.channel(0), &[3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_delay_reports_latency() {
        assert_eq!(Delay::new(128).latency_samples(), 128);
        assert_eq!(Delay::from_ms(10.0, 48000.0).latency_samples(), 480);
    }

    #[test]
    fn test_zero_delay_is_passthrough() {
        let mut delay = prepared(0, 2);
        let mut buffer = AudioBuffer::from_channels(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let original = buffer.clone();
        delay.process(&mut buffer).unwrap();
        assert_eq!(buffer, original);
    }

    #[test]
    fn test_block_split_matches_single_block() {
        let input: Vec<f32> = (0..50).map(|i| i as f32).collect();

        let mut whole = prepared(7, 1);
        let mut expected = AudioBuffer::from_channels(vec![input.clone()]).unwrap();
        whole.process(&mut expected).unwrap();

        let mut split = prepared(7, 1);
        let mut collected = Vec::new();
        for piece in input.chunks(3) {
            let mut block = AudioBuffer::from_channels(vec![piece.to_vec()]).unwrap();
            split.process(&mut block).unwrap();
            collected.extend_from_slice(block.channel(0));
        }
        assert_eq!(collected, expected.channel(0));
    }

    #[test]
    fn test_reset_clears_line() {
        let mut delay = prepared(2, 1);
        let mut buffer = AudioBuffer::from_channels(vec![vec![1.0, 1.0]]).unwrap();
        delay.process(&mut buffer).unwrap();
        delay.reset();

        let mut silence = AudioBuffer::new(1, 2);
        delay.process(&mut silence).unwrap();
        assert!(silence.is_silent(0.0));
    }
}
