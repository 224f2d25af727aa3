//! Shared helpers for the integration test suites

#![allow(dead_code)]

use std::collections::VecDeque;

use approx::relative_eq;
use pedalchain::engine::generate_noise;
use pedalchain::{impl_plugin_common, AudioBuffer, PedalError, Plugin, ProcessSpec};

pub const SAMPLE_RATE: f64 = 44100.0;

/// One second of stereo white noise
pub fn noise() -> AudioBuffer {
    generate_noise(2, SAMPLE_RATE as usize, 42)
}

/// Assert that two buffers match within a relative tolerance
pub fn assert_close(actual: &AudioBuffer, expected: &AudioBuffer, rtol: f32) {
    assert_eq!(actual.num_channels(), expected.num_channels(), "channel count");
    assert_eq!(actual.num_samples(), expected.num_samples(), "frame count");
    for (ch, (a, e)) in actual.channels().zip(expected.channels()).enumerate() {
        for (i, (&x, &y)) in a.iter().zip(e).enumerate() {
            assert!(
                relative_eq!(x, y, epsilon = 1e-6, max_relative = rtol),
                "channel {} frame {}: {} vs {}",
                ch,
                i,
                x,
                y
            );
        }
    }
}

/// Copy of `buffer` with every sample multiplied by `factor`
pub fn scaled(buffer: &AudioBuffer, factor: f32) -> AudioBuffer {
    let mut out = buffer.clone();
    out.scale(factor);
    out
}

/// Low-pass filter that only accepts blocks of exactly `block` frames
///
/// Fails the call if the engine ever hands it a different block length.
pub struct FixedBlock {
    block: usize,
    memory: Vec<f32>,
}

impl FixedBlock {
    pub fn new(block: usize) -> Self {
        Self {
            block,
            memory: Vec::new(),
        }
    }
}

impl Plugin for FixedBlock {
    impl_plugin_common!("FixedBlock");

    fn block_size(&self) -> Option<usize> {
        Some(self.block)
    }

    fn prepare(&mut self, spec: &ProcessSpec) -> pedalchain::Result<()> {
        self.memory = vec![0.0; spec.num_channels];
        Ok(())
    }

    fn process(&mut self, buffer: &mut AudioBuffer) -> pedalchain::Result<()> {
        if buffer.num_samples() != self.block {
            return Err(PedalError::ProcessingError {
                reason: format!("expected {} frames, got {}", self.block, buffer.num_samples()),
            });
        }
        for (channel, memory) in buffer.channels_mut().zip(self.memory.iter_mut()) {
            for sample in channel.iter_mut() {
                *memory = 0.5 * *sample + 0.5 * *memory;
                *sample = *memory;
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.memory.iter_mut().for_each(|m| *m = 0.0);
    }
}

/// Keeps every other frame of the stream, counted from the last reset
pub struct Decimator {
    position: usize,
}

impl Decimator {
    pub fn new() -> Self {
        Self { position: 0 }
    }
}

impl Plugin for Decimator {
    impl_plugin_common!("Decimator");

    fn prepare(&mut self, _spec: &ProcessSpec) -> pedalchain::Result<()> {
        Ok(())
    }

    fn process(&mut self, buffer: &mut AudioBuffer) -> pedalchain::Result<()> {
        let start = self.position;
        let kept: Vec<Vec<f32>> = buffer
            .channels()
            .map(|channel| {
                channel
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| (start + i) % 2 == 0)
                    .map(|(_, s)| *s)
                    .collect()
            })
            .collect();
        self.position += buffer.num_samples();
        *buffer = AudioBuffer::from_channels(kept)?;
        Ok(())
    }

    fn reset(&mut self) {
        self.position = 0;
    }
}

/// Look-ahead stage whose latency (one millisecond) is only known once the
/// sample rate arrives in `prepare`
pub struct Lookahead {
    latency: usize,
    lines: Vec<VecDeque<f32>>,
}

impl Lookahead {
    pub fn new() -> Self {
        Self {
            latency: 0,
            lines: Vec::new(),
        }
    }

    fn fill(&mut self, num_channels: usize) {
        self.lines = vec![std::iter::repeat(0.0).take(self.latency).collect(); num_channels];
    }
}

impl Plugin for Lookahead {
    impl_plugin_common!("Lookahead");

    fn latency_samples(&self) -> usize {
        self.latency
    }

    fn prepare(&mut self, spec: &ProcessSpec) -> pedalchain::Result<()> {
        self.latency = (spec.sample_rate / 1000.0).round() as usize;
        self.fill(spec.num_channels);
        Ok(())
    }

    fn process(&mut self, buffer: &mut AudioBuffer) -> pedalchain::Result<()> {
        for (channel, line) in buffer.channels_mut().zip(self.lines.iter_mut()) {
            for sample in channel.iter_mut() {
                line.push_back(*sample);
                *sample = line.pop_front().unwrap_or(0.0);
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        let num_channels = self.lines.len();
        self.fill(num_channels);
    }
}
