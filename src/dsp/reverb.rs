//! Reverb effect implementation
//!
//! Implements the Freeverb algorithm:
//! - 8 parallel comb filters for early reflections
//! - 4 series allpass filters for diffusion
//! - Stereo width control
//! - Pre-delay buffer
//!
//! The tail outlives the input, which makes this the reference stateful
//! leaf: splitting a signal across calls without a reset must give the
//! same output as one call.

use serde::{Deserialize, Serialize};

use crate::dsp::plugin::{check_channels, Plugin, ProcessSpec};
use crate::engine::AudioBuffer;
use crate::error::{PedalError, Result};
use crate::impl_plugin_common;

// ============================================================================
// Freeverb Constants
// ============================================================================

/// Reference sample rate for Freeverb delays
const REFERENCE_SAMPLE_RATE: f64 = 44100.0;

/// Comb filter delays at 44100 Hz (8 filters)
const COMB_DELAYS: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];

/// Allpass filter delays at 44100 Hz (4 filters)
const ALLPASS_DELAYS: [usize; 4] = [556, 441, 341, 225];

/// Stereo spread offset in samples (for right channel)
const STEREO_SPREAD: usize = 23;

/// Fixed gain for allpass filters (standard Freeverb value)
const ALLPASS_GAIN: f32 = 0.5;

/// Input attenuation ahead of the comb bank
const FIXED_GAIN: f32 = 0.015;

/// Scale factor for room size parameter to feedback
const ROOM_SCALE: f32 = 0.28;

/// Offset for room size parameter to feedback
const ROOM_OFFSET: f32 = 0.7;

/// Scale factor for damping parameter
const DAMP_SCALE: f32 = 0.4;

/// Maximum pre-delay time in milliseconds
const MAX_PRE_DELAY_MS: f32 = 100.0;

// ============================================================================
// Parameter Structs
// ============================================================================

/// Reverb parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbParams {
    /// Room size: 0 (tiny) to 1 (huge hall)
    pub room_size: f32,
    /// Damping: 0 (bright) to 1 (dark)
    pub damping: f32,
    /// Wet signal level: 0 to 1
    pub wet_level: f32,
    /// Dry signal level: 0 to 1
    pub dry_level: f32,
    /// Stereo width: 0 (mono) to 1 (full stereo)
    pub width: f32,
    /// Pre-delay in milliseconds: 0 to 100
    pub pre_delay_ms: f32,
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self {
            room_size: 0.5,
            damping: 0.5,
            wet_level: 0.33,
            dry_level: 0.4,
            width: 1.0,
            pre_delay_ms: 0.0,
        }
    }
}

fn check_range(param: &str, value: f32, min: f32, max: f32) -> Result<()> {
    if !(min..=max).contains(&value) {
        return Err(PedalError::InvalidParameter {
            param: param.to_string(),
            value: value.to_string(),
            expected: format!("{} to {}", min, max),
        });
    }
    Ok(())
}

impl ReverbParams {
    /// Validate all parameters are within range
    pub fn validate(&self) -> Result<()> {
        check_range("room_size", self.room_size, 0.0, 1.0)?;
        check_range("damping", self.damping, 0.0, 1.0)?;
        check_range("wet_level", self.wet_level, 0.0, 1.0)?;
        check_range("dry_level", self.dry_level, 0.0, 1.0)?;
        check_range("width", self.width, 0.0, 1.0)?;
        check_range("pre_delay_ms", self.pre_delay_ms, 0.0, MAX_PRE_DELAY_MS)
    }
}

// ============================================================================
// Filter Components
// ============================================================================

/// Low-pass feedback comb filter
#[derive(Debug, Clone)]
struct CombFilter {
    buffer: Vec<f32>,
    write_pos: usize,
    /// Buffer size mask for efficient wrapping
    mask: usize,
    delay: usize,
    /// Damping low-pass state
    filter_state: f32,
    feedback: f32,
    damp1: f32,
    damp2: f32,
}

impl CombFilter {
    fn new(delay: usize) -> Self {
        // Round up to next power of 2 for efficient wrapping
        let size = (delay + 1).next_power_of_two();
        Self {
            buffer: vec![0.0; size],
            write_pos: 0,
            mask: size - 1,
            delay,
            filter_state: 0.0,
            feedback: 0.5,
            damp1: 0.5,
            damp2: 0.5,
        }
    }

    fn set_coefficients(&mut self, feedback: f32, damp1: f32, damp2: f32) {
        self.feedback = feedback;
        self.damp1 = damp1;
        self.damp2 = damp2;
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let read_pos = (self.write_pos + self.mask + 1 - self.delay) & self.mask;
        let output = self.buffer[read_pos];

        self.filter_state = output * self.damp1 + self.filter_state * self.damp2;
        self.buffer[self.write_pos] = input + self.filter_state * self.feedback;
        self.write_pos = (self.write_pos + 1) & self.mask;

        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.filter_state = 0.0;
        self.write_pos = 0;
    }
}

/// Allpass filter for diffusion
#[derive(Debug, Clone)]
struct AllpassFilter {
    buffer: Vec<f32>,
    write_pos: usize,
    mask: usize,
    delay: usize,
}

impl AllpassFilter {
    fn new(delay: usize) -> Self {
        let size = (delay + 1).next_power_of_two();
        Self {
            buffer: vec![0.0; size],
            write_pos: 0,
            mask: size - 1,
            delay,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let read_pos = (self.write_pos + self.mask + 1 - self.delay) & self.mask;
        let delayed = self.buffer[read_pos];

        let output = delayed - ALLPASS_GAIN * input;
        self.buffer[self.write_pos] = input + ALLPASS_GAIN * output;
        self.write_pos = (self.write_pos + 1) & self.mask;

        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

/// Pre-delay line; a delay of 0 passes the input through
#[derive(Debug, Clone)]
struct PreDelayBuffer {
    buffer: Vec<f32>,
    write_pos: usize,
    mask: usize,
}

impl PreDelayBuffer {
    fn new(max_size: usize) -> Self {
        let size = (max_size + 1).next_power_of_two();
        Self {
            buffer: vec![0.0; size],
            write_pos: 0,
            mask: size - 1,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, delay_samples: usize) -> f32 {
        self.buffer[self.write_pos] = input;
        let read_pos = (self.write_pos + self.mask + 1 - delay_samples) & self.mask;
        let output = self.buffer[read_pos];
        self.write_pos = (self.write_pos + 1) & self.mask;
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

/// One channel of the reverb network
#[derive(Debug, Clone)]
struct Tank {
    pre_delay: PreDelayBuffer,
    combs: [CombFilter; 8],
    allpasses: [AllpassFilter; 4],
}

impl Tank {
    fn new(sample_rate: f64, spread: usize) -> Self {
        let scale = sample_rate / REFERENCE_SAMPLE_RATE;
        let scaled = |delay: usize| (((delay + spread) as f64 * scale) as usize).max(1);
        let max_pre_delay = (MAX_PRE_DELAY_MS as f64 / 1000.0 * sample_rate) as usize;

        Self {
            pre_delay: PreDelayBuffer::new(max_pre_delay),
            combs: std::array::from_fn(|i| CombFilter::new(scaled(COMB_DELAYS[i]))),
            allpasses: std::array::from_fn(|i| AllpassFilter::new(scaled(ALLPASS_DELAYS[i]))),
        }
    }

    fn set_coefficients(&mut self, feedback: f32, damp1: f32, damp2: f32) {
        for comb in &mut self.combs {
            comb.set_coefficients(feedback, damp1, damp2);
        }
    }

    #[inline]
    fn process(&mut self, input: f32, pre_delay_samples: usize) -> f32 {
        let delayed = self.pre_delay.process(input, pre_delay_samples);

        // Parallel combs
        let mut output: f32 = self.combs.iter_mut().map(|comb| comb.process(delayed)).sum();

        // Series allpasses
        for allpass in &mut self.allpasses {
            output = allpass.process(output);
        }
        output
    }

    fn clear(&mut self) {
        self.pre_delay.clear();
        self.combs.iter_mut().for_each(CombFilter::clear);
        self.allpasses.iter_mut().for_each(AllpassFilter::clear);
    }
}

// ============================================================================
// Main Reverb Effect
// ============================================================================

/// Freeverb-style reverb for mono or stereo audio
///
/// Preparing with more than two channels fails with `UnsupportedChannels`.
#[derive(Debug, Clone)]
pub struct Reverb {
    params: ReverbParams,
    sample_rate: f64,
    left: Tank,
    right: Tank,
    pre_delay_samples: usize,
}

impl Reverb {
    /// Create a new Reverb effect with default parameters
    pub fn new() -> Self {
        let mut reverb = Self {
            params: ReverbParams::default(),
            sample_rate: REFERENCE_SAMPLE_RATE,
            left: Tank::new(REFERENCE_SAMPLE_RATE, 0),
            right: Tank::new(REFERENCE_SAMPLE_RATE, STEREO_SPREAD),
            pre_delay_samples: 0,
        };
        reverb.update_coefficients();
        reverb
    }

    /// Create a new Reverb effect with the given parameters
    pub fn with_params(params: ReverbParams) -> Result<Self> {
        let mut reverb = Self::new();
        reverb.set_params(params)?;
        Ok(reverb)
    }

    pub fn params(&self) -> &ReverbParams {
        &self.params
    }

    /// Set parameters with validation; the tail is kept
    pub fn set_params(&mut self, params: ReverbParams) -> Result<()> {
        params.validate()?;
        self.params = params;
        self.update_coefficients();
        Ok(())
    }

    fn update_coefficients(&mut self) {
        let feedback = self.params.room_size * ROOM_SCALE + ROOM_OFFSET;
        let damp1 = 1.0 - self.params.damping * DAMP_SCALE;
        let damp2 = self.params.damping * DAMP_SCALE;

        self.left.set_coefficients(feedback, damp1, damp2);
        self.right.set_coefficients(feedback, damp1, damp2);
        self.pre_delay_samples =
            ((self.params.pre_delay_ms / 1000.0) as f64 * self.sample_rate) as usize;
    }

    fn process_mono(&mut self, buffer: &mut AudioBuffer) {
        let wet = self.params.wet_level;
        let dry = self.params.dry_level;
        let pre_delay = self.pre_delay_samples;

        for sample in buffer.channel_mut(0).iter_mut() {
            let output = self.left.process(*sample * FIXED_GAIN, pre_delay);
            *sample = *sample * dry + output * wet;
        }
    }

    fn process_stereo(&mut self, buffer: &mut AudioBuffer) {
        let dry = self.params.dry_level;
        let width = self.params.width;
        let pre_delay = self.pre_delay_samples;

        // wet1 is the same-side contribution, wet2 the cross-side one
        let wet1 = self.params.wet_level * (1.0 + width) / 2.0;
        let wet2 = self.params.wet_level * (1.0 - width) / 2.0;

        for i in 0..buffer.num_samples() {
            let input_left = buffer.channel(0)[i];
            let input_right = buffer.channel(1)[i];
            let input_mono = (input_left + input_right) * 0.5 * FIXED_GAIN;

            let output_left = self.left.process(input_mono, pre_delay);
            let output_right = self.right.process(input_mono, pre_delay);

            buffer.channel_mut(0)[i] =
                input_left * dry + output_left * wet1 + output_right * wet2;
            buffer.channel_mut(1)[i] =
                input_right * dry + output_right * wet1 + output_left * wet2;
        }
    }
}

impl Default for Reverb {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for Reverb {
    impl_plugin_common!("Reverb");

    fn prepare(&mut self, spec: &ProcessSpec) -> Result<()> {
        check_channels(self.name(), spec, 1, 2)?;
        if (spec.sample_rate - self.sample_rate).abs() > f64::EPSILON {
            self.sample_rate = spec.sample_rate;
            self.left = Tank::new(spec.sample_rate, 0);
            self.right = Tank::new(spec.sample_rate, STEREO_SPREAD);
            self.update_coefficients();
        }
        Ok(())
    }

    fn process(&mut self, buffer: &mut AudioBuffer) -> Result<()> {
        match buffer.num_channels() {
            0 => Ok(()),
            1 => {
                self.process_mono(buffer);
                Ok(())
            }
            2 => {
                self.process_stereo(buffer);
                Ok(())
            }
            channels => Err(PedalError::UnsupportedChannels {
                node: self.name().to_string(),
                channels,
            }),
        }
    }

    fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================
