//! Gain Effect
//!
//! Stateless volume control with a dB-based interface.

use crate::dsp::plugin::{Plugin, ProcessSpec};
use crate::engine::buffer::db_to_linear;
use crate::engine::AudioBuffer;
use crate::error::Result;
use crate::impl_plugin_common;

// ============================================================================
// Constants
// ============================================================================

/// Minimum gain in dB (-96 dB = effectively silent)
pub const MIN_GAIN_DB: f32 = -96.0;

/// Maximum gain in dB (+24 dB)
pub const MAX_GAIN_DB: f32 = 24.0;

// ============================================================================
// Gain Effect
// ============================================================================

/// Simple gain adjustment effect
///
/// Accepts any channel count, reports no latency and keeps no state, so it
/// is the neutral element for most engine tests.
///
/// # Example
/// ```
/// use pedalchain::{AudioBuffer, Gain, Plugin};
///
/// let mut gain = Gain::new(-6.0);
/// let mut buffer = AudioBuffer::from_channels(vec![vec![1.0; 4]]).unwrap();
/// gain.process(&mut buffer).unwrap();
/// assert!((buffer.channel(0)[0] - 0.501).abs() < 0.001);
/// ```
#[derive(Debug, Clone)]
pub struct Gain {
    gain_db: f32,
    gain_linear: f32,
}

impl Gain {
    /// Create a new gain effect; `gain_db` is clamped to -96..=24 dB
    pub fn new(gain_db: f32) -> Self {
        let clamped = gain_db.clamp(MIN_GAIN_DB, MAX_GAIN_DB);
        Self {
            gain_db: clamped,
            gain_linear: db_to_linear(clamped),
        }
    }

    /// Set the gain in decibels (clamped to the valid range)
    pub fn set_gain_db(&mut self, db: f32) {
        self.gain_db = db.clamp(MIN_GAIN_DB, MAX_GAIN_DB);
        self.gain_linear = db_to_linear(self.gain_db);
    }

    /// Current gain in decibels
    pub fn gain_db(&self) -> f32 {
        self.gain_db
    }

    /// Current linear gain multiplier
    pub fn gain_linear(&self) -> f32 {
        self.gain_linear
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Plugin for Gain {
    impl_plugin_common!("Gain");

    fn prepare(&mut self, _spec: &ProcessSpec) -> Result<()> {
        self.gain_linear = db_to_linear(self.gain_db);
        Ok(())
    }

    fn process(&mut self, buffer: &mut AudioBuffer) -> Result<()> {
        // Unity gain optimization
        if (self.gain_linear - 1.0).abs() < f32::EPSILON {
            return Ok(());
        }
        buffer.scale(self.gain_linear);
        Ok(())
    }

    fn reset(&mut self) {}
}

// ============================================================================
// Tests
// ============================================================================
