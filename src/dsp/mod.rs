//! Leaf processing units
//!
//! The `Plugin` trait every leaf implements, plus a few reference leaves
//! that make the engine usable on its own.

mod delay;
mod gain;
pub mod plugin;
mod reverb;
mod synth;

pub use delay::Delay;
pub use gain::{Gain, MAX_GAIN_DB, MIN_GAIN_DB};
pub use plugin::{NoteEvent, Plugin, PluginKind, ProcessSpec, TimedMessage};
pub use reverb::{Reverb, ReverbParams};
pub use synth::SineSynth;
