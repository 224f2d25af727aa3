//! Pedalchain - Streaming Audio Effect Composition
//!
//! Pedalchain builds trees of audio processing units and streams audio
//! through them:
//! 1. Leaves wrap a [`Plugin`] (an effect or an instrument)
//! 2. [`Chain`] runs nodes one after another
//! 3. [`Mix`] runs nodes side by side and sums them, compensating latency
//! 4. [`Pedalboard`] is a root chain that only accepts effects
//!
//! # Guarantees
//!
//! - Output does not depend on how the input is split into buffers
//! - Effect state carries over between calls unless a reset is requested
//! - One effect instance may be shared by trees running on different
//!   threads without deadlock or corruption
//!
//! # Example
//! ```
//! use pedalchain::{mix, AudioBuffer, Delay, Gain, Pedalboard, Plugin};
//!
//! let board = Pedalboard::new(vec![
//!     Gain::new(-6.0).into_node(),
//!     mix![Delay::new(64).into_node(), Gain::new(0.0).into_node()].into(),
//! ])
//! .unwrap();
//!
//! let input = AudioBuffer::from_channels(vec![vec![0.5; 1024]; 2]).unwrap();
//! let output = board.process(&input, Some(44100.0), Some(256), true).unwrap();
//! assert_eq!(output.num_samples(), 1024);
//! ```

pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod graph;
pub mod preset;

pub use config::EngineConfig;
pub use dsp::{
    Delay, Gain, NoteEvent, Plugin, PluginKind, ProcessSpec, Reverb, ReverbParams, SineSynth,
    TimedMessage,
};
pub use engine::{db_to_linear, linear_to_db, process, render, AudioBuffer};
pub use error::{ErrorKind, PedalError, Result};
pub use graph::{Chain, Mix, Node, NodeId, Pedalboard};
pub use preset::NodeSpec;
