//! Plugin trait definition
//!
//! The narrow interface every leaf processing unit implements. The engine
//! never looks inside a plugin; it only prepares, feeds, resets and queries
//! it through this trait.

use std::any::Any;

use crate::engine::AudioBuffer;
use crate::error::{PedalError, Result};
use crate::graph::Node;

/// Capability of a leaf: effects transform audio, instruments synthesize it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginKind {
    Effect,
    Instrument,
}

/// Processing context handed to `Plugin::prepare`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessSpec {
    pub sample_rate: f64,
    pub num_channels: usize,
    pub max_block_size: usize,
}

/// A note message with a timestamp in seconds
#[derive(Debug, Clone, PartialEq)]
pub struct NoteEvent {
    /// Raw message bytes (e.g. `[0x90, 60, 100]`)
    pub message: Vec<u8>,
    /// Seconds from the start of the render
    pub timestamp: f64,
}

impl NoteEvent {
    pub fn new(message: impl Into<Vec<u8>>, timestamp: f64) -> Self {
        Self {
            message: message.into(),
            timestamp,
        }
    }
}

impl From<(Vec<u8>, f64)> for NoteEvent {
    fn from((message, timestamp): (Vec<u8>, f64)) -> Self {
        Self { message, timestamp }
    }
}

impl<const N: usize> From<([u8; N], f64)> for NoteEvent {
    fn from((message, timestamp): ([u8; N], f64)) -> Self {
        Self {
            message: message.to_vec(),
            timestamp,
        }
    }
}

/// A note message scheduled inside one render block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedMessage<'a> {
    pub message: &'a [u8],
    /// Frame offset from the start of the block
    pub sample_offset: usize,
}

/// Base trait for all leaf processing units
///
/// # Lifecycle
/// `prepare` is called before the first block and again (followed by
/// `reset`) whenever the sample rate or channel count changes. `process`
/// then runs block by block; `reset` clears internal state without
/// touching configuration.
pub trait Plugin: Send {
    /// Human-readable name, used in error messages
    fn name(&self) -> &str;

    /// Effect or instrument
    fn kind(&self) -> PluginKind {
        PluginKind::Effect
    }

    /// Output delay in samples introduced by this plugin
    fn latency_samples(&self) -> usize {
        0
    }

    /// Fixed number of frames this plugin must be given per call, if any
    fn block_size(&self) -> Option<usize> {
        None
    }

    /// Allocate and size internal state
    ///
    /// Must fail with `UnsupportedChannels` for channel counts the plugin
    /// cannot handle, without modifying state.
    fn prepare(&mut self, spec: &ProcessSpec) -> Result<()>;

    /// Process one block in place
    ///
    /// A plugin may change the length or channel count of the buffer
    /// (variable-rate or look-ahead processing).
    fn process(&mut self, buffer: &mut AudioBuffer) -> Result<()>;

    /// Synthesize one block from note events (instruments only)
    fn render(&mut self, _events: &[TimedMessage<'_>], _buffer: &mut AudioBuffer) -> Result<()> {
        Err(PedalError::ExpectedAudio {
            node: self.name().to_string(),
        })
    }

    /// Clear internal state (delay lines, filter memory, voices)
    fn reset(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Wrap this plugin in a shareable node
    fn into_node(self) -> Node
    where
        Self: Sized + 'static,
    {
        Node::leaf(self)
    }
}

/// Helper macro to implement the boilerplate Plugin methods
#[macro_export]
macro_rules! impl_plugin_common {
    ($name:expr) => {
        fn name(&self) -> &str {
            $name
        }

        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
            self
        }
    };
}

/// Reject channel counts outside `min..=max`
pub(crate) fn check_channels(name: &str, spec: &ProcessSpec, min: usize, max: usize) -> Result<()> {
    if spec.num_channels < min || spec.num_channels > max {
        return Err(PedalError::UnsupportedChannels {
            node: name.to_string(),
            channels: spec.num_channels,
        });
    }
    Ok(())
}
