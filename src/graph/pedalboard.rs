//! Pedalboard: the root chain for audio effects
//!
//! Behaves like a `Chain` but refuses instruments, directly or nested, at
//! insertion time, and carries an `EngineConfig` whose default sample rate
//! is used when `process` is called without one.

use super::impl_container;
use super::node::Node;
use crate::config::EngineConfig;
use crate::engine::{self, AudioBuffer};
use crate::error::{PedalError, Result};

/// Effects-only chain with engine defaults
///
/// # Example
/// ```
/// use pedalchain::{AudioBuffer, Gain, Pedalboard, Plugin};
///
/// let board = Pedalboard::new(vec![Gain::new(-6.0).into_node()])
///     .unwrap()
///     .with_sample_rate(44100.0)
///     .unwrap();
/// let input = AudioBuffer::from_channels(vec![vec![1.0; 16]]).unwrap();
/// let output = board.process(&input, None, None, true).unwrap();
/// assert_eq!(output.num_samples(), 16);
/// ```
#[derive(Debug, Clone)]
pub struct Pedalboard {
    node: Node,
    config: EngineConfig,
}

impl Pedalboard {
    /// Create a pedalboard; fails if any node is or contains an instrument
    pub fn new(nodes: Vec<Node>) -> Result<Self> {
        Self::with_config(nodes, EngineConfig::default())
    }

    /// Create a pedalboard with explicit engine defaults
    pub fn with_config(nodes: Vec<Node>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let node = Node::chain_with("Pedalboard", nodes, true);
        node.validate_initial()?;
        Ok(Self { node, config })
    }

    /// Set the sample rate used when `process` receives none
    pub fn with_sample_rate(mut self, sample_rate: f64) -> Result<Self> {
        self.set_default_sample_rate(Some(sample_rate))?;
        Ok(self)
    }

    pub fn set_default_sample_rate(&mut self, sample_rate: Option<f64>) -> Result<()> {
        let mut config = self.config.clone();
        config.default_sample_rate = sample_rate;
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn default_sample_rate(&self) -> Option<f64> {
        self.config.default_sample_rate
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run audio through the pedalboard
    ///
    /// `sample_rate` falls back to the configured default; without either
    /// the call fails with `MissingSampleRate`.
    pub fn process(
        &self,
        input: &AudioBuffer,
        sample_rate: Option<f64>,
        buffer_size: Option<usize>,
        reset: bool,
    ) -> Result<AudioBuffer> {
        let sample_rate = sample_rate
            .or(self.config.default_sample_rate)
            .ok_or(PedalError::MissingSampleRate)?;
        engine::process_with(&self.node, input, sample_rate, buffer_size, reset, &self.config)
    }
}

impl PartialEq for Pedalboard {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

impl_container!(Pedalboard);
