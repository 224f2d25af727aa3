//! Streaming buffer adapter
//!
//! Wraps one plugin with a pending-input queue so that the frames a caller
//! happens to pass per call never decide what the plugin sees. A plugin
//! with a fixed block size gets exactly that many frames per call; any
//! other plugin gets the pending frames in pieces no larger than its
//! prepared maximum block size.

use tracing::debug;

use super::node::Node;
use crate::dsp::{Plugin, PluginKind, ProcessSpec, TimedMessage};
use crate::engine::plan::ExecContext;
use crate::engine::{AudioBuffer, FrameQueue};
use crate::error::{PedalError, Result};

pub(crate) struct LeafState {
    plugin: Box<dyn Plugin>,
    prepared: Option<ProcessSpec>,
    pending: FrameQueue,
}

impl LeafState {
    pub(crate) fn new(plugin: Box<dyn Plugin>) -> Self {
        Self {
            plugin,
            prepared: None,
            pending: FrameQueue::new(),
        }
    }

    pub(crate) fn plugin_mut(&mut self) -> &mut dyn Plugin {
        self.plugin.as_mut()
    }

    pub(crate) fn latency(&self) -> usize {
        self.plugin.latency_samples()
    }

    /// Most frames this leaf can hold back before producing output
    pub(crate) fn buffering(&self) -> usize {
        self.plugin
            .block_size()
            .map(|size| size.saturating_sub(1))
            .unwrap_or(0)
    }

    pub(crate) fn pending_frames(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn is_prepared(&self) -> bool {
        self.prepared.is_some()
    }

    /// Prepare the plugin unless it is already prepared for this sample
    /// rate and channel count
    ///
    /// Re-preparing resets the plugin and drops pending input. A failed
    /// prepare leaves the previous state in place.
    pub(crate) fn ensure_prepared(
        &mut self,
        node: &Node,
        sample_rate: f64,
        num_channels: usize,
        max_block_size: usize,
    ) -> Result<()> {
        let current = self.prepared.filter(|spec| {
            spec.sample_rate == sample_rate && spec.num_channels == num_channels
        });
        if current.is_some() {
            return Ok(());
        }

        let spec = ProcessSpec {
            sample_rate,
            num_channels,
            max_block_size: max_block_size.max(self.plugin.block_size().unwrap_or(0)),
        };
        self.plugin.prepare(&spec)?;
        self.plugin.reset();
        self.pending.clear();
        debug!(
            node = %node,
            sample_rate,
            num_channels,
            max_block_size = spec.max_block_size,
            "prepared plugin"
        );
        self.prepared = Some(spec);
        Ok(())
    }

    /// Feed audio and return whatever the plugin produced
    pub(crate) fn process(
        &mut self,
        node: &Node,
        input: AudioBuffer,
        ctx: &ExecContext,
    ) -> Result<AudioBuffer> {
        if self.plugin.kind() == PluginKind::Instrument {
            return Err(PedalError::ExpectedNotes {
                node: node.to_string(),
            });
        }
        if input.is_empty() {
            return Ok(input);
        }

        let channels = input.num_channels();
        self.ensure_prepared(node, ctx.sample_rate, channels, ctx.max_block_size)?;
        self.pending.push(&input);

        let piece = match self.plugin.block_size() {
            Some(size) if size > 0 => size,
            _ => self
                .prepared
                .map(|spec| spec.max_block_size)
                .unwrap_or(ctx.max_block_size)
                .max(1),
        };
        let exact = matches!(self.plugin.block_size(), Some(size) if size > 0);

        let mut output = AudioBuffer::new(channels, 0);
        while self.pending.len() >= piece || (!exact && !self.pending.is_empty()) {
            let mut block = self.pending.pop(piece, channels);
            self.plugin.process(&mut block)?;
            if output.is_empty() {
                output = block;
            } else {
                output.append(&block)?;
            }
        }
        Ok(output)
    }

    /// Synthesize one block from note events
    pub(crate) fn render(
        &mut self,
        node: &Node,
        events: &[TimedMessage<'_>],
        frames: usize,
        spec: &ProcessSpec,
    ) -> Result<AudioBuffer> {
        if self.plugin.kind() != PluginKind::Instrument {
            return Err(PedalError::ExpectedAudio {
                node: node.to_string(),
            });
        }
        self.ensure_prepared(node, spec.sample_rate, spec.num_channels, spec.max_block_size)?;
        let mut buffer = AudioBuffer::new(spec.num_channels, frames);
        self.plugin.render(events, &mut buffer)?;
        Ok(buffer)
    }

    pub(crate) fn reset(&mut self) {
        self.plugin.reset();
        self.pending.clear();
    }
}
