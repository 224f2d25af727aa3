//! Mix: parallel composition
//!
//! Every branch receives the same input. Branch outputs are delayed so that
//! they line up with the slowest branch, then summed channel-wise. Only
//! frames that every branch has produced are released.

use tracing::debug;

use super::impl_container;
use super::node::{Node, NodeId};
use crate::engine::{self, AudioBuffer, FrameQueue};
use crate::error::Result;

/// Branches processed side by side and summed
///
/// Latency is that of the slowest branch; faster branches are delayed to
/// match before summation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mix {
    node: Node,
}

impl Mix {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            node: Node::mix_with("Mix", nodes),
        }
    }

    /// Run audio through the mix; see [`engine::process`]
    pub fn process(
        &self,
        input: &AudioBuffer,
        sample_rate: f64,
        buffer_size: Option<usize>,
        reset: bool,
    ) -> Result<AudioBuffer> {
        engine::process(&self.node, input, sample_rate, buffer_size, reset)
    }
}

impl Default for Mix {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl_container!(Mix);

/// Output of one branch for one chunk
pub(crate) struct BranchOutput {
    pub branch: NodeId,
    pub latency: usize,
    pub audio: AudioBuffer,
}

/// Alignment queue for one branch
struct Lane {
    branch: NodeId,
    latency: usize,
    queue: FrameQueue,
}

/// Processing state of a Mix node
#[derive(Default)]
pub(crate) struct MixState {
    lanes: Vec<Lane>,
}

impl MixState {
    pub(crate) fn reset(&mut self) {
        self.lanes.clear();
    }

    fn matches(&self, outputs: &[BranchOutput]) -> bool {
        self.lanes.len() == outputs.len()
            && self
                .lanes
                .iter()
                .zip(outputs)
                .all(|(lane, out)| lane.branch == out.branch && lane.latency == out.latency)
    }

    /// Rebuild alignment queues; each lane starts with the silence that
    /// makes up its latency deficit
    fn realign(&mut self, node: &Node, outputs: &[BranchOutput]) {
        if !self.lanes.is_empty() {
            let dropped = self.lanes.iter().map(|lane| lane.queue.len()).max().unwrap_or(0);
            debug!(mix = %node, branches = outputs.len(), dropped, "realigning mix branches");
        }
        let target = outputs.iter().map(|out| out.latency).max().unwrap_or(0);
        self.lanes = outputs
            .iter()
            .map(|out| {
                let mut queue = FrameQueue::new();
                queue.push_silence(target - out.latency);
                Lane {
                    branch: out.branch,
                    latency: out.latency,
                    queue,
                }
            })
            .collect();
    }

    /// Sum aligned branch outputs
    ///
    /// `num_channels` and `num_frames` describe the chunk given to the mix;
    /// a mix without branches answers with silence of that shape.
    pub(crate) fn combine(
        &mut self,
        node: &Node,
        outputs: Vec<BranchOutput>,
        num_channels: usize,
        num_frames: usize,
    ) -> AudioBuffer {
        if outputs.is_empty() {
            self.lanes.clear();
            return AudioBuffer::new(num_channels, num_frames);
        }
        if !self.matches(&outputs) {
            self.realign(node, &outputs);
        }

        for (lane, out) in self.lanes.iter_mut().zip(&outputs) {
            lane.queue.push(&out.audio);
        }

        let ready = self.lanes.iter().map(|lane| lane.queue.len()).min().unwrap_or(0);
        let channels = self
            .lanes
            .iter()
            .map(|lane| lane.queue.num_channels())
            .chain(outputs.iter().map(|out| out.audio.num_channels()))
            .max()
            .filter(|&channels| channels > 0)
            .unwrap_or(num_channels);

        let mut mixed = AudioBuffer::new(channels, ready);
        for lane in &mut self.lanes {
            let block = lane.queue.pop(ready, channels);
            mixed.add_from(&block);
        }
        mixed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{Gain, Plugin};

    fn mono(samples: &[f32]) -> AudioBuffer {
        AudioBuffer::from_channels(vec![samples.to_vec()]).unwrap()
    }

    fn output(branch: &Node, latency: usize, audio: AudioBuffer) -> BranchOutput {
        BranchOutput {
            branch: branch.id(),
            latency,
            audio,
        }
    }

    #[test]
    fn test_empty_mix_is_silence() {
        let node = Gain::new(0.0).into_node();
        let mut state = MixState::default();
        let out = state.combine(&node, Vec::new(), 2, 16);
        assert_eq!(out.num_channels(), 2);
        assert_eq!(out.num_samples(), 16);
        assert!(out.is_silent(0.0));
    }

    #[test]
    fn test_latency_deficit_is_prefilled() {
        let node = Gain::new(0.0).into_node();
        let a = Gain::new(0.0).into_node();
        let b = Gain::new(0.0).into_node();
        let mut state = MixState::default();

        // Branch a is undelayed, branch b reports two samples of latency
        let out = state.combine(
            &node,
            vec![
                output(&a, 0, mono(&[1.0, 2.0, 3.0, 4.0])),
                output(&b, 2, mono(&[0.0, 0.0, 1.0, 2.0])),
            ],
            1,
            4,
        );
        assert_eq!(out.channel(0), &[0.0, 0.0, 2.0, 4.0]);

        let out = state.combine(
            &node,
            vec![
                output(&a, 0, mono(&[5.0, 6.0])),
                output(&b, 2, mono(&[3.0, 4.0])),
            ],
            1,
            2,
        );
        assert_eq!(out.channel(0), &[6.0, 8.0]);
    }

    #[test]
    fn test_releases_only_common_frames() {
        let node = Gain::new(0.0).into_node();
        let a = Gain::new(0.0).into_node();
        let b = Gain::new(0.0).into_node();
        let mut state = MixState::default();

        let out = state.combine(
            &node,
            vec![output(&a, 0, mono(&[1.0; 8])), output(&b, 0, mono(&[1.0; 3]))],
            1,
            8,
        );
        assert_eq!(out.num_samples(), 3);

        let out = state.combine(
            &node,
            vec![output(&a, 0, mono(&[])), output(&b, 0, mono(&[1.0; 5]))],
            1,
            0,
        );
        assert_eq!(out.channel(0), &[2.0; 5]);
    }

    #[test]
    fn test_missing_channels_sum_as_zero() {
        let node = Gain::new(0.0).into_node();
        let a = Gain::new(0.0).into_node();
        let b = Gain::new(0.0).into_node();
        let mut state = MixState::default();
        let stereo = AudioBuffer::from_channels(vec![vec![1.0, 1.0], vec![2.0, 2.0]]).unwrap();

        let out = state.combine(
            &node,
            vec![output(&a, 0, stereo), output(&b, 0, mono(&[0.5, 0.5]))],
            2,
            2,
        );
        assert_eq!(out.num_channels(), 2);
        assert_eq!(out.channel(0), &[1.5, 1.5]);
        assert_eq!(out.channel(1), &[2.0, 2.0]);
    }
}
