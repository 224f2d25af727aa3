//! Stream driver
//!
//! Top-level `process` and `render` calls. A call splits its input into
//! chunks, re-snapshots the tree before every chunk, pushes the chunk
//! through the snapshot and trims the tree's latency from the front of the
//! stream. All processing locks the call needs are taken before the first
//! chunk and kept until the call returns; if an edit between chunks brings
//! in nodes the call has not locked, every lock is released and the union
//! is re-acquired in id order.

use tracing::{debug, trace, warn};

use super::lock::merge_rosters;
use super::plan::{ExecContext, Plan};
use super::{AudioBuffer, LockSet};
use crate::config::{validate_sample_rate, EngineConfig};
use crate::dsp::{NoteEvent, ProcessSpec, TimedMessage};
use crate::error::{PedalError, Result};
use crate::graph::Node;

/// Position of the latency trim in the output stream of a root node
#[derive(Debug, Default)]
pub(crate) struct StreamCursor {
    /// Frames still to drop; unset until the first chunk after a reset
    pending_trim: Option<usize>,
}

impl StreamCursor {
    pub(crate) fn reset(&mut self) {
        self.pending_trim = None;
    }

    /// Drop leading frames until `latency` frames have been dropped since
    /// the last reset
    pub(crate) fn trim(&mut self, latency: usize, output: &mut AudioBuffer) {
        let remaining = self.pending_trim.get_or_insert(latency);
        let dropped = (*remaining).min(output.num_samples());
        output.discard_front(dropped);
        *remaining -= dropped;
    }
}

/// Push `input` through `node` using the default configuration
///
/// With `reset` the tree is cleared first and the returned buffer holds
/// exactly as many frames as `input`: the tail still inside the tree is
/// flushed with silence. Without `reset` the call continues the previous
/// stream, so successive outputs concatenate to the latency-compensated
/// stream and a single output may be shorter or longer than its input.
pub fn process(
    node: &Node,
    input: &AudioBuffer,
    sample_rate: f64,
    buffer_size: Option<usize>,
    reset: bool,
) -> Result<AudioBuffer> {
    process_with(node, input, sample_rate, buffer_size, reset, &EngineConfig::default())
}

/// Push `input` through `node` using `config` for missing arguments
pub fn process_with(
    node: &Node,
    input: &AudioBuffer,
    sample_rate: f64,
    buffer_size: Option<usize>,
    reset: bool,
    config: &EngineConfig,
) -> Result<AudioBuffer> {
    validate_sample_rate(sample_rate)?;
    let buffer_size = buffer_size.unwrap_or(config.default_buffer_size);
    if buffer_size == 0 {
        return Err(PedalError::InvalidBufferSize { buffer_size });
    }
    if input.num_channels() == 0 {
        return Err(PedalError::ShapeMismatch {
            details: "input audio has no channels".to_string(),
        });
    }
    if let Some(instrument) = node.find_instrument() {
        return Err(PedalError::ExpectedNotes {
            node: instrument.to_string(),
        });
    }

    let ctx = ExecContext {
        sample_rate,
        max_block_size: buffer_size,
    };
    let mut stream = Stream::new(input, ctx, reset, config.max_depth);
    let mut roster = Plan::snapshot(node, config.max_depth)?.nodes();

    loop {
        let uncovered = {
            let locks = LockSet::acquire(&roster);
            stream.run(node, &locks)?
        };
        match uncovered {
            None => break,
            Some(extra) => {
                roster = merge_rosters(&roster, &extra);
                debug!(node = %node, locked = roster.len(), "tree changed mid-call; relocking");
            }
        }
    }
    Ok(stream.finish())
}

/// State of one `process` call across relocks
struct Stream<'i> {
    input: &'i AudioBuffer,
    ctx: ExecContext,
    reset_pending: bool,
    flush: bool,
    max_depth: usize,
    /// Input frames consumed so far
    position: usize,
    output: AudioBuffer,
    /// Silence frames fed during the flush since the last produced frame
    starved: usize,
}

impl<'i> Stream<'i> {
    fn new(input: &'i AudioBuffer, ctx: ExecContext, reset: bool, max_depth: usize) -> Self {
        Self {
            input,
            ctx,
            reset_pending: reset,
            flush: reset,
            max_depth,
            position: 0,
            output: AudioBuffer::new(input.num_channels(), 0),
            starved: 0,
        }
    }

    /// Process chunks until the stream is done or the tree grew past
    /// `locks`; in the latter case the full node list is returned
    fn run(&mut self, node: &Node, locks: &LockSet<'_>) -> Result<Option<Vec<Node>>> {
        let total = self.input.num_samples();
        let chunk_size = self.ctx.max_block_size;

        loop {
            let plan = Plan::snapshot(node, self.max_depth)?;
            if !plan.covered_by(locks) {
                return Ok(Some(plan.nodes()));
            }
            if self.reset_pending {
                plan.reset(locks)?;
                self.reset_pending = false;
            }
            plan.prime(self.input.num_channels(), &self.ctx, locks)?;

            let flushing = self.position >= total;
            let chunk = if !flushing {
                let chunk = self.input.slice(self.position, chunk_size);
                self.position += chunk.num_samples();
                chunk
            } else if self.flush && self.output.num_samples() < total {
                AudioBuffer::new(self.input.num_channels(), chunk_size)
            } else {
                return Ok(None);
            };
            let fed = chunk.num_samples();
            trace!(node = %node, frames = fed, flushing, "processing chunk");

            let mut produced = plan.execute(chunk, &self.ctx, locks)?;
            let latency = plan.latency(locks)?;
            locks
                .state(node)?
                .try_borrow_mut()
                .map_err(|_| PedalError::ProcessingError {
                    reason: format!("{} was re-entered while it was processing", node),
                })?
                .cursor
                .trim(latency, &mut produced);

            if flushing {
                if produced.is_empty() {
                    self.starved += fed;
                    let limit = latency + plan.buffering(locks)? + 2 * chunk_size;
                    if self.starved > limit {
                        return Err(PedalError::ProcessingError {
                            reason: format!(
                                "{} produced no output after {} frames of silence",
                                node, self.starved
                            ),
                        });
                    }
                } else {
                    self.starved = 0;
                }
            }

            if self.output.is_empty() {
                self.output = produced;
            } else {
                self.output.append(&produced)?;
            }
        }
    }

    fn finish(mut self) -> AudioBuffer {
        if self.flush {
            self.output.truncate(self.input.num_samples());
        }
        self.output
    }
}

/// Render note events through an instrument using the default configuration
pub fn render(
    node: &Node,
    events: &[NoteEvent],
    duration: f64,
    sample_rate: f64,
    num_channels: usize,
    buffer_size: Option<usize>,
    reset: bool,
) -> Result<AudioBuffer> {
    render_with(
        node,
        events,
        duration,
        sample_rate,
        num_channels,
        buffer_size,
        reset,
        &EngineConfig::default(),
    )
}

/// Check ordering and range of note timestamps
fn validate_events(events: &[NoteEvent]) -> Result<()> {
    let mut previous: Option<f64> = None;
    for (index, event) in events.iter().enumerate() {
        let timestamp = event.timestamp;
        if !timestamp.is_finite() || timestamp < 0.0 {
            return Err(PedalError::InvalidTimestamp { index, timestamp });
        }
        if let Some(previous) = previous.filter(|&previous| timestamp < previous) {
            return Err(PedalError::UnorderedEvents {
                index,
                timestamp,
                previous,
            });
        }
        previous = Some(timestamp);
    }
    Ok(())
}

/// Render `duration` seconds of audio from an instrument leaf
///
/// Events at or after the end of the rendered span are dropped.
#[allow(clippy::too_many_arguments)]
pub fn render_with(
    node: &Node,
    events: &[NoteEvent],
    duration: f64,
    sample_rate: f64,
    num_channels: usize,
    buffer_size: Option<usize>,
    reset: bool,
    config: &EngineConfig,
) -> Result<AudioBuffer> {
    if !node.is_leaf() || !node.is_instrument() {
        return Err(PedalError::ExpectedAudio {
            node: node.to_string(),
        });
    }
    validate_sample_rate(sample_rate)?;
    if !duration.is_finite() || duration < 0.0 {
        return Err(PedalError::InvalidParameter {
            param: "duration".to_string(),
            value: duration.to_string(),
            expected: "finite, non-negative seconds".to_string(),
        });
    }
    if duration > sample_rate {
        return Err(PedalError::SwappedArguments {
            node: node.to_string(),
            duration,
            sample_rate,
        });
    }
    if num_channels == 0 {
        return Err(PedalError::InvalidParameter {
            param: "num_channels".to_string(),
            value: num_channels.to_string(),
            expected: "at least 1".to_string(),
        });
    }
    let buffer_size = buffer_size.unwrap_or(config.default_buffer_size);
    if buffer_size == 0 {
        return Err(PedalError::InvalidBufferSize { buffer_size });
    }
    validate_events(events)?;

    let total = (duration * sample_rate).round() as usize;
    let mut scheduled: Vec<(usize, &[u8])> = Vec::with_capacity(events.len());
    for event in events {
        let offset = (event.timestamp * sample_rate).round() as usize;
        if offset >= total {
            warn!(
                node = %node,
                timestamp = event.timestamp,
                duration,
                "dropping note event past the end of the render"
            );
            continue;
        }
        scheduled.push((offset, event.message.as_slice()));
    }

    let roster = vec![node.clone()];
    let locks = LockSet::acquire(&roster);
    let mut state = locks
        .state(node)?
        .try_borrow_mut()
        .map_err(|_| PedalError::ProcessingError {
            reason: format!("{} was re-entered while it was rendering", node),
        })?;
    if reset {
        state.reset();
    }

    let spec = ProcessSpec {
        sample_rate,
        num_channels,
        max_block_size: buffer_size,
    };
    let leaf = state.leaf_mut(node)?;
    let mut output = AudioBuffer::new(num_channels, 0);
    let mut next = 0;
    let mut start = 0;
    while start < total {
        let frames = buffer_size.min(total - start);
        let end = start + frames;
        let mut block_events = Vec::new();
        while let Some(&(offset, message)) = scheduled.get(next).filter(|(offset, _)| *offset < end) {
            block_events.push(TimedMessage {
                message,
                sample_offset: offset - start,
            });
            next += 1;
        }
        trace!(node = %node, frames, events = block_events.len(), "rendering block");
        let block = leaf.render(node, &block_events, frames, &spec)?;
        output.append(&block)?;
        start = end;
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{Delay, Gain, Plugin, SineSynth};

    fn ramp(len: usize) -> AudioBuffer {
        AudioBuffer::from_channels(vec![(0..len).map(|i| i as f32).collect()]).unwrap()
    }

    #[test]
    fn test_cursor_trims_once() {
        let mut cursor = StreamCursor::default();
        let mut first = ramp(3);
        cursor.trim(5, &mut first);
        assert!(first.is_empty());
        let mut second = ramp(4);
        cursor.trim(5, &mut second);
        assert_eq!(second.channel(0), &[2.0, 3.0]);
        let mut third = ramp(2);
        cursor.trim(5, &mut third);
        assert_eq!(third.num_samples(), 2);
    }

    #[test]
    fn test_reset_output_matches_input_length() {
        let delay = Delay::new(100).into_node();
        let input = ramp(1000);
        let out = process(&delay, &input, 44100.0, Some(64), true).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_rejects_bad_arguments() {
        let gain = Gain::new(0.0).into_node();
        let input = ramp(10);
        assert!(matches!(
            process(&gain, &input, 0.0, None, true),
            Err(PedalError::InvalidSampleRate { .. })
        ));
        assert!(matches!(
            process(&gain, &input, 44100.0, Some(0), true),
            Err(PedalError::InvalidBufferSize { .. })
        ));
        assert!(matches!(
            process(&gain, &AudioBuffer::default(), 44100.0, None, true),
            Err(PedalError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_instrument_rejects_audio() {
        let synth = SineSynth::new().into_node();
        let err = process(&synth, &ramp(10), 44100.0, None, true).unwrap_err();
        assert!(matches!(err, PedalError::ExpectedNotes { .. }));
    }

    #[test]
    fn test_render_validation() {
        let synth = SineSynth::new().into_node();
        assert!(matches!(
            render(&synth, &[], 44100.0, 2.0, 1, None, true),
            Err(PedalError::SwappedArguments { .. })
        ));
        let unordered = [
            NoteEvent::new([0x90, 60, 100], 0.5),
            NoteEvent::new([0x80, 60, 0], 0.1),
        ];
        assert!(matches!(
            render(&synth, &unordered, 1.0, 44100.0, 1, None, true),
            Err(PedalError::UnorderedEvents { index: 1, .. })
        ));
        let negative = [NoteEvent::new([0x90, 60, 100], -1.0)];
        assert!(matches!(
            render(&synth, &negative, 1.0, 44100.0, 1, None, true),
            Err(PedalError::InvalidTimestamp { index: 0, .. })
        ));

        let gain = Gain::new(0.0).into_node();
        assert!(matches!(
            render(&gain, &[], 1.0, 44100.0, 1, None, true),
            Err(PedalError::ExpectedAudio { .. })
        ));
    }

    #[test]
    fn test_render_length_and_late_events() {
        let synth = SineSynth::new().into_node();
        let events = [
            NoteEvent::new([0x90, 69, 100], 0.0),
            NoteEvent::new([0x90, 72, 100], 5.0),
        ];
        let out = render(&synth, &events, 0.5, 8000.0, 2, Some(512), true).unwrap();
        assert_eq!(out.num_samples(), 4000);
        assert_eq!(out.num_channels(), 2);
        assert!(!out.is_silent(1e-3));
    }
}
