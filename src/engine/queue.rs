//! Pending-frame queue
//!
//! FIFO of planar frames used wherever a producer and a consumer disagree
//! about block sizes: the pending input of a leaf and the per-branch output
//! lanes of a mix. The queue widens itself when audio with more channels
//! arrives; earlier frames read back as silence on the new channels.

use std::collections::VecDeque;

use super::buffer::AudioBuffer;

/// Planar FIFO of audio frames
#[derive(Debug, Clone, Default)]
pub struct FrameQueue {
    channels: Vec<VecDeque<f32>>,
    len: usize,
}

impl FrameQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames currently queued
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no frames are queued
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Widest channel count seen since the last clear
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Drop all frames and forget the channel count
    pub fn clear(&mut self) {
        self.channels.clear();
        self.len = 0;
    }

    fn widen(&mut self, num_channels: usize) {
        while self.channels.len() < num_channels {
            self.channels.push(std::iter::repeat(0.0).take(self.len).collect());
        }
    }

    /// Queue every frame of `buffer`
    pub fn push(&mut self, buffer: &AudioBuffer) {
        self.widen(buffer.num_channels());
        let frames = buffer.num_samples();
        for (ch, lane) in self.channels.iter_mut().enumerate() {
            if ch < buffer.num_channels() {
                lane.extend(buffer.channel(ch).iter().copied());
            } else {
                lane.extend(std::iter::repeat(0.0).take(frames));
            }
        }
        self.len += frames;
    }

    /// Queue `frames` frames of silence
    pub fn push_silence(&mut self, frames: usize) {
        for lane in &mut self.channels {
            lane.extend(std::iter::repeat(0.0).take(frames));
        }
        self.len += frames;
    }

    /// Dequeue up to `frames` frames as a buffer with `num_channels` channels
    ///
    /// Channels the queue never saw come back silent; channels beyond
    /// `num_channels` are dropped from the returned block.
    pub fn pop(&mut self, frames: usize, num_channels: usize) -> AudioBuffer {
        let frames = frames.min(self.len);
        let mut out = AudioBuffer::new(num_channels, frames);
        for (ch, lane) in self.channels.iter_mut().enumerate() {
            let drained = lane.drain(..frames);
            if ch < num_channels {
                for (dst, src) in out.channel_mut(ch).iter_mut().zip(drained) {
                    *dst = src;
                }
            }
        }
        self.len -= frames;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_order() {
        let mut queue = FrameQueue::new();
        queue.push(&AudioBuffer::from_channels(vec![vec![1.0, 2.0, 3.0]]).unwrap());
        queue.push(&AudioBuffer::from_channels(vec![vec![4.0]]).unwrap());
        assert_eq!(queue.len(), 4);

        let head = queue.pop(3, 1);
        assert_eq!(head.channel(0), &[1.0, 2.0, 3.0]);
        let rest = queue.pop(10, 1);
        assert_eq!(rest.channel(0), &[4.0]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_silence_before_first_push() {
        let mut queue = FrameQueue::new();
        queue.push_silence(2);
        queue.push(&AudioBuffer::from_channels(vec![vec![5.0], vec![6.0]]).unwrap());

        let out = queue.pop(3, 2);
        assert_eq!(out.channel(0), &[0.0, 0.0, 5.0]);
        assert_eq!(out.channel(1), &[0.0, 0.0, 6.0]);
    }

    #[test]
    fn test_widening_pads_earlier_frames() {
        let mut queue = FrameQueue::new();
        queue.push(&AudioBuffer::from_channels(vec![vec![1.0]]).unwrap());
        queue.push(&AudioBuffer::from_channels(vec![vec![2.0], vec![3.0]]).unwrap());
        assert_eq!(queue.num_channels(), 2);

        let out = queue.pop(2, 2);
        assert_eq!(out.channel(0), &[1.0, 2.0]);
        assert_eq!(out.channel(1), &[0.0, 3.0]);
    }

    #[test]
    fn test_pop_extra_channels_are_silent() {
        let mut queue = FrameQueue::new();
        queue.push(&AudioBuffer::from_channels(vec![vec![1.0, 1.0]]).unwrap());
        let out = queue.pop(2, 3);
        assert_eq!(out.num_channels(), 3);
        assert_eq!(out.channel(2), &[0.0, 0.0]);
    }
}
