//! Sine synthesizer
//!
//! Minimal polyphonic instrument: one sine voice per held note with a
//! short linear release. Note-on is status 0x9n with non-zero velocity;
//! note-off is 0x8n, or 0x9n with velocity 0. Other messages are ignored.

use std::f64::consts::TAU;

use crate::dsp::plugin::{Plugin, PluginKind, ProcessSpec, TimedMessage};
use crate::engine::AudioBuffer;
use crate::error::{PedalError, Result};
use crate::impl_plugin_common;

/// Peak amplitude of a full-velocity voice
const VOICE_LEVEL: f32 = 0.2;

/// Release time in milliseconds
const RELEASE_MS: f64 = 5.0;

const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;

fn note_to_hz(note: u8) -> f64 {
    440.0 * 2.0_f64.powf((note as f64 - 69.0) / 12.0)
}

#[derive(Debug, Clone)]
struct Voice {
    note: u8,
    phase: f64,
    increment: f64,
    level: f32,
    /// Remaining release samples once the note is released
    release: Option<usize>,
}

impl Voice {
    #[inline]
    fn next(&mut self, release_samples: usize) -> f32 {
        let envelope = match self.release {
            Some(remaining) => remaining as f32 / release_samples.max(1) as f32,
            None => 1.0,
        };
        let sample = (self.phase * TAU).sin() as f32 * self.level * envelope;
        self.phase = (self.phase + self.increment).fract();
        if let Some(remaining) = self.release.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        sample
    }

    fn finished(&self) -> bool {
        self.release == Some(0)
    }
}

/// Polyphonic sine instrument
#[derive(Debug, Clone)]
pub struct SineSynth {
    sample_rate: f64,
    release_samples: usize,
    voices: Vec<Voice>,
}

impl SineSynth {
    pub fn new() -> Self {
        let sample_rate = 44100.0;
        Self {
            sample_rate,
            release_samples: (RELEASE_MS / 1000.0 * sample_rate) as usize,
            voices: Vec::new(),
        }
    }

    /// Number of voices currently sounding (including releasing ones)
    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    fn handle(&mut self, message: &[u8]) {
        let (status, note, velocity) = match message {
            [status, note, velocity, ..] => (status & 0xF0, *note, *velocity),
            _ => return,
        };
        match status {
            NOTE_ON if velocity > 0 => {
                self.voices.push(Voice {
                    note,
                    phase: 0.0,
                    increment: note_to_hz(note) / self.sample_rate,
                    level: VOICE_LEVEL * velocity as f32 / 127.0,
                    release: None,
                });
            }
            NOTE_ON | NOTE_OFF => {
                let release = self.release_samples;
                for voice in self
                    .voices
                    .iter_mut()
                    .filter(|v| v.note == note && v.release.is_none())
                {
                    voice.release = Some(release);
                }
            }
            _ => {}
        }
    }
}

impl Default for SineSynth {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for SineSynth {
    impl_plugin_common!("SineSynth");

    fn kind(&self) -> PluginKind {
        PluginKind::Instrument
    }

    fn prepare(&mut self, spec: &ProcessSpec) -> Result<()> {
        self.sample_rate = spec.sample_rate;
        self.release_samples = (RELEASE_MS / 1000.0 * spec.sample_rate) as usize;
        Ok(())
    }

    fn process(&mut self, _buffer: &mut AudioBuffer) -> Result<()> {
        Err(PedalError::ExpectedNotes {
            node: self.name().to_string(),
        })
    }

    fn render(&mut self, events: &[TimedMessage<'_>], buffer: &mut AudioBuffer) -> Result<()> {
        let mut pending = events.iter().peekable();
        let release_samples = self.release_samples;

        for i in 0..buffer.num_samples() {
            while let Some(event) = pending.next_if(|e| e.sample_offset <= i) {
                self.handle(event.message);
            }

            let sample: f32 = self
                .voices
                .iter_mut()
                .map(|voice| voice.next(release_samples))
                .sum();
            self.voices.retain(|voice| !voice.finished());

            for ch in buffer.channels_mut() {
                ch[i] = sample;
            }
        }

        // Events past the block end still take effect for the next block
        for event in pending {
            self.handle(event.message);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.voices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared() -> SineSynth {
        let mut synth = SineSynth::new();
        synth
            .prepare(&ProcessSpec {
                sample_rate: 44100.0,
                num_channels: 2,
                max_block_size: 512,
            })
            .unwrap();
        synth
    }

    #[test]
    fn test_silent_without_notes() {
        let mut synth = prepared();
        let mut buffer = AudioBuffer::new(2, 256);
        synth.render(&[], &mut buffer).unwrap();
        assert!(buffer.is_silent(0.0));
    }

    #[test]
    fn test_note_starts_at_offset() {
        let mut synth = prepared();
        let on = [0x90, 69, 127];
        let events = [TimedMessage {
            message: &on,
            sample_offset: 100,
        }];
        let mut buffer = AudioBuffer::new(1, 256);
        synth.render(&events, &mut buffer).unwrap();

        assert!(buffer.slice(0, 101).is_silent(0.0));
        assert!(!buffer.slice(101, 155).is_silent(1e-4));
        assert_eq!(synth.active_voices(), 1);
    }

    #[test]
    fn test_note_off_releases_voice() {
        let mut synth = prepared();
        let on = [0x90, 60, 100];
        let off = [0x80, 60, 0];
        let events = [
            TimedMessage {
                message: &on,
                sample_offset: 0,
            },
            TimedMessage {
                message: &off,
                sample_offset: 10,
            },
        ];
        let mut buffer = AudioBuffer::new(1, 1024);
        synth.render(&events, &mut buffer).unwrap();
        assert_eq!(synth.active_voices(), 0);
        assert!(buffer.slice(512, 512).is_silent(0.0));
    }

    #[test]
    fn test_velocity_zero_is_note_off() {
        let mut synth = prepared();
        synth.handle(&[0x90, 64, 90]);
        synth.handle(&[0x90, 64, 0]);
        assert!(synth.voices.iter().all(|v| v.release.is_some()));
    }

    #[test]
    fn test_rejects_audio() {
        let mut synth = prepared();
        let err = synth.process(&mut AudioBuffer::new(1, 4)).unwrap_err();
        assert!(matches!(err, PedalError::ExpectedNotes { .. }));
    }
}
