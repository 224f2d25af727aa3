//! Audio file I/O
//!
//! WAV import/export through `hound`, plus test-signal generators used by
//! the CLI and the test suites.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::buffer::AudioBuffer;
use crate::error::{PedalError, Result};

/// Read a WAV file into a planar float buffer
///
/// Returns the audio and the file's sample rate. Integer formats of 8, 16,
/// 24 and 32 bits and 32-bit float are accepted.
pub fn read_wav(path: &Path) -> Result<(AudioBuffer, u32)> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, hound::Error>>()?,
        (SampleFormat::Int, bits @ (8 | 16 | 24 | 32)) => {
            let scale = 1.0 / (1_i64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<Vec<f32>, hound::Error>>()?
        }
        (format, bits) => {
            return Err(PedalError::ShapeMismatch {
                details: format!("unsupported WAV format: {:?} with {} bits", format, bits),
            })
        }
    };

    let buffer = AudioBuffer::from_interleaved(&samples, channels)?;
    Ok((buffer, spec.sample_rate))
}

/// Write a buffer as a WAV file
///
/// `bit_depth` 32 writes float samples; 16 and 24 write clamped integers.
pub fn write_wav(buffer: &AudioBuffer, path: &Path, sample_rate: u32, bit_depth: u16) -> Result<()> {
    if !matches!(bit_depth, 16 | 24 | 32) {
        return Err(PedalError::InvalidParameter {
            param: "bit_depth".to_string(),
            value: bit_depth.to_string(),
            expected: "16, 24 or 32".to_string(),
        });
    }
    let spec = WavSpec {
        channels: buffer.num_channels() as u16,
        sample_rate,
        bits_per_sample: bit_depth,
        sample_format: if bit_depth == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };

    let mut writer = WavWriter::create(path, spec)?;
    let interleaved = buffer.to_interleaved();
    match bit_depth {
        16 => {
            for sample in interleaved {
                writer.write_sample((sample * 32767.0).clamp(-32768.0, 32767.0) as i16)?;
            }
        }
        24 => {
            for sample in interleaved {
                // 24-bit stored as i32 in hound
                writer.write_sample((sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32)?;
            }
        }
        _ => {
            for sample in interleaved {
                writer.write_sample(sample)?;
            }
        }
    }
    writer.finalize()?;
    Ok(())
}

/// Uniform white noise in [-1, 1) from a fixed seed
pub fn generate_noise(num_channels: usize, num_samples: usize, seed: u64) -> AudioBuffer {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut buffer = AudioBuffer::new(num_channels, num_samples);
    for channel in buffer.channels_mut() {
        for sample in channel.iter_mut() {
            *sample = rng.gen_range(-1.0..1.0);
        }
    }
    buffer
}

/// Sine wave on every channel
pub fn generate_test_tone(
    frequency: f32,
    num_channels: usize,
    num_samples: usize,
    sample_rate: f64,
) -> AudioBuffer {
    let angular_freq = std::f64::consts::TAU * frequency as f64 / sample_rate;
    let mut buffer = AudioBuffer::new(num_channels, num_samples);
    for channel in buffer.channels_mut() {
        for (i, sample) in channel.iter_mut().enumerate() {
            *sample = (angular_freq * i as f64).sin() as f32;
        }
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_is_deterministic() {
        let a = generate_noise(2, 256, 7);
        let b = generate_noise(2, 256, 7);
        assert_eq!(a, b);
        assert!(a.peak() <= 1.0);
        assert_ne!(a, generate_noise(2, 256, 8));
    }

    #[test]
    fn test_wav_roundtrip_float() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.wav");
        let original = generate_noise(2, 1000, 1);

        write_wav(&original, &path, 48000, 32).unwrap();
        let (loaded, sample_rate) = read_wav(&path).unwrap();
        assert_eq!(sample_rate, 48000);
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_wav_16_bit_is_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let original = generate_test_tone(440.0, 1, 512, 44100.0);

        write_wav(&original, &path, 44100, 16).unwrap();
        let (loaded, _) = read_wav(&path).unwrap();
        for (a, b) in loaded.channel(0).iter().zip(original.channel(0)) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_rejects_unknown_bit_depth() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.wav");
        let result = write_wav(&AudioBuffer::new(1, 4), &path, 44100, 12);
        assert!(result.is_err());
    }
}
