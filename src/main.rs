//! Pedalchain CLI
//!
//! Renders audio through a preset tree and reports tree latency.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pedalchain::engine::{generate_noise, read_wav, write_wav};
use pedalchain::{EngineConfig, NodeSpec};

/// Pedalchain - streaming audio effect trees
#[derive(Parser, Debug)]
#[command(name = "pedalchain")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Engine configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process audio through a preset and write a WAV file
    Render {
        /// Preset file (JSON)
        #[arg(short, long)]
        preset: PathBuf,

        /// Input WAV file; white noise is used when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Sample rate for generated noise (input files use their own)
        #[arg(long, default_value_t = 44100)]
        sample_rate: u32,

        /// Frames per processing chunk
        #[arg(long)]
        buffer_size: Option<usize>,

        /// Channel count for generated noise
        #[arg(long, default_value_t = 2)]
        channels: usize,

        /// Length of generated noise in seconds
        #[arg(long, default_value_t = 2.0)]
        duration: f64,

        /// Seed for generated noise
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Output bit depth (16, 24 or 32)
        #[arg(long, default_value_t = 32)]
        bit_depth: u16,
    },

    /// Print the latency of a preset in samples
    Latency {
        /// Preset file (JSON)
        #[arg(short, long)]
        preset: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Render {
            preset,
            input,
            output,
            sample_rate,
            buffer_size,
            channels,
            duration,
            seed,
            bit_depth,
        } => {
            let (audio, sample_rate) = match input {
                Some(path) => read_wav(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                None => {
                    if channels == 0 || duration.is_nan() || duration <= 0.0 {
                        bail!("noise needs at least one channel and a positive duration");
                    }
                    let frames = (duration * sample_rate as f64).round() as usize;
                    (generate_noise(channels, frames, seed), sample_rate)
                }
            };
            render(&preset, &output, audio, sample_rate, buffer_size, bit_depth, config)
        }
        Commands::Latency { preset } => {
            let node = load_preset(&preset)?.build()?;
            println!("{}", node.latency_samples()?);
            Ok(())
        }
    }
}

fn load_preset(path: &Path) -> Result<NodeSpec> {
    NodeSpec::from_file(path).with_context(|| format!("failed to load preset {}", path.display()))
}

fn render(
    preset: &Path,
    output: &Path,
    audio: pedalchain::AudioBuffer,
    sample_rate: u32,
    buffer_size: Option<usize>,
    bit_depth: u16,
    config: EngineConfig,
) -> Result<()> {
    let board = load_preset(preset)?.build_pedalboard(config)?;
    info!(
        frames = audio.num_samples(),
        channels = audio.num_channels(),
        sample_rate,
        latency = board.latency_samples()?,
        "rendering {}",
        preset.display()
    );

    let processed = board.process(&audio, Some(sample_rate as f64), buffer_size, true)?;
    write_wav(&processed, output, sample_rate, bit_depth)
        .with_context(|| format!("failed to write {}", output.display()))?;

    info!(peak = processed.peak(), "wrote {}", output.display());
    Ok(())
}
