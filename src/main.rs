//! sensorstream - Command Line Entry Point
//!
//! Replays capture files through the decoding pipeline and prints the
//! decimated channel values, or generates synthetic captures to replay.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use sensorstream_rs::{
    config::{FanOutPolicy, PipelineConfig},
    generator::{CaptureGenerator, Waveform},
    pipeline::{PipelineController, PipelineListener},
    source::{LineSource, ReaderSource},
    types::{Observation, PipelineState},
};
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Pipeline configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a capture through the pipeline ("-" reads stdin)
    Replay {
        /// Capture file path
        input: PathBuf,

        /// Nominal sample rate in Hz (0 = as fast as possible)
        #[arg(short, long)]
        rate: Option<u32>,

        /// Emit one value per channel every N samples
        #[arg(short, long)]
        decimation: Option<u64>,

        /// Minimum milliseconds between values of one channel
        #[arg(long)]
        display_interval_ms: Option<u64>,

        /// What to do when a channel queue is full
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,

        /// How long the block policy waits for queue space
        #[arg(long, default_value = "5")]
        block_timeout_ms: u64,

        /// Write final statistics as JSON
        #[arg(long)]
        stats_json: Option<PathBuf>,
    },

    /// Write a synthetic capture file
    Generate {
        /// Output file path
        output: PathBuf,

        /// Number of samples to generate
        #[arg(short = 'n', long, default_value = "10000")]
        samples: u64,

        /// Frames per line
        #[arg(long, default_value = "10")]
        frames_per_line: usize,

        /// Signal shape used for every channel
        #[arg(short, long, value_enum, default_value = "sine")]
        pattern: PatternArg,

        /// Bytes inserted between frames
        #[arg(long, default_value = "")]
        filler: String,
    },

    /// Print the effective configuration as TOML
    ShowConfig,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PolicyArg {
    Drop,
    Block,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PatternArg {
    Sine,
    Sawtooth,
    Square,
    Triangle,
    Constant,
}

/// Listener that prints observations to stdout
struct ConsoleListener;

impl PipelineListener for ConsoleListener {
    fn on_processing_started(&mut self) {
        tracing::info!("Processing started");
    }

    fn on_channel_value_updated(&mut self, channel: usize, value: f64, sequence: u32) {
        println!("{}", Observation::new(channel, value, sequence));
    }

    fn on_processing_stopped(&mut self, total_samples: u64) {
        println!("Processing stopped. Total samples: {}", total_samples);
    }

    fn on_error(&mut self, message: &str) {
        eprintln!("Error: {}", message);
    }

    fn on_decoding_error(&mut self, channel: usize, message: &str) {
        tracing::warn!("Channel {} decode error: {}", channel, message);
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sensorstream_rs=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Command::Replay {
            input,
            rate,
            decimation,
            display_interval_ms,
            policy,
            block_timeout_ms,
            stats_json,
        } => {
            if let Some(rate) = rate {
                config.sample_rate_hz = rate;
            }
            if let Some(decimation) = decimation {
                config.decimation_factor = decimation;
            }
            if let Some(interval) = display_interval_ms {
                config.display_interval_ms = interval;
            }
            match policy {
                Some(PolicyArg::Drop) => config.fan_out = FanOutPolicy::Drop,
                Some(PolicyArg::Block) => {
                    config.fan_out = FanOutPolicy::Block {
                        timeout_ms: block_timeout_ms,
                    }
                }
                None => {}
            }
            replay(config, &input, stats_json.as_deref())
        }
        Command::Generate {
            output,
            samples,
            frames_per_line,
            pattern,
            filler,
        } => generate(&config, &output, samples, frames_per_line, pattern, filler),
        Command::ShowConfig => {
            config.validate()?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn open_source(input: &Path) -> anyhow::Result<Box<dyn LineSource>> {
    if input == Path::new("-") {
        return Ok(Box::new(ReaderSource::new(BufReader::new(io::stdin()))));
    }
    let source = ReaderSource::open(input)
        .with_context(|| format!("Failed to open capture {:?}", input))?;
    Ok(Box::new(source))
}

fn replay(config: PipelineConfig, input: &Path, stats_json: Option<&Path>) -> anyhow::Result<()> {
    let source = open_source(input)?;
    let mut controller = PipelineController::new(config, ConsoleListener)?;

    let stop = controller.stop_handle();
    ctrlc::set_handler(move || {
        tracing::info!("Interrupted, stopping");
        stop.trigger();
    })
    .context("Failed to install Ctrl-C handler")?;

    tracing::info!("Replaying {:?}", input);
    controller.start(source)?;
    let state = controller.wait();

    let stats = controller.stats();
    tracing::info!(
        "Read {} lines, published {} samples, average {} processed per channel",
        stats.lines_read,
        stats.samples_published,
        stats.average_processed()
    );
    for channel in &stats.channels {
        if channel.dropped > 0 || channel.decode_errors > 0 {
            tracing::warn!(
                "Channel {}: {} dropped, {} decode errors",
                channel.channel,
                channel.dropped,
                channel.decode_errors
            );
        }
    }

    if let Some(path) = stats_json {
        let file = File::create(path)
            .with_context(|| format!("Failed to create stats file {:?}", path))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &stats)
            .context("Failed to write stats")?;
    }

    if state == PipelineState::Failed {
        bail!("pipeline failed");
    }
    Ok(())
}

fn generate(
    config: &PipelineConfig,
    output: &Path,
    samples: u64,
    frames_per_line: usize,
    pattern: PatternArg,
    filler: String,
) -> anyhow::Result<()> {
    config.validate()?;
    let format = config.frame.clone();
    let half = format.reference_scale / 2.0;

    let mut generator = CaptureGenerator::new(format)
        .with_sample_rate(config.sample_rate_hz)
        .with_frames_per_line(frames_per_line)
        .with_filler(filler);

    match pattern {
        // Per-channel sines are the generator default
        PatternArg::Sine => {}
        PatternArg::Constant => {
            generator = generator.with_all_waveforms(Waveform::Constant(half));
        }
        _ => {
            for index in 0..config.frame.channel_count {
                generator = generator.with_waveform(index, periodic(pattern, index, half));
            }
        }
    }

    let file =
        File::create(output).with_context(|| format!("Failed to create {:?}", output))?;
    let lines = generator.write_to(BufWriter::new(file), samples)?;
    tracing::info!("Wrote {} samples in {} lines to {:?}", samples, lines, output);
    Ok(())
}

/// Periodic waveform for one channel, channel n at n Hz
fn periodic(pattern: PatternArg, index: usize, half: f64) -> Waveform {
    let period = 1.0 / (index + 1) as f64;
    match pattern {
        PatternArg::Sawtooth => Waveform::Sawtooth {
            period,
            amplitude: half * 1.8,
            offset: half * 0.1,
        },
        PatternArg::Square => Waveform::Square {
            period,
            amplitude: half * 0.9,
            offset: half,
        },
        PatternArg::Triangle => Waveform::Triangle {
            period,
            amplitude: half * 0.9,
            offset: half,
        },
        PatternArg::Sine | PatternArg::Constant => Waveform::Sine {
            frequency: (index + 1) as f64,
            amplitude: half * 0.9,
            offset: half,
        },
    }
}
