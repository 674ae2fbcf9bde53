//! # sensorstream-rs: Fixed-Rate Multi-Channel Stream Decoder
//!
//! Replays a captured (or live) line-oriented stream of hex-encoded,
//! multi-channel sensor frames at a nominal sample rate, decodes every
//! channel in parallel, and reports a decimated, rate-limited view of each
//! channel to a single listener.
//!
//! ## Architecture
//!
//! - **Parser**: Splits each line into a timestamp and any number of frames,
//!   skipping malformed ones
//! - **Pipeline**: An ingestion thread paces samples and fans them out to
//!   one bounded queue per channel; one worker per channel decimates and
//!   throttles; a dispatcher thread serializes notifications
//! - **Communication**: Crossbeam channels between every pair of threads
//!
//! ## Configuration
//!
//! Everything the pipeline does is driven by [`PipelineConfig`], loadable
//! from TOML. Defaults replay 4 channels of 24-bit readings at 1 kHz with
//! one observation per channel every 100 samples.
//!
//! ## Example
//!
//! ```ignore
//! use sensorstream_rs::{
//!     config::PipelineConfig,
//!     pipeline::{PipelineController, PipelineListener},
//!     source::ReaderSource,
//! };
//!
//! struct Printer;
//!
//! impl PipelineListener for Printer {
//!     fn on_channel_value_updated(&mut self, channel: usize, value: f64, sequence: u32) {
//!         println!("Ch{}: {:.4} V (Sample #{})", channel, value, sequence);
//!     }
//! }
//!
//! let mut controller = PipelineController::new(PipelineConfig::default(), Printer)?;
//! controller.start(ReaderSource::open("capture.txt")?)?;
//! controller.wait();
//! ```

pub mod config;
pub mod error;
pub mod generator;
pub mod parser;
pub mod pipeline;
pub mod source;
pub mod types;

// Re-export commonly used types
pub use config::{FanOutPolicy, FrameFormat, PipelineConfig};
pub use error::{DecoderError, Result};
pub use parser::FrameParser;
pub use pipeline::{PipelineController, PipelineEvent, PipelineListener, StopSignal};
pub use source::{LineSource, MemorySource, ReaderSource};
pub use types::{Observation, PipelineState, PipelineStats, Sample};
