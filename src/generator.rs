//! Synthetic capture generator
//!
//! Produces capture files in the wire format the parser reads, so the
//! pipeline can be exercised without hardware. Each channel follows its own
//! [`Waveform`].
//!
//! # Example
//!
//! ```ignore
//! use sensorstream_rs::config::FrameFormat;
//! use sensorstream_rs::generator::{CaptureGenerator, Waveform};
//!
//! let generator = CaptureGenerator::new(FrameFormat::default())
//!     .with_waveform(0, Waveform::Constant(1.0))
//!     .with_frames_per_line(10);
//!
//! let file = std::fs::File::create("capture.txt")?;
//! generator.write_to(std::io::BufWriter::new(file), 10_000)?;
//! ```

use crate::config::FrameFormat;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::io::{self, Write};

/// Shape of a generated channel signal, in volts over time in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Waveform {
    /// Fixed value
    Constant(f64),
    /// Sine wave
    Sine {
        frequency: f64,
        amplitude: f64,
        offset: f64,
    },
    /// Ramp from `offset` to `offset + amplitude`, then reset
    Sawtooth {
        period: f64,
        amplitude: f64,
        offset: f64,
    },
    /// Alternates between `offset + amplitude` and `offset - amplitude`
    Square {
        period: f64,
        amplitude: f64,
        offset: f64,
    },
    /// Linear rise and fall between `offset - amplitude` and `offset + amplitude`
    Triangle {
        period: f64,
        amplitude: f64,
        offset: f64,
    },
}

impl Waveform {
    /// Value at `t` seconds
    pub fn value_at(&self, t: f64) -> f64 {
        match *self {
            Waveform::Constant(v) => v,
            Waveform::Sine {
                frequency,
                amplitude,
                offset,
            } => offset + amplitude * (2.0 * PI * frequency * t).sin(),
            Waveform::Sawtooth {
                period,
                amplitude,
                offset,
            } => offset + amplitude * (phase(t, period) / period),
            Waveform::Square {
                period,
                amplitude,
                offset,
            } => {
                if phase(t, period) < period / 2.0 {
                    offset + amplitude
                } else {
                    offset - amplitude
                }
            }
            Waveform::Triangle {
                period,
                amplitude,
                offset,
            } => {
                let half = period / 2.0;
                let t = phase(t, period);
                if t < half {
                    offset + amplitude * (2.0 * t / half - 1.0)
                } else {
                    offset + amplitude * (1.0 - 2.0 * (t - half) / half)
                }
            }
        }
    }

    /// Sine centred in the ADC range, at `frequency` Hz
    pub fn centred_sine(format: &FrameFormat, frequency: f64) -> Self {
        let half = format.reference_scale / 2.0;
        Waveform::Sine {
            frequency,
            amplitude: half * 0.9,
            offset: half,
        }
    }
}

fn phase(t: f64, period: f64) -> f64 {
    if period > 0.0 {
        t.rem_euclid(period)
    } else {
        0.0
    }
}

/// Writer of synthetic capture lines
#[derive(Debug, Clone)]
pub struct CaptureGenerator {
    format: FrameFormat,
    waveforms: Vec<Waveform>,
    sample_rate_hz: u32,
    frames_per_line: usize,
    start_timestamp: u64,
    filler: String,
}

impl CaptureGenerator {
    /// Create a generator with one centred sine per channel, channel `n` at `n` Hz
    pub fn new(format: FrameFormat) -> Self {
        let waveforms = (0..format.channel_count)
            .map(|i| Waveform::centred_sine(&format, (i + 1) as f64))
            .collect();
        Self {
            format,
            waveforms,
            sample_rate_hz: 1000,
            frames_per_line: 1,
            start_timestamp: 1_700_000_000_000,
            filler: String::new(),
        }
    }

    /// Use `waveform` for the zero-based channel `index`
    pub fn with_waveform(mut self, index: usize, waveform: Waveform) -> Self {
        if let Some(slot) = self.waveforms.get_mut(index) {
            *slot = waveform;
        }
        self
    }

    /// Use `waveform` for every channel
    pub fn with_all_waveforms(mut self, waveform: Waveform) -> Self {
        self.waveforms.fill(waveform);
        self
    }

    /// Sample rate used to compute time and line timestamps
    pub fn with_sample_rate(mut self, sample_rate_hz: u32) -> Self {
        self.sample_rate_hz = sample_rate_hz.max(1);
        self
    }

    pub fn with_frames_per_line(mut self, frames_per_line: usize) -> Self {
        self.frames_per_line = frames_per_line.max(1);
        self
    }

    /// Timestamp of the first line, in milliseconds
    pub fn with_start_timestamp(mut self, start_timestamp: u64) -> Self {
        self.start_timestamp = start_timestamp;
        self
    }

    /// Bytes inserted between frames, to exercise resynchronization
    pub fn with_filler(mut self, filler: impl Into<String>) -> Self {
        self.filler = filler.into();
        self
    }

    /// Physical value of every channel for sample `index`
    pub fn values(&self, index: u64) -> Vec<f64> {
        let t = index as f64 / self.sample_rate_hz as f64;
        self.waveforms.iter().map(|w| w.value_at(t)).collect()
    }

    /// Encoded frame for sample `index`
    pub fn frame(&self, index: u64) -> String {
        let raw: Vec<u64> = self
            .values(index)
            .into_iter()
            .map(|v| self.format.encode_reading(v))
            .collect();
        self.format.encode_frame(index as u32, &raw)
    }

    /// Line holding `count` frames starting at sample `first`
    pub fn line(&self, first: u64, count: usize) -> String {
        let timestamp = self.start_timestamp + first * 1000 / self.sample_rate_hz as u64;
        let mut line = timestamp.to_string();
        for i in 0..count as u64 {
            if i > 0 {
                line.push_str(&self.filler);
            }
            line.push_str(&self.frame(first + i));
        }
        line
    }

    /// Lines covering `samples` samples
    pub fn lines(&self, samples: u64) -> impl Iterator<Item = String> + '_ {
        let per_line = self.frames_per_line as u64;
        (0..samples).step_by(self.frames_per_line).map(move |first| {
            let count = per_line.min(samples - first) as usize;
            self.line(first, count)
        })
    }

    /// Write `samples` samples as newline-terminated lines
    ///
    /// Returns the number of lines written.
    pub fn write_to<W: Write>(&self, mut writer: W, samples: u64) -> io::Result<u64> {
        let mut written = 0;
        for line in self.lines(samples) {
            writeln!(writer, "{}", line)?;
            written += 1;
        }
        writer.flush()?;
        tracing::debug!("Generated {} samples in {} lines", samples, written);
        Ok(written)
    }
}
