//! Frame parser for hex-encoded sample lines
//!
//! A raw line looks like `<timestamp><data>`, where the data portion holds
//! any number of sub-frames mixed with arbitrary bytes:
//!
//! ```text
//! 1700000000!002201487A0245F9022AC6E004EB!0023...
//! ^^^^^^^^^^ ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^
//! timestamp  marker, sequence, 4 x 24-bit readings
//! ```
//!
//! The parser is stateless. [`FrameParser::parse_line`] splits off the
//! timestamp and returns a lazy [`Frames`] iterator over the data portion.
//! The iterator is `Clone`, so a scan can be restarted from the beginning at
//! any point without re-parsing what came before.
//!
//! Malformed or truncated sub-frames are skipped one at a time; they never
//! abort the rest of the line. After every candidate marker the scan resumes
//! one byte later, so overlapping candidates are tolerated and each line is
//! parsed in time linear in its length.

mod encode;
mod line;

pub use line::{data_portion, extract_timestamp, split_line, wall_clock_millis, LineParts};

use crate::config::FrameFormat;
use crate::types::Sample;
use std::fmt;
use std::iter::FusedIterator;
use thiserror::Error;

/// Field of a frame, used to locate parse errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameField {
    /// The sequence number field
    Sequence,
    /// A channel reading field (1-based channel number)
    Channel(usize),
    /// A reading field decoded on its own, outside any frame
    Reading,
}

impl fmt::Display for FrameField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameField::Sequence => write!(f, "sequence"),
            FrameField::Channel(n) => write!(f, "channel {}", n),
            FrameField::Reading => write!(f, "reading"),
        }
    }
}

/// Reasons a single sub-frame is rejected
///
/// These never leave the parser as failures of a line; they are only used
/// to skip the offending sub-frame and for trace logging.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("frame does not start with the marker")]
    MissingMarker,

    #[error("invalid hex in {field} field")]
    InvalidHex { field: FrameField },
}

/// Stateless decoder from encoded text to [`Sample`]s
#[derive(Debug, Clone)]
pub struct FrameParser {
    format: FrameFormat,
    marker: Option<u8>,
    frame_len: usize,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new(FrameFormat::default())
    }
}

impl FrameParser {
    /// Create a parser for the given wire format
    ///
    /// The format should have passed [`FrameFormat::validate`]; a non-ASCII
    /// marker can never match and yields no frames.
    pub fn new(format: FrameFormat) -> Self {
        let marker = format.marker.is_ascii().then_some(format.marker as u8);
        let frame_len = format.frame_len();
        Self {
            format,
            marker,
            frame_len,
        }
    }

    /// The wire format this parser decodes
    pub fn format(&self) -> &FrameFormat {
        &self.format
    }

    /// Encoded length of one frame, marker included
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Parse a raw line: leading timestamp followed by the data portion
    ///
    /// Lines without a usable timestamp are stamped with the current wall
    /// clock in Unix milliseconds.
    pub fn parse_line<'a>(&'a self, line: &'a str) -> Frames<'a> {
        let parts = split_line(line);
        self.frames(parts.data, parts.timestamp)
    }

    /// Scan a data portion for frames, tagging each with `timestamp`
    pub fn frames<'a>(&'a self, data: &'a str, timestamp: u64) -> Frames<'a> {
        Frames {
            parser: self,
            data: data.as_bytes(),
            pos: 0,
            timestamp,
        }
    }

    /// Decode exactly one frame, which must start with the marker
    pub fn parse_frame(&self, frame: &str, timestamp: u64) -> Result<Sample, FrameError> {
        self.decode(frame.as_bytes(), timestamp)
    }

    /// Convert one channel hex field into physical units
    pub fn hex_to_reading(&self, hex: &str) -> Result<f64, FrameError> {
        if hex.len() != self.format.channel_digits {
            return Err(FrameError::Truncated {
                needed: self.format.channel_digits,
                available: hex.len(),
            });
        }
        let raw = parse_hex(hex.as_bytes()).ok_or(FrameError::InvalidHex {
            field: FrameField::Reading,
        })?;
        Ok(self.format.normalize(raw))
    }

    fn decode(&self, frame: &[u8], timestamp: u64) -> Result<Sample, FrameError> {
        if frame.len() < self.frame_len {
            return Err(FrameError::Truncated {
                needed: self.frame_len,
                available: frame.len(),
            });
        }
        if Some(frame[0]) != self.marker {
            return Err(FrameError::MissingMarker);
        }

        let mut pos = 1;
        let seq_end = pos + self.format.sequence_digits;
        let sequence = parse_hex(&frame[pos..seq_end]).ok_or(FrameError::InvalidHex {
            field: FrameField::Sequence,
        })? as u32;
        pos = seq_end;

        let width = self.format.channel_digits;
        let mut readings = Vec::with_capacity(self.format.channel_count);
        for channel in 0..self.format.channel_count {
            let raw = parse_hex(&frame[pos..pos + width]).ok_or(FrameError::InvalidHex {
                field: FrameField::Channel(channel + 1),
            })?;
            readings.push(self.format.normalize(raw));
            pos += width;
        }

        Ok(Sample::new(sequence, readings, timestamp))
    }
}

/// Lazy scan over the frames of one data portion
///
/// Yields samples left to right. Cloning the iterator captures the current
/// position, so a clone taken before the first `next` replays the whole line.
#[derive(Debug, Clone)]
pub struct Frames<'a> {
    parser: &'a FrameParser,
    data: &'a [u8],
    pos: usize,
    timestamp: u64,
}

impl Iterator for Frames<'_> {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        let marker = self.parser.marker?;
        let frame_len = self.parser.frame_len;

        while self.pos < self.data.len() {
            let offset = self.data[self.pos..].iter().position(|&b| b == marker)?;
            let start = self.pos + offset;
            self.pos = start + 1;

            // Every later marker has even less room left
            if start + frame_len > self.data.len() {
                self.pos = self.data.len();
                return None;
            }

            match self
                .parser
                .decode(&self.data[start..start + frame_len], self.timestamp)
            {
                Ok(sample) => return Some(sample),
                Err(e) => tracing::trace!("Skipping frame at offset {}: {}", start, e),
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.data.len().saturating_sub(self.pos);
        (0, Some(remaining / self.parser.frame_len.max(1) + 1))
    }
}

impl FusedIterator for Frames<'_> {}

/// Parse an unsigned big-endian hex field, rejecting anything but hex digits
fn parse_hex(field: &[u8]) -> Option<u64> {
    if field.is_empty() || field.len() > 16 {
        return None;
    }
    field.iter().try_fold(0u64, |acc, &b| {
        let digit = (b as char).to_digit(16)?;
        Some((acc << 4) | digit as u64)
    })
}
