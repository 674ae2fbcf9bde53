//! Wire format and delivery settings
//!
//! This module contains the pieces of configuration that describe the data
//! itself and how it is delivered, separate from the pipeline-level rates
//! in [`super::PipelineConfig`].
//!
//! # Main Types
//!
//! - [`FrameFormat`] - Layout of one encoded sub-frame and its normalization
//! - [`FanOutPolicy`] - What the fan-out does when a channel queue is full

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default sub-frame start marker
pub const DEFAULT_MARKER: char = '!';

/// Default number of hex digits in the sequence field
pub const DEFAULT_SEQUENCE_DIGITS: usize = 4;

/// Default number of channels per frame
pub const DEFAULT_CHANNEL_COUNT: usize = 4;

/// Default number of hex digits per channel reading
pub const DEFAULT_CHANNEL_DIGITS: usize = 6;

/// Default ADC resolution in bits
pub const DEFAULT_BITS: u32 = 24;

/// Default full-scale reference (volts)
pub const DEFAULT_REFERENCE_SCALE: f64 = 3.3;

/// Largest sequence field that still fits a `u32`
pub const MAX_SEQUENCE_DIGITS: usize = 8;

/// Largest channel field that still fits a `u64`
pub const MAX_CHANNEL_DIGITS: usize = 16;

/// Layout of one encoded sub-frame
///
/// A frame is `marker`, then `sequence_digits` hex digits, then
/// `channel_count` fields of `channel_digits` hex digits each. With the
/// defaults that is `!SSSS` followed by four 6-digit readings, 29 characters
/// in total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameFormat {
    /// Single-character start marker
    pub marker: char,
    /// Width of the sequence number field in hex digits
    pub sequence_digits: usize,
    /// Number of channel readings per frame
    pub channel_count: usize,
    /// Width of each channel field in hex digits
    pub channel_digits: usize,
    /// ADC resolution used for normalization
    pub bits: u32,
    /// Physical value of a full-scale reading
    pub reference_scale: f64,
}

impl Default for FrameFormat {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER,
            sequence_digits: DEFAULT_SEQUENCE_DIGITS,
            channel_count: DEFAULT_CHANNEL_COUNT,
            channel_digits: DEFAULT_CHANNEL_DIGITS,
            bits: DEFAULT_BITS,
            reference_scale: DEFAULT_REFERENCE_SCALE,
        }
    }
}

impl FrameFormat {
    /// Total encoded length of one frame, marker included
    pub fn frame_len(&self) -> usize {
        1 + self.sequence_digits + self.channel_count * self.channel_digits
    }

    /// Largest raw ADC value (`2^bits - 1`)
    ///
    /// `bits` is clamped to 1..=64, the widest value a hex field can carry.
    pub fn full_scale(&self) -> f64 {
        let bits = self.bits.clamp(1, 64);
        ((1u128 << bits) - 1) as f64
    }

    /// Convert a raw ADC value into physical units
    pub fn normalize(&self, raw: u64) -> f64 {
        (raw as f64 / self.full_scale()) * self.reference_scale
    }

    /// Check the format for values the parser cannot handle
    pub fn validate(&self) -> Result<(), String> {
        if !self.marker.is_ascii() || self.marker.is_ascii_hexdigit() {
            return Err(format!(
                "marker {:?} must be a single ASCII character that is not a hex digit",
                self.marker
            ));
        }
        if self.sequence_digits == 0 || self.sequence_digits > MAX_SEQUENCE_DIGITS {
            return Err(format!(
                "sequence_digits must be between 1 and {}, got {}",
                MAX_SEQUENCE_DIGITS, self.sequence_digits
            ));
        }
        if self.channel_count == 0 {
            return Err("channel_count must be at least 1".to_string());
        }
        if self.channel_digits == 0 || self.channel_digits > MAX_CHANNEL_DIGITS {
            return Err(format!(
                "channel_digits must be between 1 and {}, got {}",
                MAX_CHANNEL_DIGITS, self.channel_digits
            ));
        }
        if self.bits == 0 || self.bits > 64 {
            return Err(format!("bits must be between 1 and 64, got {}", self.bits));
        }
        if !(self.reference_scale.is_finite() && self.reference_scale > 0.0) {
            return Err(format!(
                "reference_scale must be a positive number, got {}",
                self.reference_scale
            ));
        }
        Ok(())
    }
}

/// What the fan-out does when a channel queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FanOutPolicy {
    /// Drop the sample for that channel and count the loss
    #[default]
    Drop,
    /// Wait up to `timeout_ms` for room, then drop and count the loss
    Block {
        /// Longest time the ingestion loop may wait on one channel
        timeout_ms: u64,
    },
}

impl FanOutPolicy {
    /// Timeout for the blocking policy, `None` for drop
    pub fn timeout(&self) -> Option<Duration> {
        match self {
            FanOutPolicy::Drop => None,
            FanOutPolicy::Block { timeout_ms } => Some(Duration::from_millis(*timeout_ms)),
        }
    }
}

impl std::fmt::Display for FanOutPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FanOutPolicy::Drop => write!(f, "drop"),
            FanOutPolicy::Block { timeout_ms } => write!(f, "block ({} ms)", timeout_ms),
        }
    }
}
