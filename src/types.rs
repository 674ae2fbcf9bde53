//! Core data types for sensorstream-rs
//!
//! This module contains the fundamental data structures that flow through
//! the decoding pipeline.
//!
//! # Main Types
//!
//! - [`Sample`] - One synchronized reading of all channels at a sequence number
//! - [`Observation`] - One decimated, externally reported single-channel reading
//! - [`PipelineState`] - Lifecycle state of the pipeline controller
//! - [`PipelineStats`] / [`ChannelStats`] - Snapshot of pipeline counters
//!
//! # Sharing
//!
//! A [`Sample`] is created once by the frame parser and then shared read-only
//! by every channel worker through an `Arc`. It is freed when the last worker
//! has consumed or dropped it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One decoded frame: a sequence number plus one reading per channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Sequence number as encoded in the frame (wraps per source format)
    pub sequence: u32,
    /// Normalized channel readings, index 0 is channel 1
    pub readings: Box<[f64]>,
    /// Capture timestamp taken from the source line
    pub timestamp: u64,
}

impl Sample {
    /// Create a new sample
    pub fn new(sequence: u32, readings: impl Into<Box<[f64]>>, timestamp: u64) -> Self {
        Self {
            sequence,
            readings: readings.into(),
            timestamp,
        }
    }

    /// Number of channel readings carried by this sample
    pub fn channel_count(&self) -> usize {
        self.readings.len()
    }

    /// Reading for a zero-based channel index
    pub fn reading(&self, index: usize) -> Option<f64> {
        self.readings.get(index).copied()
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sample[#{}, t={}", self.sequence, self.timestamp)?;
        for (i, value) in self.readings.iter().enumerate() {
            write!(f, ", ch{}={:.4}", i + 1, value)?;
        }
        write!(f, "]")
    }
}

/// A decoded channel value reported to the collaborator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// 1-based channel number
    pub channel: usize,
    /// Decoded reading in physical units
    pub value: f64,
    /// Sequence number of the sample the reading came from
    pub sequence: u32,
}

impl Observation {
    /// Create a new observation
    pub fn new(channel: usize, value: f64, sequence: u32) -> Self {
        Self {
            channel,
            value,
            sequence,
        }
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ch{}: {:.4} V (Sample #{})",
            self.channel, self.value, self.sequence
        )
    }
}

/// Lifecycle state of the decoding pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PipelineState {
    /// Created, not yet started
    #[default]
    Idle,
    /// Ingesting and decoding
    Running,
    /// Stop requested or input exhausted, threads winding down
    Stopping,
    /// Finished successfully (terminal)
    Stopped,
    /// Finished because the byte source failed (terminal)
    Failed,
}

impl PipelineState {
    /// Check if the pipeline is actively running
    pub fn is_running(&self) -> bool {
        matches!(self, PipelineState::Running)
    }

    /// Check if the pipeline has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Stopped | PipelineState::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, Running)
                | (Idle, Failed)
                | (Running, Stopping)
                | (Running, Failed)
                | (Stopping, Stopped)
                | (Stopping, Failed)
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "Idle"),
            PipelineState::Running => write!(f, "Running"),
            PipelineState::Stopping => write!(f, "Stopping"),
            PipelineState::Stopped => write!(f, "Stopped"),
            PipelineState::Failed => write!(f, "Failed"),
        }
    }
}

/// Counters for one channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStats {
    /// 1-based channel number
    pub channel: usize,
    /// Samples the worker decoded
    pub processed: u64,
    /// Observations the worker emitted
    pub emitted: u64,
    /// Samples dropped at the fan-out because the queue was full
    pub dropped: u64,
    /// Samples the worker failed to decode
    pub decode_errors: u64,
}

/// Statistics about a pipeline run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Samples handed to the fan-out
    pub samples_published: u64,
    /// Lines read from the byte source
    pub lines_read: u64,
    /// Per-channel counters, in channel order
    pub channels: Vec<ChannelStats>,
}

impl PipelineStats {
    /// Total samples dropped across all channels
    pub fn total_dropped(&self) -> u64 {
        self.channels.iter().map(|c| c.dropped).sum()
    }

    /// Total observations emitted across all channels
    pub fn total_emitted(&self) -> u64 {
        self.channels.iter().map(|c| c.emitted).sum()
    }

    /// Average number of samples processed per channel
    ///
    /// All channels see the same samples, so this approximates how many
    /// samples have made it all the way through the decoders.
    pub fn average_processed(&self) -> u64 {
        if self.channels.is_empty() {
            return 0;
        }
        let total: u64 = self.channels.iter().map(|c| c.processed).sum();
        total / self.channels.len() as u64
    }
}
