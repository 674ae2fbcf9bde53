//! Lock-free counters shared between the ingestion loop and the workers

use crate::types::{ChannelStats, PipelineStats};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters owned by one channel
#[derive(Debug, Default)]
pub struct ChannelCounters {
    processed: AtomicU64,
    emitted: AtomicU64,
    dropped: AtomicU64,
    decode_errors: AtomicU64,
}

impl ChannelCounters {
    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_emitted(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// All counters of one pipeline run
#[derive(Debug)]
pub struct PipelineCounters {
    samples_published: AtomicU64,
    lines_read: AtomicU64,
    channels: Box<[ChannelCounters]>,
}

impl PipelineCounters {
    /// Create zeroed counters for `channel_count` channels
    pub fn new(channel_count: usize) -> Self {
        Self {
            samples_published: AtomicU64::new(0),
            lines_read: AtomicU64::new(0),
            channels: (0..channel_count).map(|_| ChannelCounters::default()).collect(),
        }
    }

    /// Counters for a zero-based channel index
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below the channel count the counters were
    /// created with.
    pub fn channel(&self, index: usize) -> &ChannelCounters {
        &self.channels[index]
    }

    pub fn record_published(&self) {
        self.samples_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_line(&self) {
        self.lines_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn samples_published(&self) -> u64 {
        self.samples_published.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            samples_published: self.samples_published(),
            lines_read: self.lines_read.load(Ordering::Relaxed),
            channels: self
                .channels
                .iter()
                .enumerate()
                .map(|(i, c)| ChannelStats {
                    channel: i + 1,
                    processed: c.processed(),
                    emitted: c.emitted.load(Ordering::Relaxed),
                    dropped: c.dropped(),
                    decode_errors: c.decode_errors.load(Ordering::Relaxed),
                })
                .collect(),
        }
    }
}
