//! Per-channel decoding worker
//!
//! Each channel gets one worker thread with its own queue. The worker takes
//! its reading out of every shared [`Sample`], counts it, and reports every
//! `decimation_factor`-th value as an [`Observation`]. A display-rate
//! ceiling keeps emissions of one channel at least `display_interval`
//! apart; the worker sleeps (interruptibly) instead of emitting early.
//!
//! Throttle state is private to the worker, so channels never wait on each
//! other. A sample the worker cannot decode produces a
//! [`PipelineEvent::DecodingError`] and is not counted; the worker keeps
//! going.

use crate::config::PipelineConfig;
use crate::error::{DecoderError, Result};
use crate::pipeline::bridge::{EventSender, PipelineEvent};
use crate::pipeline::stats::PipelineCounters;
use crate::pipeline::timing::{sleep_until, StopSignal};
use crate::types::{Observation, Sample};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Decoder for one channel
pub struct ChannelWorker {
    /// Zero-based index into the sample readings
    index: usize,
    queue: Receiver<Arc<Sample>>,
    events: EventSender,
    stop: StopSignal,
    counters: Arc<PipelineCounters>,
    decimation_factor: u64,
    display_interval: Duration,
    poll_timeout: Duration,
    /// Samples decoded so far
    count: u64,
    last_emit: Option<Instant>,
}

impl ChannelWorker {
    /// Create a worker for the zero-based channel `index`
    pub fn new(
        index: usize,
        queue: Receiver<Arc<Sample>>,
        events: EventSender,
        stop: StopSignal,
        counters: Arc<PipelineCounters>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            index,
            queue,
            events,
            stop,
            counters,
            decimation_factor: config.decimation_factor.max(1),
            display_interval: config.display_interval(),
            poll_timeout: config.queue_poll_timeout(),
            count: 0,
            last_emit: None,
        }
    }

    /// 1-based channel number
    pub fn channel(&self) -> usize {
        self.index + 1
    }

    /// Samples decoded so far
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Run until stopped or until the queue is closed and drained
    ///
    /// On an explicit stop, samples still queued are discarded.
    pub fn run(mut self) {
        tracing::debug!("Channel {} worker started", self.channel());

        while !self.stop.is_triggered() {
            match self.queue.recv_timeout(self.poll_timeout) {
                Ok(sample) => self.process(&sample),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let discarded = self.queue.len();
        if discarded > 0 {
            tracing::debug!(
                "Channel {} discarded {} queued samples",
                self.channel(),
                discarded
            );
        }
        tracing::debug!(
            "Channel {} worker stopped after {} samples",
            self.channel(),
            self.count
        );
    }

    /// Decode one sample and emit an observation if it is due
    pub fn process(&mut self, sample: &Sample) {
        let value = match self.decode(sample) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("{}", e);
                self.counters.channel(self.index).record_decode_error();
                let message = match e {
                    DecoderError::ChannelDecode { message, .. } => message,
                    other => other.to_string(),
                };
                self.events.emit(PipelineEvent::DecodingError {
                    channel: self.channel(),
                    message,
                });
                return;
            }
        };

        self.count += 1;
        self.counters.channel(self.index).record_processed();

        if self.count % self.decimation_factor == 0 {
            self.emit(Observation::new(self.channel(), value, sample.sequence));
        }
    }

    fn decode(&self, sample: &Sample) -> Result<f64> {
        let value = sample
            .reading(self.index)
            .ok_or_else(|| DecoderError::ChannelDecode {
                channel: self.channel(),
                message: format!(
                    "sample #{} carries only {} readings",
                    sample.sequence,
                    sample.channel_count()
                ),
            })?;

        if !value.is_finite() {
            return Err(DecoderError::ChannelDecode {
                channel: self.channel(),
                message: format!("sample #{} has non-finite reading {}", sample.sequence, value),
            });
        }

        Ok(value)
    }

    fn emit(&mut self, obs: Observation) {
        if let Some(last) = self.last_emit {
            if !sleep_until(last + self.display_interval, &self.stop) {
                return;
            }
        }

        self.last_emit = Some(Instant::now());
        self.counters.channel(self.index).record_emitted();
        tracing::trace!("{}", obs);
        self.events.emit(PipelineEvent::ChannelValue(obs));
    }
}
