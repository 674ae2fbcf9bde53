//! Fan-out of decoded samples to the channel queues
//!
//! Every sample is wrapped in one `Arc` and offered to each channel's
//! bounded queue. A full queue never blocks the other channels for longer
//! than the policy allows:
//!
//! - [`FanOutPolicy::Drop`]: `try_send`, the sample is lost for that channel
//! - [`FanOutPolicy::Block`]: `send_timeout`, lost only once the timeout expires
//!
//! Either way a loss is counted per channel, never silent. A queue whose
//! worker has already exited counts as a drop as well.

use crate::config::FanOutPolicy;
use crate::pipeline::stats::PipelineCounters;
use crate::types::Sample;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::Arc;

/// Producer side of all channel queues
#[derive(Debug)]
pub struct FanOut {
    queues: Vec<Sender<Arc<Sample>>>,
    policy: FanOutPolicy,
    counters: Arc<PipelineCounters>,
}

impl FanOut {
    /// Create one bounded queue per channel
    ///
    /// Returns the fan-out and the consumer ends, in channel order.
    pub fn new(
        channel_count: usize,
        capacity: usize,
        policy: FanOutPolicy,
        counters: Arc<PipelineCounters>,
    ) -> (Self, Vec<Receiver<Arc<Sample>>>) {
        let (queues, receivers): (Vec<_>, Vec<_>) =
            (0..channel_count).map(|_| bounded(capacity)).unzip();
        (
            Self {
                queues,
                policy,
                counters,
            },
            receivers,
        )
    }

    /// Offer a sample to every channel queue
    ///
    /// Returns the number of channels that lost the sample.
    pub fn publish(&self, sample: Sample) -> usize {
        let sample = Arc::new(sample);
        let timeout = self.policy.timeout();
        let mut lost = 0;

        for (index, queue) in self.queues.iter().enumerate() {
            let delivered = match timeout {
                None => queue.try_send(Arc::clone(&sample)).is_ok(),
                Some(timeout) => queue.send_timeout(Arc::clone(&sample), timeout).is_ok(),
            };
            if !delivered {
                lost += 1;
                self.counters.channel(index).record_dropped();
            }
        }

        if lost > 0 {
            tracing::trace!("Sample #{} dropped on {} channel(s)", sample.sequence, lost);
        }
        self.counters.record_published();
        lost
    }

    pub fn channel_count(&self) -> usize {
        self.queues.len()
    }

    /// Samples waiting in a channel's queue (zero-based index)
    pub fn queue_len(&self, index: usize) -> usize {
        self.queues.get(index).map_or(0, |q| q.len())
    }
}
