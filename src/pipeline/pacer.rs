//! Replay pacing against an absolute schedule
//!
//! Sample `i` is released no earlier than `T0 + i * interval`. Deadlines
//! are computed from the start time rather than from the previous sample,
//! so sleep overshoot does not accumulate. When the pacer falls behind it
//! releases samples back to back until it has caught up; samples are never
//! skipped.

use crate::pipeline::timing::{sleep_until, StopSignal};
use std::time::{Duration, Instant};

/// Absolute-schedule pacer for the ingestion loop
#[derive(Debug, Clone)]
pub struct Pacer {
    interval: Option<Duration>,
    start: Instant,
    released: u64,
}

impl Pacer {
    /// Start a schedule now; `None` disables pacing
    pub fn new(interval: Option<Duration>) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    /// Start a schedule at a given instant
    pub fn starting_at(interval: Option<Duration>, start: Instant) -> Self {
        Self {
            interval,
            start,
            released: 0,
        }
    }

    /// Deadline of the next sample, `None` when unpaced
    pub fn next_deadline(&self) -> Option<Instant> {
        self.interval.map(|interval| {
            let offset = (interval.as_nanos() as u64).saturating_mul(self.released);
            self.start + Duration::from_nanos(offset)
        })
    }

    /// Wait for the next slot and claim it
    ///
    /// Returns `false` without claiming the slot if a stop was requested.
    pub fn wait_next(&mut self, stop: &StopSignal) -> bool {
        let ready = match self.next_deadline() {
            Some(deadline) => sleep_until(deadline, stop),
            None => !stop.is_triggered(),
        };
        if ready {
            self.released += 1;
        }
        ready
    }

    /// Samples released so far
    pub fn released(&self) -> u64 {
        self.released
    }

    /// Time since the schedule started
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Achieved release rate in samples per second
    pub fn achieved_rate(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.released as f64 / secs
        } else {
            0.0
        }
    }

    /// How far the last released sample is behind its deadline
    pub fn lag(&self) -> Duration {
        match (self.interval, self.released) {
            (Some(interval), n) if n > 0 => {
                let offset = (interval.as_nanos() as u64).saturating_mul(n - 1);
                self.elapsed().saturating_sub(Duration::from_nanos(offset))
            }
            _ => Duration::ZERO,
        }
    }
}
