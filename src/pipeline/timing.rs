//! Cooperative cancellation and interruptible sleeps
//!
//! Every suspension point in the pipeline (pacing sleeps, display-rate
//! sleeps, queue waits) checks one shared [`StopSignal`]. Sleeps are cut
//! into short slices so a stop request is noticed within
//! [`MAX_SLEEP_SLICE`] even when the full wait is much longer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Longest uninterrupted sleep before the stop signal is checked again
pub const MAX_SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Shared stop flag polled by the ingestion loop and every worker
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// Create a signal that has not been triggered
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop; idempotent
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop has been requested
    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sleep until `deadline` unless a stop is requested first
///
/// Returns `true` if the deadline was reached, `false` if the signal was
/// triggered. A deadline in the past returns immediately without sleeping.
pub fn sleep_until(deadline: Instant, stop: &StopSignal) -> bool {
    loop {
        if stop.is_triggered() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(MAX_SLEEP_SLICE));
    }
}
