//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use sensorstream_rs::PipelineConfig;
use std::time::Duration;

/// Upper bound for any single pipeline run in tests
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Configuration that replays as fast as possible and reports every sample
pub fn fast_config() -> PipelineConfig {
    PipelineConfig {
        sample_rate_hz: 0,
        decimation_factor: 1,
        display_interval_ms: 0,
        queue_poll_timeout_ms: 10,
        ..Default::default()
    }
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}
