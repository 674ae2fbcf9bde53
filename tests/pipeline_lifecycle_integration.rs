//! Integration tests for the pipeline lifecycle
//!
//! These tests validate the complete workflow through the public API:
//! - Start, stop and restart rules of the controller
//! - Exactly one final notification, always last
//! - Read faults ending in the failed state
//! - Decimation and fan-out as seen by a listener

mod common;

use common::builders::{sequential_lines, LineBuilder};
use common::mock_helpers::{drain, observations_for, stopped_count, EndlessSource, FailingSource};
use common::{assert_float_eq, fast_config};
use sensorstream_rs::{
    DecoderError, FanOutPolicy, MemorySource, PipelineConfig, PipelineController, PipelineEvent,
    PipelineListener, PipelineState,
};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_example_line_reaches_listener() {
    let line = LineBuilder::new()
        .frame(0x22, &[0x01487A, 0x0245F9, 0x022AC6, 0xE004EB])
        .build();
    assert_eq!(line, "1700000000!002201487A0245F9022AC6E004EB");

    let (mut controller, rx) = PipelineController::with_channel(fast_config()).unwrap();
    controller.start(MemorySource::new([line])).unwrap();
    assert_eq!(controller.wait(), PipelineState::Stopped);

    let events = drain(&rx);
    let channel_one = observations_for(&events, 1);
    assert_eq!(channel_one.len(), 1);
    assert_eq!(channel_one[0].sequence, 34);
    assert_float_eq(channel_one[0].value, 0.016_54, 1e-5);
    assert_eq!(channel_one[0].to_string(), "Ch1: 0.0165 V (Sample #34)");

    let channel_four = observations_for(&events, 4);
    assert_float_eq(channel_four[0].value, 0xE004EB as f64 / 16_777_215.0 * 3.3, 1e-9);
}

#[test]
fn test_decimation_across_all_channels() {
    let config = PipelineConfig {
        decimation_factor: 100,
        ..fast_config()
    };
    let (mut controller, rx) = PipelineController::with_channel(config).unwrap();
    controller
        .start(MemorySource::new(sequential_lines(250, 1.0)))
        .unwrap();
    assert_eq!(controller.wait(), PipelineState::Stopped);

    let events = drain(&rx);
    for channel in 1..=4 {
        let sequences: Vec<u32> = observations_for(&events, channel)
            .iter()
            .map(|o| o.sequence)
            .collect();
        // The 100th and 200th samples carry sequences 99 and 199
        assert_eq!(sequences, vec![99, 199], "channel {}", channel);
    }
    assert_eq!(
        events.last(),
        Some(&PipelineEvent::Stopped { total_samples: 250 })
    );

    let stats = controller.stats();
    assert_eq!(stats.average_processed(), 250);
    assert_eq!(stats.total_dropped(), 0);
}

#[test]
fn test_started_first_and_stopped_last_exactly_once() {
    let (mut controller, rx) = PipelineController::with_channel(fast_config()).unwrap();
    controller
        .start(MemorySource::new(sequential_lines(50, 2.0)))
        .unwrap();
    controller.wait();

    // Nothing may arrive once the run is terminal
    thread::sleep(Duration::from_millis(50));
    let events = drain(&rx);

    assert_eq!(events.first(), Some(&PipelineEvent::Started));
    assert_eq!(stopped_count(&events), 1);
    assert!(matches!(events.last(), Some(PipelineEvent::Stopped { .. })));
}

#[test]
fn test_stop_mid_stream() {
    let config = PipelineConfig {
        sample_rate_hz: 1000,
        ..fast_config()
    };
    let (mut controller, rx) = PipelineController::with_channel(config).unwrap();
    controller
        .start(EndlessSource(LineBuilder::new().frame_with_value(1, 1.0).build()))
        .unwrap();

    thread::sleep(Duration::from_millis(100));
    assert_eq!(controller.state(), PipelineState::Running);
    assert!(controller.stop());
    assert_eq!(controller.wait(), PipelineState::Stopped);

    let events = drain(&rx);
    assert_eq!(stopped_count(&events), 1);
    match events.last() {
        Some(PipelineEvent::Stopped { total_samples }) => {
            assert!(*total_samples > 0);
            assert_eq!(*total_samples, controller.stats().samples_published);
        }
        other => panic!("unexpected last event {:?}", other),
    }
}

#[test]
fn test_stop_is_idempotent_and_restart_rejected() {
    let config = PipelineConfig {
        sample_rate_hz: 1000,
        ..fast_config()
    };
    let (mut controller, _rx) = PipelineController::with_channel(config).unwrap();
    assert!(!controller.stop());

    controller
        .start(EndlessSource(LineBuilder::new().frame_with_value(1, 1.0).build()))
        .unwrap();
    assert!(!controller.start(MemorySource::default()).unwrap());

    assert!(controller.stop());
    assert!(!controller.stop());
    assert_eq!(controller.wait(), PipelineState::Stopped);
    assert!(!controller.stop());

    let err = controller.start(MemorySource::default()).unwrap_err();
    assert!(matches!(err, DecoderError::InvalidState { .. }));
}

#[test]
fn test_read_fault_reports_error_then_stopped() {
    let lines = sequential_lines(10, 1.5);
    let (mut controller, rx) = PipelineController::with_channel(fast_config()).unwrap();
    controller
        .start(FailingSource::new(lines, "device unplugged"))
        .unwrap();
    assert_eq!(controller.wait(), PipelineState::Failed);

    let events = drain(&rx);
    let error_pos = events
        .iter()
        .position(|e| matches!(e, PipelineEvent::Error(msg) if msg.contains("device unplugged")))
        .expect("error event");
    assert_eq!(error_pos, events.len() - 2);
    assert_eq!(
        events.last(),
        Some(&PipelineEvent::Stopped { total_samples: 10 })
    );
}

#[test]
fn test_garbage_lines_are_skipped() {
    let lines = vec![
        "garbage".to_string(),
        String::new(),
        LineBuilder::new().frame_with_value(5, 1.0).build(),
        "1700000001!00ZZ".to_string(),
        LineBuilder::new().garbage("!!!").frame_with_value(6, 1.0).build(),
    ];
    let (mut controller, rx) = PipelineController::with_channel(fast_config()).unwrap();
    controller.start(MemorySource::new(lines)).unwrap();
    assert_eq!(controller.wait(), PipelineState::Stopped);

    let sequences: Vec<u32> = observations_for(&drain(&rx), 2)
        .iter()
        .map(|o| o.sequence)
        .collect();
    assert_eq!(sequences, vec![5, 6]);
    assert_eq!(controller.stats().lines_read, 5);
}

#[test]
fn test_slow_listener_with_drop_policy_counts_losses() {
    struct Slow(Arc<Mutex<u64>>);

    impl PipelineListener for Slow {
        fn on_channel_value_updated(&mut self, _: usize, _: f64, _: u32) {
            thread::sleep(Duration::from_millis(1));
            *self.0.lock().unwrap() += 1;
        }
    }

    let config = PipelineConfig {
        queue_capacity: 4,
        event_capacity: 4,
        fan_out: FanOutPolicy::Drop,
        ..fast_config()
    };
    let seen = Arc::new(Mutex::new(0));
    let mut controller = PipelineController::new(config, Slow(Arc::clone(&seen))).unwrap();
    controller
        .start(MemorySource::new(sequential_lines(500, 1.0)))
        .unwrap();
    assert_eq!(controller.wait(), PipelineState::Stopped);

    let stats = controller.stats();
    assert_eq!(stats.samples_published, 500);
    for channel in &stats.channels {
        // Every sample is either decoded or counted as dropped
        assert_eq!(channel.processed + channel.dropped, 500);
    }
    assert!(stats.total_dropped() > 0);
    assert_eq!(*seen.lock().unwrap(), stats.total_emitted());
}

#[test]
fn test_drop_joins_all_threads() {
    let config = PipelineConfig {
        sample_rate_hz: 1000,
        ..fast_config()
    };
    let (mut controller, rx) = PipelineController::with_channel(config).unwrap();
    controller
        .start(EndlessSource(LineBuilder::new().frame_with_value(1, 1.0).build()))
        .unwrap();
    thread::sleep(Duration::from_millis(20));

    let start = Instant::now();
    drop(controller);
    assert!(start.elapsed() < common::test_timeout());

    let events = drain(&rx);
    assert_eq!(stopped_count(&events), 1);
    assert!(matches!(events.last(), Some(PipelineEvent::Stopped { .. })));
}
