//! Mock sources and listener helpers

use crossbeam_channel::Receiver;
use sensorstream_rs::{LineSource, Observation, PipelineEvent};
use std::collections::VecDeque;
use std::io;

/// Source that yields some lines, then fails with a read fault
pub struct FailingSource {
    lines: VecDeque<String>,
    message: &'static str,
}

impl FailingSource {
    pub fn new(lines: Vec<String>, message: &'static str) -> Self {
        Self {
            lines: lines.into(),
            message,
        }
    }
}

impl LineSource for FailingSource {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        match self.lines.pop_front() {
            Some(line) => Ok(Some(line)),
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, self.message)),
        }
    }
}

/// Source that never ends, repeating one line
pub struct EndlessSource(pub String);

impl LineSource for EndlessSource {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        Ok(Some(self.0.clone()))
    }
}

/// Everything currently queued on an event receiver
pub fn drain(rx: &Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
    rx.try_iter().collect()
}

/// Observations of one 1-based channel, in delivery order
pub fn observations_for(events: &[PipelineEvent], channel: usize) -> Vec<Observation> {
    events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::ChannelValue(obs) if obs.channel == channel => Some(*obs),
            _ => None,
        })
        .collect()
}

/// Number of `Stopped` notifications
pub fn stopped_count(events: &[PipelineEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, PipelineEvent::Stopped { .. }))
        .count()
}
