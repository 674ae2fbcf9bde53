//! Concurrent decoding pipeline
//!
//! A byte source is replayed at a nominal rate, split into frames, and each
//! decoded sample is fanned out to one worker per channel. Workers report
//! decimated, display-rate-limited observations to a single listener.
//!
//! # Architecture
//!
//! ```text
//!                                         ┌──► [queue] ──► ChannelWorker 1 ──┐
//! [LineSource] ──► IngestLoop ──► FanOut ─┼──► [queue] ──► ChannelWorker 2 ──┼──► dispatcher ──► PipelineListener
//!               (parse + pace)            └──► [queue] ──► ChannelWorker N ──┘
//! ```
//!
//! # Threads
//!
//! - `ingest`: reads, parses, paces and publishes; also supervises shutdown
//! - `channel-N`: one decoder per channel
//! - `pipeline-dispatch`: delivers every notification, one at a time
//!
//! # Lifecycle
//!
//! [`PipelineController`] moves through `Idle -> Running -> Stopping ->
//! Stopped`, or ends in `Failed` when the source faults. Whatever the
//! reason for ending, the listener sees exactly one `Stopped` notification
//! and it is the last one. Samples are counted when they are published, so
//! the reported total does not depend on queue drops.

pub mod bridge;
pub mod fanout;
pub mod ingest;
pub mod pacer;
pub mod state;
pub mod stats;
pub mod timing;
pub mod worker;

pub use bridge::{EventSender, PipelineEvent, PipelineListener};
pub use fanout::FanOut;
pub use ingest::{IngestLoop, IngestOutcome};
pub use pacer::Pacer;
pub use stats::PipelineCounters;
pub use timing::StopSignal;
pub use worker::ChannelWorker;

use crate::config::PipelineConfig;
use crate::error::{DecoderError, Result, ResultExt};
use crate::source::LineSource;
use crate::types::{PipelineState, PipelineStats};
use crossbeam_channel::{unbounded, Receiver};
use state::StateCell;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Owner of a pipeline run
///
/// Construct with a configuration and a listener, then [`start`] it with a
/// byte source. The controller can be stopped from any thread through
/// [`stop_handle`]. Dropping it stops the run and joins every thread.
///
/// [`start`]: PipelineController::start
/// [`stop_handle`]: PipelineController::stop_handle
pub struct PipelineController {
    config: PipelineConfig,
    state: Arc<StateCell>,
    stop: StopSignal,
    counters: Arc<PipelineCounters>,
    events: Option<EventSender>,
    dispatcher: Option<JoinHandle<()>>,
    supervisor: Option<JoinHandle<()>>,
}

impl PipelineController {
    /// Validate the configuration and start the notification dispatcher
    pub fn new(config: PipelineConfig, listener: impl PipelineListener) -> Result<Self> {
        config.validate()?;

        let state = Arc::new(StateCell::new());
        let (events, dispatcher) =
            bridge::spawn_dispatcher(Box::new(listener), Arc::clone(&state), config.event_capacity)
                .context("Failed to spawn dispatcher thread")?;

        Ok(Self {
            counters: Arc::new(PipelineCounters::new(config.frame.channel_count)),
            config,
            state,
            stop: StopSignal::new(),
            events: Some(events),
            dispatcher: Some(dispatcher),
            supervisor: None,
        })
    }

    /// Create a controller whose notifications arrive on a channel
    pub fn with_channel(config: PipelineConfig) -> Result<(Self, Receiver<PipelineEvent>)> {
        let (tx, rx) = unbounded();
        Ok((Self::new(config, tx)?, rx))
    }

    pub fn state(&self) -> PipelineState {
        self.state.get()
    }

    /// Snapshot of the run's counters
    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }

    /// Handle that stops the run from any thread (signal handlers, UI)
    pub fn stop_handle(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Start processing `source`
    ///
    /// Returns `Ok(false)` if the pipeline is already running. A pipeline
    /// that is stopping or has finished cannot be restarted.
    pub fn start<S>(&mut self, source: S) -> Result<bool>
    where
        S: LineSource + 'static,
    {
        match self.state.get() {
            PipelineState::Idle => {}
            PipelineState::Running => return Ok(false),
            state => {
                return Err(DecoderError::InvalidState {
                    operation: "start",
                    state,
                })
            }
        }

        let events = self
            .events
            .clone()
            .ok_or_else(|| DecoderError::Channel("notification channel closed".to_string()))?;

        if !self.state.compare_and_set(PipelineState::Idle, PipelineState::Running) {
            return Ok(false);
        }
        tracing::info!(
            "Starting pipeline: {} channels at {} Hz, decimation {}, fan-out {}",
            self.config.frame.channel_count,
            self.config.sample_rate_hz,
            self.config.decimation_factor,
            self.config.fan_out
        );
        events.emit(PipelineEvent::Started);

        let (fanout, queues) = FanOut::new(
            self.config.frame.channel_count,
            self.config.queue_capacity,
            self.config.fan_out,
            Arc::clone(&self.counters),
        );

        let mut workers = Vec::with_capacity(queues.len());
        for (index, queue) in queues.into_iter().enumerate() {
            let worker = ChannelWorker::new(
                index,
                queue,
                events.clone(),
                self.stop.clone(),
                Arc::clone(&self.counters),
                &self.config,
            );
            let spawned = thread::Builder::new()
                .name(format!("channel-{}", index + 1))
                .spawn(move || worker.run())
                .with_context(|| format!("Failed to spawn channel {} worker", index + 1));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    self.abort_start(workers, &events, &err);
                    return Err(err);
                }
            }
        }

        let supervisor = Supervisor {
            ingest: IngestLoop::new(
                source,
                fanout,
                self.stop.clone(),
                Arc::clone(&self.counters),
                &self.config,
            ),
            workers,
            events: events.clone(),
            state: Arc::clone(&self.state),
            stop: self.stop.clone(),
            counters: Arc::clone(&self.counters),
        };

        // On failure the closure is dropped with the fan-out inside it, so
        // the workers see a closed queue and exit on their own
        match thread::Builder::new()
            .name("ingest".to_string())
            .spawn(move || supervisor.run())
            .context("Failed to spawn ingestion thread")
        {
            Ok(handle) => {
                self.supervisor = Some(handle);
                Ok(true)
            }
            Err(err) => {
                self.abort_start(Vec::new(), &events, &err);
                Err(err)
            }
        }
    }

    /// Request a stop
    ///
    /// Returns whether this call moved the pipeline from running to
    /// stopping. While the workers are still draining after end of input, a
    /// stop discards what they have not reached yet. Never blocks; use
    /// [`wait`](Self::wait) to block until done.
    pub fn stop(&self) -> bool {
        if self
            .state
            .compare_and_set(PipelineState::Running, PipelineState::Stopping)
        {
            tracing::info!("Stop requested");
            self.stop.trigger();
            true
        } else {
            if self.state.get() == PipelineState::Stopping {
                self.stop.trigger();
            }
            false
        }
    }

    /// Block until the run has finished and return the terminal state
    ///
    /// Returns `Idle` immediately if the pipeline was never started.
    pub fn wait(&mut self) -> PipelineState {
        let Some(handle) = self.supervisor.take() else {
            // A start that failed to spawn has queued its finish already
            return match self.state.get() {
                PipelineState::Idle => PipelineState::Idle,
                _ => self.state.wait_terminal(),
            };
        };
        if handle.join().is_err() {
            tracing::error!("Ingestion thread panicked");
            if let Some(events) = &self.events {
                events.finish(PipelineState::Failed, self.counters.samples_published());
            }
        }
        self.state.wait_terminal()
    }

    /// Stop, wait for every thread and return the final state
    pub fn shutdown(mut self) -> PipelineState {
        self.stop();
        self.wait();
        self.close();
        self.state.get()
    }

    fn close(&mut self) {
        self.events.take();
        if let Some(handle) = self.dispatcher.take() {
            if handle.join().is_err() {
                tracing::error!("Dispatcher thread panicked");
            }
        }
    }

    fn abort_start(&self, workers: Vec<JoinHandle<()>>, events: &EventSender, err: &DecoderError) {
        tracing::error!("{}", err);
        self.stop.trigger();
        for handle in workers {
            let _ = handle.join();
        }
        events.emit(PipelineEvent::Error(err.to_string()));
        events.finish(PipelineState::Failed, self.counters.samples_published());
    }
}

impl Drop for PipelineController {
    fn drop(&mut self) {
        self.stop();
        self.wait();
        self.close();
    }
}

/// Owns the ingestion loop and tears the run down once it ends
struct Supervisor<S> {
    ingest: IngestLoop<S>,
    workers: Vec<JoinHandle<()>>,
    events: EventSender,
    state: Arc<StateCell>,
    stop: StopSignal,
    counters: Arc<PipelineCounters>,
}

impl<S: LineSource> Supervisor<S> {
    fn run(self) {
        let outcome = self.ingest.run();

        // End of input and stop handles arrive here still Running
        self.state
            .compare_and_set(PipelineState::Running, PipelineState::Stopping);

        // After end of input the workers drain their queues; otherwise
        // whatever is still queued is discarded
        if !matches!(outcome, IngestOutcome::EndOfInput) {
            self.stop.trigger();
        }

        for (index, handle) in self.workers.into_iter().enumerate() {
            if handle.join().is_err() {
                tracing::error!("Channel {} worker panicked", index + 1);
            }
        }

        let total = self.counters.samples_published();
        let terminal = match outcome {
            IngestOutcome::Failed(err) => {
                self.events.emit(PipelineEvent::Error(err.to_string()));
                PipelineState::Failed
            }
            _ => PipelineState::Stopped,
        };

        tracing::info!(
            "Pipeline {}: {} samples, {} dropped",
            match terminal {
                PipelineState::Failed => "failed",
                _ => "stopped",
            },
            total,
            self.counters.snapshot().total_dropped()
        );
        self.events.finish(terminal, total);
    }
}
