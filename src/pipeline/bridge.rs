//! Thread boundary between the pipeline and the collaborator
//!
//! Workers never call the collaborator directly. They push
//! [`PipelineEvent`]s into one bounded channel, and a single dispatcher
//! thread drains it and invokes the [`PipelineListener`]. Callbacks are
//! therefore serialized and never run on a worker thread.
//!
//! The terminal notification also travels through this channel, so every
//! observation queued before it is delivered first. The controller's state
//! only becomes terminal after the listener has seen `Stopped`.

use crate::pipeline::state::StateCell;
use crate::types::{Observation, PipelineState};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Notifications delivered to the collaborator, in order
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Processing has started
    Started,

    /// A decimated channel value
    ChannelValue(Observation),

    /// A channel failed to decode one sample (non-fatal)
    DecodingError { channel: usize, message: String },

    /// A fatal error; always followed by `Stopped`
    Error(String),

    /// Processing has finished; always the last event of a run
    Stopped { total_samples: u64 },
}

/// Receiver of pipeline notifications
///
/// All methods are called from the dispatcher thread, one at a time.
/// Only value updates are mandatory; the other hooks default to no-ops.
pub trait PipelineListener: Send + 'static {
    fn on_processing_started(&mut self) {}

    /// A decimated reading of a 1-based channel
    fn on_channel_value_updated(&mut self, channel: usize, value: f64, sequence: u32);

    fn on_processing_stopped(&mut self, _total_samples: u64) {}

    fn on_error(&mut self, _message: &str) {}

    fn on_decoding_error(&mut self, _channel: usize, _message: &str) {}

    /// Route an event to the matching hook
    fn handle(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::Started => self.on_processing_started(),
            PipelineEvent::ChannelValue(obs) => {
                self.on_channel_value_updated(obs.channel, obs.value, obs.sequence)
            }
            PipelineEvent::DecodingError { channel, message } => {
                self.on_decoding_error(channel, &message)
            }
            PipelineEvent::Error(message) => self.on_error(&message),
            PipelineEvent::Stopped { total_samples } => self.on_processing_stopped(total_samples),
        }
    }
}

/// Forward every event into a channel, for collaborators that prefer to
/// poll rather than implement callbacks
impl PipelineListener for Sender<PipelineEvent> {
    fn on_channel_value_updated(&mut self, channel: usize, value: f64, sequence: u32) {
        let _ = self.send(PipelineEvent::ChannelValue(Observation::new(
            channel, value, sequence,
        )));
    }

    fn handle(&mut self, event: PipelineEvent) {
        let _ = self.send(event);
    }
}

/// Messages carried from the pipeline threads to the dispatcher
#[derive(Debug)]
pub(crate) enum Dispatch {
    Event(PipelineEvent),
    /// Deliver `Stopped`, then enter `state`
    Finish {
        state: PipelineState,
        total_samples: u64,
    },
}

/// Cloneable producer side of the notification channel
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<Dispatch>,
}

impl EventSender {
    /// Queue an event for the dispatcher
    ///
    /// Blocks while the channel is full. Returns `false` if the dispatcher
    /// is gone.
    pub fn emit(&self, event: PipelineEvent) -> bool {
        self.tx.send(Dispatch::Event(event)).is_ok()
    }

    /// Queue the terminal notification
    pub(crate) fn finish(&self, state: PipelineState, total_samples: u64) -> bool {
        self.tx
            .send(Dispatch::Finish {
                state,
                total_samples,
            })
            .is_ok()
    }
}

/// Create a notification channel without a dispatcher thread
///
/// The receiver yields the raw dispatch messages; [`drain_events`] turns
/// them into plain events. Used by tests that drive a worker directly.
pub(crate) fn event_channel(capacity: usize) -> (EventSender, Receiver<Dispatch>) {
    let (tx, rx) = bounded(capacity);
    (EventSender { tx }, rx)
}

/// Collect everything currently queued as plain events
#[cfg(test)]
pub(crate) fn drain_events(rx: &Receiver<Dispatch>) -> Vec<PipelineEvent> {
    rx.try_iter()
        .map(|msg| match msg {
            Dispatch::Event(event) => event,
            Dispatch::Finish { total_samples, .. } => PipelineEvent::Stopped { total_samples },
        })
        .collect()
}

/// Spawn the dispatcher thread
///
/// The thread exits once every [`EventSender`] has been dropped and the
/// channel is drained.
pub(crate) fn spawn_dispatcher(
    listener: Box<dyn PipelineListener>,
    state: Arc<StateCell>,
    capacity: usize,
) -> std::io::Result<(EventSender, JoinHandle<()>)> {
    let (events, rx) = event_channel(capacity);
    let handle = thread::Builder::new()
        .name("pipeline-dispatch".to_string())
        .spawn(move || run_dispatcher(listener, rx, state))?;
    Ok((events, handle))
}

fn run_dispatcher(
    mut listener: Box<dyn PipelineListener>,
    rx: Receiver<Dispatch>,
    state: Arc<StateCell>,
) {
    tracing::debug!("Dispatcher started");

    for msg in rx {
        let (event, terminal) = match msg {
            Dispatch::Event(event) => (event, None),
            Dispatch::Finish {
                state,
                total_samples,
            } => (PipelineEvent::Stopped { total_samples }, Some(state)),
        };

        // A panicking listener must not take the terminal transition with it
        if panic::catch_unwind(AssertUnwindSafe(|| listener.handle(event))).is_err() {
            tracing::error!("Pipeline listener panicked while handling an event");
        }

        if let Some(terminal) = terminal {
            state.transition(terminal);
        }
    }

    tracing::debug!("Dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl PipelineListener for Recorder {
        fn on_processing_started(&mut self) {
            self.calls.push("started".into());
        }

        fn on_channel_value_updated(&mut self, channel: usize, value: f64, sequence: u32) {
            self.calls.push(format!("{} {} {}", channel, value, sequence));
        }

        fn on_processing_stopped(&mut self, total_samples: u64) {
            self.calls.push(format!("stopped {}", total_samples));
        }
    }

    #[test]
    fn test_handle_routes_events() {
        let mut recorder = Recorder::default();
        recorder.handle(PipelineEvent::Started);
        recorder.handle(PipelineEvent::ChannelValue(Observation::new(2, 0.5, 9)));
        recorder.handle(PipelineEvent::Error("ignored".into()));
        recorder.handle(PipelineEvent::Stopped { total_samples: 9 });

        assert_eq!(recorder.calls, vec!["started", "2 0.5 9", "stopped 9"]);
    }

    #[test]
    fn test_sender_listener_forwards() {
        let (tx, rx) = unbounded();
        let mut listener = tx;
        listener.on_channel_value_updated(1, 1.5, 3);
        listener.handle(PipelineEvent::Error("boom".into()));

        assert_eq!(
            rx.try_recv().unwrap(),
            PipelineEvent::ChannelValue(Observation::new(1, 1.5, 3))
        );
        assert_eq!(rx.try_recv().unwrap(), PipelineEvent::Error("boom".into()));
    }

    #[test]
    fn test_dispatcher_delivers_in_order_and_sets_state() {
        let (tx, rx) = unbounded();
        let state = Arc::new(StateCell::new());
        state.transition(PipelineState::Running);
        state.transition(PipelineState::Stopping);

        let (events, handle) = spawn_dispatcher(Box::new(tx), Arc::clone(&state), 16).unwrap();
        events.emit(PipelineEvent::Started);
        events.emit(PipelineEvent::ChannelValue(Observation::new(1, 0.25, 100)));
        events.finish(PipelineState::Stopped, 100);
        drop(events);
        handle.join().unwrap();

        assert_eq!(state.get(), PipelineState::Stopped);
        let received: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            received,
            vec![
                PipelineEvent::Started,
                PipelineEvent::ChannelValue(Observation::new(1, 0.25, 100)),
                PipelineEvent::Stopped { total_samples: 100 },
            ]
        );
    }

    #[test]
    fn test_dispatcher_survives_listener_panic() {
        struct Panicky(Sender<u64>);

        impl PipelineListener for Panicky {
            fn on_channel_value_updated(&mut self, _: usize, _: f64, _: u32) {
                panic!("listener bug");
            }

            fn on_processing_stopped(&mut self, total_samples: u64) {
                let _ = self.0.send(total_samples);
            }
        }

        let (tx, rx) = unbounded();
        let state = Arc::new(StateCell::new());
        state.transition(PipelineState::Running);
        state.transition(PipelineState::Stopping);

        let (events, handle) = spawn_dispatcher(Box::new(Panicky(tx)), state, 4).unwrap();
        events.emit(PipelineEvent::ChannelValue(Observation::new(1, 0.0, 1)));
        events.finish(PipelineState::Stopped, 1);
        drop(events);
        handle.join().unwrap();

        assert_eq!(rx.try_recv().unwrap(), 1);
    }
}
