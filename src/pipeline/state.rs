//! Shared lifecycle state with blocking wait for completion

use crate::types::PipelineState;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Pipeline state shared by the controller, the ingestion thread and the
/// dispatcher
#[derive(Debug, Default)]
pub struct StateCell {
    state: Mutex<PipelineState>,
    changed: Condvar,
}

impl StateCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> PipelineState {
        *self.lock()
    }

    /// Move to `next` if the current state allows it
    pub fn transition(&self, next: PipelineState) -> bool {
        let mut state = self.lock();
        if !state.can_transition_to(next) {
            return false;
        }
        tracing::debug!("Pipeline state: {} -> {}", *state, next);
        *state = next;
        self.changed.notify_all();
        true
    }

    /// Move from exactly `expected` to `next`
    pub fn compare_and_set(&self, expected: PipelineState, next: PipelineState) -> bool {
        let mut state = self.lock();
        if *state != expected || !state.can_transition_to(next) {
            return false;
        }
        tracing::debug!("Pipeline state: {} -> {}", *state, next);
        *state = next;
        self.changed.notify_all();
        true
    }

    /// Block until the state is terminal and return it
    pub fn wait_terminal(&self) -> PipelineState {
        let mut state = self.lock();
        while !state.is_terminal() {
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *state
    }

    fn lock(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
