//! Run lifecycle
//!
//! `Pending → Synthesizing → Applying → Reporting → Publishing → Done`, with
//! `PartiallyFailed` reachable from any non-terminal state.

use crate::models::RunState;
use crate::obs;

pub struct RunLifecycle {
    run_id: String,
    state: RunState,
}

impl RunLifecycle {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            state: RunState::Pending,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Move to `next`, emitting a state change event
    pub fn advance(&mut self, next: RunState) {
        debug_assert!(
            is_valid_transition(self.state, next),
            "invalid run transition {:?} -> {:?}",
            self.state,
            next
        );
        if self.state == next {
            return;
        }
        obs::emit_state_changed(&self.run_id, self.state, next);
        self.state = next;
    }
}

pub fn is_valid_transition(from: RunState, to: RunState) -> bool {
    use RunState::*;

    if from == to {
        return !from.is_terminal();
    }
    match (from, to) {
        (Pending, Synthesizing)
        | (Synthesizing, Applying)
        | (Applying, Reporting)
        | (Reporting, Publishing)
        | (Publishing, Done) => true,
        (from, PartiallyFailed) => !from.is_terminal(),
        _ => false,
    }
}
