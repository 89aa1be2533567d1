//! State machine for one orchestration turn.

use serde::Serialize;
use thiserror::Error;
use toolbelt_primitives::{ToolId, TurnId};
use tracing::debug;

/// States a turn moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    /// Turn created, nothing done yet.
    Idle,
    /// Ranking the catalog against the query.
    Ranking,
    /// Core tools merged into the ranked set.
    Unioned,
    /// Resolving implementations for the selected set.
    Loading,
    /// Handles are available for invocation.
    Ready,
    /// A tool invocation is in flight.
    Invoking,
    /// Turn finished; no further work is accepted.
    Done,
}

impl TurnState {
    /// Returns `true` when tools may be invoked.
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns `true` once the turn has finished.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Events that drive turn transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEvent {
    /// Start ranking.
    Rank,
    /// Merge the core set into the ranking.
    Union,
    /// Start resolving handles.
    Load,
    /// Resolution finished.
    Loaded,
    /// Start an invocation.
    Invoke,
    /// An invocation finished, successfully or not.
    Complete,
    /// End the turn.
    Finish,
}

/// Validated turn state holder.
#[derive(Debug, Clone, Copy)]
pub struct TurnMachine {
    turn_id: TurnId,
    state: TurnState,
}

impl TurnMachine {
    /// Creates a machine in [`TurnState::Idle`].
    #[must_use]
    pub const fn new(turn_id: TurnId) -> Self {
        Self {
            turn_id,
            state: TurnState::Idle,
        }
    }

    /// Returns the turn identifier.
    #[must_use]
    pub const fn turn_id(&self) -> TurnId {
        self.turn_id
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> TurnState {
        self.state
    }

    /// Applies `event`, returning the resulting state.
    ///
    /// # Errors
    ///
    /// Returns [`TurnError::InvalidTransition`] when `event` is not allowed
    /// from the current state.
    pub fn transition(&mut self, event: TurnEvent) -> TurnResult<TurnState> {
        let next = match (self.state, event) {
            (TurnState::Idle, TurnEvent::Rank) => Some(TurnState::Ranking),
            (TurnState::Ranking, TurnEvent::Union) => Some(TurnState::Unioned),
            (TurnState::Unioned, TurnEvent::Load) => Some(TurnState::Loading),
            (TurnState::Loading, TurnEvent::Loaded) | (TurnState::Invoking, TurnEvent::Complete) => {
                Some(TurnState::Ready)
            }
            (TurnState::Ready, TurnEvent::Invoke) => Some(TurnState::Invoking),
            (TurnState::Idle | TurnState::Ready, TurnEvent::Finish) => Some(TurnState::Done),
            _ => None,
        };

        let Some(next_state) = next else {
            return Err(TurnError::InvalidTransition {
                turn_id: self.turn_id,
                from: self.state,
                event,
            });
        };

        debug!(
            turn_id = %self.turn_id,
            ?self.state,
            ?next_state,
            ?event,
            "turn transition"
        );
        self.state = next_state;
        Ok(next_state)
    }
}

/// Errors raised while driving a turn.
#[derive(Debug, Error)]
pub enum TurnError {
    /// Transition was not permitted from the current state.
    #[error("invalid turn transition from {from:?} via {event:?} in turn {turn_id}")]
    InvalidTransition {
        /// Turn whose transition failed.
        turn_id: TurnId,
        /// State prior to the attempted transition.
        from: TurnState,
        /// Event that was rejected.
        event: TurnEvent,
    },

    /// The requested tool is not among the turn's loaded handles.
    #[error("tool `{tool}` was not loaded in turn {turn_id}")]
    NotLoaded {
        /// Turn the invocation was attempted in.
        turn_id: TurnId,
        /// Requested tool.
        tool: ToolId,
    },
}

/// Result alias used for turn operations.
pub type TurnResult<T> = Result<T, TurnError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_machine() -> TurnMachine {
        let mut machine = TurnMachine::new(TurnId::random());
        for event in [TurnEvent::Rank, TurnEvent::Union, TurnEvent::Load, TurnEvent::Loaded] {
            machine.transition(event).unwrap();
        }
        machine
    }

    #[test]
    fn happy_path_reaches_ready() {
        let machine = ready_machine();
        assert!(machine.state().is_ready());
    }

    #[test]
    fn invocations_cycle_through_ready() {
        let mut machine = ready_machine();
        for _ in 0..2 {
            assert_eq!(machine.transition(TurnEvent::Invoke).unwrap(), TurnState::Invoking);
            assert_eq!(machine.transition(TurnEvent::Complete).unwrap(), TurnState::Ready);
        }
        machine.transition(TurnEvent::Finish).unwrap();
        assert!(machine.state().is_terminal());
    }

    #[test]
    fn invoking_before_ready_is_rejected() {
        let mut machine = TurnMachine::new(TurnId::random());
        machine.transition(TurnEvent::Rank).unwrap();

        let err = machine
            .transition(TurnEvent::Invoke)
            .expect_err("invoke should fail while ranking");
        assert!(matches!(
            err,
            TurnError::InvalidTransition {
                from: TurnState::Ranking,
                event: TurnEvent::Invoke,
                ..
            }
        ));
        assert_eq!(machine.state(), TurnState::Ranking);
    }

    #[test]
    fn cannot_finish_mid_invocation_or_twice() {
        let mut machine = ready_machine();
        machine.transition(TurnEvent::Invoke).unwrap();
        assert!(machine.transition(TurnEvent::Finish).is_err());

        machine.transition(TurnEvent::Complete).unwrap();
        machine.transition(TurnEvent::Finish).unwrap();
        assert!(machine.transition(TurnEvent::Finish).is_err());
        assert!(machine.transition(TurnEvent::Rank).is_err());
    }

    #[test]
    fn idle_turn_can_finish() {
        let mut machine = TurnMachine::new(TurnId::random());
        assert_eq!(machine.transition(TurnEvent::Finish).unwrap(), TurnState::Done);
    }
}
