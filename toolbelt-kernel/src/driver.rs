//! Turn driver that walks the turn state machine against a registry.

use std::collections::HashMap;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use toolbelt_primitives::{ToolId, TurnId};
use toolbelt_telemetry::turn_span;
use toolbelt_tools::{ErrorKind, InvocationResult, ToolHandle};
use tracing::{Instrument, Span, debug, info, warn};

use crate::core_set::union;
use crate::registry::ToolRegistry;
use crate::turn::{TurnError, TurnEvent, TurnMachine, TurnResult, TurnState};

/// Outcome of one invocation made during a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationRecord {
    /// Tool that was invoked.
    pub tool: ToolId,
    /// Failure class, or `None` on success.
    pub error: Option<ErrorKind>,
    /// Wall-clock duration in milliseconds.
    pub elapsed_ms: u64,
}

/// Applies `event` to the machine when dropped.
///
/// Keeps the turn usable when a load or invoke future is abandoned midway.
struct Settle<'m> {
    machine: &'m mut TurnMachine,
    event: TurnEvent,
}

impl Drop for Settle<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.machine.transition(self.event) {
            debug!(error = %err, "turn step already settled");
        }
    }
}

/// What a finished turn did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnSummary {
    /// Turn identifier.
    pub turn_id: TurnId,
    /// Ranked ids.
    pub ranked: Vec<ToolId>,
    /// Ranked ids plus core ids.
    pub selected: Vec<ToolId>,
    /// Ids that loaded, in selection order.
    pub loaded: Vec<ToolId>,
    /// Invocations in the order they were made.
    pub invocations: Vec<InvocationRecord>,
}

/// A single orchestration turn.
///
/// Steps must run in order: [`Turn::rank`], [`Turn::union`], [`Turn::load`],
/// then any number of [`Turn::invoke`] calls, then [`Turn::finish`]. Calling
/// a step out of order fails with [`TurnError::InvalidTransition`] and leaves
/// the turn unchanged.
pub struct Turn<'r> {
    registry: &'r ToolRegistry,
    machine: TurnMachine,
    cancel: CancellationToken,
    span: Span,
    ranked: Vec<ToolId>,
    selected: Vec<ToolId>,
    handles: HashMap<ToolId, ToolHandle>,
    invocations: Vec<InvocationRecord>,
}

impl std::fmt::Debug for Turn<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Turn")
            .field("turn_id", &self.machine.turn_id())
            .field("state", &self.machine.state())
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}

impl<'r> Turn<'r> {
    pub(crate) fn new(registry: &'r ToolRegistry, turn_id: TurnId) -> Self {
        Self {
            registry,
            machine: TurnMachine::new(turn_id),
            cancel: CancellationToken::new(),
            span: turn_span(turn_id),
            ranked: Vec::new(),
            selected: Vec::new(),
            handles: HashMap::new(),
            invocations: Vec::new(),
        }
    }

    /// Turn identifier.
    #[must_use]
    pub fn id(&self) -> TurnId {
        self.machine.turn_id()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> TurnState {
        self.machine.state()
    }

    /// Token that cancels this turn's invocations when fired.
    ///
    /// Other turns are unaffected.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancels any in-flight and future invocations of this turn.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Ranked ids, available after [`Turn::rank`].
    #[must_use]
    pub fn ranked(&self) -> &[ToolId] {
        &self.ranked
    }

    /// Selected ids, available after [`Turn::union`].
    #[must_use]
    pub fn selected(&self) -> &[ToolId] {
        &self.selected
    }

    /// Handle loaded for `id`, available after [`Turn::load`].
    #[must_use]
    pub fn handle(&self, id: &ToolId) -> Option<&ToolHandle> {
        self.handles.get(id)
    }

    /// Ranks the catalog against `query`.
    ///
    /// Ranking failures are logged and treated as an empty ranking so the
    /// core tools still reach the model.
    ///
    /// # Errors
    ///
    /// Returns [`TurnError::InvalidTransition`] unless the turn is idle.
    pub fn rank(&mut self, query: &str, limit: usize) -> TurnResult<&[ToolId]> {
        self.machine.transition(TurnEvent::Rank)?;
        let _entered = self.span.enter();
        self.ranked = self.registry.rank(query, limit).unwrap_or_else(|err| {
            warn!(error = %err, "ranking failed; continuing with core tools only");
            Vec::new()
        });
        debug!(ranked = self.ranked.len(), "turn ranked");
        Ok(&self.ranked)
    }

    /// Adds the core tools to the ranking.
    ///
    /// # Errors
    ///
    /// Returns [`TurnError::InvalidTransition`] unless ranking has run.
    pub fn union(&mut self) -> TurnResult<&[ToolId]> {
        self.machine.transition(TurnEvent::Union)?;
        self.selected = union(&self.ranked, &self.registry.core_ids());
        Ok(&self.selected)
    }

    /// Resolves handles for the selected ids.
    ///
    /// Ids that fail to load are left out; the turn still becomes ready,
    /// also when this future is dropped before loading finishes.
    ///
    /// # Errors
    ///
    /// Returns [`TurnError::InvalidTransition`] unless the union has run.
    pub async fn load(&mut self) -> TurnResult<Vec<ToolId>> {
        self.machine.transition(TurnEvent::Load)?;
        let settle = Settle {
            machine: &mut self.machine,
            event: TurnEvent::Loaded,
        };
        self.handles = self
            .registry
            .resolve(&self.selected)
            .instrument(self.span.clone())
            .await;
        drop(settle);
        Ok(self.loaded_ids())
    }

    /// Runs rank, union and load in sequence.
    ///
    /// # Errors
    ///
    /// Returns [`TurnError::InvalidTransition`] unless the turn is idle.
    pub async fn prepare(&mut self, query: &str, limit: usize) -> TurnResult<Vec<ToolId>> {
        self.rank(query, limit)?;
        self.union()?;
        self.load().await
    }

    fn loaded_ids(&self) -> Vec<ToolId> {
        self.selected
            .iter()
            .filter(|id| self.handles.contains_key(*id))
            .cloned()
            .collect()
    }

    /// Invokes a loaded tool under this turn's cancellation token.
    ///
    /// The outer result reports misuse of the turn. The inner result is the
    /// invocation outcome, which is recorded either way. Dropping the future
    /// aborts the tool and returns the turn to ready without a record.
    ///
    /// # Errors
    ///
    /// Returns [`TurnError::NotLoaded`] when `id` has no handle in this turn
    /// and [`TurnError::InvalidTransition`] unless the turn is ready.
    pub async fn invoke(&mut self, id: &ToolId, args: Value) -> TurnResult<InvocationResult> {
        if !self.machine.state().is_ready() {
            return Err(TurnError::InvalidTransition {
                turn_id: self.id(),
                from: self.machine.state(),
                event: TurnEvent::Invoke,
            });
        }
        let Some(handle) = self.handles.get(id).cloned() else {
            return Err(TurnError::NotLoaded {
                turn_id: self.id(),
                tool: id.clone(),
            });
        };

        self.machine.transition(TurnEvent::Invoke)?;
        let settle = Settle {
            machine: &mut self.machine,
            event: TurnEvent::Complete,
        };
        let started = Instant::now();
        let outcome = self
            .registry
            .invoke_with_cancellation(&handle, args, &self.cancel)
            .instrument(self.span.clone())
            .await;
        drop(settle);

        #[allow(clippy::cast_possible_truncation)]
        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.invocations.push(InvocationRecord {
            tool: id.clone(),
            error: outcome.as_ref().err().map(toolbelt_tools::InvocationError::kind),
            elapsed_ms,
        });
        Ok(outcome)
    }

    /// Ends the turn and returns what it did.
    ///
    /// # Errors
    ///
    /// Returns [`TurnError::InvalidTransition`] while loading or invoking.
    pub fn finish(mut self) -> TurnResult<TurnSummary> {
        self.machine.transition(TurnEvent::Finish)?;
        let loaded = self.loaded_ids();
        let _entered = self.span.enter();
        info!(
            selected = self.selected.len(),
            loaded = loaded.len(),
            invocations = self.invocations.len(),
            "turn finished"
        );
        Ok(TurnSummary {
            turn_id: self.machine.turn_id(),
            ranked: std::mem::take(&mut self.ranked),
            selected: std::mem::take(&mut self.selected),
            loaded,
            invocations: std::mem::take(&mut self.invocations),
        })
    }
}
