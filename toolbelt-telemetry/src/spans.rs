//! Span constructors shared by the registry and its callers.

use toolbelt_primitives::{ToolId, TurnId};
use tracing::{Span, info_span};

/// Span covering one orchestration turn.
#[must_use]
pub fn turn_span(turn: TurnId) -> Span {
    info_span!("turn", turn = %turn)
}

/// Span covering a single tool invocation.
#[must_use]
pub fn invocation_span(tool: &ToolId) -> Span {
    info_span!("invoke", tool = %tool)
}
