//! Per-turn tool selection, loading and invocation.
//!
//! [`ToolRegistry`] ties together the descriptor catalog, the relevance
//! ranker, the single-flight loader and the invocation adapter. An
//! orchestration loop either calls the individual operations, asks for a
//! [`Selection`] in one step, or drives a [`Turn`] through its state machine.

#![warn(missing_docs, clippy::pedantic)]

mod core_set;
mod driver;
mod merger;
mod registry;
mod turn;

pub use core_set::union;
pub use driver::{InvocationRecord, Turn, TurnSummary};
pub use merger::{Registration, RejectionReason};
pub use registry::{Selection, ToolRegistry, ToolRegistryBuilder};
pub use turn::{TurnError, TurnEvent, TurnMachine, TurnResult, TurnState};
