//! Observability utilities for the tool registry.

#![warn(missing_docs, clippy::pedantic)]

pub mod spans;
pub mod tracing_support;

pub use spans::{invocation_span, turn_span};
pub use tracing_support::{TelemetryConfig, TelemetryError, init, try_init};
