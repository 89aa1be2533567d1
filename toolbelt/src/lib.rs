//! Per-turn tool selection, loading and invocation.
//!
//! Depend on this crate to get the whole stack behind feature flags, or on
//! the individual `toolbelt-*` crates for a narrower build.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use toolbelt_primitives as primitives;

/// Registry, turns and runtime merging (enabled by `kernel` feature).
#[cfg(feature = "kernel")]
pub use toolbelt_kernel as kernel;

/// Relevance ranking (enabled by `ranker` feature).
#[cfg(feature = "ranker")]
pub use toolbelt_ranker as ranker;

/// Catalog, providers, loader and invocation adapter (enabled by `tools` feature).
#[cfg(feature = "tools")]
pub use toolbelt_tools as tools;

/// Configuration and catalog files (enabled by `config` feature).
#[cfg(feature = "config")]
pub use toolbelt_config as config;

/// Tracing setup (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use toolbelt_telemetry as telemetry;

/// Types most orchestration loops need.
#[cfg(feature = "kernel")]
pub mod prelude {
    pub use toolbelt_config::{CatalogSource, RegistryConfig};
    pub use toolbelt_kernel::{Registration, Selection, ToolRegistry, Turn, TurnSummary};
    pub use toolbelt_primitives::{Descriptor, ToolId};
    pub use toolbelt_tools::{
        CapabilityProvider, ContractedTool, InputContract, InvocationError, Tool, ToolError,
        ToolHandle, ToolResult,
    };
}
