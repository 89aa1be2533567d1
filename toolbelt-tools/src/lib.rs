//! Tool catalog, loading and invocation utilities.
//!
//! The modules exposed here keep descriptor metadata ([`catalog`]), bind tool
//! identifiers to the providers that produce implementations ([`provider`]),
//! load implementations through a single-flight cache ([`loader`]), and invoke
//! loaded handles with argument validation, timeouts and structured errors
//! ([`invoke`]).

#![warn(missing_docs, clippy::pedantic)]

pub mod catalog;
pub mod contract;
pub mod error;
pub mod invoke;
pub mod loader;
pub mod provider;
pub mod tool;

pub use catalog::{Catalog, CatalogSnapshot};
pub use contract::{AdditionalProperties, InputContract, Schema, SchemaType, Violation};
pub use error::{DuplicateId, LoadError, LoadResult, ToolError, ToolResult};
pub use invoke::{ErrorKind, InvocationAdapter, InvocationConfig, InvocationError, InvocationResult};
pub use loader::{LoaderConfig, PreloadReport, ToolLoader};
pub use provider::{BindingOrigin, CapabilityProvider, ProviderBindings, StaticProvider};
pub use tool::{ContractedTool, Tool, ToolHandle};
