//! Core shared types for toolbelt: identifiers, descriptors and errors.

#![warn(missing_docs, clippy::pedantic)]

mod descriptor;
mod error;
mod ids;

/// Tool descriptors and supporting builders.
pub use descriptor::{Descriptor, DescriptorBuilder};
/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Identifiers for tools and agent turns.
pub use ids::{ToolId, TurnId};
