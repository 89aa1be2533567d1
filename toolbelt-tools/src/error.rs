//! Errors produced by tool implementations, providers and the loader.

use thiserror::Error;
use toolbelt_primitives::ToolId;

/// Result alias for tool and provider operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Result alias for loader operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Errors returned by tool implementations and capability providers.
#[derive(Debug, Error)]
pub enum ToolError {
    /// An input contract could not be parsed.
    #[error("invalid input contract: {reason}")]
    InvalidContract {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Tool execution failed.
    #[error("tool execution failed: {reason}")]
    Execution {
        /// Human-readable error returned by the tool implementation.
        reason: String,
    },

    /// A provider could not produce an implementation.
    #[error("tool unavailable: {reason}")]
    Unavailable {
        /// Human-readable reason the implementation is missing.
        reason: String,
    },
}

impl ToolError {
    /// Creates an execution error from the supplied reason.
    #[must_use]
    pub fn execution(reason: impl Into<String>) -> Self {
        Self::Execution {
            reason: reason.into(),
        }
    }

    /// Creates an unavailability error from the supplied reason.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Reasons a tool implementation failed to load.
///
/// Values are cloneable so a single failed load can be reported to every
/// caller that was waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    /// No static or runtime provider is bound to the identifier.
    #[error("no provider is bound to tool `{id}`")]
    MissingBinding {
        /// Identifier of the unbound tool.
        id: ToolId,
    },

    /// The provider returned an error.
    #[error("provider for tool `{id}` failed: {reason}")]
    Provider {
        /// Identifier of the tool being loaded.
        id: ToolId,
        /// Error reported by the provider.
        reason: String,
    },

    /// The provider panicked while loading.
    #[error("provider for tool `{id}` panicked")]
    Panicked {
        /// Identifier of the tool being loaded.
        id: ToolId,
    },
}

impl LoadError {
    /// Returns the identifier of the tool that failed to load.
    #[must_use]
    pub const fn id(&self) -> &ToolId {
        match self {
            Self::MissingBinding { id } | Self::Provider { id, .. } | Self::Panicked { id } => id,
        }
    }
}

/// Identifier collided with an existing entry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("tool `{id}` is already registered")]
pub struct DuplicateId {
    /// Identifier of the offending tool.
    pub id: ToolId,
}
