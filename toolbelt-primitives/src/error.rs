//! Shared error definitions for toolbelt primitives.

use thiserror::Error;
use uuid::Error as UuidError;

/// Result alias used throughout the primitives crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided turn identifier could not be parsed.
    #[error("invalid turn id: {source}")]
    InvalidTurnId {
        /// Source parsing error from the UUID library.
        #[from]
        source: UuidError,
    },

    /// Tool identifier failed validation.
    #[error("invalid tool id `{id}`: {reason}")]
    InvalidToolId {
        /// The offending identifier string.
        id: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Descriptor definition failed validation.
    #[error("invalid descriptor `{id}`: {reason}")]
    InvalidDescriptor {
        /// Identifier of the descriptor being built.
        id: String,
        /// Human-readable reason for rejection.
        reason: String,
    },
}
