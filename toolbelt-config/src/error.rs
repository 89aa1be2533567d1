use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while reading configuration or catalog files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read `{path}`: {source}")]
    Io {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// TOML document failed to parse.
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON document failed to parse.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// File extension is neither `.toml` nor `.json`.
    #[error("unsupported configuration format for `{path}`")]
    UnsupportedFormat {
        /// Offending path.
        path: PathBuf,
    },

    /// A catalog entry failed descriptor validation.
    #[error("catalog entry `{id}` is invalid: {source}")]
    InvalidEntry {
        /// Identifier as written in the file.
        id: String,
        /// Validation failure.
        #[source]
        source: toolbelt_primitives::Error,
    },

    /// Values parsed but are out of range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Human-readable reason.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}
