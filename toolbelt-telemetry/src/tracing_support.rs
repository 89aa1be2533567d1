//! Structured tracing helpers.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Filter used when `RUST_LOG` is unset, e.g. `"info,toolbelt_kernel=debug"`.
    pub default_directive: String,
    /// Include the event target in output.
    pub with_target: bool,
    /// Emit ANSI colours.
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_directive: "info".into(),
            with_target: false,
            ansi: true,
        }
    }
}

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The default directive could not be parsed.
    #[error("invalid log directive `{directive}`: {source}")]
    InvalidDirective {
        /// Directive as configured.
        directive: String,
        /// Parser error.
        #[source]
        source: ParseError,
    },

    /// A global subscriber is already installed.
    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled,
}

fn filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.default_directive).map_err(|source| {
        TelemetryError::InvalidDirective {
            directive: config.default_directive.clone(),
            source,
        }
    })
}

/// Installs a global fmt subscriber filtered by `RUST_LOG` or the configured
/// default directive.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidDirective`] for an unparsable directive
/// and [`TelemetryError::AlreadyInstalled`] when a subscriber already exists.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(config)?)
        .with_target(config.with_target)
        .with_ansi(config.ansi)
        .try_init()
        .map_err(|_| TelemetryError::AlreadyInstalled)
}

/// Like [`init`], but treats an existing subscriber as success.
///
/// Returns `true` when this call installed the subscriber.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidDirective`] for an unparsable directive.
pub fn try_init(config: &TelemetryConfig) -> Result<bool, TelemetryError> {
    match init(config) {
        Ok(()) => Ok(true),
        Err(TelemetryError::AlreadyInstalled) => Ok(false),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_installation_is_harmless() {
        let config = TelemetryConfig::default();
        try_init(&config).unwrap();
        assert!(!try_init(&config).unwrap());
    }

    #[test]
    fn bad_directive_is_reported() {
        let config = TelemetryConfig {
            default_directive: "toolbelt=verbose".into(),
            ..TelemetryConfig::default()
        };
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(matches!(
                try_init(&config),
                Err(TelemetryError::InvalidDirective { .. })
            ));
        }
    }
}
