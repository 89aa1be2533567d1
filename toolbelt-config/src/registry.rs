use std::path::Path;

use serde::{Deserialize, Serialize};
use toolbelt_primitives::ToolId;
use toolbelt_ranker::RankerConfig;
use toolbelt_tools::{InvocationConfig, LoaderConfig};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::format::{self, Format};

/// Tunables for every registry component.
///
/// Every section is optional; omitted values fall back to their defaults.
///
/// ```toml
/// core = ["search"]
///
/// [ranker]
/// default_limit = 5
///
/// [ranker.weights]
/// keywords = 4.0
///
/// [invocation]
/// default_timeout_ms = 10000
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Ranking parameters.
    pub ranker: RankerConfig,
    /// Loader parameters.
    pub loader: LoaderConfig,
    /// Invocation parameters.
    pub invocation: InvocationConfig,
    /// Ids that must be present in every turn's resolved set.
    pub core: Vec<ToolId>,
}

impl RegistryConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] on malformed input and
    /// [`ConfigError::Invalid`] when values are out of range.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        Self::parse(Format::Toml, text)
    }

    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] on malformed input and
    /// [`ConfigError::Invalid`] when values are out of range.
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        Self::parse(Format::Json, text)
    }

    /// Loads a `.toml` or `.json` file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::UnsupportedFormat`] when
    /// the file cannot be read, plus any parse or validation error.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let (format, text) = format::read(path)?;
        let config = Self::parse(format, &text)?;
        debug!(path = %path.display(), core = config.core.len(), "registry configuration loaded");
        Ok(config)
    }

    fn parse(format: Format, text: &str) -> ConfigResult<Self> {
        let config: Self = format.parse(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is in range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> ConfigResult<()> {
        self.ranker
            .validate()
            .map_err(|err| ConfigError::invalid(err.to_string()))?;
        if self.invocation.default_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "invocation.default_timeout_ms must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = RegistryConfig::from_toml_str("").unwrap();
        assert_eq!(config, RegistryConfig::default());
        assert_eq!(config.ranker.default_limit.get(), 8);
        assert_eq!(config.loader.max_concurrent_loads.get(), 8);
        assert_eq!(config.invocation.default_timeout_ms, 30_000);
        assert!(config.core.is_empty());
    }

    #[test]
    fn toml_overrides_are_applied() {
        let config = RegistryConfig::from_toml_str(
            r#"
            core = ["search", "clock"]

            [ranker]
            default_limit = 5
            fuzzy_ratio = 0.3

            [ranker.weights]
            keywords = 4.0

            [loader]
            max_concurrent_loads = 2

            [invocation]
            default_timeout_ms = 1500
            "#,
        )
        .unwrap();

        assert_eq!(config.core, vec![ToolId::new("search").unwrap(), ToolId::new("clock").unwrap()]);
        assert_eq!(config.ranker.default_limit.get(), 5);
        assert!((config.ranker.weights.keywords - 4.0).abs() < f64::EPSILON);
        assert!((config.ranker.weights.tags - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.loader.max_concurrent_loads.get(), 2);
        assert_eq!(config.invocation.default_timeout_ms, 1500);
    }

    #[test]
    fn json_is_accepted() {
        let config =
            RegistryConfig::from_json_str(r#"{"core": ["calc"], "ranker": {"bm25": {"k1": 1.5}}}"#)
                .unwrap();
        assert_eq!(config.core.len(), 1);
        assert!((config.ranker.bm25.k1 - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = RegistryConfig::from_toml_str("[ranker.bm25]\nb = 2.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let err = RegistryConfig::from_toml_str("[invocation]\ndefault_timeout_ms = 0").unwrap_err();
        assert!(err.to_string().contains("default_timeout_ms"));
    }

    #[test]
    fn zero_limits_fail_to_parse() {
        assert!(matches!(
            RegistryConfig::from_toml_str("[loader]\nmax_concurrent_loads = 0"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn invalid_core_ids_fail_to_parse() {
        assert!(RegistryConfig::from_json_str(r#"{"core": ["has space"]}"#).is_err());
    }
}
