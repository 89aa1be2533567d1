//! Tunable ranking parameters.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::error::{RankResult, RankingError};
use crate::index::{Field, MatchKind};

/// Per-field score multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldWeights {
    /// Weight applied to keyword matches.
    pub keywords: f64,
    /// Weight applied to tag matches.
    pub tags: f64,
    /// Weight applied to description matches.
    pub description: f64,
    /// Weight applied to example matches.
    pub examples: f64,
}

impl FieldWeights {
    /// Returns the weight for the supplied field.
    #[must_use]
    pub const fn weight(&self, field: Field) -> f64 {
        match field {
            Field::Keywords => self.keywords,
            Field::Tags => self.tags,
            Field::Description => self.description,
            Field::Examples => self.examples,
        }
    }
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            keywords: 3.0,
            tags: 2.0,
            description: 1.0,
            examples: 0.5,
        }
    }
}

/// Partial credit granted per match kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchCredits {
    /// Credit for an exact token match.
    pub exact: f64,
    /// Credit when the query token is a strict prefix of an indexed term.
    pub prefix: f64,
    /// Credit for a match within the fuzzy edit-distance bound.
    pub fuzzy: f64,
}

impl MatchCredits {
    /// Returns the credit for the supplied match kind.
    #[must_use]
    pub const fn credit(&self, kind: MatchKind) -> f64 {
        match kind {
            MatchKind::Exact => self.exact,
            MatchKind::Prefix => self.prefix,
            MatchKind::Fuzzy => self.fuzzy,
        }
    }
}

impl Default for MatchCredits {
    fn default() -> Self {
        Self {
            exact: 1.0,
            prefix: 0.5,
            fuzzy: 0.25,
        }
    }
}

/// BM25 saturation and length-normalisation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f64,
    /// Field-length normalisation, in `[0, 1]`.
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// Complete ranking configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankerConfig {
    /// Per-field weights.
    pub weights: FieldWeights,
    /// Per-match-kind credits.
    pub credits: MatchCredits,
    /// BM25 parameters.
    pub bm25: Bm25Params,
    /// Maximum fuzzy edit distance as a fraction of the query token length.
    pub fuzzy_ratio: f64,
    /// Query tokens shorter than this (in chars) never match fuzzily.
    pub min_fuzzy_len: usize,
    /// Result limit used when callers do not supply one.
    pub default_limit: NonZeroUsize,
}

impl RankerConfig {
    /// Maximum edit distance tolerated for a query token of `len` chars.
    #[must_use]
    pub fn fuzzy_budget(&self, len: usize) -> usize {
        if len < self.min_fuzzy_len || self.fuzzy_ratio <= 0.0 {
            return 0;
        }
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let budget = (len as f64 * self.fuzzy_ratio).floor() as usize;
        budget.max(1)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RankingError::InvalidConfig`] when a weight or credit is
    /// negative or not finite, or a BM25 parameter is out of range.
    pub fn validate(&self) -> RankResult<()> {
        let weights = [
            self.weights.keywords,
            self.weights.tags,
            self.weights.description,
            self.weights.examples,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(RankingError::InvalidConfig(
                "field weights must be finite and non-negative",
            ));
        }

        let credits = [self.credits.exact, self.credits.prefix, self.credits.fuzzy];
        if credits.iter().any(|c| !c.is_finite() || *c < 0.0) {
            return Err(RankingError::InvalidConfig(
                "match credits must be finite and non-negative",
            ));
        }

        if !self.bm25.k1.is_finite() || self.bm25.k1 < 0.0 {
            return Err(RankingError::InvalidConfig(
                "bm25 k1 must be finite and non-negative",
            ));
        }
        if !(0.0..=1.0).contains(&self.bm25.b) {
            return Err(RankingError::InvalidConfig("bm25 b must lie in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.fuzzy_ratio) {
            return Err(RankingError::InvalidConfig(
                "fuzzy ratio must lie in [0, 1]",
            ));
        }
        Ok(())
    }
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            weights: FieldWeights::default(),
            credits: MatchCredits::default(),
            bm25: Bm25Params::default(),
            fuzzy_ratio: 0.2,
            min_fuzzy_len: 4,
            default_limit: NonZeroUsize::new(8).expect("non-zero"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuzzy_budget_scales_with_length() {
        let config = RankerConfig::default();
        assert_eq!(config.fuzzy_budget(3), 0);
        assert_eq!(config.fuzzy_budget(4), 1);
        assert_eq!(config.fuzzy_budget(9), 1);
        assert_eq!(config.fuzzy_budget(10), 2);
    }

    #[test]
    fn rejects_negative_weights() {
        let mut config = RankerConfig::default();
        config.weights.tags = -1.0;
        assert!(matches!(
            config.validate(),
            Err(RankingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_b() {
        let mut config = RankerConfig::default();
        config.bm25.b = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_overrides_keep_defaults() {
        let config: RankerConfig =
            serde_json::from_str(r#"{"weights": {"keywords": 5.0}, "default_limit": 3}"#)
                .expect("parse");
        assert!((config.weights.keywords - 5.0).abs() < f64::EPSILON);
        assert!((config.weights.tags - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.default_limit.get(), 3);
        assert!(config.validate().is_ok());
    }
}
