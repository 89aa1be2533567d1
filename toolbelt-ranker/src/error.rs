//! Ranking errors.

use thiserror::Error;

/// Errors produced while ranking tools.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RankingError {
    /// No index has been built yet, or it was cleared.
    #[error("ranking index has not been built")]
    IndexNotBuilt,
    /// The query contained no indexable tokens.
    #[error("query `{query}` contains no searchable terms")]
    EmptyQuery {
        /// Original query text.
        query: String,
    },
    /// Ranking configuration was invalid.
    #[error("invalid ranker configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Result alias for ranking operations.
pub type RankResult<T> = Result<T, RankingError>;
