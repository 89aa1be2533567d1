//! Relevance ranking for tool descriptors.
//!
//! Descriptors are tokenised into a weighted inverted index ([`ToolIndex`]) and
//! free-text queries are scored against it with a BM25-style function. Query
//! tokens match vocabulary terms exactly, by prefix, or within a bounded edit
//! distance. The [`Ranker`] owns the current index and swaps in rebuilt
//! instances atomically so concurrent readers never see a partial index.

#![warn(missing_docs, clippy::pedantic)]

mod config;
mod distance;
mod error;
mod index;
mod ranker;
mod tokenize;

pub use config::{Bm25Params, FieldWeights, MatchCredits, RankerConfig};
pub use distance::bounded_levenshtein;
pub use error::{RankResult, RankingError};
pub use index::{Field, MatchKind, ScoredTool, ToolIndex};
pub use ranker::Ranker;
pub use tokenize::tokenize;
