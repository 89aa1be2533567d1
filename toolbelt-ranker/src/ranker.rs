//! Owner of the current index; swaps rebuilt indexes in atomically.

use std::sync::{Arc, PoisonError, RwLock};

use toolbelt_primitives::{Descriptor, ToolId};
use tracing::{debug, info};

use crate::config::RankerConfig;
use crate::error::{RankResult, RankingError};
use crate::index::{ScoredTool, ToolIndex};
use crate::tokenize::tokenize;

/// Thread-safe ranker over a swappable [`ToolIndex`].
///
/// Readers clone the current `Arc` and score against it without holding the
/// lock, so a concurrent rebuild never exposes a partially built index.
#[derive(Debug)]
pub struct Ranker {
    config: RankerConfig,
    index: RwLock<Option<Arc<ToolIndex>>>,
}

impl Ranker {
    /// Creates a ranker with no index installed.
    #[must_use]
    pub fn new(config: RankerConfig) -> Self {
        Self {
            config,
            index: RwLock::new(None),
        }
    }

    /// Returns the ranking configuration.
    #[must_use]
    pub const fn config(&self) -> &RankerConfig {
        &self.config
    }

    /// Returns the currently installed index, if any.
    #[must_use]
    pub fn current(&self) -> Option<Arc<ToolIndex>> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Builds a fresh index from `descriptors` and installs it.
    ///
    /// The index is built without holding the lock. It is only installed if
    /// `revision` is not older than the installed index's revision, so racing
    /// rebuilds from stale snapshots cannot replace a newer index. Returns the
    /// index that is installed after the call.
    pub fn rebuild(&self, revision: u64, descriptors: &[Descriptor]) -> Arc<ToolIndex> {
        let fresh = Arc::new(ToolIndex::build(revision, descriptors, self.config));

        let mut guard = self.index.write().unwrap_or_else(PoisonError::into_inner);
        let newer = guard
            .as_ref()
            .filter(|installed| installed.revision() > revision)
            .cloned();
        if let Some(installed) = newer {
            debug!(
                installed = installed.revision(),
                stale = revision,
                "discarding index built from stale catalog snapshot"
            );
            return installed;
        }

        info!(
            revision,
            tools = fresh.len(),
            terms = fresh.vocabulary_len(),
            "ranking index rebuilt"
        );
        *guard = Some(Arc::clone(&fresh));
        fresh
    }

    /// Drops the installed index. Subsequent queries fail with
    /// [`RankingError::IndexNotBuilt`] until the next rebuild.
    pub fn clear(&self) {
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = None;
        debug!("ranking index cleared");
    }

    /// Ranks tools for `text`, returning at most `limit` scored results.
    ///
    /// # Errors
    ///
    /// Returns [`RankingError::IndexNotBuilt`] when no index is installed and
    /// [`RankingError::EmptyQuery`] when `text` yields no searchable tokens.
    pub fn rank_scored(&self, text: &str, limit: usize) -> RankResult<Vec<ScoredTool>> {
        let index = self.current().ok_or(RankingError::IndexNotBuilt)?;
        if tokenize(text).is_empty() {
            return Err(RankingError::EmptyQuery {
                query: text.to_owned(),
            });
        }
        Ok(index.search(text, limit))
    }

    /// Ranks tools for `text`, returning at most `limit` identifiers.
    ///
    /// # Errors
    ///
    /// See [`Ranker::rank_scored`].
    pub fn rank(&self, text: &str, limit: usize) -> RankResult<Vec<ToolId>> {
        Ok(self
            .rank_scored(text, limit)?
            .into_iter()
            .map(|scored| scored.id)
            .collect())
    }
}

impl Default for Ranker {
    fn default() -> Self {
        Self::new(RankerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn descriptor(id: &str, keywords: &[&str]) -> Descriptor {
        Descriptor::builder(ToolId::new(id).unwrap())
            .name(id)
            .and_then(|b| b.keywords(keywords.iter().copied()))
            .and_then(|b| b.build())
            .unwrap()
    }

    #[test]
    fn rank_requires_index() {
        let ranker = Ranker::default();
        assert_eq!(
            ranker.rank("calculate", 5).unwrap_err(),
            RankingError::IndexNotBuilt
        );
    }

    #[test]
    fn empty_query_is_reported() {
        let ranker = Ranker::default();
        ranker.rebuild(1, &[descriptor("calc", &["math"])]);
        assert!(matches!(
            ranker.rank("?? !", 5),
            Err(RankingError::EmptyQuery { .. })
        ));
    }

    #[test]
    fn rebuild_makes_new_tools_visible() {
        let ranker = Ranker::default();
        ranker.rebuild(1, &[descriptor("calc", &["math"])]);
        assert!(ranker.rank("weather", 5).unwrap().is_empty());

        ranker.rebuild(
            2,
            &[descriptor("calc", &["math"]), descriptor("forecast", &["weather"])],
        );
        let ranked = ranker.rank("weather", 5).unwrap();
        assert_eq!(ranked, vec![ToolId::new("forecast").unwrap()]);
    }

    #[test]
    fn stale_rebuild_is_discarded() {
        let ranker = Ranker::default();
        ranker.rebuild(5, &[descriptor("fresh", &["current"])]);
        let installed = ranker.rebuild(3, &[descriptor("stale", &["old"])]);

        assert_eq!(installed.revision(), 5);
        assert!(ranker.current().unwrap().contains("fresh"));
        assert!(!ranker.current().unwrap().contains("stale"));
    }

    #[test]
    fn readers_keep_their_snapshot_across_swaps() {
        let ranker = Ranker::default();
        ranker.rebuild(1, &[descriptor("calc", &["math"])]);
        let snapshot = ranker.current().unwrap();

        ranker.rebuild(2, &[descriptor("search", &["web"])]);
        assert!(snapshot.contains("calc"));
        assert!(!snapshot.contains("search"));

        ranker.clear();
        assert!(ranker.current().is_none());
        assert!(snapshot.contains("calc"));
    }

    #[test]
    fn concurrent_readers_never_see_a_mixed_index() {
        let old = [descriptor("calc", &["math"]), descriptor("search", &["web"])];
        let new = [descriptor("calc", &["math"]), descriptor("forecast", &["weather"])];
        let ranked_set = |ids: &[&str]| {
            ids.iter()
                .map(|raw| ToolId::new(*raw).unwrap())
                .collect::<BTreeSet<_>>()
        };
        let old_set = ranked_set(&["calc", "search"]);
        let new_set = ranked_set(&["calc", "forecast"]);

        let ranker = Ranker::default();
        ranker.rebuild(0, &old);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for revision in 1..=200 {
                    let descriptors = if revision % 2 == 0 { &old } else { &new };
                    ranker.rebuild(revision, descriptors);
                }
            });
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..500 {
                        let ranked: BTreeSet<ToolId> = ranker
                            .rank("math web weather", 10)
                            .unwrap()
                            .into_iter()
                            .collect();
                        assert!(
                            ranked == old_set || ranked == new_set,
                            "mixed ranking {ranked:?}"
                        );
                    }
                });
            }
        });
    }
}
