//! Lazy, single-flight loading of tool implementations.
//!
//! The first caller to request an unloaded id starts the provider call and
//! parks a shared future in the cache; concurrent callers for the same id
//! await that future instead of calling the provider again. Successful loads
//! are cached until invalidated. Failed loads are reported to every waiter
//! and then forgotten, so the next request retries.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use toolbelt_primitives::ToolId;
use tracing::{debug, info, warn};

use crate::error::{LoadError, LoadResult};
use crate::provider::{BindingOrigin, CapabilityProvider, ProviderBindings};
use crate::tool::ToolHandle;

type SharedLoad = Shared<BoxFuture<'static, LoadResult<ToolHandle>>>;

#[derive(Clone)]
enum Slot {
    Ready(ToolHandle),
    Loading(SharedLoad),
}

/// Loader tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Upper bound on provider calls in flight for one batch.
    pub max_concurrent_loads: NonZeroUsize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_concurrent_loads: NonZeroUsize::new(8).expect("non-zero"),
        }
    }
}

/// Outcome of preloading a set of tools.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadReport {
    /// Identifiers that loaded, in request order.
    pub loaded: Vec<ToolId>,
    /// Identifiers that failed, with the reason.
    pub failed: Vec<(ToolId, LoadError)>,
}

impl PreloadReport {
    /// Returns `true` when every requested tool loaded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Resolves tool ids to loaded handles through a single-flight cache.
pub struct ToolLoader {
    bindings: Arc<ProviderBindings>,
    cache: Mutex<HashMap<ToolId, Slot>>,
    config: LoaderConfig,
}

impl std::fmt::Debug for ToolLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolLoader")
            .field("cached", &self.cached_ids())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ToolLoader {
    /// Creates a loader over the supplied bindings.
    #[must_use]
    pub fn new(bindings: Arc<ProviderBindings>, config: LoaderConfig) -> Self {
        Self {
            bindings,
            cache: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Returns the provider bindings consulted on a cache miss.
    #[must_use]
    pub fn bindings(&self) -> &Arc<ProviderBindings> {
        &self.bindings
    }

    /// Returns the loader configuration.
    #[must_use]
    pub const fn config(&self) -> &LoaderConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ToolId, Slot>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolves a single tool.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::MissingBinding`] when no provider is bound, and
    /// [`LoadError::Provider`] or [`LoadError::Panicked`] when the provider
    /// fails. Concurrent callers for the same id observe the same outcome.
    pub async fn resolve_one(&self, id: &ToolId) -> LoadResult<ToolHandle> {
        let load = {
            let mut cache = self.lock();
            match cache.get(id).cloned() {
                Some(Slot::Ready(handle)) => {
                    debug!(tool = %id, "tool cache hit");
                    return Ok(handle);
                }
                Some(Slot::Loading(load)) => {
                    debug!(tool = %id, "joining in-flight load");
                    load
                }
                None => {
                    let Some((origin, provider)) = self.bindings.lookup(id) else {
                        return Err(LoadError::MissingBinding { id: id.clone() });
                    };
                    let load = start_load(id.clone(), origin, provider);
                    cache.insert(id.clone(), Slot::Loading(load.clone()));
                    load
                }
            }
        };

        let outcome = load.clone().await;
        self.settle(id, &load, &outcome);
        outcome
    }

    fn settle(&self, id: &ToolId, load: &SharedLoad, outcome: &LoadResult<ToolHandle>) {
        let mut cache = self.lock();
        let current = matches!(cache.get(id), Some(Slot::Loading(pending)) if pending.ptr_eq(load));
        if !current {
            return;
        }
        match outcome {
            Ok(handle) => {
                info!(tool = %id, "tool loaded");
                cache.insert(id.clone(), Slot::Ready(handle.clone()));
            }
            Err(_) => {
                cache.remove(id);
            }
        }
    }

    /// Resolves a batch of ids, loading misses concurrently.
    ///
    /// Duplicate ids are resolved once. Ids that fail to load are logged and
    /// omitted from the returned map; the batch itself never fails.
    pub async fn resolve(&self, ids: &[ToolId]) -> HashMap<ToolId, ToolHandle> {
        let outcomes = self.resolve_all(ids).await;
        let mut handles = HashMap::with_capacity(outcomes.len());
        for (id, outcome) in outcomes {
            match outcome {
                Ok(handle) => {
                    handles.insert(id, handle);
                }
                Err(err) => warn!(tool = %id, error = %err, "tool failed to load"),
            }
        }
        handles
    }

    async fn resolve_all(&self, ids: &[ToolId]) -> Vec<(ToolId, LoadResult<ToolHandle>)> {
        let mut seen = HashSet::with_capacity(ids.len());
        let loads: Vec<_> = ids
            .iter()
            .filter(|id| seen.insert(*id))
            .map(|id| async move { (id.clone(), self.resolve_one(id).await) })
            .collect();

        stream::iter(loads)
            .buffer_unordered(self.config.max_concurrent_loads.get())
            .collect()
            .await
    }

    /// Loads `ids` ahead of time and reports which succeeded.
    pub async fn preload(&self, ids: &[ToolId]) -> PreloadReport {
        let mut outcomes: HashMap<ToolId, LoadResult<ToolHandle>> =
            self.resolve_all(ids).await.into_iter().collect();

        let mut report = PreloadReport::default();
        for id in ids {
            match outcomes.remove(id) {
                Some(Ok(_)) => report.loaded.push(id.clone()),
                Some(Err(err)) => {
                    warn!(tool = %id, error = %err, "preload failed");
                    report.failed.push((id.clone(), err));
                }
                None => {}
            }
        }
        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "preload finished"
        );
        report
    }

    /// Drops the cached entry for `id`, returning whether one existed.
    ///
    /// An in-flight load is detached: its waiters still receive the result
    /// but it is not cached.
    pub fn invalidate(&self, id: &ToolId) -> bool {
        let removed = self.lock().remove(id).is_some();
        if removed {
            debug!(tool = %id, "tool cache entry invalidated");
        }
        removed
    }

    /// Drops every cached entry.
    pub fn clear(&self) {
        let mut cache = self.lock();
        let dropped = cache.len();
        cache.clear();
        debug!(dropped, "tool cache cleared");
    }

    /// Returns `true` when a loaded handle for `id` is cached.
    #[must_use]
    pub fn is_cached(&self, id: &ToolId) -> bool {
        matches!(self.lock().get(id), Some(Slot::Ready(_)))
    }

    /// Identifiers with a cached handle, sorted.
    #[must_use]
    pub fn cached_ids(&self) -> Vec<ToolId> {
        let mut ids: Vec<_> = self
            .lock()
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Ready(_)))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort_unstable();
        ids
    }
}

fn start_load(
    id: ToolId,
    origin: BindingOrigin,
    provider: Arc<dyn CapabilityProvider>,
) -> SharedLoad {
    async move {
        debug!(tool = %id, %origin, "loading tool");
        let outcome = AssertUnwindSafe(provider.load(&id)).catch_unwind().await;
        match outcome {
            Ok(Ok(executor)) => Ok(ToolHandle::new(id, executor)),
            Ok(Err(err)) => Err(LoadError::Provider {
                id,
                reason: err.to_string(),
            }),
            Err(_) => Err(LoadError::Panicked { id }),
        }
    }
    .boxed()
    .shared()
}
