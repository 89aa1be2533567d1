//! The registry an orchestration loop talks to.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use toolbelt_config::{CatalogSource, ConfigResult, RegistryConfig};
use toolbelt_primitives::{Descriptor, ToolId, TurnId};
use toolbelt_ranker::{RankResult, Ranker, RankingError, ScoredTool, ToolIndex};
use toolbelt_telemetry::invocation_span;
use toolbelt_tools::{
    CapabilityProvider, Catalog, InvocationAdapter, InvocationResult, LoadResult, PreloadReport,
    ProviderBindings, StaticProvider, Tool, ToolHandle, ToolLoader,
};
use tracing::{Instrument, debug, info, warn};

use crate::core_set::union;
use crate::driver::Turn;
use crate::merger::{self, Registration};

/// Result of ranking, core union and resolution for one query.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Ids in ranked order, before the core union.
    pub ranked: Vec<ToolId>,
    /// Ranked ids followed by core ids, without duplicates.
    pub selected: Vec<ToolId>,
    /// Loaded handles in `selected` order.
    pub handles: Vec<ToolHandle>,
    /// Selected ids that failed to load.
    pub failed: Vec<ToolId>,
}

impl Selection {
    /// Returns the handle loaded for `id`, if any.
    #[must_use]
    pub fn handle(&self, id: &str) -> Option<&ToolHandle> {
        self.handles.iter().find(|handle| handle.id().as_str() == id)
    }

    /// Ids that have a loaded handle, in selection order.
    #[must_use]
    pub fn loaded_ids(&self) -> Vec<ToolId> {
        self.handles.iter().map(|handle| handle.id().clone()).collect()
    }
}

/// Catalog, ranking, loading and invocation behind one handle.
///
/// Instances are independent of each other; share one behind an [`Arc`] to
/// serve concurrent turns.
pub struct ToolRegistry {
    config: RegistryConfig,
    catalog: Catalog,
    bindings: Arc<ProviderBindings>,
    ranker: Ranker,
    loader: ToolLoader,
    adapter: InvocationAdapter,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.catalog.len())
            .field("revision", &self.catalog.revision())
            .field("bindings", &self.bindings)
            .field("cached", &self.loader.cached_ids())
            .finish_non_exhaustive()
    }
}

impl ToolRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Returns the descriptor catalog.
    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Returns the provider bindings.
    #[must_use]
    pub fn bindings(&self) -> &ProviderBindings {
        &self.bindings
    }

    /// Result limit used when callers have no preference.
    #[must_use]
    pub fn default_limit(&self) -> usize {
        self.config.ranker.default_limit.get()
    }

    /// Configured core ids followed by catalog entries flagged as core.
    #[must_use]
    pub fn core_ids(&self) -> Vec<ToolId> {
        union(&self.config.core, &self.catalog.core_ids())
    }

    /// Ids with a cached handle.
    #[must_use]
    pub fn cached_ids(&self) -> Vec<ToolId> {
        self.loader.cached_ids()
    }

    /// Rebuilds the ranking index from the current catalog.
    pub fn rebuild(&self) -> Arc<ToolIndex> {
        let snapshot = self.catalog.snapshot();
        self.ranker.rebuild(snapshot.revision, &snapshot.descriptors)
    }

    /// Drops the ranking index and every cached handle.
    ///
    /// Descriptors and bindings are kept; the next ranking rebuilds the
    /// index and the next resolution reloads implementations.
    pub fn reset(&self) {
        self.loader.clear();
        self.ranker.clear();
        info!("registry reset");
    }

    /// Ranks the catalog against `query`, returning scores.
    ///
    /// A missing index is rebuilt once. A query without searchable tokens
    /// yields an empty ranking.
    ///
    /// # Errors
    ///
    /// Returns [`RankingError::IndexNotBuilt`] only if the index is dropped
    /// again between the rebuild and the retry.
    pub fn rank_scored(&self, query: &str, limit: usize) -> RankResult<Vec<ScoredTool>> {
        let ranked = match self.ranker.rank_scored(query, limit) {
            Err(RankingError::IndexNotBuilt) => {
                debug!("ranking index missing; rebuilding");
                self.rebuild();
                self.ranker.rank_scored(query, limit)
            }
            other => other,
        };
        match ranked {
            Err(RankingError::EmptyQuery { query }) => {
                debug!(%query, "query has no searchable terms");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    /// Ranks the catalog against `query`, returning at most `limit` ids.
    ///
    /// # Errors
    ///
    /// See [`ToolRegistry::rank_scored`].
    pub fn rank(&self, query: &str, limit: usize) -> RankResult<Vec<ToolId>> {
        Ok(self
            .rank_scored(query, limit)?
            .into_iter()
            .map(|scored| scored.id)
            .collect())
    }

    /// Resolves handles for `ids`, omitting any that fail to load.
    pub async fn resolve(&self, ids: &[ToolId]) -> HashMap<ToolId, ToolHandle> {
        self.loader.resolve(ids).await
    }

    /// Resolves a single handle.
    ///
    /// # Errors
    ///
    /// Returns the [`toolbelt_tools::LoadError`] explaining the failure.
    pub async fn resolve_one(&self, id: &ToolId) -> LoadResult<ToolHandle> {
        self.loader.resolve_one(id).await
    }

    /// Loads every core tool ahead of the first turn.
    pub async fn preload_core(&self) -> PreloadReport {
        self.loader.preload(&self.core_ids()).await
    }

    /// Invokes a loaded tool.
    ///
    /// # Errors
    ///
    /// Returns a [`toolbelt_tools::InvocationError`] describing validation,
    /// execution, timeout or cancellation failures.
    pub async fn invoke(&self, handle: &ToolHandle, args: Value) -> InvocationResult {
        self.adapter
            .invoke(handle, args)
            .instrument(invocation_span(handle.id()))
            .await
    }

    /// Invokes a loaded tool, stopping early when `cancel` fires.
    ///
    /// # Errors
    ///
    /// See [`ToolRegistry::invoke`].
    pub async fn invoke_with_cancellation(
        &self,
        handle: &ToolHandle,
        args: Value,
        cancel: &CancellationToken,
    ) -> InvocationResult {
        self.adapter
            .invoke_with_cancellation(handle, args, cancel)
            .instrument(invocation_span(handle.id()))
            .await
    }

    /// Registers a tool discovered at runtime.
    ///
    /// Rejected when the id is already described or bound. Accepted tools
    /// become searchable immediately.
    pub fn register_runtime_capability<T>(&self, descriptor: Descriptor, tool: T) -> Registration
    where
        T: Tool + 'static,
    {
        self.register_runtime_provider(descriptor, Arc::new(StaticProvider::new(tool)))
    }

    /// Registers a runtime capability backed by an arbitrary provider.
    pub fn register_runtime_provider(
        &self,
        descriptor: Descriptor,
        provider: Arc<dyn CapabilityProvider>,
    ) -> Registration {
        let outcome = merger::merge(&self.catalog, &self.bindings, descriptor, provider);
        if outcome.is_accepted() {
            self.rebuild();
        }
        outcome
    }

    /// Ranks, applies the core union and resolves in one call.
    pub async fn select(&self, query: &str, limit: usize) -> Selection {
        let ranked = self.rank(query, limit).unwrap_or_else(|err| {
            warn!(error = %err, "ranking failed; continuing with core tools only");
            Vec::new()
        });
        let selected = union(&ranked, &self.core_ids());
        let mut loaded = self.resolve(&selected).await;

        let mut handles = Vec::with_capacity(loaded.len());
        let mut failed = Vec::new();
        for id in &selected {
            match loaded.remove(id) {
                Some(handle) => handles.push(handle),
                None => failed.push(id.clone()),
            }
        }
        debug!(
            ranked = ranked.len(),
            selected = selected.len(),
            failed = failed.len(),
            "selection resolved"
        );

        Selection {
            ranked,
            selected,
            handles,
            failed,
        }
    }

    /// Starts a turn driven by the turn state machine.
    #[must_use]
    pub fn begin_turn(&self) -> Turn<'_> {
        Turn::new(self, TurnId::random())
    }
}

/// Assembles a [`ToolRegistry`].
#[derive(Default)]
pub struct ToolRegistryBuilder {
    config: RegistryConfig,
    descriptors: Vec<Descriptor>,
    bindings: Vec<(ToolId, Arc<dyn CapabilityProvider>)>,
}

impl fmt::Debug for ToolRegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistryBuilder")
            .field("config", &self.config)
            .field("descriptors", &self.descriptors.len())
            .field("bindings", &self.bindings.len())
            .finish()
    }
}

impl ToolRegistryBuilder {
    /// Replaces the configuration.
    #[must_use]
    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds a static descriptor. Later descriptors replace earlier ones with
    /// the same id.
    #[must_use]
    pub fn descriptor(mut self, descriptor: Descriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Adds static descriptors.
    #[must_use]
    pub fn descriptors(mut self, descriptors: impl IntoIterator<Item = Descriptor>) -> Self {
        self.descriptors.extend(descriptors);
        self
    }

    /// Adds every descriptor from a parsed catalog file.
    #[must_use]
    pub fn catalog(self, source: CatalogSource) -> Self {
        self.descriptors(source.into_descriptors())
    }

    /// Binds a static provider to `id`.
    #[must_use]
    pub fn bind<P>(mut self, id: ToolId, provider: P) -> Self
    where
        P: CapabilityProvider + 'static,
    {
        self.bindings.push((id, Arc::new(provider)));
        self
    }

    /// Binds a ready implementation to `id`.
    #[must_use]
    pub fn bind_tool<T>(self, id: ToolId, tool: T) -> Self
    where
        T: Tool + 'static,
    {
        self.bind(id, StaticProvider::new(tool))
    }

    /// Validates the configuration, populates the catalog and builds the
    /// initial index.
    ///
    /// # Errors
    ///
    /// Returns [`toolbelt_config::ConfigError::Invalid`] when the
    /// configuration is out of range.
    pub fn build(self) -> ConfigResult<ToolRegistry> {
        let Self {
            config,
            descriptors,
            bindings,
        } = self;
        config.validate()?;

        let catalog = Catalog::new();
        for descriptor in descriptors {
            catalog.register(descriptor);
        }

        let provider_bindings = Arc::new(ProviderBindings::new());
        for (id, provider) in bindings {
            if !catalog.contains(id.as_str()) {
                warn!(tool = %id, "provider bound to an id with no descriptor");
            }
            provider_bindings.bind_static_shared(id, provider);
        }

        let registry = ToolRegistry {
            ranker: Ranker::new(config.ranker),
            loader: ToolLoader::new(Arc::clone(&provider_bindings), config.loader),
            adapter: InvocationAdapter::new(config.invocation),
            bindings: provider_bindings,
            catalog,
            config,
        };

        for id in registry.core_ids() {
            if !registry.catalog.contains(id.as_str()) {
                warn!(tool = %id, "core tool has no descriptor");
            }
        }
        registry.rebuild();
        info!(tools = registry.catalog.len(), "tool registry ready");
        Ok(registry)
    }
}
