//! Capability providers and the bindings that map tool ids to them.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde::Serialize;
use toolbelt_primitives::ToolId;
use tracing::{debug, warn};

use crate::error::{DuplicateId, ToolResult};
use crate::tool::Tool;

/// Produces the implementation behind a tool identifier.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// Loads the implementation for `id`.
    async fn load(&self, id: &ToolId) -> ToolResult<Arc<dyn Tool>>;
}

#[async_trait]
impl<F, Fut> CapabilityProvider for F
where
    F: Send + Sync + Fn(ToolId) -> Fut,
    Fut: Future<Output = ToolResult<Arc<dyn Tool>>> + Send,
{
    async fn load(&self, id: &ToolId) -> ToolResult<Arc<dyn Tool>> {
        (self)(id.clone()).await
    }
}

/// Provider that always yields the same implementation.
#[derive(Clone)]
pub struct StaticProvider {
    tool: Arc<dyn Tool>,
}

impl StaticProvider {
    /// Wraps a tool implementation.
    #[must_use]
    pub fn new<T: Tool + 'static>(tool: T) -> Self {
        Self {
            tool: Arc::new(tool),
        }
    }

    /// Wraps an already shared implementation.
    #[must_use]
    pub fn from_shared(tool: Arc<dyn Tool>) -> Self {
        Self { tool }
    }
}

impl fmt::Debug for StaticProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticProvider").finish_non_exhaustive()
    }
}

#[async_trait]
impl CapabilityProvider for StaticProvider {
    async fn load(&self, _id: &ToolId) -> ToolResult<Arc<dyn Tool>> {
        Ok(Arc::clone(&self.tool))
    }
}

/// Where a provider binding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingOrigin {
    /// Bound at startup alongside the static catalog.
    Static,
    /// Bound later through runtime capability registration.
    Runtime,
}

impl fmt::Display for BindingOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Static => "static",
            Self::Runtime => "runtime",
        })
    }
}

#[derive(Default)]
struct Bindings {
    fixed: HashMap<ToolId, Arc<dyn CapabilityProvider>>,
    runtime: HashMap<ToolId, Arc<dyn CapabilityProvider>>,
}

/// Static and runtime provider bindings.
///
/// Lookups consult static bindings first, then runtime ones.
#[derive(Default)]
pub struct ProviderBindings {
    inner: RwLock<Bindings>,
}

impl fmt::Debug for ProviderBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.read();
        let mut fixed: Vec<_> = inner.fixed.keys().map(ToolId::as_str).collect();
        let mut runtime: Vec<_> = inner.runtime.keys().map(ToolId::as_str).collect();
        fixed.sort_unstable();
        runtime.sort_unstable();
        f.debug_struct("ProviderBindings")
            .field("static", &fixed)
            .field("runtime", &runtime)
            .finish()
    }
}

impl ProviderBindings {
    /// Creates an empty binding table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Bindings> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Bindings> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Binds a static provider, replacing any previous static binding.
    pub fn bind_static<P>(&self, id: ToolId, provider: P)
    where
        P: CapabilityProvider + 'static,
    {
        self.bind_static_shared(id, Arc::new(provider));
    }

    /// Binds an already shared static provider.
    pub fn bind_static_shared(&self, id: ToolId, provider: Arc<dyn CapabilityProvider>) {
        let mut inner = self.write();
        if inner.fixed.insert(id.clone(), provider).is_some() {
            warn!(tool = %id, "replacing static provider binding");
        } else {
            debug!(tool = %id, "static provider bound");
        }
    }

    /// Binds a runtime provider unless `id` is already bound.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateId`] when a static or runtime binding exists.
    pub fn bind_runtime(
        &self,
        id: ToolId,
        provider: Arc<dyn CapabilityProvider>,
    ) -> Result<(), DuplicateId> {
        let mut inner = self.write();
        if inner.fixed.contains_key(&id) || inner.runtime.contains_key(&id) {
            return Err(DuplicateId { id });
        }
        debug!(tool = %id, "runtime provider bound");
        inner.runtime.insert(id, provider);
        Ok(())
    }

    /// Removes a runtime binding, returning whether one existed.
    pub fn unbind_runtime(&self, id: &ToolId) -> bool {
        self.write().runtime.remove(id).is_some()
    }

    /// Resolves the provider bound to `id`.
    #[must_use]
    pub fn lookup(&self, id: &ToolId) -> Option<(BindingOrigin, Arc<dyn CapabilityProvider>)> {
        let inner = self.read();
        if let Some(provider) = inner.fixed.get(id) {
            return Some((BindingOrigin::Static, Arc::clone(provider)));
        }
        inner
            .runtime
            .get(id)
            .map(|provider| (BindingOrigin::Runtime, Arc::clone(provider)))
    }

    /// Returns the origin of the binding for `id`, if any.
    #[must_use]
    pub fn origin(&self, id: &ToolId) -> Option<BindingOrigin> {
        self.lookup(id).map(|(origin, _)| origin)
    }

    /// Returns `true` when any binding exists for `id`.
    #[must_use]
    pub fn contains(&self, id: &ToolId) -> bool {
        let inner = self.read();
        inner.fixed.contains_key(id) || inner.runtime.contains_key(id)
    }
}
