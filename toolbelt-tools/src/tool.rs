//! Tool implementations and the handles the loader hands out.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use toolbelt_primitives::ToolId;

use crate::contract::InputContract;
use crate::error::ToolResult;

/// Trait implemented by tool executors.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Invokes the tool with the given JSON input, returning JSON output.
    async fn invoke(&self, input: Value) -> ToolResult<Value>;

    /// Contract the arguments must satisfy. Defaults to accepting anything.
    fn input_contract(&self) -> InputContract {
        InputContract::any()
    }

    /// Per-tool timeout overriding the adapter default.
    fn timeout(&self) -> Option<Duration> {
        None
    }
}

#[async_trait]
impl<F, Fut> Tool for F
where
    F: Send + Sync + Fn(Value) -> Fut,
    Fut: Future<Output = ToolResult<Value>> + Send,
{
    async fn invoke(&self, input: Value) -> ToolResult<Value> {
        (self)(input).await
    }
}

/// Wraps a tool with an explicit contract and optional timeout.
///
/// Mostly useful for closures, which otherwise get the permissive defaults.
pub struct ContractedTool<T> {
    inner: T,
    contract: InputContract,
    timeout: Option<Duration>,
}

impl<T: Tool> ContractedTool<T> {
    /// Attaches `contract` to `inner`.
    #[must_use]
    pub fn new(inner: T, contract: InputContract) -> Self {
        Self {
            inner,
            contract,
            timeout: None,
        }
    }

    /// Sets the per-tool timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl<T: Tool> Tool for ContractedTool<T> {
    async fn invoke(&self, input: Value) -> ToolResult<Value> {
        self.inner.invoke(input).await
    }

    fn input_contract(&self) -> InputContract {
        self.contract.clone()
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

struct LoadedTool {
    id: ToolId,
    executor: Arc<dyn Tool>,
    contract: InputContract,
    timeout: Option<Duration>,
    loaded_at: DateTime<Utc>,
}

/// Cheaply cloneable handle to a loaded tool implementation.
///
/// Clones share the same implementation; [`ToolHandle::same_as`] tells
/// whether two handles came from the same load.
#[derive(Clone)]
pub struct ToolHandle {
    inner: Arc<LoadedTool>,
}

impl ToolHandle {
    /// Creates a handle for `executor`, capturing its contract and timeout.
    #[must_use]
    pub fn new(id: ToolId, executor: Arc<dyn Tool>) -> Self {
        let contract = executor.input_contract();
        let timeout = executor.timeout();
        Self {
            inner: Arc::new(LoadedTool {
                id,
                executor,
                contract,
                timeout,
                loaded_at: Utc::now(),
            }),
        }
    }

    /// Identifier of the tool.
    #[must_use]
    pub fn id(&self) -> &ToolId {
        &self.inner.id
    }

    /// Argument contract captured at load time.
    #[must_use]
    pub fn contract(&self) -> &InputContract {
        &self.inner.contract
    }

    /// Per-tool timeout override.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.inner.timeout
    }

    /// When the implementation was loaded.
    #[must_use]
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.inner.loaded_at
    }

    /// Returns `true` when both handles share one loaded implementation.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn executor(&self) -> Arc<dyn Tool> {
        Arc::clone(&self.inner.executor)
    }
}

impl fmt::Debug for ToolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolHandle")
            .field("id", &self.inner.id)
            .field("timeout", &self.inner.timeout)
            .field("loaded_at", &self.inner.loaded_at)
            .finish_non_exhaustive()
    }
}
