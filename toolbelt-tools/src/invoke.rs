//! Uniform invocation of loaded tools.
//!
//! Every call follows the same path: validate the arguments against the
//! handle's contract, run the implementation on its own task under a
//! deadline, and translate whatever happens into an [`InvocationError`].

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use toolbelt_primitives::ToolId;
use tracing::{debug, warn};

use crate::contract::Violation;
use crate::tool::ToolHandle;

/// Result alias for invocations.
pub type InvocationResult = Result<Value, InvocationError>;

/// Invocation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvocationConfig {
    /// Deadline applied when a tool declares no timeout of its own.
    pub default_timeout_ms: u64,
}

impl InvocationConfig {
    /// Default deadline as a [`Duration`].
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

impl Default for InvocationConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
        }
    }
}

/// Coarse classification of invocation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Arguments did not satisfy the tool's contract.
    Validation,
    /// The tool ran and failed, or panicked.
    Execution,
    /// The tool exceeded its deadline.
    Timeout,
    /// The caller cancelled the invocation.
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Validation => "validation",
            Self::Execution => "execution",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Normalised invocation failure.
///
/// Serializes to a JSON object tagged with `kind` so it can be handed back
/// to a model verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvocationError {
    /// Arguments were rejected before the tool ran.
    #[error("invalid arguments for tool `{tool}`: {}", describe(.violations))]
    Validation {
        /// Tool that was called.
        tool: ToolId,
        /// Every violation found.
        violations: Vec<Violation>,
    },

    /// The tool returned an error or panicked.
    #[error("tool `{tool}` failed: {reason}")]
    Execution {
        /// Tool that was called.
        tool: ToolId,
        /// Failure reported by the tool.
        reason: String,
    },

    /// The tool did not finish before its deadline.
    #[error("tool `{tool}` timed out after {timeout_ms}ms")]
    Timeout {
        /// Tool that was called.
        tool: ToolId,
        /// Deadline that elapsed.
        timeout_ms: u64,
    },

    /// The invocation was cancelled by the caller.
    #[error("invocation of tool `{tool}` was cancelled")]
    Cancelled {
        /// Tool that was called.
        tool: ToolId,
    },
}

fn describe(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl InvocationError {
    /// Returns the failure classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Execution { .. } => ErrorKind::Execution,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Returns the tool the failure belongs to.
    #[must_use]
    pub const fn tool(&self) -> &ToolId {
        match self {
            Self::Validation { tool, .. }
            | Self::Execution { tool, .. }
            | Self::Timeout { tool, .. }
            | Self::Cancelled { tool } => tool,
        }
    }

    /// Renders the error as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::String(self.to_string()))
    }
}

/// Validates, executes and normalises tool invocations.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvocationAdapter {
    config: InvocationConfig,
}

impl InvocationAdapter {
    /// Creates an adapter with the supplied configuration.
    #[must_use]
    pub const fn new(config: InvocationConfig) -> Self {
        Self { config }
    }

    /// Returns the adapter configuration.
    #[must_use]
    pub const fn config(&self) -> &InvocationConfig {
        &self.config
    }

    /// Deadline that applies to `handle`.
    #[must_use]
    pub fn timeout_for(&self, handle: &ToolHandle) -> Duration {
        handle
            .timeout()
            .unwrap_or_else(|| self.config.default_timeout())
    }

    /// Invokes `handle` with `args`.
    ///
    /// # Errors
    ///
    /// See [`InvocationAdapter::invoke_with_cancellation`].
    pub async fn invoke(&self, handle: &ToolHandle, args: Value) -> InvocationResult {
        self.invoke_with_cancellation(handle, args, &CancellationToken::new())
            .await
    }

    /// Invokes `handle` with `args`, giving up early if `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError::Validation`] without running the tool when
    /// the arguments violate its contract, [`InvocationError::Execution`]
    /// when the tool fails or panics, [`InvocationError::Timeout`] when the
    /// deadline elapses and [`InvocationError::Cancelled`] when `cancel`
    /// fires first. Timed out and cancelled tasks are aborted, as is the
    /// task of an invocation whose future is dropped before it completes.
    pub async fn invoke_with_cancellation(
        &self,
        handle: &ToolHandle,
        args: Value,
        cancel: &CancellationToken,
    ) -> InvocationResult {
        let tool = handle.id().clone();

        if let Err(violations) = handle.contract().validate(&args) {
            warn!(tool = %tool, violations = violations.len(), "rejected invalid tool arguments");
            return Err(InvocationError::Validation { tool, violations });
        }
        if cancel.is_cancelled() {
            return Err(InvocationError::Cancelled { tool });
        }

        let deadline = self.timeout_for(handle);
        let executor = handle.executor();
        let started = Instant::now();
        let mut task =
            AbortOnDropHandle::new(tokio::spawn(async move { executor.invoke(args).await }));

        let finished = tokio::select! {
            joined = tokio::time::timeout(deadline, &mut task) => Some(joined),
            () = cancel.cancelled() => None,
        };
        let Some(finished) = finished else {
            warn!(tool = %tool, "tool invocation cancelled");
            return Err(InvocationError::Cancelled { tool });
        };

        #[allow(clippy::cast_possible_truncation)]
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match finished {
            Ok(Ok(Ok(output))) => {
                debug!(tool = %tool, elapsed_ms, "tool invocation succeeded");
                Ok(output)
            }
            Ok(Ok(Err(err))) => {
                warn!(tool = %tool, elapsed_ms, error = %err, "tool invocation failed");
                Err(InvocationError::Execution {
                    tool,
                    reason: err.to_string(),
                })
            }
            Ok(Err(join_err)) => {
                let reason = if join_err.is_panic() {
                    "tool panicked".to_owned()
                } else {
                    join_err.to_string()
                };
                warn!(tool = %tool, elapsed_ms, %reason, "tool task did not complete");
                Err(InvocationError::Execution { tool, reason })
            }
            Err(_) => {
                #[allow(clippy::cast_possible_truncation)]
                let timeout_ms = deadline.as_millis() as u64;
                warn!(tool = %tool, timeout_ms, "tool invocation timed out");
                Err(InvocationError::Timeout { tool, timeout_ms })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::contract::InputContract;
    use crate::error::{ToolError, ToolResult};
    use crate::tool::{ContractedTool, Tool};

    fn handle(tool: impl Tool + 'static) -> ToolHandle {
        ToolHandle::new(ToolId::new("calc").unwrap(), Arc::new(tool))
    }

    fn adapter_ms(default_timeout_ms: u64) -> InvocationAdapter {
        InvocationAdapter::new(InvocationConfig { default_timeout_ms })
    }

    fn object_contract() -> InputContract {
        InputContract::from_json_schema(&json!({
            "type": "object",
            "properties": { "expression": { "type": "string" } },
            "required": ["expression"]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn successful_invocation_returns_output() {
        let handle = handle(|input: Value| async move {
            Ok::<_, ToolError>(json!({ "result": input["expression"] }))
        });
        let output = InvocationAdapter::default()
            .invoke(&handle, json!({ "expression": "2+2" }))
            .await
            .unwrap();
        assert_eq!(output, json!({ "result": "2+2" }));
    }

    #[tokio::test]
    async fn invalid_arguments_never_reach_the_tool() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let tool = ContractedTool::new(
            move |input: Value| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ToolError>(input)
                }
            },
            object_contract(),
        );
        let handle = handle(tool);

        let err = InvocationAdapter::default()
            .invoke(&handle, json!({ "expr": 4 }))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let InvocationError::Validation { violations, .. } = &err else {
            panic!("expected validation error");
        };
        assert_eq!(violations[0].path, "/expression");
    }

    #[tokio::test]
    async fn tool_errors_become_execution_errors() {
        let handle = handle(|_: Value| async move {
            Err::<Value, _>(ToolError::execution("division by zero"))
        });
        let err = InvocationAdapter::default()
            .invoke(&handle, Value::Null)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Execution);
        assert!(err.to_string().contains("division by zero"));
    }

    #[tokio::test]
    async fn panics_are_contained() {
        async fn explode(_: Value) -> ToolResult<Value> {
            panic!("boom")
        }
        let handle = handle(explode);
        let err = InvocationAdapter::default()
            .invoke(&handle, Value::Null)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            InvocationError::Execution {
                tool: ToolId::new("calc").unwrap(),
                reason: "tool panicked".into(),
            }
        );
    }

    #[tokio::test]
    async fn slow_tools_time_out() {
        let handle = handle(|_: Value| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, ToolError>(Value::Null)
        });
        let err = adapter_ms(20).invoke(&handle, Value::Null).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.to_value()["timeout_ms"], json!(20));
    }

    #[tokio::test]
    async fn per_tool_timeout_overrides_default() {
        let tool = ContractedTool::new(
            |_: Value| async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, ToolError>(Value::Null)
            },
            InputContract::any(),
        )
        .with_timeout(Duration::from_millis(10));
        let handle = handle(tool);

        let adapter = adapter_ms(60_000);
        assert_eq!(adapter.timeout_for(&handle), Duration::from_millis(10));
        let err = adapter.invoke(&handle, Value::Null).await.unwrap_err();
        assert!(matches!(err, InvocationError::Timeout { timeout_ms: 10, .. }));
    }

    #[tokio::test]
    async fn cancellation_interrupts_invocation() {
        let handle = handle(|_: Value| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, ToolError>(Value::Null)
        });
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let err = InvocationAdapter::default()
            .invoke_with_cancellation(&handle, Value::Null, &token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn dropping_the_call_stops_the_tool() {
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&finished);
        let handle = handle(move |_: Value| {
            let counter = Arc::clone(&counter);
            async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ToolError>(Value::Null)
            }
        });
        let adapter = adapter_ms(50);

        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), adapter.invoke(&handle, Value::Null))
                .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn errors_serialize_with_kind_tag() {
        let err = InvocationError::Cancelled {
            tool: ToolId::new("calc").unwrap(),
        };
        assert_eq!(err.to_value(), json!({ "kind": "cancelled", "tool": "calc" }));
    }
}
