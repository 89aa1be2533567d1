//! Admission of capabilities registered while the system is running.

use std::sync::Arc;

use serde::Serialize;
use toolbelt_primitives::{Descriptor, ToolId};
use toolbelt_tools::{Catalog, CapabilityProvider, ProviderBindings};
use tracing::{info, warn};

/// Why a runtime registration was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// The id already has a descriptor or a provider binding.
    DuplicateId,
}

/// Outcome of a runtime capability registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Registration {
    /// The capability is now searchable and loadable.
    Accepted {
        /// Registered id.
        id: ToolId,
    },
    /// Nothing changed.
    Rejected {
        /// Id that was refused.
        id: ToolId,
        /// Reason for the refusal.
        reason: RejectionReason,
    },
}

impl Registration {
    /// Returns `true` when the registration was accepted.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// Returns the id the registration concerned.
    #[must_use]
    pub const fn id(&self) -> &ToolId {
        match self {
            Self::Accepted { id } | Self::Rejected { id, .. } => id,
        }
    }
}

/// Inserts a runtime descriptor and binding, or leaves both untouched.
///
/// The binding is claimed first because it rejects ids bound statically as
/// well as at runtime; the catalog insert then rejects ids described but not
/// yet bound, in which case the binding is released again. Callers rebuild
/// the index after an acceptance.
pub(crate) fn merge(
    catalog: &Catalog,
    bindings: &ProviderBindings,
    descriptor: Descriptor,
    provider: Arc<dyn CapabilityProvider>,
) -> Registration {
    let id = descriptor.id().clone();
    let rejected = |id: ToolId| {
        warn!(tool = %id, "runtime capability rejected: duplicate id");
        Registration::Rejected {
            id,
            reason: RejectionReason::DuplicateId,
        }
    };

    if catalog.contains(id.as_str()) {
        return rejected(id);
    }

    let descriptor = if descriptor.is_core() {
        warn!(tool = %id, "runtime capabilities cannot be core; clearing flag");
        descriptor.with_core(false)
    } else {
        descriptor
    };

    if bindings.bind_runtime(id.clone(), provider).is_err() {
        return rejected(id);
    }
    if catalog.try_register(descriptor).is_err() {
        bindings.unbind_runtime(&id);
        return rejected(id);
    }

    info!(tool = %id, "runtime capability registered");
    Registration::Accepted { id }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use toolbelt_tools::{StaticProvider, ToolError};

    use super::*;

    fn descriptor(id: &str, description: &str) -> Descriptor {
        Descriptor::builder(ToolId::new(id).unwrap())
            .name(id)
            .unwrap()
            .description(description)
            .build()
            .unwrap()
    }

    fn provider() -> Arc<dyn CapabilityProvider> {
        Arc::new(StaticProvider::new(|v: Value| async move {
            Ok::<_, ToolError>(v)
        }))
    }

    #[test]
    fn accepts_new_ids() {
        let catalog = Catalog::new();
        let bindings = ProviderBindings::new();

        let outcome = merge(&catalog, &bindings, descriptor("weather", "forecast"), provider());
        assert!(outcome.is_accepted());
        assert!(catalog.contains("weather"));
        assert!(bindings.contains(&ToolId::new("weather").unwrap()));
    }

    #[test]
    fn rejects_catalogued_ids_without_touching_them() {
        let catalog = Catalog::new();
        let bindings = ProviderBindings::new();
        catalog.register(descriptor("calc", "original"));

        let outcome = merge(&catalog, &bindings, descriptor("calc", "impostor"), provider());
        assert_eq!(
            outcome,
            Registration::Rejected {
                id: ToolId::new("calc").unwrap(),
                reason: RejectionReason::DuplicateId,
            }
        );
        assert_eq!(catalog.get("calc").unwrap().description(), "original");
        assert!(!bindings.contains(&ToolId::new("calc").unwrap()));
    }

    #[test]
    fn rejects_statically_bound_ids() {
        let catalog = Catalog::new();
        let bindings = ProviderBindings::new();
        bindings.bind_static_shared(ToolId::new("calc").unwrap(), provider());

        let outcome = merge(&catalog, &bindings, descriptor("calc", "impostor"), provider());
        assert!(!outcome.is_accepted());
        assert!(!catalog.contains("calc"));
    }

    #[test]
    fn clears_core_flag() {
        let catalog = Catalog::new();
        let bindings = ProviderBindings::new();

        merge(
            &catalog,
            &bindings,
            descriptor("sneaky", "").with_core(true),
            provider(),
        );
        assert!(!catalog.get("sneaky").unwrap().is_core());
        assert!(catalog.core_ids().is_empty());
    }

    #[test]
    fn registration_serializes_with_status() {
        let outcome = Registration::Rejected {
            id: ToolId::new("calc").unwrap(),
            reason: RejectionReason::DuplicateId,
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            serde_json::json!({"status": "rejected", "id": "calc", "reason": "duplicate_id"})
        );
    }
}
