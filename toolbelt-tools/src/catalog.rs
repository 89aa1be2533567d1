//! Descriptor catalog keyed by tool identifier.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use toolbelt_primitives::{Descriptor, ToolId};
use tracing::{debug, warn};

use crate::error::DuplicateId;

/// Point-in-time copy of the catalog used for index rebuilds.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    /// Revision the snapshot was taken at.
    pub revision: u64,
    /// Descriptors in registration order.
    pub descriptors: Vec<Descriptor>,
}

#[derive(Debug, Default)]
struct Entries {
    ordered: Vec<Descriptor>,
    positions: HashMap<ToolId, usize>,
    revision: u64,
}

/// Thread-safe store of tool descriptors.
///
/// Iteration order is registration order; overwriting an existing identifier
/// keeps its original position. Every mutation bumps the revision.
#[derive(Debug, Default)]
pub struct Catalog {
    inner: RwLock<Entries>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a descriptor, replacing any existing one with the same id.
    ///
    /// Returns the replaced descriptor, if any.
    pub fn register(&self, descriptor: Descriptor) -> Option<Descriptor> {
        let mut entries = self.write();
        entries.revision += 1;
        if let Some(&position) = entries.positions.get(descriptor.id()) {
            warn!(tool = %descriptor.id(), "overwriting existing catalog entry");
            return Some(std::mem::replace(&mut entries.ordered[position], descriptor));
        }

        debug!(tool = %descriptor.id(), "catalog entry registered");
        let position = entries.ordered.len();
        entries.positions.insert(descriptor.id().clone(), position);
        entries.ordered.push(descriptor);
        None
    }

    /// Registers a descriptor only if its id is not already present.
    ///
    /// The check and the insert happen under one write lock.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateId`] when the identifier is already registered.
    pub fn try_register(&self, descriptor: Descriptor) -> Result<(), DuplicateId> {
        let mut entries = self.write();
        if entries.positions.contains_key(descriptor.id()) {
            return Err(DuplicateId {
                id: descriptor.id().clone(),
            });
        }

        entries.revision += 1;
        let position = entries.ordered.len();
        entries.positions.insert(descriptor.id().clone(), position);
        entries.ordered.push(descriptor);
        Ok(())
    }

    /// Returns the descriptor registered under `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Descriptor> {
        let entries = self.read();
        entries
            .positions
            .get(id)
            .map(|&position| entries.ordered[position].clone())
    }

    /// Returns `true` when `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.read().positions.contains_key(id)
    }

    /// Returns every descriptor in registration order.
    #[must_use]
    pub fn all(&self) -> Vec<Descriptor> {
        self.read().ordered.clone()
    }

    /// Returns the descriptors together with the revision they belong to.
    #[must_use]
    pub fn snapshot(&self) -> CatalogSnapshot {
        let entries = self.read();
        CatalogSnapshot {
            revision: entries.revision,
            descriptors: entries.ordered.clone(),
        }
    }

    /// Identifiers of descriptors flagged as core, in registration order.
    #[must_use]
    pub fn core_ids(&self) -> Vec<ToolId> {
        self.read()
            .ordered
            .iter()
            .filter(|descriptor| descriptor.is_core())
            .map(|descriptor| descriptor.id().clone())
            .collect()
    }

    /// Current revision. Starts at zero and grows with every mutation.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.read().revision
    }

    /// Number of registered descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().ordered.len()
    }

    /// Returns `true` when the catalog holds no descriptors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().ordered.is_empty()
    }
}
