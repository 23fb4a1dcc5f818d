// crates/fedsync-core/src/runtime/memory.rs
// ============================================================================
// Module: In-Memory Collaborators
// Description: In-memory snapshot store and plugin catalog.
// Purpose: Provide deterministic collaborators for tests and embedding hosts.
// Dependencies: crate::{core, interfaces}, async-trait
// ============================================================================

//! ## Overview
//! [`InMemorySnapshotStore`] keeps connection state and foreign schema names in
//! memory; sessions copy the data at acquisition. [`InstalledPlugins`] is a
//! fixed plugin catalog. Neither is intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::ConnectionName;
use crate::core::ConnectionState;
use crate::core::ConnectionStateMap;
use crate::core::PluginId;
use crate::interfaces::CatalogError;
use crate::interfaces::PluginCatalog;
use crate::interfaces::SnapshotSession;
use crate::interfaces::SnapshotStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Snapshot Store
// ============================================================================

/// Data held by [`InMemorySnapshotStore`].
#[derive(Debug, Default, Clone)]
struct Snapshot {
    /// Recorded connection state.
    state: ConnectionStateMap,
    /// Physical schema names.
    foreign_schemas: BTreeSet<String>,
}

/// In-memory snapshot store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemorySnapshotStore {
    /// Snapshot protected by a mutex.
    snapshot: Arc<Mutex<Snapshot>>,
}

impl InMemorySnapshotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a connection state entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Store`] when the store mutex is poisoned.
    pub fn put_state(&self, state: ConnectionState) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        guard.state.insert(state.name.clone(), state);
        Ok(())
    }

    /// Records a physical schema name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Store`] when the store mutex is poisoned.
    pub fn put_foreign_schema(&self, name: impl Into<String>) -> Result<(), StoreError> {
        self.lock()?.foreign_schemas.insert(name.into());
        Ok(())
    }

    /// Removes a connection state entry and its physical schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Store`] when the store mutex is poisoned.
    pub fn remove(&self, name: &ConnectionName) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        guard.state.remove(name);
        guard.foreign_schemas.remove(name.as_str());
        Ok(())
    }

    /// Locks the snapshot.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Snapshot>, StoreError> {
        self.snapshot.lock().map_err(|_| StoreError::Store("snapshot mutex poisoned".to_string()))
    }
}

/// Session over an [`InMemorySnapshotStore`] copy.
#[derive(Debug)]
pub struct InMemorySnapshotSession {
    /// Snapshot copied at acquisition.
    snapshot: Snapshot,
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    type Session = InMemorySnapshotSession;

    async fn acquire(&self) -> Result<Self::Session, StoreError> {
        let snapshot = self.lock()?.clone();
        Ok(InMemorySnapshotSession {
            snapshot,
        })
    }
}

#[async_trait]
impl SnapshotSession for InMemorySnapshotSession {
    async fn load_connection_state(&mut self) -> Result<ConnectionStateMap, StoreError> {
        Ok(self.snapshot.state.clone())
    }

    async fn load_foreign_schema_names(&mut self) -> Result<Vec<String>, StoreError> {
        Ok(self.snapshot.foreign_schemas.iter().cloned().collect())
    }
}

// ============================================================================
// SECTION: Plugin Catalog
// ============================================================================

/// Fixed set of installed plugins.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InstalledPlugins {
    /// Installed plugin identifiers.
    plugins: BTreeSet<PluginId>,
}

impl InstalledPlugins {
    /// Creates a catalog from plugin identifiers.
    #[must_use]
    pub fn new<I, P>(plugins: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PluginId>,
    {
        Self {
            plugins: plugins.into_iter().map(Into::into).collect(),
        }
    }
}

impl PluginCatalog for InstalledPlugins {
    fn is_installed(&self, plugin: &PluginId) -> Result<bool, CatalogError> {
        Ok(self.plugins.contains(plugin))
    }
}
