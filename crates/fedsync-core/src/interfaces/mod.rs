// crates/fedsync-core/src/interfaces/mod.rs
// ============================================================================
// Module: Fedsync Interfaces
// Description: Contracts for the snapshot store, plugin supervisor, and catalog.
// Purpose: Define the collaborator surfaces the reconciliation engine depends on.
// Dependencies: crate::core, async-trait, tokio-util
// ============================================================================

//! ## Overview
//! The reconciliation engine performs no I/O of its own. It reads the current
//! snapshot through a [`SnapshotStore`], starts plugin processes through a
//! [`PluginSupervisor`], and checks plugin installation through a
//! [`PluginCatalog`]. Implementations decide how those operations are carried
//! out; the engine only decides what should change.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::core::Connection;
use crate::core::ConnectionPlugin;
use crate::core::ConnectionStateMap;
use crate::core::PluginId;

// ============================================================================
// SECTION: Snapshot Store
// ============================================================================

/// Snapshot store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("snapshot store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("snapshot store corruption: {0}")]
    Corrupt(String),
    /// Store data version is incompatible.
    #[error("snapshot store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store data is invalid.
    #[error("snapshot store invalid data: {0}")]
    Invalid(String),
    /// Store reported an error.
    #[error("snapshot store error: {0}")]
    Store(String),
}

/// Backing store holding persisted connection state.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Session type returned by [`SnapshotStore::acquire`].
    type Session: SnapshotSession;

    /// Acquires a session. Reads through the session reflect the store as of
    /// acquisition; dropping the session releases it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when no session can be acquired.
    async fn acquire(&self) -> Result<Self::Session, StoreError>;
}

/// Read session over the backing store.
#[async_trait]
pub trait SnapshotSession: Send {
    /// Loads the recorded state of every connection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the snapshot cannot be read.
    async fn load_connection_state(&mut self) -> Result<ConnectionStateMap, StoreError>;

    /// Loads the names of physical schemas present in the backing store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the schema names cannot be read.
    async fn load_foreign_schema_names(&mut self) -> Result<Vec<String>, StoreError>;
}

// ============================================================================
// SECTION: Plugin Supervisor
// ============================================================================

/// Plugin launch errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaunchError {
    /// This connection's plugin failed to start, handshake, or report a schema.
    #[error("plugin launch failed: {0}")]
    Failed(String),
    /// The supervisor cannot launch any plugin.
    #[error("plugin supervisor unavailable: {0}")]
    Unavailable(String),
    /// The launch observed cancellation and stopped.
    #[error("plugin launch cancelled")]
    Cancelled,
}

/// Starts plugin processes for connections.
#[async_trait]
pub trait PluginSupervisor: Send + Sync {
    /// Starts (or reuses) the plugin process serving `connection` and returns
    /// its descriptor with the schema reported for `connection`.
    ///
    /// Implementations should observe `cancel` and release any partially
    /// started process before returning [`LaunchError::Cancelled`].
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError`] when the plugin cannot be started.
    async fn launch(
        &self,
        connection: &Connection,
        cancel: &CancellationToken,
    ) -> Result<ConnectionPlugin, LaunchError>;
}

// ============================================================================
// SECTION: Plugin Catalog
// ============================================================================

/// Plugin catalog errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Catalog could not be read.
    #[error("plugin catalog error: {0}")]
    Unreadable(String),
}

/// Resolves whether a plugin is installed.
pub trait PluginCatalog: Send + Sync {
    /// Returns true when the plugin is installed and can be launched.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the catalog itself cannot be read.
    fn is_installed(&self, plugin: &PluginId) -> Result<bool, CatalogError>;
}
