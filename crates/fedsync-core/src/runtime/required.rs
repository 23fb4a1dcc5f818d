// crates/fedsync-core/src/runtime/required.rs
// ============================================================================
// Module: Required-State Builder
// Description: Derives the desired connection state from configuration.
// Purpose: Resolve plugins and seed required state from the current snapshot.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The required state is what the backing store should look like once every
//! configured connection has been imported. Each connection (aggregator
//! children included) is checked against the plugin catalog; connections whose
//! plugin is not installed are set aside in `missing_plugins` and take no
//! further part in the run.
//!
//! Seeding copies the schema fingerprint and mode from the current snapshot,
//! plus health and modification time when the recorded entry is healthy, so
//! the diff stage can compare like with like. Errored entries are not carried
//! and therefore always come up for retry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::core::Connection;
use crate::core::ConnectionIndex;
use crate::core::ConnectionHealth;
use crate::core::ConnectionSet;
use crate::core::ConnectionState;
use crate::core::ConnectionStateMap;
use crate::core::PluginId;
use crate::core::Timestamp;
use crate::interfaces::PluginCatalog;
use crate::runtime::reconciler::ReconcileError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Output of [`build_required_state`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredState {
    /// Desired state for every connection whose plugin is installed.
    pub state: ConnectionStateMap,
    /// Connections whose plugin is not installed, keyed by plugin.
    pub missing_plugins: BTreeMap<PluginId, Vec<Connection>>,
    /// Flattened lookup over the configured connections.
    pub index: ConnectionIndex,
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builds the required connection state for `connections`.
///
/// # Errors
///
/// Returns [`ReconcileError::InvalidConfig`] when the connection set is
/// structurally corrupt and [`ReconcileError::Catalog`] when the plugin
/// catalog cannot be read.
pub fn build_required_state(
    connections: &ConnectionSet,
    current: &ConnectionStateMap,
    catalog: &dyn PluginCatalog,
    now: Timestamp,
) -> Result<RequiredState, ReconcileError> {
    let index = ConnectionIndex::build(connections)?;
    let mut installed: BTreeMap<PluginId, bool> = BTreeMap::new();
    let mut state = ConnectionStateMap::new();
    let mut missing_plugins: BTreeMap<PluginId, Vec<Connection>> = BTreeMap::new();

    for connection in index.iter() {
        let resolved = match installed.get(&connection.plugin) {
            Some(resolved) => *resolved,
            None => {
                let resolved = catalog.is_installed(&connection.plugin)?;
                installed.insert(connection.plugin.clone(), resolved);
                resolved
            }
        };
        if !resolved {
            missing_plugins.entry(connection.plugin.clone()).or_default().push(connection.clone());
            continue;
        }
        state.insert(connection.name.clone(), seed_state(connection, current, now));
    }

    Ok(RequiredState {
        state,
        missing_plugins,
        index,
    })
}

/// Derives one required entry, carrying recorded schema fields forward.
///
/// Health and modification time carry over only from a healthy entry. An
/// errored entry is seeded pending so that it differs from the recorded state
/// and the connection is retried.
fn seed_state(
    connection: &Connection,
    current: &ConnectionStateMap,
    now: Timestamp,
) -> ConnectionState {
    let mut required = ConnectionState::from_connection(connection, now);
    if let Some(recorded) = current.get(&connection.name) {
        required.schema_hash.clone_from(&recorded.schema_hash);
        required.schema_mode = recorded.schema_mode;
        if recorded.health != ConnectionHealth::Error {
            required.health = recorded.health;
            required.modified_at = recorded.modified_at;
        }
    }
    required
}

#[cfg(test)]
mod tests {
    use super::seed_state;
    use crate::core::Connection;
    use crate::core::ConnectionHealth;
    use crate::core::ConnectionState;
    use crate::core::ConnectionStateMap;
    use crate::core::SchemaMode;
    use crate::core::Timestamp;

    #[test]
    fn seeding_without_history_is_pending_at_now() {
        let now = Timestamp::from_unix_millis(42);
        let seeded = seed_state(&Connection::standalone("aws", "aws"), &ConnectionStateMap::new(), now);
        assert_eq!(seeded.health, ConnectionHealth::Pending);
        assert!(seeded.schema_hash.is_empty());
        assert_eq!(seeded.schema_mode, None);
        assert_eq!(seeded.modified_at, now);
    }

    #[test]
    fn seeding_copies_recorded_schema_fields() {
        let connection = Connection::standalone("aws", "aws");
        let mut recorded = ConnectionState::from_connection(&connection, Timestamp::from_unix_millis(1));
        recorded.schema_hash = "h1".to_string();
        recorded.schema_mode = Some(SchemaMode::Static);
        recorded.health = ConnectionHealth::Ready;
        let mut current = ConnectionStateMap::new();
        current.insert("aws".into(), recorded.clone());

        let seeded = seed_state(&connection, &current, Timestamp::from_unix_millis(99));
        assert_eq!(seeded, recorded);
        assert_eq!(seeded.health, ConnectionHealth::Ready);
        assert_eq!(seeded.modified_at, Timestamp::from_unix_millis(1));
    }

    #[test]
    fn seeding_resets_errored_status() {
        let connection = Connection::standalone("aws", "aws");
        let mut recorded = ConnectionState::from_connection(&connection, Timestamp::from_unix_millis(1));
        recorded.schema_hash = "h1".to_string();
        recorded.set_error("plugin crashed");
        let mut current = ConnectionStateMap::new();
        current.insert("aws".into(), recorded.clone());

        let seeded = seed_state(&connection, &current, Timestamp::from_unix_millis(99));
        assert_eq!(seeded.schema_hash, "h1");
        assert_eq!(seeded.health, ConnectionHealth::Pending);
        assert_eq!(seeded.error, None);
        assert_eq!(seeded.modified_at, Timestamp::from_unix_millis(99));
        assert_ne!(seeded, recorded);
    }
}
