// crates/fedsync-core/src/core/plugin.rs
// ============================================================================
// Module: Fedsync Connection Plugins
// Description: Handles to started plugin processes and their schemas.
// Purpose: Carry plugin instances from the loader to validation and the applier.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`ConnectionPlugin`] describes one running plugin process and the schema
//! it reported for every connection it serves. The supervisor owns the
//! process; the descriptor is what a reconciliation run hands back so the
//! caller can issue DDL against it or release it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ConnectionName;
use crate::core::identifiers::PluginId;
use crate::core::identifiers::PluginInstanceId;
use crate::core::schema::Schema;

// ============================================================================
// SECTION: Connection Plugin
// ============================================================================

/// A started plugin process and the connections it serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionPlugin {
    /// Supervisor-assigned process identifier.
    pub instance_id: PluginInstanceId,
    /// Plugin package identifier.
    pub plugin: PluginId,
    /// Reported schema for each served connection.
    pub connections: BTreeMap<ConnectionName, Schema>,
}

impl ConnectionPlugin {
    /// Creates a plugin descriptor serving no connections yet.
    #[must_use]
    pub fn new(instance_id: impl Into<String>, plugin: impl Into<PluginId>) -> Self {
        Self {
            instance_id: PluginInstanceId::new(instance_id),
            plugin: plugin.into(),
            connections: BTreeMap::new(),
        }
    }

    /// Adds a served connection with its schema.
    #[must_use]
    pub fn serving(mut self, name: impl Into<ConnectionName>, schema: Schema) -> Self {
        self.connections.insert(name.into(), schema);
        self
    }

    /// Returns true when this process serves the named connection.
    #[must_use]
    pub fn includes_connection(&self, name: &str) -> bool {
        self.connections.contains_key(name)
    }

    /// Returns the schema reported for the named connection.
    #[must_use]
    pub fn schema_for(&self, name: &str) -> Option<&Schema> {
        self.connections.get(name)
    }
}

/// Loaded plugins keyed by the connection name they were loaded for.
pub type PluginMap = BTreeMap<ConnectionName, ConnectionPlugin>;
