// crates/fedsync-core/src/core/state.rs
// ============================================================================
// Module: Fedsync Connection State
// Description: Persisted per-connection state and the state map.
// Purpose: Represent current (stored) and required (computed) connection state.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`ConnectionState`] records what the backing store knows about one
//! connection: its desired settings, the schema fingerprint last imported, and
//! a runtime health status. Equality compares every field except the
//! modification time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::connection::Connection;
use crate::core::connection::ConnectionType;
use crate::core::identifiers::ConnectionName;
use crate::core::identifiers::PluginId;
use crate::core::schema::SchemaMode;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Health
// ============================================================================

/// Runtime health of a connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionHealth {
    /// Awaiting schema import.
    #[default]
    Pending,
    /// Schema imported and usable.
    Ready,
    /// Plugin failed to load or validate.
    Error,
}

impl ConnectionHealth {
    /// Returns a stable label for the health value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }
}

// ============================================================================
// SECTION: Connection State
// ============================================================================

/// Last known state of one connection.
///
/// # Invariants
/// - `schema_hash` is empty until a schema has been fingerprinted.
/// - `schema_mode == None` means the plugin never reported a mode.
/// - `error` is set only when `health == ConnectionHealth::Error`.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct ConnectionState {
    /// Connection name.
    pub name: ConnectionName,
    /// Plugin serving the connection.
    pub plugin: PluginId,
    /// Connection type.
    pub connection_type: ConnectionType,
    /// Child connection names (aggregators only).
    #[serde(default)]
    pub children: Vec<ConnectionName>,
    /// Opaque connection options.
    #[serde(default)]
    pub config: String,
    /// Schema mode last reported by the plugin.
    #[serde(default)]
    pub schema_mode: Option<SchemaMode>,
    /// Schema fingerprint last imported.
    #[serde(default)]
    pub schema_hash: String,
    /// Runtime health.
    #[serde(default)]
    pub health: ConnectionHealth,
    /// Failure detail when unhealthy.
    #[serde(default)]
    pub error: Option<String>,
    /// Last modification time.
    #[serde(default)]
    pub modified_at: Timestamp,
}

impl ConnectionState {
    /// Derives a pending state for a connection with no recorded schema.
    #[must_use]
    pub fn from_connection(connection: &Connection, modified_at: Timestamp) -> Self {
        Self {
            name: connection.name.clone(),
            plugin: connection.plugin.clone(),
            connection_type: connection.connection_type(),
            children: connection.children().iter().map(|child| child.name.clone()).collect(),
            config: connection.config.clone(),
            schema_mode: None,
            schema_hash: String::new(),
            health: ConnectionHealth::Pending,
            error: None,
            modified_at,
        }
    }

    /// Marks the connection as failed with the given reason.
    pub fn set_error(&mut self, reason: impl Into<String>) {
        self.health = ConnectionHealth::Error;
        self.error = Some(reason.into());
    }

    /// Marks the connection as pending re-import at `modified_at`.
    pub fn mark_pending(&mut self, modified_at: Timestamp) {
        self.health = ConnectionHealth::Pending;
        self.error = None;
        self.modified_at = modified_at;
    }

    /// Returns true for aggregator connections.
    #[must_use]
    pub fn is_aggregator(&self) -> bool {
        self.connection_type == ConnectionType::Aggregator
    }
}

impl PartialEq for ConnectionState {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.plugin == other.plugin
            && self.connection_type == other.connection_type
            && self.children == other.children
            && self.config == other.config
            && self.schema_mode == other.schema_mode
            && self.schema_hash == other.schema_hash
            && self.health == other.health
            && self.error == other.error
    }
}

/// Connection state keyed by connection name.
pub type ConnectionStateMap = BTreeMap<ConnectionName, ConnectionState>;
