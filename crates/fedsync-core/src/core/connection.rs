// crates/fedsync-core/src/core/connection.rs
// ============================================================================
// Module: Fedsync Connections
// Description: Desired connection configuration and its flattened index.
// Purpose: Model standalone and aggregator connections as a tagged variant.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A [`Connection`] is either standalone (served by its own plugin process) or
//! an aggregator fanning out to child connections. Aggregators have no plugin
//! process; [`ConnectionIndex`] resolves any name to the connection whose
//! plugin represents it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::ConnectionName;
use crate::core::identifiers::PluginId;

// ============================================================================
// SECTION: Connection Types
// ============================================================================

/// Connection type label recorded in state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    /// Connection served directly by a plugin process.
    Standalone,
    /// Virtual connection over child connections.
    Aggregator,
}

impl ConnectionType {
    /// Returns a stable label for the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standalone => "standalone",
            Self::Aggregator => "aggregator",
        }
    }
}

/// Connection kind with kind-specific data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectionKind {
    /// Connection served directly by its plugin.
    Standalone,
    /// Aggregator over an ordered list of children.
    Aggregator {
        /// Child connections in configured order.
        children: Vec<Connection>,
    },
}

/// A configured connection.
///
/// # Invariants
/// - Aggregators have at least one child (checked by [`ConnectionIndex::build`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Connection name.
    pub name: ConnectionName,
    /// Plugin serving the connection (for aggregators, the children's plugin).
    pub plugin: PluginId,
    /// Opaque plugin-specific connection options.
    #[serde(default)]
    pub config: String,
    /// Connection kind.
    #[serde(flatten)]
    pub kind: ConnectionKind,
}

impl Connection {
    /// Creates a standalone connection.
    #[must_use]
    pub fn standalone(name: impl Into<ConnectionName>, plugin: impl Into<PluginId>) -> Self {
        Self {
            name: name.into(),
            plugin: plugin.into(),
            config: String::new(),
            kind: ConnectionKind::Standalone,
        }
    }

    /// Creates an aggregator connection over the given children.
    #[must_use]
    pub fn aggregator(
        name: impl Into<ConnectionName>,
        plugin: impl Into<PluginId>,
        children: Vec<Self>,
    ) -> Self {
        Self {
            name: name.into(),
            plugin: plugin.into(),
            config: String::new(),
            kind: ConnectionKind::Aggregator {
                children,
            },
        }
    }

    /// Sets the opaque connection options.
    #[must_use]
    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.config = config.into();
        self
    }

    /// Returns the connection type label.
    #[must_use]
    pub const fn connection_type(&self) -> ConnectionType {
        match self.kind {
            ConnectionKind::Standalone => ConnectionType::Standalone,
            ConnectionKind::Aggregator {
                ..
            } => ConnectionType::Aggregator,
        }
    }

    /// Returns the children of an aggregator (empty for standalone).
    #[must_use]
    pub fn children(&self) -> &[Self] {
        match &self.kind {
            ConnectionKind::Standalone => &[],
            ConnectionKind::Aggregator {
                children,
            } => children,
        }
    }

    /// Returns the connection whose plugin represents this one.
    ///
    /// Standalone connections represent themselves; aggregators are
    /// represented by their first child.
    #[must_use]
    pub fn representative(&self) -> Option<&Self> {
        match &self.kind {
            ConnectionKind::Standalone => Some(self),
            ConnectionKind::Aggregator {
                children,
            } => children.first(),
        }
    }
}

/// Desired connection configuration keyed by name.
pub type ConnectionSet = BTreeMap<ConnectionName, Connection>;

// ============================================================================
// SECTION: Connection Index
// ============================================================================

/// Configuration corruption detected while indexing connections.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionIndexError {
    /// Aggregator declared without children.
    #[error("aggregator connection {0} has no child connections")]
    EmptyAggregator(ConnectionName),
    /// Aggregator child is itself an aggregator.
    #[error("aggregator connection {parent} has aggregator child {child}")]
    NestedAggregator {
        /// Aggregator name.
        parent: ConnectionName,
        /// Offending child name.
        child: ConnectionName,
    },
    /// Two different definitions share one name.
    #[error("connection {0} is defined more than once with different settings")]
    Conflict(ConnectionName),
    /// Map key and connection name disagree.
    #[error("connection set key {key} does not match connection name {name}")]
    KeyMismatch {
        /// Map key.
        key: ConnectionName,
        /// Name stored in the connection.
        name: ConnectionName,
    },
}

/// Flattened lookup of every configured connection, including children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionIndex {
    /// Connections keyed by name.
    connections: BTreeMap<ConnectionName, Connection>,
}

impl ConnectionIndex {
    /// Indexes a connection set, flattening aggregator children.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionIndexError`] when the set is structurally corrupt.
    pub fn build(set: &ConnectionSet) -> Result<Self, ConnectionIndexError> {
        let mut index = Self::default();
        for (key, connection) in set {
            if key != &connection.name {
                return Err(ConnectionIndexError::KeyMismatch {
                    key: key.clone(),
                    name: connection.name.clone(),
                });
            }
            if let ConnectionKind::Aggregator {
                children,
            } = &connection.kind
            {
                if children.is_empty() {
                    return Err(ConnectionIndexError::EmptyAggregator(connection.name.clone()));
                }
                for child in children {
                    if child.connection_type() == ConnectionType::Aggregator {
                        return Err(ConnectionIndexError::NestedAggregator {
                            parent: connection.name.clone(),
                            child: child.name.clone(),
                        });
                    }
                    index.insert(child)?;
                }
            }
            index.insert(connection)?;
        }
        Ok(index)
    }

    /// Inserts a connection, rejecting conflicting redefinitions.
    fn insert(&mut self, connection: &Connection) -> Result<(), ConnectionIndexError> {
        match self.connections.get(&connection.name) {
            Some(existing) if existing != connection => {
                Err(ConnectionIndexError::Conflict(connection.name.clone()))
            }
            Some(_) => Ok(()),
            None => {
                self.connections.insert(connection.name.clone(), connection.clone());
                Ok(())
            }
        }
    }

    /// Returns the connection with the given name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Connection> {
        self.connections.get(name)
    }

    /// Returns the connection whose plugin represents `name`.
    #[must_use]
    pub fn representative(&self, name: &str) -> Option<&Connection> {
        self.get(name).and_then(Connection::representative)
    }

    /// Iterates over all indexed connections in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Returns the number of indexed connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns true when no connections are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
