// crates/fedsync-core/src/core/mod.rs
// ============================================================================
// Module: Fedsync Core Types
// Description: Connection configuration, state, schemas, and plan types.
// Purpose: Provide stable, serializable types shared by all reconciliation stages.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Core types describe desired connections, their persisted state, the schemas
//! plugins report, and the reconciliation plan handed to the applier.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod compat;
pub mod connection;
pub mod hashing;
pub mod identifiers;
pub mod plugin;
pub mod schema;
pub mod state;
pub mod time;
pub mod updates;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use compat::DEFAULT_RESERVED_CONNECTION_NAMES;
pub use compat::SUPPORTED_PROTOCOL_VERSION;
pub use connection::Connection;
pub use connection::ConnectionIndex;
pub use connection::ConnectionIndexError;
pub use connection::ConnectionKind;
pub use connection::ConnectionSet;
pub use connection::ConnectionType;
pub use hashing::schema_hash;
pub use identifiers::ConnectionName;
pub use identifiers::PluginId;
pub use identifiers::PluginInstanceId;
pub use plugin::ConnectionPlugin;
pub use plugin::PluginMap;
pub use schema::ColumnDefinition;
pub use schema::ColumnType;
pub use schema::Schema;
pub use schema::SchemaMode;
pub use schema::TableSchema;
pub use state::ConnectionHealth;
pub use state::ConnectionState;
pub use state::ConnectionStateMap;
pub use time::Timestamp;
pub use updates::ConnectionUpdates;
pub use updates::LoadFailure;
pub use updates::LoadFailureKind;
pub use updates::ValidationFailure;
pub use updates::ValidationFailureKind;
pub use updates::validation_warning;
