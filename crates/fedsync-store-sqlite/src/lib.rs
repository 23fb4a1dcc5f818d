// crates/fedsync-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Snapshot Store
// Description: Durable SnapshotStore backend using SQLite WAL.
// Purpose: Persist connection state and physical schema names for fedsync.
// Dependencies: fedsync-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`fedsync_core::SnapshotStore`]. Each
//! connection's state is stored as canonical JSON with an integrity hash, and
//! reads fail closed when a row does not verify.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::MAX_STATE_BYTES;
pub use store::SqliteSnapshotSession;
pub use store::SqliteSnapshotStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
