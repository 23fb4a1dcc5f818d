// crates/fedsync-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Snapshot Store Tests
// Description: Validate SQLite SnapshotStore behavior.
// Purpose: Ensure durable persistence, snapshot reads, and integrity checks.
// Dependencies: fedsync-store-sqlite, fedsync-core, rusqlite, tempfile, tokio
// ============================================================================

//! ## Overview
//! Exercises persistence across instances, fail-closed integrity checks on
//! tampered rows, and committing a reconciliation plan.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use fedsync_core::Connection;
use fedsync_core::ConnectionHealth;
use fedsync_core::ConnectionName;
use fedsync_core::ConnectionState;
use fedsync_core::ConnectionStateMap;
use fedsync_core::ConnectionUpdates;
use fedsync_core::SchemaMode;
use fedsync_core::SnapshotSession;
use fedsync_core::SnapshotStore;
use fedsync_core::StoreError;
use fedsync_core::Timestamp;
use fedsync_core::ValidationFailure;
use fedsync_core::ValidationFailureKind;
use fedsync_store_sqlite::SqliteSnapshotStore;
use fedsync_store_sqlite::SqliteStoreConfig;
use fedsync_store_sqlite::SqliteStoreError;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn sample_state(name: &str) -> ConnectionState {
    let mut state = ConnectionState::from_connection(
        &Connection::standalone(name, "aws").with_config("regions = [\"*\"]"),
        Timestamp::from_unix_millis(1_700_000_000_000),
    );
    state.schema_hash = "abc123".to_string();
    state.schema_mode = Some(SchemaMode::Static);
    state.health = ConnectionHealth::Ready;
    state
}

fn state_map(names: &[&str]) -> ConnectionStateMap {
    names.iter().map(|name| ((*name).into(), sample_state(name))).collect()
}

fn store_for(temp: &TempDir) -> SqliteSnapshotStore {
    SqliteSnapshotStore::new(&SqliteStoreConfig::new(temp.path().join("fedsync.db"))).unwrap()
}

fn raw_connection(temp: &TempDir) -> rusqlite::Connection {
    rusqlite::Connection::open(temp.path().join("fedsync.db")).unwrap()
}

async fn load(store: &SqliteSnapshotStore) -> Result<(ConnectionStateMap, Vec<String>), StoreError> {
    let mut session = store.acquire().await?;
    let state = session.load_connection_state().await?;
    let foreign = session.load_foreign_schema_names().await?;
    Ok((state, foreign))
}

// ============================================================================
// SECTION: Persistence
// ============================================================================

#[tokio::test]
async fn empty_store_reads_empty_snapshot() {
    let temp = TempDir::new().unwrap();
    let (state, foreign) = load(&store_for(&temp)).await.unwrap();
    assert!(state.is_empty());
    assert!(foreign.is_empty());
}

#[tokio::test]
async fn saved_state_persists_across_instances() {
    let temp = TempDir::new().unwrap();
    {
        let store = store_for(&temp);
        store.save_connection_state(&state_map(&["aws", "gcp"])).unwrap();
        store.record_foreign_schema("aws").unwrap();
        store.record_foreign_schema("stale").unwrap();
        store.drop_foreign_schema("stale").unwrap();
    }
    let (state, foreign) = load(&store_for(&temp)).await.unwrap();
    assert_eq!(state, state_map(&["aws", "gcp"]));
    assert_eq!(state.get("aws").unwrap().health, ConnectionHealth::Ready);
    assert_eq!(foreign, vec!["aws".to_string()]);
}

#[tokio::test]
async fn save_replaces_previous_state() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp);
    store.save_connection_state(&state_map(&["aws", "gcp"])).unwrap();
    store.save_connection_state(&state_map(&["gcp"])).unwrap();
    let (state, _) = load(&store).await.unwrap();
    assert_eq!(state.keys().map(ConnectionName::as_str).collect::<Vec<_>>(), vec!["gcp"]);
}

#[tokio::test]
async fn session_is_isolated_from_later_writes() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp);
    store.save_connection_state(&state_map(&["aws"])).unwrap();
    let mut session = store.acquire().await.unwrap();
    store.save_connection_state(&state_map(&["aws", "gcp"])).unwrap();
    assert_eq!(session.load_connection_state().await.unwrap().len(), 1);
}

#[tokio::test]
async fn commit_updates_applies_plan() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp);
    store.record_foreign_schema("old").unwrap();
    store.record_foreign_schema("bad_protocol").unwrap();

    let mut updates = ConnectionUpdates {
        update: state_map(&["aws"]),
        final_connection_state: state_map(&["aws", "bad_protocol"]),
        current_connection_state: state_map(&["old", "bad_protocol"]),
        ..ConnectionUpdates::default()
    };
    updates.delete.insert("old".into());
    updates.validation_failures.push(ValidationFailure {
        connection_name: "bad_protocol".into(),
        plugin: "aws".into(),
        kind: ValidationFailureKind::ProtocolIncompatible,
        message: "protocol too new".to_string(),
        should_drop_if_exists: true,
    });
    store.commit_updates(&updates).unwrap();

    let (state, foreign) = load(&store).await.unwrap();
    assert_eq!(state.keys().map(ConnectionName::as_str).collect::<Vec<_>>(), vec!["aws", "bad_protocol"]);
    assert_eq!(foreign, vec!["aws".to_string()]);
}

// ============================================================================
// SECTION: Integrity
// ============================================================================

#[tokio::test]
async fn tampered_hash_is_corrupt() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp);
    store.save_connection_state(&state_map(&["aws"])).unwrap();
    raw_connection(&temp)
        .execute("UPDATE connection_state SET state_hash = 'bad' WHERE name = 'aws'", rusqlite::params![])
        .unwrap();
    let err = load(&store).await.unwrap_err();
    assert!(matches!(err, StoreError::Corrupt(_)));
}

#[tokio::test]
async fn unknown_hash_algorithm_is_invalid() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp);
    store.save_connection_state(&state_map(&["aws"])).unwrap();
    raw_connection(&temp)
        .execute("UPDATE connection_state SET hash_algorithm = 'md5'", rusqlite::params![])
        .unwrap();
    let err = load(&store).await.unwrap_err();
    assert!(matches!(err, StoreError::Invalid(_)));
}

#[tokio::test]
async fn key_payload_mismatch_is_invalid() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp);
    store.save_connection_state(&state_map(&["aws"])).unwrap();
    raw_connection(&temp)
        .execute("UPDATE connection_state SET name = 'gcp'", rusqlite::params![])
        .unwrap();
    let err = load(&store).await.unwrap_err();
    assert!(matches!(err, StoreError::Invalid(_)));
}

#[test]
fn unsupported_schema_version_is_rejected() {
    let temp = TempDir::new().unwrap();
    drop(store_for(&temp));
    raw_connection(&temp).execute("UPDATE store_meta SET version = 999", rusqlite::params![]).unwrap();
    let result = SqliteSnapshotStore::new(&SqliteStoreConfig::new(temp.path().join("fedsync.db")));
    assert!(matches!(result, Err(SqliteStoreError::VersionMismatch(_))));
}

#[test]
fn directory_path_is_rejected() {
    let temp = TempDir::new().unwrap();
    let result = SqliteSnapshotStore::new(&SqliteStoreConfig::new(temp.path()));
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn mismatched_map_key_is_rejected_on_save() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp);
    let mut state = ConnectionStateMap::new();
    state.insert("gcp".into(), sample_state("aws"));
    let result = store.save_connection_state(&state);
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}
