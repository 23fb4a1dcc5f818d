// crates/fedsync-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Snapshot Store
// Description: Durable SnapshotStore backed by SQLite WAL.
// Purpose: Persist connection state and physical schema names between runs.
// Dependencies: fedsync-core, rusqlite, serde, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! Connection state is stored one row per connection as canonical JSON with a
//! SHA-256 integrity hash; reads recompute the hash and fail closed on
//! mismatch. The `foreign_schemas` table mirrors the physical schemas that
//! exist in the backing database.
//!
//! [`SqliteSnapshotStore::acquire`] reads both tables inside one transaction
//! on a blocking thread, so a session always reflects a single point in time.
//! Write helpers are provided for the applier that executes a plan.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use fedsync_core::ConnectionName;
use fedsync_core::ConnectionState;
use fedsync_core::ConnectionStateMap;
use fedsync_core::ConnectionUpdates;
use fedsync_core::SnapshotSession;
use fedsync_core::SnapshotStore;
use fedsync_core::StoreError;
use fedsync_core::Timestamp;
use fedsync_core::hashing::DEFAULT_HASH_ALGORITHM;
use fedsync_core::hashing::HashAlgorithm;
use fedsync_core::hashing::canonical_json_bytes;
use fedsync_core::hashing::hash_bytes;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum serialized size of one connection state row.
pub const MAX_STATE_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode.
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode.
    #[default]
    Full,
    /// Normal synchronous mode.
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` snapshot store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a config with default pragmas for `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or hash mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Stored payload exceeded size limits.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!(
                "state_json exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

/// Maps a rusqlite error into a store error.
fn db_error(err: &rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed snapshot store.
#[derive(Clone)]
pub struct SqliteSnapshotStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteSnapshotStore {
    /// Opens (or creates) the store described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Replaces the persisted connection state with `state`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when serialization or the write fails.
    pub fn save_connection_state(&self, state: &ConnectionStateMap) -> Result<(), SqliteStoreError> {
        self.with_transaction(|tx| replace_connection_state(tx, state))
    }

    /// Records that a physical schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the write fails.
    pub fn record_foreign_schema(&self, name: &str) -> Result<(), SqliteStoreError> {
        self.with_transaction(|tx| insert_foreign_schema(tx, name))
    }

    /// Records that a physical schema was dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the write fails.
    pub fn drop_foreign_schema(&self, name: &str) -> Result<(), SqliteStoreError> {
        self.with_transaction(|tx| delete_foreign_schema(tx, name))
    }

    /// Persists the outcome of an applied plan in one transaction.
    ///
    /// Deleted schemas and schemas flagged for drop are removed, updated
    /// connections are recorded as existing, and the final state replaces
    /// the stored state.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when serialization or the write fails.
    pub fn commit_updates(&self, updates: &ConnectionUpdates) -> Result<(), SqliteStoreError> {
        let dropped: BTreeSet<ConnectionName> =
            updates.delete.iter().cloned().chain(updates.schemas_to_drop()).collect();
        self.with_transaction(|tx| {
            for name in &dropped {
                delete_foreign_schema(tx, name.as_str())?;
            }
            for name in updates.update.keys() {
                insert_foreign_schema(tx, name.as_str())?;
            }
            replace_connection_state(tx, &updates.final_connection_state)
        })
    }

    /// Reads connection state and foreign schema names in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the read fails or a row is corrupt.
    pub fn read_snapshot(&self) -> Result<SqliteSnapshotSession, SqliteStoreError> {
        let (rows, foreign_schemas) = {
            let mut guard = self.lock()?;
            let tx = guard.transaction().map_err(|err| db_error(&err))?;
            let rows = read_state_rows(&tx)?;
            let foreign_schemas = read_foreign_schemas(&tx)?;
            tx.commit().map_err(|err| db_error(&err))?;
            drop(guard);
            (rows, foreign_schemas)
        };
        let mut state = ConnectionStateMap::new();
        for row in rows {
            let entry = row.verify()?;
            state.insert(entry.name.clone(), entry);
        }
        Ok(SqliteSnapshotSession {
            state,
            foreign_schemas,
        })
    }

    /// Runs `write` inside a committed transaction.
    fn with_transaction<F>(&self, write: F) -> Result<(), SqliteStoreError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<(), SqliteStoreError>,
    {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| db_error(&err))?;
        write(&tx)?;
        tx.commit().map_err(|err| db_error(&err))?;
        drop(guard);
        Ok(())
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    type Session = SqliteSnapshotSession;

    async fn acquire(&self) -> Result<Self::Session, StoreError> {
        let store = self.clone();
        let session = tokio::task::spawn_blocking(move || store.read_snapshot())
            .await
            .map_err(|err| StoreError::Store(format!("snapshot read task failed: {err}")))?;
        session.map_err(StoreError::from)
    }
}

// ============================================================================
// SECTION: Session
// ============================================================================

/// Snapshot read from the `SQLite` store at acquisition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqliteSnapshotSession {
    /// Verified connection state.
    state: ConnectionStateMap,
    /// Physical schema names.
    foreign_schemas: Vec<String>,
}

#[async_trait]
impl SnapshotSession for SqliteSnapshotSession {
    async fn load_connection_state(&mut self) -> Result<ConnectionStateMap, StoreError> {
        Ok(self.state.clone())
    }

    async fn load_foreign_schema_names(&mut self) -> Result<Vec<String>, StoreError> {
        Ok(self.foreign_schemas.clone())
    }
}

// ============================================================================
// SECTION: Rows
// ============================================================================

/// Raw `connection_state` row awaiting integrity verification.
struct StateRow {
    /// Row key.
    name: String,
    /// Canonical JSON payload.
    bytes: Vec<u8>,
    /// Stored digest.
    hash: String,
    /// Stored digest algorithm label.
    algorithm: String,
}

impl StateRow {
    /// Verifies the digest and decodes the payload.
    fn verify(self) -> Result<ConnectionState, SqliteStoreError> {
        if self.bytes.len() > MAX_STATE_BYTES {
            return Err(SqliteStoreError::TooLarge {
                max_bytes: MAX_STATE_BYTES,
                actual_bytes: self.bytes.len(),
            });
        }
        let algorithm = HashAlgorithm::from_label(&self.algorithm).ok_or_else(|| {
            SqliteStoreError::Invalid(format!("unsupported hash algorithm: {}", self.algorithm))
        })?;
        if hash_bytes(algorithm, &self.bytes).value != self.hash {
            return Err(SqliteStoreError::Corrupt(format!(
                "hash mismatch for connection {}",
                self.name
            )));
        }
        let state: ConnectionState = serde_json::from_slice(&self.bytes)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        if state.name.as_str() != self.name {
            return Err(SqliteStoreError::Invalid(format!(
                "connection name mismatch between key {} and payload {}",
                self.name, state.name
            )));
        }
        Ok(state)
    }
}

/// Reads every `connection_state` row.
fn read_state_rows(tx: &Transaction<'_>) -> Result<Vec<StateRow>, SqliteStoreError> {
    let mut statement = tx
        .prepare(
            "SELECT name, state_json, state_hash, hash_algorithm FROM connection_state ORDER BY \
             name",
        )
        .map_err(|err| db_error(&err))?;
    let rows = statement
        .query_map(params![], |row| {
            Ok(StateRow {
                name: row.get(0)?,
                bytes: row.get(1)?,
                hash: row.get(2)?,
                algorithm: row.get(3)?,
            })
        })
        .map_err(|err| db_error(&err))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(|err| db_error(&err))
}

/// Reads every foreign schema name.
fn read_foreign_schemas(tx: &Transaction<'_>) -> Result<Vec<String>, SqliteStoreError> {
    let mut statement =
        tx.prepare("SELECT name FROM foreign_schemas ORDER BY name").map_err(|err| db_error(&err))?;
    let rows = statement.query_map(params![], |row| row.get(0)).map_err(|err| db_error(&err))?;
    rows.collect::<Result<Vec<String>, _>>().map_err(|err| db_error(&err))
}

/// Replaces all `connection_state` rows.
fn replace_connection_state(
    tx: &Transaction<'_>,
    state: &ConnectionStateMap,
) -> Result<(), SqliteStoreError> {
    let saved_at = Timestamp::now().as_unix_millis();
    tx.execute("DELETE FROM connection_state", params![]).map_err(|err| db_error(&err))?;
    for (name, entry) in state {
        if entry.name != *name {
            return Err(SqliteStoreError::Invalid(format!(
                "connection name mismatch between key {name} and payload {}",
                entry.name
            )));
        }
        let canonical_json =
            canonical_json_bytes(entry).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        if canonical_json.len() > MAX_STATE_BYTES {
            return Err(SqliteStoreError::TooLarge {
                max_bytes: MAX_STATE_BYTES,
                actual_bytes: canonical_json.len(),
            });
        }
        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, &canonical_json);
        tx.execute(
            "INSERT INTO connection_state (name, state_json, state_hash, hash_algorithm, \
             saved_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![name.as_str(), canonical_json, digest.value, digest.algorithm.as_str(), saved_at],
        )
        .map_err(|err| db_error(&err))?;
    }
    Ok(())
}

/// Inserts a foreign schema name if absent.
fn insert_foreign_schema(tx: &Transaction<'_>, name: &str) -> Result<(), SqliteStoreError> {
    tx.execute(
        "INSERT INTO foreign_schemas (name, recorded_at) VALUES (?1, ?2) ON CONFLICT(name) DO \
         NOTHING",
        params![name, Timestamp::now().as_unix_millis()],
    )
    .map_err(|err| db_error(&err))?;
    Ok(())
}

/// Removes a foreign schema name.
fn delete_foreign_schema(tx: &Transaction<'_>, name: &str) -> Result<(), SqliteStoreError> {
    tx.execute("DELETE FROM foreign_schemas WHERE name = ?1", params![name])
        .map_err(|err| db_error(&err))?;
    Ok(())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    if path.components().any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH) {
        return Err(SqliteStoreError::Invalid("store path contains an overlong component".to_string()));
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid("store path must be a file, not a directory".to_string()));
    }
    Ok(())
}

/// Opens an `SQLite` connection and applies pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(|err| db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| db_error(&err))?;
    Ok(connection)
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| db_error(&err))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| db_error(&err))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| db_error(&err))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| db_error(&err))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS connection_state (
                    name TEXT PRIMARY KEY,
                    state_json BLOB NOT NULL,
                    state_hash TEXT NOT NULL,
                    hash_algorithm TEXT NOT NULL,
                    saved_at INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS foreign_schemas (
                    name TEXT PRIMARY KEY,
                    recorded_at INTEGER NOT NULL
                );",
            )
            .map_err(|err| db_error(&err))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| db_error(&err))?;
    Ok(())
}
