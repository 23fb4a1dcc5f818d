// crates/fedsync-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared fixtures and a scripted plugin supervisor.
// Purpose: Provide deterministic collaborators for reconciliation tests.
// Dependencies: fedsync-core, tokio, tokio-util
// ============================================================================

//! ## Overview
//! [`ScriptedSupervisor`] answers launches from a per-connection script and
//! records how many launches overlapped. Unscripted connections get a static
//! schema with one table named after the connection.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use fedsync_core::ColumnDefinition;
use fedsync_core::ColumnType;
use fedsync_core::Connection;
use fedsync_core::ConnectionName;
use fedsync_core::ConnectionPlugin;
use fedsync_core::ConnectionSet;
use fedsync_core::ConnectionState;
use fedsync_core::LaunchError;
use fedsync_core::PluginSupervisor;
use fedsync_core::ReconcileAuditEvent;
use fedsync_core::ReconcileAuditSink;
use fedsync_core::Schema;
use fedsync_core::SchemaMode;
use fedsync_core::TableSchema;
use fedsync_core::Timestamp;
use tokio_util::sync::CancellationToken;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Fixed run time used across tests.
pub const NOW: Timestamp = Timestamp::from_unix_millis(1_700_000_000_000);

/// Earlier time used for recorded state.
pub const EARLIER: Timestamp = Timestamp::from_unix_millis(1_600_000_000_000);

/// Builds a schema with one table holding an `id` column.
pub fn schema_with_table(table: &str, mode: Option<SchemaMode>) -> Schema {
    Schema::new(mode, 0).with_table(
        table,
        TableSchema::new(vec![ColumnDefinition::new("id", ColumnType::String)]),
    )
}

/// Builds a connection set from connections.
pub fn connection_set(connections: impl IntoIterator<Item = Connection>) -> ConnectionSet {
    connections.into_iter().map(|connection| (connection.name.clone(), connection)).collect()
}

/// Builds recorded state for a connection.
pub fn recorded(connection: &Connection, hash: &str, mode: Option<SchemaMode>) -> ConnectionState {
    let mut state = ConnectionState::from_connection(connection, EARLIER);
    state.schema_hash = hash.to_string();
    state.schema_mode = mode;
    state
}

// ============================================================================
// SECTION: Scripted Supervisor
// ============================================================================

/// Scripted launch behavior for one connection.
#[derive(Debug, Clone)]
pub enum Script {
    /// Report this schema.
    Schema(Schema),
    /// Report a plugin that serves no schema for the connection.
    NoSchema,
    /// Fail this launch.
    Fail(String),
    /// Fail the first launch; later launches use the default schema.
    FailOnce(String),
    /// Report the supervisor as unavailable.
    Unavailable(String),
    /// Panic inside the launch.
    Panic,
    /// Wait for cancellation, then report it.
    WaitForCancel,
}

/// Plugin supervisor driven by per-connection scripts.
#[derive(Default)]
pub struct ScriptedSupervisor {
    /// Scripts keyed by connection.
    scripts: Mutex<BTreeMap<ConnectionName, Script>>,
    /// Launch order.
    launches: Mutex<Vec<ConnectionName>>,
    /// Launches currently running.
    in_flight: AtomicUsize,
    /// Highest overlap observed.
    peak: AtomicUsize,
    /// Time each launch holds its slot.
    delay: Duration,
}

impl ScriptedSupervisor {
    /// Creates a supervisor that answers immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a supervisor whose launches take `delay`.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Scripts the launch for `name`.
    pub fn script(self, name: &str, script: Script) -> Self {
        self.scripts.lock().unwrap().insert(name.into(), script);
        self
    }

    /// Wraps the supervisor for sharing.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Returns launched connection names in launch order.
    pub fn launches(&self) -> Vec<ConnectionName> {
        self.launches.lock().unwrap().clone()
    }

    /// Returns the highest number of overlapping launches.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginSupervisor for ScriptedSupervisor {
    async fn launch(
        &self,
        connection: &Connection,
        cancel: &CancellationToken,
    ) -> Result<ConnectionPlugin, LaunchError> {
        self.launches.lock().unwrap().push(connection.name.clone());
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let script = {
            let mut scripts = self.scripts.lock().unwrap();
            if matches!(scripts.get(&connection.name), Some(Script::FailOnce(_))) {
                scripts.remove(&connection.name)
            } else {
                scripts.get(&connection.name).cloned()
            }
        };
        let instance = format!("{}-{}", connection.plugin, connection.name);
        let plugin = ConnectionPlugin::new(instance, connection.plugin.clone());
        let result = match script {
            None => Ok(plugin.serving(
                connection.name.clone(),
                schema_with_table(connection.name.as_str(), Some(SchemaMode::Static)),
            )),
            Some(Script::Schema(schema)) => Ok(plugin.serving(connection.name.clone(), schema)),
            Some(Script::NoSchema) => Ok(plugin),
            Some(Script::Fail(reason) | Script::FailOnce(reason)) => Err(LaunchError::Failed(reason)),
            Some(Script::Unavailable(reason)) => Err(LaunchError::Unavailable(reason)),
            Some(Script::Panic) => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                panic!("scripted launch panic");
            }
            Some(Script::WaitForCancel) => {
                cancel.cancelled().await;
                Err(LaunchError::Cancelled)
            }
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ============================================================================
// SECTION: Recording Audit Sink
// ============================================================================

/// Audit sink that keeps events in memory.
#[derive(Default)]
pub struct RecordingAuditSink {
    /// Recorded events.
    events: Mutex<Vec<ReconcileAuditEvent>>,
}

impl RecordingAuditSink {
    /// Returns the phase labels recorded so far.
    pub fn phases(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.event == "reconcile_phase")
            .map(|event| event.phase)
            .collect()
    }

    /// Returns all recorded events.
    pub fn events(&self) -> Vec<ReconcileAuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ReconcileAuditSink for RecordingAuditSink {
    fn record(&self, event: &ReconcileAuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
