// crates/fedsync-core/src/core/updates.rs
// ============================================================================
// Module: Fedsync Connection Updates
// Description: Reconciliation plan, per-connection failures, and summaries.
// Purpose: Carry the outcome of one reconciliation run to the applier.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`ConnectionUpdates`] is produced fresh by every reconciliation run. It
//! lists the connections to create or update, the schemas to delete, the
//! connections blocked on missing plugins, and the complete final state to
//! persist once the plan is applied. Partial failures are data here, never
//! errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::core::connection::Connection;
use crate::core::identifiers::ConnectionName;
use crate::core::identifiers::PluginId;
use crate::core::plugin::PluginMap;
use crate::core::state::ConnectionStateMap;

// ============================================================================
// SECTION: Load Failures
// ============================================================================

/// Why a plugin could not be loaded for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadFailureKind {
    /// The plugin process failed to start or handshake.
    Launch,
    /// The supervisor could not launch any plugin.
    SupervisorUnavailable,
    /// The run was cancelled before the launch started.
    Cancelled,
    /// The launch task terminated abnormally.
    TaskFailed,
}

impl LoadFailureKind {
    /// Returns a stable label for the failure kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Launch => "launch",
            Self::SupervisorUnavailable => "supervisor_unavailable",
            Self::Cancelled => "cancelled",
            Self::TaskFailed => "task_failed",
        }
    }
}

/// Plugin load failure recorded against one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadFailure {
    /// Failure classification.
    pub kind: LoadFailureKind,
    /// Human-readable reason.
    pub reason: String,
}

impl LoadFailure {
    /// Creates a new load failure.
    #[must_use]
    pub fn new(kind: LoadFailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.reason, self.kind.as_str())
    }
}

// ============================================================================
// SECTION: Validation Failures
// ============================================================================

/// Why a loaded plugin was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationFailureKind {
    /// Plugin protocol is newer than this engine supports.
    ProtocolIncompatible,
    /// Connection name collides with a reserved name.
    ReservedName,
    /// Aggregator's representative child did not validate.
    AggregatorChildInvalid,
}

/// Validation failure for one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFailure {
    /// Connection that failed validation.
    pub connection_name: ConnectionName,
    /// Plugin serving the connection.
    pub plugin: PluginId,
    /// Failure classification.
    pub kind: ValidationFailureKind,
    /// Human-readable message.
    pub message: String,
    /// Whether an existing physical schema for the connection must be dropped.
    pub should_drop_if_exists: bool,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Connection: {}\nPlugin:     {}\nError:      {}",
            self.connection_name, self.plugin, self.message
        )
    }
}

/// Builds the operator-facing summary for a batch of validation failures.
///
/// Returns an empty string when there are no failures.
#[must_use]
pub fn validation_warning(failures: &[ValidationFailure]) -> String {
    if failures.is_empty() {
        return String::new();
    }
    let count = failures.len();
    let blocks: Vec<String> = failures.iter().map(ToString::to_string).collect();
    format!(
        "{count} connection validation {}\n\n{}\n\n{count} {} not imported.",
        pluralize("error", count),
        blocks.join("\n\n"),
        pluralize("connection", count)
    )
}

/// Appends `s` to `word` unless `count` is one.
fn pluralize(word: &str, count: usize) -> String {
    if count == 1 { word.to_string() } else { format!("{word}s") }
}

// ============================================================================
// SECTION: Connection Updates
// ============================================================================

/// Reconciliation plan produced by one run.
///
/// # Invariants
/// - A name never appears in both `update` and `delete`.
/// - `final_connection_state` is a superset of `update`.
/// - `connection_plugins` holds every plugin instantiated during the run,
///   including those for connections that later failed validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionUpdates {
    /// Connections to create or update, with their required state.
    pub update: ConnectionStateMap,
    /// Schemas to delete.
    pub delete: BTreeSet<ConnectionName>,
    /// Connections whose plugin is not installed, keyed by plugin.
    pub missing_plugins: BTreeMap<PluginId, Vec<Connection>>,
    /// Complete state to persist after the plan is applied.
    pub final_connection_state: ConnectionStateMap,
    /// Every plugin instantiated during the run, keyed by connection.
    pub connection_plugins: PluginMap,
    /// Snapshot the run started from.
    pub current_connection_state: ConnectionStateMap,
    /// Plugin load failures keyed by connection.
    pub load_failures: BTreeMap<ConnectionName, LoadFailure>,
    /// Validation failures in connection order.
    pub validation_failures: Vec<ValidationFailure>,
}

impl ConnectionUpdates {
    /// Returns true when the plan creates, updates, or deletes anything.
    #[must_use]
    pub fn has_updates(&self) -> bool {
        !self.update.is_empty() || !self.delete.is_empty()
    }

    /// Returns true when any plugin load failed because the supervisor was
    /// unavailable. Such a plan is incomplete.
    #[must_use]
    pub fn supervisor_unavailable(&self) -> bool {
        self.load_failures
            .values()
            .any(|failure| failure.kind == LoadFailureKind::SupervisorUnavailable)
    }

    /// Marks a connection as failed and removes it from the update set.
    ///
    /// Names absent from the final state are ignored.
    pub fn set_error(&mut self, name: &ConnectionName, reason: impl Into<String>) {
        let Some(state) = self.final_connection_state.get_mut(name) else {
            return;
        };
        state.set_error(reason);
        self.update.remove(name);
    }

    /// Returns connections whose existing schema must be dropped because the
    /// plugin now serving them failed validation.
    #[must_use]
    pub fn schemas_to_drop(&self) -> BTreeSet<ConnectionName> {
        self.validation_failures
            .iter()
            .filter(|failure| failure.should_drop_if_exists)
            .filter(|failure| self.current_connection_state.contains_key(&failure.connection_name))
            .map(|failure| failure.connection_name.clone())
            .collect()
    }

    /// Returns the operator-facing validation summary.
    #[must_use]
    pub fn validation_warning(&self) -> String {
        validation_warning(&self.validation_failures)
    }
}

impl fmt::Display for ConnectionUpdates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.update.is_empty() {
            writeln!(f, "Update: {}", join_names(self.update.keys()))?;
        }
        if !self.delete.is_empty() {
            writeln!(f, "Delete: {}", join_names(self.delete.iter()))?;
        }
        if self.final_connection_state.is_empty() {
            writeln!(f, "Connection state EMPTY")
        } else {
            writeln!(f, "Connection state: {}", join_names(self.final_connection_state.keys()))
        }
    }
}

/// Joins connection names with commas.
fn join_names<'a>(names: impl Iterator<Item = &'a ConnectionName>) -> String {
    names.map(ConnectionName::as_str).collect::<Vec<_>>().join(",")
}
