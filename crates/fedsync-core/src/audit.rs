// crates/fedsync-core/src/audit.rs
// ============================================================================
// Module: Reconciliation Audit Logging
// Description: Structured audit events for reconciliation runs.
// Purpose: Emit JSON-line logs of phases, decisions, and failures.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The reconciler records one event per phase transition, one per connection
//! decision, and one per connection failure. Sinks are intentionally thin so
//! hosts can route events to their own logging pipeline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::core::ConnectionName;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Reconciliation audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Reconciliation phase label.
    pub phase: &'static str,
    /// Connection the event concerns, when any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionName>,
    /// Decision or failure label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<&'static str>,
    /// Free-form detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ReconcileAuditEvent {
    /// Creates a phase-transition event.
    #[must_use]
    pub fn phase(phase: &'static str, detail: Option<String>) -> Self {
        Self::build("reconcile_phase", phase, None, None, detail)
    }

    /// Creates a per-connection decision event.
    #[must_use]
    pub fn decision(
        phase: &'static str,
        connection: &ConnectionName,
        outcome: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        Self::build(
            "connection_decision",
            phase,
            Some(connection.clone()),
            Some(outcome),
            Some(detail.into()),
        )
    }

    /// Creates a per-connection failure event.
    #[must_use]
    pub fn failure(
        phase: &'static str,
        connection: &ConnectionName,
        outcome: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        Self::build(
            "connection_failure",
            phase,
            Some(connection.clone()),
            Some(outcome),
            Some(detail.into()),
        )
    }

    /// Builds an event stamped with the current time.
    fn build(
        event: &'static str,
        phase: &'static str,
        connection: Option<ConnectionName>,
        outcome: Option<&'static str>,
        detail: Option<String>,
    ) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event,
            timestamp_ms,
            phase,
            connection,
            outcome,
            detail,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for reconciliation events.
pub trait ReconcileAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &ReconcileAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl ReconcileAuditSink for StderrAuditSink {
    fn record(&self, event: &ReconcileAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl ReconcileAuditSink for FileAuditSink {
    fn record(&self, event: &ReconcileAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl ReconcileAuditSink for NoopAuditSink {
    fn record(&self, _event: &ReconcileAuditEvent) {}
}
