// crates/fedsync-core/src/lib.rs
// ============================================================================
// Module: Fedsync Core Library
// Description: Public API surface for the connection reconciliation engine.
// Purpose: Expose core types, collaborator interfaces, and the reconciler.
// Dependencies: crate::{audit, core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Fedsync decides, for a federated query engine, which connection schemas
//! must be created, refreshed, or dropped so the backing store matches the
//! configured connections. It performs no I/O itself: the snapshot store,
//! plugin supervisor, and plugin catalog are supplied through
//! [`interfaces`], and the result is a [`ConnectionUpdates`] plan for an
//! applier to execute.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::ReconcileAuditEvent;
pub use audit::ReconcileAuditSink;
pub use audit::StderrAuditSink;
pub use interfaces::CatalogError;
pub use interfaces::LaunchError;
pub use interfaces::PluginCatalog;
pub use interfaces::PluginSupervisor;
pub use interfaces::SnapshotSession;
pub use interfaces::SnapshotStore;
pub use interfaces::StoreError;
pub use runtime::InMemorySnapshotStore;
pub use runtime::InstalledPlugins;
pub use runtime::PluginLoader;
pub use runtime::ReconcileContext;
pub use runtime::ReconcileError;
pub use runtime::ReconcileOutcome;
pub use runtime::ReconcilePhase;
pub use runtime::ReconcileRequest;
pub use runtime::Reconciler;
pub use runtime::ReconcilerConfig;
pub use runtime::ValidationPolicy;
