// crates/fedsync-core/src/runtime/mod.rs
// ============================================================================
// Module: Fedsync Runtime
// Description: Reconciliation stages and the orchestrator that runs them.
// Purpose: Turn configuration plus a snapshot into a connection update plan.
// Dependencies: crate::{audit, core, interfaces}, tokio, tokio-util
// ============================================================================

//! ## Overview
//! Each stage lives in its own module and can be driven on its own; the
//! [`Reconciler`] sequences them for a full run.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod diff;
pub mod loader;
pub mod memory;
pub mod prober;
pub mod reconciler;
pub mod required;
pub mod validator;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use diff::ConnectionDiff;
pub use diff::DiffInput;
pub use diff::DiffReason;
pub use diff::diff_connection_state;
pub use loader::DEFAULT_MAX_CONCURRENT_PLUGIN_LOADS;
pub use loader::LoadOutcome;
pub use loader::MAX_CONCURRENT_PLUGIN_LOADS;
pub use loader::PluginLoader;
pub use memory::InMemorySnapshotSession;
pub use memory::InMemorySnapshotStore;
pub use memory::InstalledPlugins;
pub use prober::DynamicSchemaProber;
pub use prober::ProbeOutcome;
pub use reconciler::ReconcileContext;
pub use reconciler::ReconcileError;
pub use reconciler::ReconcileOutcome;
pub use reconciler::ReconcilePhase;
pub use reconciler::ReconcileRequest;
pub use reconciler::Reconciler;
pub use reconciler::ReconcilerConfig;
pub use required::RequiredState;
pub use required::build_required_state;
pub use validator::ValidationOutcome;
pub use validator::ValidationPolicy;
pub use validator::validate_plugins;
