// crates/fedsync-core/src/runtime/reconciler.rs
// ============================================================================
// Module: Reconciliation Orchestrator
// Description: Runs one reconciliation from snapshot to connection updates.
// Purpose: Sequence the build, probe, diff, load, validate, and merge stages.
// Dependencies: crate::{audit, core, interfaces, runtime}, thiserror, tokio-util
// ============================================================================

//! ## Overview
//! [`Reconciler::reconcile`] reads the current snapshot, derives the required
//! state, and produces a [`ConnectionUpdates`] plan. It moves through
//! [`ReconcilePhase`] in order and records one audit event per transition.
//!
//! Only the first three phases can fail the run: an unreadable snapshot, an
//! unreadable plugin catalog, or a corrupt connection set. Everything after
//! that is per-connection: plugin load and validation failures mark the
//! affected connection's final state as errored, drop it from the update set,
//! and surface as warnings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::audit::NoopAuditSink;
use crate::audit::ReconcileAuditEvent;
use crate::audit::ReconcileAuditSink;
use crate::core::Connection;
use crate::core::ConnectionIndexError;
use crate::core::ConnectionName;
use crate::core::ConnectionSet;
use crate::core::ConnectionStateMap;
use crate::core::ConnectionUpdates;
use crate::core::LoadFailure;
use crate::core::Timestamp;
use crate::core::schema_hash;
use crate::interfaces::CatalogError;
use crate::interfaces::PluginCatalog;
use crate::interfaces::PluginSupervisor;
use crate::interfaces::SnapshotSession;
use crate::interfaces::SnapshotStore;
use crate::interfaces::StoreError;
use crate::runtime::diff::DiffInput;
use crate::runtime::diff::diff_connection_state;
use crate::runtime::loader::DEFAULT_MAX_CONCURRENT_PLUGIN_LOADS;
use crate::runtime::loader::PluginLoader;
use crate::runtime::prober::DynamicSchemaProber;
use crate::runtime::required::build_required_state;
use crate::runtime::validator::ValidationPolicy;
use crate::runtime::validator::validate_plugins;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Fatal reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Snapshot store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Plugin catalog failure.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// Connection set is structurally corrupt.
    #[error("invalid connection configuration: {0}")]
    InvalidConfig(#[from] ConnectionIndexError),
    /// Run was cancelled before the snapshot was read.
    #[error("reconciliation cancelled")]
    Cancelled,
}

// ============================================================================
// SECTION: Phases
// ============================================================================

/// Reconciliation phases in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReconcilePhase {
    /// Run accepted; nothing read yet.
    Initializing,
    /// Current snapshot read.
    StateLoaded,
    /// Required state derived.
    RequiredStateBuilt,
    /// Dynamic-schema connections probed.
    DynamicProbed,
    /// Update and delete sets classified.
    Diffed,
    /// Plugins loaded for updated connections.
    PluginsLoaded,
    /// Plugins validated.
    Validated,
    /// Final state merged.
    Finalized,
    /// Run aborted with a fatal error.
    Failed,
}

impl ReconcilePhase {
    /// Returns a stable label for the phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::StateLoaded => "state_loaded",
            Self::RequiredStateBuilt => "required_state_built",
            Self::DynamicProbed => "dynamic_probed",
            Self::Diffed => "diffed",
            Self::PluginsLoaded => "plugins_loaded",
            Self::Validated => "validated",
            Self::Finalized => "finalized",
            Self::Failed => "failed",
        }
    }

    /// Returns true for phases from which a fatal error may abort the run.
    #[must_use]
    pub const fn can_fail(self) -> bool {
        matches!(self, Self::Initializing | Self::StateLoaded | Self::RequiredStateBuilt)
    }
}

// ============================================================================
// SECTION: Requests and Outcomes
// ============================================================================

/// Reconciler settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Bound on concurrent plugin launches.
    pub max_concurrent_plugin_loads: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_plugin_loads: DEFAULT_MAX_CONCURRENT_PLUGIN_LOADS,
        }
    }
}

/// Configuration snapshot a run reconciles against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileContext {
    /// Desired connections.
    pub connections: ConnectionSet,
    /// Validation settings.
    pub validation: ValidationPolicy,
}

/// Per-run request parameters.
#[derive(Debug, Clone, Default)]
pub struct ReconcileRequest {
    /// Connections to refresh regardless of state.
    pub force_names: BTreeSet<ConnectionName>,
    /// Modification time stamped on new and updated connections.
    pub now: Timestamp,
    /// Cancellation signal for the run.
    pub cancel: CancellationToken,
}

/// Result of a completed run.
///
/// A supervisor that becomes unavailable does not fail the run. The affected
/// connections carry [`crate::core::LoadFailureKind::SupervisorUnavailable`]
/// failures and a warning is added, so a plan may be short only because no
/// plugin could start. Callers check
/// [`ConnectionUpdates::supervisor_unavailable`] before applying it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Reconciliation plan.
    pub updates: ConnectionUpdates,
    /// Operator-facing warnings for partial failures.
    pub warnings: Vec<String>,
}

// ============================================================================
// SECTION: Reconciler
// ============================================================================

/// Reconciliation orchestrator.
pub struct Reconciler<S> {
    /// Snapshot store.
    store: S,
    /// Plugin catalog.
    catalog: Arc<dyn PluginCatalog>,
    /// Plugin loader shared by the probe and load stages.
    loader: PluginLoader,
    /// Audit sink.
    audit: Arc<dyn ReconcileAuditSink>,
}

impl<S: SnapshotStore> Reconciler<S> {
    /// Creates a reconciler with a no-op audit sink.
    #[must_use]
    pub fn new(
        store: S,
        supervisor: Arc<dyn PluginSupervisor>,
        catalog: Arc<dyn PluginCatalog>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            loader: PluginLoader::new(supervisor, config.max_concurrent_plugin_loads),
            audit: Arc::new(NoopAuditSink),
        }
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit_sink(mut self, audit: Arc<dyn ReconcileAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Returns the snapshot store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Runs one reconciliation.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] when the snapshot or plugin catalog cannot
    /// be read, when the connection set is corrupt, or when the run is
    /// cancelled before the snapshot is read.
    pub async fn reconcile(
        &self,
        context: &ReconcileContext,
        request: ReconcileRequest,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let ReconcileRequest {
            force_names,
            now,
            cancel,
        } = request;

        self.enter(ReconcilePhase::Initializing, None);
        let (current, foreign_schema_names) =
            self.load_snapshot(&cancel).await.map_err(|err| self.fail(err))?;

        self.enter(ReconcilePhase::StateLoaded, Some(format!("{} connections recorded", current.len())));
        let required =
            build_required_state(&context.connections, &current, self.catalog.as_ref(), now)
                .map_err(|err| self.fail(err))?;

        self.enter(
            ReconcilePhase::RequiredStateBuilt,
            Some(format!("{} connections required", required.state.len())),
        );
        let probe = DynamicSchemaProber::new(&self.loader)
            .probe(&required.state, &current, &required.index, &cancel)
            .await;

        self.enter(ReconcilePhase::DynamicProbed, Some(format!("{} schemas probed", probe.hashes.len())));
        let diff = diff_connection_state(&DiffInput {
            required: &required.state,
            current: &current,
            force_names: &force_names,
            dynamic_hashes: &probe.hashes,
            foreign_schema_names: &foreign_schema_names,
            now,
        });
        for (name, reason) in &diff.reasons {
            let outcome = if diff.delete.contains(name) { "delete" } else { "update" };
            self.audit.record(&ReconcileAuditEvent::decision(
                ReconcilePhase::Diffed.as_str(),
                name,
                outcome,
                reason.as_str(),
            ));
        }

        let mut final_connection_state = required.state;
        for (name, entry) in &diff.update {
            final_connection_state.insert(name.clone(), entry.clone());
        }
        let mut updates = ConnectionUpdates {
            update: diff.update,
            delete: diff.delete,
            missing_plugins: required.missing_plugins,
            final_connection_state,
            current_connection_state: current,
            ..ConnectionUpdates::default()
        };
        self.enter(
            ReconcilePhase::Diffed,
            Some(format!("{} to update, {} to delete", updates.update.len(), updates.delete.len())),
        );

        let to_load: Vec<Connection> = updates
            .update
            .keys()
            .filter_map(|name| required.index.get(name.as_str()).cloned())
            .collect();
        let loaded = self.loader.load(&to_load, &probe.plugins, &cancel).await;
        let mut load_failures: BTreeMap<ConnectionName, LoadFailure> = probe.failures;
        // An earlier launch failure is superseded when the load stage served the connection.
        load_failures.retain(|name, _| {
            !loaded.plugins.get(name).is_some_and(|plugin| plugin.includes_connection(name.as_str()))
        });
        load_failures.extend(loaded.failures);
        for (name, failure) in &load_failures {
            self.audit.record(&ReconcileAuditEvent::failure(
                ReconcilePhase::PluginsLoaded.as_str(),
                name,
                failure.kind.as_str(),
                failure.reason.clone(),
            ));
            updates.set_error(name, failure.to_string());
        }
        updates.load_failures = load_failures;
        updates.connection_plugins = loaded.plugins;
        let supervisor_fatal = probe.fatal.or(loaded.fatal);
        self.enter(
            ReconcilePhase::PluginsLoaded,
            Some(format!("{} plugins loaded", updates.connection_plugins.len())),
        );

        let validation = validate_plugins(
            &updates.update,
            &updates.connection_plugins,
            &required.index,
            &context.validation,
        );
        for failure in &validation.failures {
            self.audit.record(&ReconcileAuditEvent::failure(
                ReconcilePhase::Validated.as_str(),
                &failure.connection_name,
                "validation_failed",
                failure.message.clone(),
            ));
            updates.set_error(&failure.connection_name, failure.message.clone());
        }
        let unvalidated: Vec<ConnectionName> = updates
            .update
            .keys()
            .filter(|name| !validation.validated_updates.contains_key(*name))
            .cloned()
            .collect();
        for name in unvalidated {
            updates.set_error(&name, "no validated plugin serves this connection");
        }
        updates.validation_failures = validation.failures;
        self.enter(
            ReconcilePhase::Validated,
            Some(format!("{} validation failures", updates.validation_failures.len())),
        );

        finalize(&mut updates, &probe.hashes);
        let warnings = build_warnings(&updates, supervisor_fatal.as_deref());
        self.enter(ReconcilePhase::Finalized, Some(format!("{} warnings", warnings.len())));

        Ok(ReconcileOutcome {
            updates,
            warnings,
        })
    }

    /// Reads the current state and foreign schema names in one session.
    async fn load_snapshot(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(ConnectionStateMap, Vec<String>), ReconcileError> {
        let mut session = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ReconcileError::Cancelled),
            session = self.store.acquire() => session?,
        };
        let current = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ReconcileError::Cancelled),
            current = session.load_connection_state() => current?,
        };
        let foreign = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ReconcileError::Cancelled),
            foreign = session.load_foreign_schema_names() => foreign?,
        };
        drop(session);
        Ok((current, foreign))
    }

    /// Records a phase transition.
    fn enter(&self, phase: ReconcilePhase, detail: Option<String>) {
        self.audit.record(&ReconcileAuditEvent::phase(phase.as_str(), detail));
    }

    /// Records the failed phase and passes the error through.
    fn fail(&self, err: ReconcileError) -> ReconcileError {
        self.enter(ReconcilePhase::Failed, Some(err.to_string()));
        err
    }
}

// ============================================================================
// SECTION: Finalize
// ============================================================================

/// Merges schema fingerprints and modes into the final state.
///
/// Recorded values are carried first, probed fingerprints override them, and
/// plugins loaded during the run supply the reported mode plus a fresh
/// fingerprint for updated or never-fingerprinted connections.
///
/// The fresh fingerprint is taken for static plugins too: a new static
/// connection has no recorded hash, and its final state must carry the hash
/// of the schema it is imported with.
fn finalize(updates: &mut ConnectionUpdates, dynamic_hashes: &BTreeMap<ConnectionName, String>) {
    for (name, state) in &mut updates.final_connection_state {
        if let Some(recorded) = updates.current_connection_state.get(name) {
            state.schema_hash.clone_from(&recorded.schema_hash);
            state.schema_mode = recorded.schema_mode;
        }
        if let Some(fresh) = dynamic_hashes.get(name) {
            state.schema_hash.clone_from(fresh);
        }
        if let Some(schema) =
            updates.connection_plugins.get(name).and_then(|plugin| plugin.schema_for(name.as_str()))
        {
            state.schema_mode = schema.mode;
            if state.schema_hash.is_empty() || updates.update.contains_key(name) {
                state.schema_hash = schema_hash(schema);
            }
        }
        if let Some(entry) = updates.update.get_mut(name) {
            entry.clone_from(state);
        }
    }
}

/// Renders operator-facing warnings for a finished run.
fn build_warnings(updates: &ConnectionUpdates, supervisor_fatal: Option<&str>) -> Vec<String> {
    let mut warnings = Vec::new();
    if let Some(reason) = supervisor_fatal {
        warnings.push(format!("plugin supervisor unavailable: {reason}"));
    }
    for (name, failure) in &updates.load_failures {
        warnings.push(format!("connection {name}: plugin load failed: {failure}"));
    }
    for (plugin, connections) in &updates.missing_plugins {
        let names: Vec<&str> = connections.iter().map(|connection| connection.name.as_str()).collect();
        warnings.push(format!(
            "plugin {plugin} is not installed; connections not imported: {}",
            names.join(",")
        ));
    }
    let validation = updates.validation_warning();
    if !validation.is_empty() {
        warnings.push(validation);
    }
    warnings
}
