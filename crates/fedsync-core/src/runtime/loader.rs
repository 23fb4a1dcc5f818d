// crates/fedsync-core/src/runtime/loader.rs
// ============================================================================
// Module: Plugin Loader
// Description: Concurrent, bounded plugin launches for a batch of connections.
// Purpose: Obtain plugin descriptors while isolating per-connection failures.
// Dependencies: crate::{core, interfaces}, tokio, tokio-util
// ============================================================================

//! ## Overview
//! [`PluginLoader::load`] turns a list of connections into the plugins that
//! serve them. Aggregators are represented by their first child, names are
//! deduplicated, and names already loaded earlier in the run are skipped.
//!
//! Launches run on a [`JoinSet`] and are bounded by a [`Semaphore`]. A failed
//! launch is recorded against its connection only. When the supervisor
//! reports itself unavailable the rest of the batch is cancelled and the
//! reason surfaces as [`LoadOutcome::fatal`]. Launches already in flight are
//! always awaited so every plugin handle obtained is returned.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::core::Connection;
use crate::core::ConnectionName;
use crate::core::ConnectionPlugin;
use crate::core::LoadFailure;
use crate::core::LoadFailureKind;
use crate::core::PluginMap;
use crate::interfaces::LaunchError;
use crate::interfaces::PluginSupervisor;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default bound on concurrent plugin launches.
pub const DEFAULT_MAX_CONCURRENT_PLUGIN_LOADS: usize = 8;

/// Upper bound accepted for concurrent plugin launches.
pub const MAX_CONCURRENT_PLUGIN_LOADS: usize = 64;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Result of one load batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Plugins obtained, merged with the already-loaded map.
    pub plugins: PluginMap,
    /// Per-connection failures.
    pub failures: BTreeMap<ConnectionName, LoadFailure>,
    /// Reason the supervisor became unavailable, if it did.
    pub fatal: Option<String>,
}

impl LoadOutcome {
    /// Folds one launch result into the outcome.
    fn record(
        &mut self,
        name: ConnectionName,
        result: Result<ConnectionPlugin, LaunchError>,
        batch: &CancellationToken,
    ) {
        match result {
            Ok(plugin) => {
                if !plugin.includes_connection(name.as_str()) {
                    self.failures.insert(
                        name.clone(),
                        LoadFailure::new(
                            LoadFailureKind::Launch,
                            format!("plugin {} reported no schema for connection {name}", plugin.plugin),
                        ),
                    );
                }
                self.plugins.insert(name, plugin);
            }
            Err(LaunchError::Failed(reason)) => {
                self.failures.insert(name, LoadFailure::new(LoadFailureKind::Launch, reason));
            }
            Err(LaunchError::Unavailable(reason)) => {
                batch.cancel();
                if self.fatal.is_none() {
                    self.fatal = Some(reason.clone());
                }
                self.failures
                    .insert(name, LoadFailure::new(LoadFailureKind::SupervisorUnavailable, reason));
            }
            Err(LaunchError::Cancelled) => {
                self.failures
                    .insert(name, LoadFailure::new(LoadFailureKind::Cancelled, "plugin load cancelled"));
            }
        }
    }
}

// ============================================================================
// SECTION: Loader
// ============================================================================

/// Launches plugins through a [`PluginSupervisor`] with bounded concurrency.
#[derive(Clone)]
pub struct PluginLoader {
    /// Supervisor used for launches.
    supervisor: Arc<dyn PluginSupervisor>,
    /// Maximum number of concurrent launches.
    max_concurrency: usize,
}

impl PluginLoader {
    /// Creates a loader. The concurrency bound is clamped to
    /// `1..=MAX_CONCURRENT_PLUGIN_LOADS`.
    #[must_use]
    pub fn new(supervisor: Arc<dyn PluginSupervisor>, max_concurrency: usize) -> Self {
        Self {
            supervisor,
            max_concurrency: max_concurrency.clamp(1, MAX_CONCURRENT_PLUGIN_LOADS),
        }
    }

    /// Returns the effective concurrency bound.
    #[must_use]
    pub const fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Resolves the launch targets for `connections`.
    ///
    /// Aggregators are replaced by their first child. Names already present in
    /// `already_loaded` are skipped.
    #[must_use]
    pub fn launch_targets(
        connections: &[Connection],
        already_loaded: &PluginMap,
    ) -> BTreeMap<ConnectionName, Connection> {
        let mut targets = BTreeMap::new();
        for connection in connections {
            let Some(target) = connection.representative() else {
                continue;
            };
            if already_loaded.contains_key(&target.name) {
                continue;
            }
            targets.entry(target.name.clone()).or_insert_with(|| target.clone());
        }
        targets
    }

    /// Loads plugins for `connections`.
    ///
    /// Never fails as a whole: every target ends up either in
    /// [`LoadOutcome::plugins`] or in [`LoadOutcome::failures`].
    pub async fn load(
        &self,
        connections: &[Connection],
        already_loaded: &PluginMap,
        cancel: &CancellationToken,
    ) -> LoadOutcome {
        let targets = Self::launch_targets(connections, already_loaded);
        let batch = cancel.child_token();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut pending: BTreeSet<ConnectionName> = targets.keys().cloned().collect();
        let mut tasks = JoinSet::new();

        for connection in targets.into_values() {
            let supervisor = Arc::clone(&self.supervisor);
            let semaphore = Arc::clone(&semaphore);
            let token = batch.clone();
            tasks.spawn(launch_one(supervisor, semaphore, connection, token));
        }

        let mut outcome = LoadOutcome::default();
        let mut task_errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, result)) => {
                    pending.remove(&name);
                    outcome.record(name, result, &batch);
                }
                Err(err) => task_errors.push(err.to_string()),
            }
        }

        // Tasks that panicked never reported their name.
        let reason = if task_errors.is_empty() {
            "plugin load task terminated".to_string()
        } else {
            format!("plugin load task terminated: {}", task_errors.join("; "))
        };
        for name in pending {
            outcome.failures.insert(name, LoadFailure::new(LoadFailureKind::TaskFailed, reason.clone()));
        }

        for (name, plugin) in already_loaded {
            outcome.plugins.entry(name.clone()).or_insert_with(|| plugin.clone());
        }
        outcome
    }
}

/// Launches one connection once a permit is available.
async fn launch_one(
    supervisor: Arc<dyn PluginSupervisor>,
    semaphore: Arc<Semaphore>,
    connection: Connection,
    cancel: CancellationToken,
) -> (ConnectionName, Result<ConnectionPlugin, LaunchError>) {
    let name = connection.name.clone();
    let permit = tokio::select! {
        biased;
        () = cancel.cancelled() => return (name, Err(LaunchError::Cancelled)),
        permit = semaphore.acquire_owned() => permit,
    };
    let Ok(_permit) = permit else {
        return (name, Err(LaunchError::Cancelled));
    };
    if cancel.is_cancelled() {
        return (name, Err(LaunchError::Cancelled));
    }
    let result = supervisor.launch(&connection, &cancel).await;
    (name, result)
}
