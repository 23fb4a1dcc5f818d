// crates/fedsync-core/src/runtime/prober.rs
// ============================================================================
// Module: Dynamic-Schema Prober
// Description: Fresh schema fingerprints for dynamic-schema connections.
// Purpose: Detect schema drift that configuration equality cannot see.
// Dependencies: crate::{core, runtime::loader}, tokio-util
// ============================================================================

//! ## Overview
//! A connection whose plugin reports a dynamic schema (or never reported a
//! mode) may change shape without any configuration change. The prober loads
//! the plugins for such connections and fingerprints the schema each one
//! reports now. The plugins it loads are reused by the later load stage.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;

use crate::core::Connection;
use crate::core::ConnectionIndex;
use crate::core::ConnectionName;
use crate::core::ConnectionStateMap;
use crate::core::LoadFailure;
use crate::core::PluginMap;
use crate::core::schema::is_dynamic_or_unset;
use crate::core::schema_hash;
use crate::runtime::loader::PluginLoader;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Result of probing dynamic-schema connections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// Fresh schema fingerprints keyed by connection.
    pub hashes: BTreeMap<ConnectionName, String>,
    /// Plugins loaded while probing.
    pub plugins: PluginMap,
    /// Connections whose plugin could not be loaded.
    pub failures: BTreeMap<ConnectionName, LoadFailure>,
    /// Reason the supervisor became unavailable, if it did.
    pub fatal: Option<String>,
}

// ============================================================================
// SECTION: Prober
// ============================================================================

/// Probes dynamic-schema connections through a [`PluginLoader`].
pub struct DynamicSchemaProber<'a> {
    /// Loader used to launch plugins.
    loader: &'a PluginLoader,
}

impl<'a> DynamicSchemaProber<'a> {
    /// Creates a prober over `loader`.
    #[must_use]
    pub const fn new(loader: &'a PluginLoader) -> Self {
        Self {
            loader,
        }
    }

    /// Selects the connections to probe: required standalone connections
    /// already present in `current` whose recorded mode is dynamic or unset.
    #[must_use]
    pub fn select(required: &ConnectionStateMap, current: &ConnectionStateMap) -> Vec<ConnectionName> {
        required
            .iter()
            .filter(|(_, state)| !state.is_aggregator())
            .filter(|(name, _)| {
                current.get(*name).is_some_and(|recorded| is_dynamic_or_unset(recorded.schema_mode))
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Loads plugins for the selected connections and fingerprints the
    /// schemas they report.
    pub async fn probe(
        &self,
        required: &ConnectionStateMap,
        current: &ConnectionStateMap,
        index: &ConnectionIndex,
        cancel: &CancellationToken,
    ) -> ProbeOutcome {
        let connections: Vec<Connection> = Self::select(required, current)
            .iter()
            .filter_map(|name| index.get(name.as_str()).cloned())
            .collect();
        if connections.is_empty() {
            return ProbeOutcome::default();
        }

        let loaded = self.loader.load(&connections, &PluginMap::new(), cancel).await;
        let hashes = loaded
            .plugins
            .iter()
            .filter(|(name, _)| !loaded.failures.contains_key(*name))
            .filter_map(|(name, plugin)| {
                plugin.schema_for(name.as_str()).map(|schema| (name.clone(), schema_hash(schema)))
            })
            .collect();
        ProbeOutcome {
            hashes,
            plugins: loaded.plugins,
            failures: loaded.failures,
            fatal: loaded.fatal,
        }
    }
}
