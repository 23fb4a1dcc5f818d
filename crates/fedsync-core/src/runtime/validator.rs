// crates/fedsync-core/src/runtime/validator.rs
// ============================================================================
// Module: Plugin Validator
// Description: Protocol and naming checks for loaded plugins.
// Purpose: Reject plugins and connections that must not be imported.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Every loaded plugin is checked in order: protocol compatibility first,
//! then the reserved-name rule. The first failing check decides the
//! connection's failure. Aggregators carry no plugin of their own and are
//! valid exactly when their first child's plugin validated.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use crate::core::ConnectionIndex;
use crate::core::ConnectionName;
use crate::core::ConnectionPlugin;
use crate::core::ConnectionStateMap;
use crate::core::DEFAULT_RESERVED_CONNECTION_NAMES;
use crate::core::PluginMap;
use crate::core::SUPPORTED_PROTOCOL_VERSION;
use crate::core::Schema;
use crate::core::ValidationFailure;
use crate::core::ValidationFailureKind;

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Validation settings applied to one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Highest plugin protocol version accepted.
    pub supported_protocol_version: u32,
    /// Connection names owned by the backing store.
    pub reserved_names: BTreeSet<String>,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            supported_protocol_version: SUPPORTED_PROTOCOL_VERSION,
            reserved_names: DEFAULT_RESERVED_CONNECTION_NAMES
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
        }
    }
}

impl ValidationPolicy {
    /// Returns true when `version` is acceptable. Zero means the plugin did
    /// not report a version and is always accepted.
    #[must_use]
    pub const fn protocol_compatible(&self, version: u32) -> bool {
        version == 0 || version <= self.supported_protocol_version
    }

    /// Returns true when `name` is reserved.
    #[must_use]
    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved_names.contains(name)
    }

    /// Renders the reserved names for messages.
    fn reserved_list(&self) -> String {
        self.reserved_names.iter().map(String::as_str).collect::<Vec<_>>().join(",")
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Output of [`validate_plugins`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOutcome {
    /// Failures in connection order; aggregators follow standalone failures.
    pub failures: Vec<ValidationFailure>,
    /// Update entries whose plugin validated.
    pub validated_updates: ConnectionStateMap,
    /// Plugins that passed every check.
    pub validated_plugins: PluginMap,
}

/// Validates loaded plugins and filters `updates` to the valid entries.
///
/// Plugins that reported no schema for their connection were already recorded
/// as load failures and are skipped.
#[must_use]
pub fn validate_plugins(
    updates: &ConnectionStateMap,
    plugins: &PluginMap,
    index: &ConnectionIndex,
    policy: &ValidationPolicy,
) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();

    for (name, plugin) in plugins {
        let Some(schema) = plugin.schema_for(name.as_str()) else {
            continue;
        };
        if let Some(failure) = check_plugin(name, plugin, schema, policy) {
            outcome.failures.push(failure);
            continue;
        }
        outcome.validated_plugins.insert(name.clone(), plugin.clone());
        if let Some(state) = updates.get(name) {
            outcome.validated_updates.insert(name.clone(), state.clone());
        }
    }

    for (name, state) in updates.iter().filter(|(_, state)| state.is_aggregator()) {
        let child = index
            .representative(name.as_str())
            .map(|child| child.name.clone())
            .or_else(|| state.children.first().cloned());
        let valid = child
            .as_ref()
            .is_some_and(|child| outcome.validated_plugins.contains_key(child));
        if valid {
            outcome.validated_updates.insert(name.clone(), state.clone());
            continue;
        }
        let message = child.map_or_else(
            || "aggregator has no child connections".to_string(),
            |child| format!("child connection {child} has no valid plugin"),
        );
        outcome.failures.push(ValidationFailure {
            connection_name: name.clone(),
            plugin: state.plugin.clone(),
            kind: ValidationFailureKind::AggregatorChildInvalid,
            message,
            should_drop_if_exists: false,
        });
    }

    outcome
}

/// Runs the per-plugin checks in order and returns the first failure.
fn check_plugin(
    name: &ConnectionName,
    plugin: &ConnectionPlugin,
    schema: &Schema,
    policy: &ValidationPolicy,
) -> Option<ValidationFailure> {
    if !policy.protocol_compatible(schema.protocol_version) {
        return Some(ValidationFailure {
            connection_name: name.clone(),
            plugin: plugin.plugin.clone(),
            kind: ValidationFailureKind::ProtocolIncompatible,
            message: format!(
                "plugin protocol version {} is newer than supported version {}; upgrade to use this plugin",
                schema.protocol_version, policy.supported_protocol_version
            ),
            should_drop_if_exists: true,
        });
    }
    if policy.is_reserved(name.as_str()) {
        return Some(ValidationFailure {
            connection_name: name.clone(),
            plugin: plugin.plugin.clone(),
            kind: ValidationFailureKind::ReservedName,
            message: format!("connection name cannot be one of {}", policy.reserved_list()),
            should_drop_if_exists: false,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::ValidationPolicy;

    #[test]
    fn protocol_zero_is_always_compatible() {
        let policy = ValidationPolicy {
            supported_protocol_version: 1,
            ..ValidationPolicy::default()
        };
        assert!(policy.protocol_compatible(0));
        assert!(policy.protocol_compatible(1));
        assert!(!policy.protocol_compatible(2));
    }

    #[test]
    fn default_policy_reserves_store_schemas() {
        let policy = ValidationPolicy::default();
        assert!(policy.is_reserved("public"));
        assert!(policy.is_reserved("internal"));
        assert!(!policy.is_reserved("aws"));
    }
}
