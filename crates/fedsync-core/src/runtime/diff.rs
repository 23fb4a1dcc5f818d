// crates/fedsync-core/src/runtime/diff.rs
// ============================================================================
// Module: Diff Engine
// Description: Classifies connections into update and delete sets.
// Purpose: Compare required state against the current snapshot.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The diff is a pure function of its inputs. A connection is updated when it
//! is forced, absent from the current snapshot, recorded as errored,
//! structurally different from its recorded state, or when its dynamic schema
//! fingerprint drifted. A name
//! is deleted when it is recorded but no longer required, or when a physical
//! schema exists that neither state knows about.
//!
//! Each classification carries a [`DiffReason`] for audit logging.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::core::ConnectionHealth;
use crate::core::ConnectionName;
use crate::core::ConnectionState;
use crate::core::ConnectionStateMap;
use crate::core::Timestamp;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Why a connection was classified for update or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffReason {
    /// Caller forced a refresh.
    Forced,
    /// Connection is not in the current snapshot.
    New,
    /// Recorded state is errored; the import is retried.
    Retry,
    /// Required state differs from the recorded state.
    Changed,
    /// Dynamic schema fingerprint no longer matches the recorded one.
    SchemaDrift,
    /// Recorded connection is no longer required.
    Removed,
    /// Physical schema is unknown to both states.
    Orphaned,
}

impl DiffReason {
    /// Returns a stable label for the reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Forced => "forced",
            Self::New => "new",
            Self::Retry => "retry_errored",
            Self::Changed => "changed",
            Self::SchemaDrift => "schema_drift",
            Self::Removed => "removed",
            Self::Orphaned => "orphaned",
        }
    }
}

/// Inputs to [`diff_connection_state`].
#[derive(Debug, Clone, Copy)]
pub struct DiffInput<'a> {
    /// Required connection state.
    pub required: &'a ConnectionStateMap,
    /// Current connection state.
    pub current: &'a ConnectionStateMap,
    /// Connections the caller wants refreshed regardless of state.
    pub force_names: &'a BTreeSet<ConnectionName>,
    /// Fresh fingerprints for probed dynamic-schema connections.
    pub dynamic_hashes: &'a BTreeMap<ConnectionName, String>,
    /// Physical schema names present in the backing store.
    pub foreign_schema_names: &'a [String],
    /// Modification time stamped on updated entries.
    pub now: Timestamp,
}

/// Output of [`diff_connection_state`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionDiff {
    /// Connections to create or update, stamped pending at `now`.
    pub update: ConnectionStateMap,
    /// Schemas to delete.
    pub delete: BTreeSet<ConnectionName>,
    /// Classification reason per name.
    pub reasons: BTreeMap<ConnectionName, DiffReason>,
}

// ============================================================================
// SECTION: Diff
// ============================================================================

/// Classifies connections into update and delete sets.
///
/// `update` and `delete` are always disjoint: updates come only from required
/// names and deletes only from names that are not required.
#[must_use]
pub fn diff_connection_state(input: &DiffInput<'_>) -> ConnectionDiff {
    let mut diff = ConnectionDiff::default();

    for (name, required) in input.required {
        let reason = if input.force_names.contains(name) {
            Some(DiffReason::Forced)
        } else {
            match input.current.get(name) {
                None => Some(DiffReason::New),
                Some(recorded) if recorded.health == ConnectionHealth::Error => {
                    Some(DiffReason::Retry)
                }
                Some(recorded) if recorded != required => Some(DiffReason::Changed),
                Some(_) => None,
            }
        };
        if let Some(reason) = reason {
            diff.mark_update(name, required, reason, input.now);
        }
    }

    for name in input.current.keys() {
        if !input.required.contains_key(name) {
            diff.delete.insert(name.clone());
            diff.reasons.insert(name.clone(), DiffReason::Removed);
        }
    }

    for schema in input.foreign_schema_names {
        let name = ConnectionName::new(schema.as_str());
        if input.required.contains_key(&name) || input.current.contains_key(&name) {
            continue;
        }
        diff.reasons.entry(name.clone()).or_insert(DiffReason::Orphaned);
        diff.delete.insert(name);
    }

    for (name, fresh) in input.dynamic_hashes {
        if diff.update.contains_key(name) {
            continue;
        }
        let (Some(recorded), Some(required)) = (input.current.get(name), input.required.get(name))
        else {
            continue;
        };
        if &recorded.schema_hash != fresh {
            diff.mark_update(name, required, DiffReason::SchemaDrift, input.now);
        }
    }

    diff
}

impl ConnectionDiff {
    /// Adds a stamped copy of `required` to the update set.
    fn mark_update(
        &mut self,
        name: &ConnectionName,
        required: &ConnectionState,
        reason: DiffReason,
        now: Timestamp,
    ) {
        let mut entry = required.clone();
        entry.mark_pending(now);
        self.update.insert(name.clone(), entry);
        self.reasons.insert(name.clone(), reason);
    }
}
