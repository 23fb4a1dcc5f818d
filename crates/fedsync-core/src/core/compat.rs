// crates/fedsync-core/src/core/compat.rs
// ============================================================================
// Module: Plugin Compatibility Defaults
// Description: Default protocol version and reserved connection names.
// Purpose: Centralize compatibility constants for config defaults and validation.
// Dependencies: none
// ============================================================================

//! Default compatibility constants. Runs receive the effective values through
//! [`crate::runtime::ValidationPolicy`]; these are only defaults.

/// Highest plugin protocol version this engine understands.
pub const SUPPORTED_PROTOCOL_VERSION: u32 = 20_220_201;

/// Schema names owned by the backing store itself.
pub const DEFAULT_RESERVED_CONNECTION_NAMES: [&str; 2] = ["public", "internal"];

/// Returns true when the name is one of the default reserved names.
#[must_use]
pub fn is_default_reserved_name(name: &str) -> bool {
    DEFAULT_RESERVED_CONNECTION_NAMES.iter().any(|reserved| reserved == &name)
}
