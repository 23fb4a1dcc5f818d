// crates/fedsync-config/src/lib.rs
// ============================================================================
// Module: Fedsync Config Library
// Description: Configuration model and validation for fedsync.
// Purpose: Single source of truth for fedsync.toml semantics.
// Dependencies: fedsync-core, fedsync-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `fedsync-config` parses `fedsync.toml` into the desired connection set and
//! the settings a reconciliation run needs. Validation is strict and fails
//! closed: a config that loads is one the reconciler can index.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
