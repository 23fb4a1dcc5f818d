// crates/fedsync-config/tests/config_load.rs
// =============================================================================
// Module: Config Load Tests
// Description: Validate file loading limits and configured resources.
// Purpose: Ensure config files fail closed and wire the sinks and store they name.
// =============================================================================

//! File loading and resource construction tests for fedsync-config.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use std::fs;

use common::AGGREGATED_TOML;
use common::TestResult;
use common::assert_invalid;
use fedsync_config::ConfigError;
use fedsync_config::FedsyncConfig;
use fedsync_config::MAX_CONFIG_FILE_SIZE;
use fedsync_core::ReconcileAuditEvent;
use fedsync_core::SnapshotSession;
use fedsync_core::SnapshotStore;
use tempfile::TempDir;

#[test]
fn loads_explicit_path() -> TestResult {
    let temp = TempDir::new().map_err(|err| err.to_string())?;
    let path = temp.path().join("fedsync.toml");
    fs::write(&path, AGGREGATED_TOML).map_err(|err| err.to_string())?;
    let config = FedsyncConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    assert_eq!(config.connections.len(), 3);
    Ok(())
}

#[test]
fn missing_file_is_io_error() {
    let temp = TempDir::new().unwrap();
    let result = FedsyncConfig::load(Some(&temp.path().join("absent.toml")));
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn oversized_file_is_rejected() -> TestResult {
    let temp = TempDir::new().map_err(|err| err.to_string())?;
    let path = temp.path().join("fedsync.toml");
    let padding = format!("# {}\n", "x".repeat(MAX_CONFIG_FILE_SIZE));
    fs::write(&path, padding).map_err(|err| err.to_string())?;
    assert_invalid(FedsyncConfig::load(Some(&path)), "exceeds size limit")
}

#[test]
fn non_utf8_file_is_rejected() -> TestResult {
    let temp = TempDir::new().map_err(|err| err.to_string())?;
    let path = temp.path().join("fedsync.toml");
    fs::write(&path, [0xff, 0xfe, 0x00]).map_err(|err| err.to_string())?;
    assert_invalid(FedsyncConfig::load(Some(&path)), "must be utf-8")
}

#[test]
fn long_path_component_is_rejected() -> TestResult {
    let temp = TempDir::new().map_err(|err| err.to_string())?;
    let path = temp.path().join(format!("{}.toml", "c".repeat(300)));
    assert_invalid(FedsyncConfig::load(Some(&path)), "component too long")
}

#[test]
fn file_audit_sink_appends_json_lines() -> TestResult {
    let temp = TempDir::new().map_err(|err| err.to_string())?;
    let log = temp.path().join("audit.jsonl");
    let toml = format!("[audit]\nsink = \"file\"\npath = {:?}\n", log.to_string_lossy());
    let config = FedsyncConfig::from_toml_str(&toml).map_err(|err| err.to_string())?;

    let sink = config.build_audit_sink().map_err(|err| err.to_string())?;
    sink.record(&ReconcileAuditEvent::phase("initializing", None));

    let content = fs::read_to_string(&log).map_err(|err| err.to_string())?;
    let line = content.lines().next().ok_or("audit log is empty")?;
    let value: serde_json::Value = serde_json::from_str(line).map_err(|err| err.to_string())?;
    assert_eq!(value["phase"], "initializing");
    Ok(())
}

#[test]
fn open_store_requires_store_section() -> TestResult {
    let config = FedsyncConfig::from_toml_str("").map_err(|err| err.to_string())?;
    assert_invalid(config.open_store(), "store section is not configured")
}

#[test]
fn open_store_returns_empty_snapshot() -> TestResult {
    let temp = TempDir::new().map_err(|err| err.to_string())?;
    let db = temp.path().join("fedsync.db");
    let toml = format!("[store]\npath = {:?}\n", db.to_string_lossy());
    let config = FedsyncConfig::from_toml_str(&toml).map_err(|err| err.to_string())?;
    let store = config.open_store().map_err(|err| err.to_string())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|err| err.to_string())?;
    let state = runtime.block_on(async {
        let mut session = store.acquire().await.map_err(|err| err.to_string())?;
        session.load_connection_state().await.map_err(|err| err.to_string())
    })?;
    assert!(state.is_empty());
    Ok(())
}
