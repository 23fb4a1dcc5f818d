// crates/fedsync-config/tests/config_validation.rs
// =============================================================================
// Module: Config Validation Tests
// Description: Validate connection naming, aggregator wiring, and settings.
// Purpose: Ensure invalid configuration fails closed before reconciliation.
// =============================================================================

//! Connection and settings validation tests for fedsync-config.

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

use common::AGGREGATED_TOML;
use common::TestResult;
use common::assert_invalid;
use common::config_from_toml;
use fedsync_config::AuditSinkKind;
use fedsync_config::FedsyncConfig;
use fedsync_config::validate_connection_name;
use fedsync_core::ConnectionIndex;
use fedsync_core::ConnectionType;
use fedsync_core::DEFAULT_RESERVED_CONNECTION_NAMES;
use fedsync_core::SUPPORTED_PROTOCOL_VERSION;
use fedsync_core::runtime::DEFAULT_MAX_CONCURRENT_PLUGIN_LOADS;

// ============================================================================
// SECTION: Defaults
// ============================================================================

#[test]
fn empty_config_uses_defaults() -> TestResult {
    let config = FedsyncConfig::from_toml_str("").map_err(|err| err.to_string())?;
    assert_eq!(config.reconcile.max_concurrent_plugin_loads, DEFAULT_MAX_CONCURRENT_PLUGIN_LOADS);
    assert_eq!(config.reconcile.supported_protocol_version, SUPPORTED_PROTOCOL_VERSION);
    assert_eq!(config.reconcile.reserved_connection_names, DEFAULT_RESERVED_CONNECTION_NAMES);
    assert_eq!(config.audit.sink, AuditSinkKind::Stderr);
    assert!(config.store.is_none());
    assert!(config.connection_set().map_err(|err| err.to_string())?.is_empty());
    Ok(())
}

#[test]
fn unknown_fields_are_rejected() {
    let result = FedsyncConfig::from_toml_str("[reconcile]\nmax_loads = 3\n");
    assert!(matches!(result, Err(fedsync_config::ConfigError::Parse(_))));
}

// ============================================================================
// SECTION: Connection Set
// ============================================================================

#[test]
fn aggregator_children_expand_from_standalone_entries() -> TestResult {
    let config = FedsyncConfig::from_toml_str(AGGREGATED_TOML).map_err(|err| err.to_string())?;
    let set = config.connection_set().map_err(|err| err.to_string())?;
    assert_eq!(set.len(), 3);

    let aggregator = set.get("all_aws").ok_or("missing aggregator")?;
    assert_eq!(aggregator.connection_type(), ConnectionType::Aggregator);
    let children: Vec<&str> = aggregator.children().iter().map(|child| child.name.as_str()).collect();
    assert_eq!(children, vec!["aws_1", "aws_2"]);
    assert_eq!(aggregator.children()[0].config, "regions = [\"us-east-1\"]");

    // The flattened set must index cleanly: children match their standalone entries.
    let index = ConnectionIndex::build(&set).map_err(|err| err.to_string())?;
    assert_eq!(index.len(), 3);
    Ok(())
}

#[test]
fn reconcile_context_carries_validation_policy() -> TestResult {
    let toml = r#"
[reconcile]
supported_protocol_version = 7
reserved_connection_names = ["public", " system "]

[[connections]]
name = "gcp"
plugin = "gcp"
"#;
    let config = FedsyncConfig::from_toml_str(toml).map_err(|err| err.to_string())?;
    let context = config.reconcile_context().map_err(|err| err.to_string())?;
    assert_eq!(context.validation.supported_protocol_version, 7);
    assert!(context.validation.is_reserved("system"));
    assert!(!context.validation.is_reserved("internal"));
    assert!(context.connections.contains_key("gcp"));
    Ok(())
}

#[test]
fn reconciler_config_uses_configured_bound() -> TestResult {
    let config = FedsyncConfig::from_toml_str(AGGREGATED_TOML).map_err(|err| err.to_string())?;
    assert_eq!(config.reconciler_config().max_concurrent_plugin_loads, 4);
    Ok(())
}

// ============================================================================
// SECTION: Names
// ============================================================================

#[test]
fn connection_names_follow_identifier_rules() -> TestResult {
    for valid in ["aws", "_private", "aws_2", "a"] {
        validate_connection_name(valid).map_err(|err| err.to_string())?;
    }
    assert_invalid(validate_connection_name(""), "must be non-empty")?;
    assert_invalid(validate_connection_name("2aws"), "must start with")?;
    assert_invalid(validate_connection_name("Aws"), "must start with")?;
    assert_invalid(validate_connection_name("aws-east"), "may only contain")?;
    assert_invalid(validate_connection_name(&"a".repeat(64)), "exceeds 63")?;
    validate_connection_name(&"a".repeat(63)).map_err(|err| err.to_string())?;
    Ok(())
}

#[test]
fn duplicate_names_are_rejected() -> TestResult {
    let toml = r#"
[[connections]]
name = "aws"
plugin = "aws"

[[connections]]
name = "aws"
plugin = "gcp"
"#;
    assert_invalid(FedsyncConfig::from_toml_str(toml), "defined more than once")
}

#[test]
fn empty_plugin_is_rejected() -> TestResult {
    let toml = "[[connections]]\nname = \"aws\"\nplugin = \" \"\n";
    assert_invalid(FedsyncConfig::from_toml_str(toml), "plugin must be non-empty")
}

// ============================================================================
// SECTION: Aggregators
// ============================================================================

#[test]
fn aggregator_requires_children() -> TestResult {
    let toml = "[[connections]]\nname = \"all\"\nplugin = \"aws\"\ntype = \"aggregator\"\n";
    assert_invalid(FedsyncConfig::from_toml_str(toml), "requires at least one child")
}

#[test]
fn aggregator_children_must_exist() -> TestResult {
    let mut config = config_from_toml(AGGREGATED_TOML).map_err(|err| err.to_string())?;
    config.connections.retain(|entry| entry.name != "aws_2");
    assert_invalid(config.validate(), "references unknown child aws_2")?;
    assert_invalid(config.connection_set(), "references unknown child aws_2")
}

#[test]
fn aggregator_children_must_be_standalone() -> TestResult {
    let mut config = config_from_toml(AGGREGATED_TOML).map_err(|err| err.to_string())?;
    let mut nested = config.connections[2].clone();
    nested.name = "all_all".to_string();
    nested.connections = vec!["all_aws".to_string()];
    config.connections.push(nested);
    assert_invalid(config.validate(), "child all_aws must be standalone")
}

#[test]
fn aggregator_children_must_share_plugin() -> TestResult {
    let mut config = config_from_toml(AGGREGATED_TOML).map_err(|err| err.to_string())?;
    config.connections[1].plugin = "gcp".to_string();
    assert_invalid(config.validate(), "uses plugin gcp (expected aws)")
}

#[test]
fn aggregator_children_must_be_unique() -> TestResult {
    let mut config = config_from_toml(AGGREGATED_TOML).map_err(|err| err.to_string())?;
    config.connections[2].connections = vec!["aws_1".to_string(), "aws_1".to_string()];
    assert_invalid(config.validate(), "lists child aws_1 more than once")
}

#[test]
fn standalone_must_not_list_children() -> TestResult {
    let mut config = config_from_toml(AGGREGATED_TOML).map_err(|err| err.to_string())?;
    config.connections[0].connections = vec!["aws_2".to_string()];
    assert_invalid(config.validate(), "must not list child connections")
}

// ============================================================================
// SECTION: Settings
// ============================================================================

#[test]
fn concurrency_bound_is_range_checked() -> TestResult {
    let mut config = config_from_toml("").map_err(|err| err.to_string())?;
    config.reconcile.max_concurrent_plugin_loads = 0;
    assert_invalid(config.validate(), "max_concurrent_plugin_loads must be between 1 and 64")?;
    config.reconcile.max_concurrent_plugin_loads = 65;
    assert_invalid(config.validate(), "max_concurrent_plugin_loads must be between 1 and 64")?;
    config.reconcile.max_concurrent_plugin_loads = 64;
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn zero_protocol_version_is_rejected() -> TestResult {
    let mut config = config_from_toml("").map_err(|err| err.to_string())?;
    config.reconcile.supported_protocol_version = 0;
    assert_invalid(config.validate(), "supported_protocol_version must be greater than zero")
}

#[test]
fn blank_reserved_name_is_rejected() -> TestResult {
    let mut config = config_from_toml("").map_err(|err| err.to_string())?;
    config.reconcile.reserved_connection_names.push("  ".to_string());
    assert_invalid(config.validate(), "reserved_connection_names entries must be non-empty")
}

#[test]
fn file_audit_sink_requires_path() -> TestResult {
    assert_invalid(FedsyncConfig::from_toml_str("[audit]\nsink = \"file\"\n"), "requires audit.path")
}

#[test]
fn audit_path_requires_file_sink() -> TestResult {
    let toml = "[audit]\nsink = \"none\"\npath = \"audit.log\"\n";
    assert_invalid(FedsyncConfig::from_toml_str(toml), "only valid for the file sink")
}

#[test]
fn store_rejects_zero_busy_timeout() -> TestResult {
    let toml = "[store]\npath = \"fedsync.db\"\nbusy_timeout_ms = 0\n";
    assert_invalid(FedsyncConfig::from_toml_str(toml), "busy_timeout_ms must be greater than zero")
}

#[test]
fn store_rejects_long_path_component() -> TestResult {
    let toml = format!("[store]\npath = \"{}.db\"\n", "a".repeat(300));
    assert_invalid(FedsyncConfig::from_toml_str(&toml), "store.path path component too long")
}
