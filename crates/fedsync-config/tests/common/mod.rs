// crates/fedsync-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for fedsync-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use fedsync_config::ConfigError;
use fedsync_config::FedsyncConfig;

/// Result type used by config tests.
pub type TestResult = Result<(), String>;

/// A config with two standalone connections and an aggregator over them.
pub const AGGREGATED_TOML: &str = r#"
[reconcile]
max_concurrent_plugin_loads = 4

[[connections]]
name = "aws_1"
plugin = "aws"
config = 'regions = ["us-east-1"]'

[[connections]]
name = "aws_2"
plugin = "aws"

[[connections]]
name = "all_aws"
plugin = "aws"
type = "aggregator"
connections = ["aws_1", "aws_2"]
"#;

/// Parses a TOML string into a `FedsyncConfig` without validating it.
pub fn config_from_toml(toml_str: &str) -> Result<FedsyncConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Asserts that `result` is an invalid-config error mentioning `needle`.
pub fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(ConfigError::Invalid(message)) => {
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Err(other) => Err(format!("expected invalid config, got {other}")),
        Ok(_) => Err("expected invalid config".to_string()),
    }
}
