// crates/fedsync-config/src/config.rs
// ============================================================================
// Module: Fedsync Configuration
// Description: Configuration loading and validation for fedsync.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: fedsync-core, fedsync-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Connection entries are flat: aggregators name their children, which must
//! be configured as standalone connections of the same plugin.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use fedsync_core::Connection;
use fedsync_core::ConnectionSet;
use fedsync_core::ConnectionType;
use fedsync_core::DEFAULT_RESERVED_CONNECTION_NAMES;
use fedsync_core::FileAuditSink;
use fedsync_core::NoopAuditSink;
use fedsync_core::ReconcileAuditSink;
use fedsync_core::ReconcileContext;
use fedsync_core::ReconcilerConfig;
use fedsync_core::SUPPORTED_PROTOCOL_VERSION;
use fedsync_core::StderrAuditSink;
use fedsync_core::ValidationPolicy;
use fedsync_core::runtime::DEFAULT_MAX_CONCURRENT_PLUGIN_LOADS;
use fedsync_core::runtime::MAX_CONCURRENT_PLUGIN_LOADS;
use fedsync_store_sqlite::SqliteSnapshotStore;
use fedsync_store_sqlite::SqliteStoreConfig;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "fedsync.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "FEDSYNC_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum connection name length (physical schema identifier limit).
pub const MAX_CONNECTION_NAME_LENGTH: usize = 63;
/// Maximum number of configured connections.
pub const MAX_CONNECTIONS: usize = 4096;

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Top-level fedsync configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FedsyncConfig {
    /// Reconciliation settings.
    #[serde(default)]
    pub reconcile: ReconcileSettings,
    /// Audit sink settings.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Optional `SQLite` snapshot store settings.
    #[serde(default)]
    pub store: Option<SqliteStoreConfig>,
    /// Configured connections.
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
}

impl FedsyncConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// An explicit `path` wins, then `FEDSYNC_CONFIG`, then `fedsync.toml` in
    /// the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.reconcile.validate()?;
        self.audit.validate()?;
        if let Some(store) = &self.store {
            validate_store(store)?;
        }
        validate_connections(&self.connections)
    }

    /// Builds the desired connection set, expanding aggregator children.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an aggregator names an unknown child.
    pub fn connection_set(&self) -> Result<ConnectionSet, ConfigError> {
        let standalone: BTreeMap<&str, Connection> = self
            .connections
            .iter()
            .filter(|entry| entry.connection_type == ConnectionType::Standalone)
            .map(|entry| {
                (
                    entry.name.as_str(),
                    Connection::standalone(entry.name.as_str(), entry.plugin.as_str())
                        .with_config(entry.config.as_str()),
                )
            })
            .collect();

        let mut set = ConnectionSet::new();
        for entry in &self.connections {
            let connection = match entry.connection_type {
                ConnectionType::Standalone => {
                    Connection::standalone(entry.name.as_str(), entry.plugin.as_str())
                        .with_config(entry.config.as_str())
                }
                ConnectionType::Aggregator => {
                    let children = entry
                        .connections
                        .iter()
                        .map(|child| {
                            standalone.get(child.as_str()).cloned().ok_or_else(|| {
                                ConfigError::Invalid(format!(
                                    "connection {} references unknown child {child}",
                                    entry.name
                                ))
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    Connection::aggregator(entry.name.as_str(), entry.plugin.as_str(), children)
                        .with_config(entry.config.as_str())
                }
            };
            set.insert(connection.name.clone(), connection);
        }
        Ok(set)
    }

    /// Builds the run context from the connections and validation settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the connection set cannot be built.
    pub fn reconcile_context(&self) -> Result<ReconcileContext, ConfigError> {
        Ok(ReconcileContext {
            connections: self.connection_set()?,
            validation: self.reconcile.validation_policy(),
        })
    }

    /// Returns the reconciler settings.
    #[must_use]
    pub const fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            max_concurrent_plugin_loads: self.reconcile.max_concurrent_plugin_loads,
        }
    }

    /// Builds the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the audit log cannot be opened.
    pub fn build_audit_sink(&self) -> Result<Arc<dyn ReconcileAuditSink>, ConfigError> {
        match self.audit.sink {
            AuditSinkKind::Stderr => Ok(Arc::new(StderrAuditSink)),
            AuditSinkKind::None => Ok(Arc::new(NoopAuditSink)),
            AuditSinkKind::File => {
                let path = self.audit.path.as_deref().ok_or_else(|| {
                    ConfigError::Invalid("file audit sink requires audit.path".to_string())
                })?;
                let sink = FileAuditSink::new(Path::new(path))
                    .map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(sink))
            }
        }
    }

    /// Opens the configured `SQLite` snapshot store.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when no store is configured or it cannot be
    /// opened.
    pub fn open_store(&self) -> Result<SqliteSnapshotStore, ConfigError> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("store section is not configured".to_string()))?;
        SqliteSnapshotStore::new(store).map_err(|err| ConfigError::Io(err.to_string()))
    }
}

/// Reconciliation settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcileSettings {
    /// Bound on concurrent plugin launches.
    #[serde(default = "default_max_concurrent_plugin_loads")]
    pub max_concurrent_plugin_loads: usize,
    /// Highest plugin protocol version accepted.
    #[serde(default = "default_supported_protocol_version")]
    pub supported_protocol_version: u32,
    /// Connection names owned by the backing store.
    #[serde(default = "default_reserved_connection_names")]
    pub reserved_connection_names: Vec<String>,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            max_concurrent_plugin_loads: default_max_concurrent_plugin_loads(),
            supported_protocol_version: default_supported_protocol_version(),
            reserved_connection_names: default_reserved_connection_names(),
        }
    }
}

impl ReconcileSettings {
    /// Returns the validation policy described by these settings.
    #[must_use]
    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            supported_protocol_version: self.supported_protocol_version,
            reserved_names: self
                .reserved_connection_names
                .iter()
                .map(|name| name.trim().to_string())
                .collect(),
        }
    }

    /// Validates reconciliation settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_plugin_loads == 0
            || self.max_concurrent_plugin_loads > MAX_CONCURRENT_PLUGIN_LOADS
        {
            return Err(ConfigError::Invalid(format!(
                "reconcile.max_concurrent_plugin_loads must be between 1 and \
                 {MAX_CONCURRENT_PLUGIN_LOADS}"
            )));
        }
        if self.supported_protocol_version == 0 {
            return Err(ConfigError::Invalid(
                "reconcile.supported_protocol_version must be greater than zero".to_string(),
            ));
        }
        if self.reserved_connection_names.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "reconcile.reserved_connection_names entries must be non-empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default concurrent plugin load bound.
const fn default_max_concurrent_plugin_loads() -> usize {
    DEFAULT_MAX_CONCURRENT_PLUGIN_LOADS
}

/// Default supported protocol version.
const fn default_supported_protocol_version() -> u32 {
    SUPPORTED_PROTOCOL_VERSION
}

/// Default reserved connection names.
fn default_reserved_connection_names() -> Vec<String> {
    DEFAULT_RESERVED_CONNECTION_NAMES.iter().map(|name| (*name).to_string()).collect()
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to `audit.path`.
    File,
    /// Discard audit events.
    None,
}

/// Audit configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink kind.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Audit log path for the file sink.
    #[serde(default)]
    pub path: Option<String>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("file audit sink requires audit.path".to_string()))
            }
            (AuditSinkKind::File, Some(path)) => validate_path_string("audit.path", path),
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit.path is only valid for the file sink".to_string()))
            }
            (_, None) => Ok(()),
        }
    }
}

/// One configured connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Connection name (also the physical schema name).
    pub name: String,
    /// Plugin serving the connection.
    pub plugin: String,
    /// Standalone or aggregator.
    #[serde(rename = "type", default = "default_connection_type")]
    pub connection_type: ConnectionType,
    /// Opaque plugin-specific options.
    #[serde(default)]
    pub config: String,
    /// Child connection names for aggregators.
    #[serde(default)]
    pub connections: Vec<String>,
}

/// Connections are standalone unless declared otherwise.
const fn default_connection_type() -> ConnectionType {
    ConnectionType::Standalone
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates connection entries and aggregator wiring.
fn validate_connections(connections: &[ConnectionConfig]) -> Result<(), ConfigError> {
    if connections.len() > MAX_CONNECTIONS {
        return Err(ConfigError::Invalid(format!(
            "too many connections (max {MAX_CONNECTIONS})"
        )));
    }
    let mut by_name: BTreeMap<&str, &ConnectionConfig> = BTreeMap::new();
    for entry in connections {
        validate_connection_name(&entry.name)?;
        if entry.plugin.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "connection {} plugin must be non-empty",
                entry.name
            )));
        }
        if by_name.insert(entry.name.as_str(), entry).is_some() {
            return Err(ConfigError::Invalid(format!(
                "connection {} is defined more than once",
                entry.name
            )));
        }
    }

    for entry in connections {
        match entry.connection_type {
            ConnectionType::Standalone => {
                if !entry.connections.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "standalone connection {} must not list child connections",
                        entry.name
                    )));
                }
            }
            ConnectionType::Aggregator => validate_aggregator(entry, &by_name)?,
        }
    }
    Ok(())
}

/// Validates one aggregator's children.
fn validate_aggregator(
    entry: &ConnectionConfig,
    by_name: &BTreeMap<&str, &ConnectionConfig>,
) -> Result<(), ConfigError> {
    if entry.connections.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "aggregator connection {} requires at least one child connection",
            entry.name
        )));
    }
    let mut seen = BTreeSet::new();
    for child_name in &entry.connections {
        if !seen.insert(child_name.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "aggregator connection {} lists child {child_name} more than once",
                entry.name
            )));
        }
        let Some(child) = by_name.get(child_name.as_str()) else {
            return Err(ConfigError::Invalid(format!(
                "connection {} references unknown child {child_name}",
                entry.name
            )));
        };
        if child.connection_type != ConnectionType::Standalone {
            return Err(ConfigError::Invalid(format!(
                "aggregator connection {} child {child_name} must be standalone",
                entry.name
            )));
        }
        if child.plugin != entry.plugin {
            return Err(ConfigError::Invalid(format!(
                "aggregator connection {} child {child_name} uses plugin {} (expected {})",
                entry.name, child.plugin, entry.plugin
            )));
        }
    }
    Ok(())
}

/// Validates a connection name.
///
/// Names are 1..=63 characters of `[a-z0-9_]` starting with a letter or
/// underscore, so every name is usable as a physical schema identifier.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when the name breaks a naming rule.
pub fn validate_connection_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::Invalid("connection name must be non-empty".to_string()));
    }
    if name.len() > MAX_CONNECTION_NAME_LENGTH {
        return Err(ConfigError::Invalid(format!(
            "connection name {name} exceeds {MAX_CONNECTION_NAME_LENGTH} characters"
        )));
    }
    let mut chars = name.chars();
    let starts_well = chars.next().is_some_and(|first| first.is_ascii_lowercase() || first == '_');
    if !starts_well {
        return Err(ConfigError::Invalid(format!(
            "connection name {name} must start with a lowercase letter or underscore"
        )));
    }
    if !chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_') {
        return Err(ConfigError::Invalid(format!(
            "connection name {name} may only contain lowercase letters, digits, and underscores"
        )));
    }
    Ok(())
}

/// Validates snapshot store settings.
fn validate_store(store: &SqliteStoreConfig) -> Result<(), ConfigError> {
    validate_path_string("store.path", &store.path.to_string_lossy())?;
    if store.busy_timeout_ms == 0 {
        return Err(ConfigError::Invalid(
            "store.busy_timeout_ms must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration or opening configured resources.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from an explicit path, the env var, or the default.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    if path.to_string_lossy().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    if path
        .components()
        .any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(ConfigError::Invalid("config path component too long".to_string()));
    }
    Ok(())
}

/// Validates a configured path string against length limits.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    if Path::new(trimmed)
        .components()
        .any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(ConfigError::Invalid(format!("{field} path component too long")));
    }
    Ok(())
}
