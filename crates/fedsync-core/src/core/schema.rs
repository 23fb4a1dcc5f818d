// crates/fedsync-core/src/core/schema.rs
// ============================================================================
// Module: Fedsync Plugin Schema
// Description: Table and column definitions reported by connection plugins.
// Purpose: Model the schema a plugin exposes for one connection.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A plugin reports one [`Schema`] per connection it serves. Tables form an
//! unordered map while columns keep their reported order, because column order
//! is part of a table's shape and table order is not.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Schema Mode
// ============================================================================

/// How a plugin's schema is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaMode {
    /// Schema is fixed for a given plugin build.
    Static,
    /// Schema depends on backend content and must be probed each run.
    Dynamic,
}

impl SchemaMode {
    /// Returns a stable label for the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Dynamic => "dynamic",
        }
    }
}

/// Returns true when a recorded mode requires a live probe.
///
/// Plugins built before schema modes existed never reported one, so an unset
/// mode is treated as dynamic.
#[must_use]
pub const fn is_dynamic_or_unset(mode: Option<SchemaMode>) -> bool {
    !matches!(mode, Some(SchemaMode::Static))
}

// ============================================================================
// SECTION: Columns
// ============================================================================

/// Column type codes as reported on the plugin wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Boolean column.
    Bool,
    /// 64-bit integer column.
    Int,
    /// Double-precision float column.
    Double,
    /// Text column.
    String,
    /// JSON document column.
    Json,
    /// Date-time column.
    Datetime,
    /// IP address column.
    IpAddr,
    /// CIDR range column.
    Cidr,
    /// Timestamp column.
    Timestamp,
    /// Inet column.
    Inet,
    /// Label-tree column.
    Ltree,
    /// Type not recognised by the plugin SDK.
    Unknown,
}

impl ColumnType {
    /// Returns the numeric wire code for the type.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Bool => 0,
            Self::Int => 1,
            Self::Double => 2,
            Self::String => 3,
            Self::Json => 4,
            Self::Datetime => 5,
            Self::IpAddr => 6,
            Self::Cidr => 7,
            Self::Timestamp => 8,
            Self::Inet => 9,
            Self::Ltree => 10,
            Self::Unknown => 11,
        }
    }
}

/// A single column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name.
    pub name: String,
    /// Column type.
    pub column_type: ColumnType,
}

impl ColumnDefinition {
    /// Creates a new column definition.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Ordered column list for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Columns in their reported order.
    pub columns: Vec<ColumnDefinition>,
}

impl TableSchema {
    /// Creates a table schema from ordered columns.
    #[must_use]
    pub const fn new(columns: Vec<ColumnDefinition>) -> Self {
        Self {
            columns,
        }
    }
}

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Schema a plugin reports for one connection.
///
/// # Invariants
/// - `protocol_version == 0` means the plugin predates protocol versioning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Tables keyed by name.
    pub tables: HashMap<String, TableSchema>,
    /// Schema mode reported by the plugin, when it reports one.
    pub mode: Option<SchemaMode>,
    /// Plugin protocol version.
    pub protocol_version: u32,
}

impl Schema {
    /// Creates an empty schema with the given mode and protocol version.
    #[must_use]
    pub fn new(mode: Option<SchemaMode>, protocol_version: u32) -> Self {
        Self {
            tables: HashMap::new(),
            mode,
            protocol_version,
        }
    }

    /// Adds a table, replacing any table with the same name.
    #[must_use]
    pub fn with_table(mut self, name: impl Into<String>, table: TableSchema) -> Self {
        self.tables.insert(name.into(), table);
        self
    }
}
