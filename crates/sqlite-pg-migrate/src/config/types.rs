//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::schema::EntityKind;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (SQLite).
    pub source: SourceConfig,

    /// Target database configuration (PostgreSQL).
    pub target: TargetConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Source database (SQLite) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database type (always "sqlite").
    #[serde(default = "default_sqlite")]
    pub r#type: String,

    /// Path to the SQLite database file.
    pub path: PathBuf,
}

/// Target database (PostgreSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database type (always "postgres").
    #[serde(default = "default_postgres")]
    pub r#type: String,

    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Target schema (default: "content").
    #[serde(default = "default_content_schema")]
    pub schema: String,

    /// Primary key column used by the conflict-skip clause (default: "id").
    #[serde(default = "default_conflict_column")]
    pub conflict_column: String,

    /// SSL mode (default: "disable").
    #[serde(default = "default_disable")]
    pub ssl_mode: String,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("conflict_column", &self.conflict_column)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Which source columns are requested for each table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnMode {
    /// Select the record schema's fields and coerce values to their types.
    #[default]
    Schema,

    /// `SELECT *`, passing rows through untouched.
    All,
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Rows per fetch/insert batch (default: 10).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Per-table batch size overrides, keyed by table name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub batch_sizes: HashMap<String, usize>,

    /// Tables to transfer. Empty means all five entity kinds.
    /// They always run in dependency order regardless of listing order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<String>,

    /// Column selection mode (default: schema).
    #[serde(default)]
    pub column_mode: ColumnMode,

    /// Read and count every batch without writing (default: false).
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_sizes: HashMap::new(),
            tables: Vec::new(),
            column_mode: ColumnMode::default(),
            dry_run: false,
        }
    }
}

impl MigrationConfig {
    /// Effective batch size for a table.
    pub fn batch_size_for(&self, table: &str) -> usize {
        self.batch_sizes
            .get(table)
            .copied()
            .unwrap_or(self.batch_size)
    }

    /// Entity kinds selected for transfer, in dependency order.
    ///
    /// Unknown table names are rejected by validation, so they are ignored here.
    pub fn selected_kinds(&self) -> Vec<EntityKind> {
        EntityKind::ALL
            .iter()
            .copied()
            .filter(|kind| {
                self.tables.is_empty() || self.tables.iter().any(|t| t == kind.table_name())
            })
            .collect()
    }
}

// Default value functions for serde
fn default_sqlite() -> String {
    "sqlite".to_string()
}

fn default_postgres() -> String {
    "postgres".to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn default_content_schema() -> String {
    "content".to_string()
}

fn default_conflict_column() -> String {
    "id".to_string()
}

fn default_disable() -> String {
    "disable".to_string()
}

fn default_batch_size() -> usize {
    10
}
