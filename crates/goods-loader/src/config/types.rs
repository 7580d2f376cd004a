//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// PostgreSQL connection configuration.
    pub database: DatabaseConfig,

    /// Input document locations.
    #[serde(default)]
    pub input: InputConfig,

    /// Target table names.
    #[serde(default)]
    pub tables: TableConfig,
}

/// PostgreSQL connection configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Target database name. Created on first run if missing.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Database used to check for and create the target database (default: "postgres").
    #[serde(default = "default_maintenance_database")]
    pub maintenance_database: String,

    /// SSL mode (default: "disable").
    #[serde(default = "default_disable")]
    pub ssl_mode: String,

    /// Connect timeout in seconds (default: 30).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("maintenance_database", &self.maintenance_database)
            .field("ssl_mode", &self.ssl_mode)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// Locations of the schema and data documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// JSON Schema file. The built-in goods schema is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_path: Option<PathBuf>,

    /// Data document (default: "goods.data.json").
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            schema_path: None,
            data_path: default_data_path(),
        }
    }
}

/// Target schema and table names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Target schema (default: "public").
    #[serde(default = "default_public_schema")]
    pub schema: String,

    /// Goods table (default: "goods").
    #[serde(default = "default_goods_table")]
    pub goods: String,

    /// Per-location stock table (default: "shops_goods").
    #[serde(default = "default_stock_table")]
    pub stock: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            schema: default_public_schema(),
            goods: default_goods_table(),
            stock: default_stock_table(),
        }
    }
}

fn default_pg_port() -> u16 {
    5432
}

fn default_maintenance_database() -> String {
    "postgres".to_string()
}

fn default_disable() -> String {
    "disable".to_string()
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_data_path() -> PathBuf {
    PathBuf::from("goods.data.json")
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_goods_table() -> String {
    "goods".to_string()
}

fn default_stock_table() -> String {
    "shops_goods".to_string()
}
