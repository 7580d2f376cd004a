//! # goods-loader
//!
//! Validates warehouse goods documents and loads them into PostgreSQL.
//!
//! A run takes one JSON document describing a good and its stock:
//!
//! - **Validation** against a JSON Schema (built-in or user supplied)
//! - **Mapping** of the nested document into flat goods and stock records
//! - **Schema definition** of the target database, tables and unique key
//! - **Upsert** of the good and every stock row in one transaction
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use goods_loader::{Config, Orchestrator, PgStore};
//!
//! #[tokio::main]
//! async fn main() -> goods_loader::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let store = PgStore::new(&config.database, &config.tables)?;
//!     let result = Orchestrator::new(config, Arc::new(store)).run().await?;
//!     println!("{}", result.message());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod mapper;
pub mod model;
pub mod orchestrator;
pub mod target;
pub mod validator;

// Re-exports for convenient access
pub use config::{Config, DatabaseConfig, InputConfig, TableConfig};
pub use error::{GoodsError, Result};
pub use model::{GoodDocument, GoodRecord, StockRecord};
pub use orchestrator::{Orchestrator, RunResult, RunState, RunStatus};
pub use target::{GoodsStore, MemoryStore, PgStore};
