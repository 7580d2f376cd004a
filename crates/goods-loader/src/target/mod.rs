//! Relational store for goods and stock records.
//!
//! The [`GoodsStore`] trait is what the orchestrator talks to:
//!
//! - **PostgreSQL**: [`PgStore`] in `postgres.rs`
//! - **In-memory**: [`MemoryStore`] in `memory.rs`, with the same conflict,
//!   foreign-key and transaction rules, for tests and embedding

mod memory;
mod postgres;
pub mod sql;
pub mod tls;

pub use memory::MemoryStore;
pub use postgres::{write_good, write_stock, PgStore};

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{GoodRecord, StockRecord};

/// Store operations needed for one validate-then-upsert run.
///
/// Implementations must be `Send + Sync`; a run uses the store sequentially.
#[async_trait]
pub trait GoodsStore: Send + Sync {
    /// Create the target database if it does not exist.
    ///
    /// Returns `true` if it was created by this call, `false` if it already
    /// existed. Fails with [`crate::GoodsError::Provisioning`].
    async fn ensure_database(&self) -> Result<bool>;

    /// Create both tables and the `(good_id, location)` unique index if absent.
    ///
    /// Idempotent. Fails with [`crate::GoodsError::Schema`].
    async fn ensure_schema(&self) -> Result<()>;

    /// Upsert one good and all of its stock rows in a single transaction.
    ///
    /// Nothing is committed unless every row is written. Fails with
    /// [`crate::GoodsError::Write`].
    async fn write_records(&self, good: &GoodRecord, stock: &[StockRecord]) -> Result<()>;

    /// Read back one good by id.
    async fn fetch_good(&self, id: i32) -> Result<Option<GoodRecord>>;

    /// Read back every stock row of a good, ordered by location.
    async fn fetch_stock(&self, good_id: i32) -> Result<Vec<StockRecord>>;

    /// Release connections held by the store.
    async fn close(&self);

    /// Store type name for logging.
    fn store_type(&self) -> &'static str;
}
