//! In-memory goods store.
//!
//! Mirrors the PostgreSQL rules that matter to a run: tables must exist before
//! writes, stock rows need their good, both tables upsert on their conflict
//! key, and a batch is applied all-or-nothing. Failures can be injected to
//! exercise the orchestrator's error paths.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::GoodsStore;
use crate::config::TableConfig;
use crate::error::{GoodsError, Result};
use crate::model::{GoodRecord, StockRecord};

#[derive(Debug, Clone, Default)]
struct Tables {
    goods: BTreeMap<i32, GoodRecord>,
    stock: BTreeMap<(i32, String), i32>,
}

#[derive(Debug, Default)]
struct State {
    databases: BTreeSet<String>,
    /// None until `ensure_schema` succeeds.
    tables: Option<Tables>,
}

/// In-memory implementation of [`GoodsStore`].
pub struct MemoryStore {
    database: String,
    names: TableConfig,
    state: Mutex<State>,
    fail_provisioning: AtomicBool,
    fail_schema: AtomicBool,
    /// Fail the n-th stock write of the next batch (0 = none).
    fail_stock_write: AtomicUsize,
    store_calls: AtomicUsize,
    closed: AtomicBool,
}

impl MemoryStore {
    /// Create a store whose server does not yet have `database`.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            names: TableConfig::default(),
            state: Mutex::new(State::default()),
            fail_provisioning: AtomicBool::new(false),
            fail_schema: AtomicBool::new(false),
            fail_stock_write: AtomicUsize::new(0),
            store_calls: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Create a store whose database already exists.
    pub fn with_existing_database(database: impl Into<String>) -> Self {
        let store = Self::new(database);
        let name = store.database.clone();
        store.lock().databases.insert(name);
        store
    }

    /// Make `ensure_database` fail.
    pub fn fail_provisioning(self) -> Self {
        self.fail_provisioning.store(true, Ordering::SeqCst);
        self
    }

    /// Make `ensure_schema` fail.
    pub fn fail_schema(self) -> Self {
        self.fail_schema.store(true, Ordering::SeqCst);
        self
    }

    /// Make the n-th (1-based) stock write of every batch fail.
    pub fn fail_stock_write_at(self, n: usize) -> Self {
        self.fail_stock_write.store(n, Ordering::SeqCst);
        self
    }

    /// Number of store operations performed, excluding `close`.
    pub fn store_calls(&self) -> usize {
        self.store_calls.load(Ordering::SeqCst)
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Total rows in the goods table.
    pub fn goods_count(&self) -> usize {
        self.lock().tables.as_ref().map_or(0, |t| t.goods.len())
    }

    /// Total rows in the stock table.
    pub fn stock_count(&self) -> usize {
        self.lock().tables.as_ref().map_or(0, |t| t.stock.len())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panic while holding the lock cannot leave a half-applied batch.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn touch(&self) {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn missing_relation(&self, table: &str) -> GoodsError {
        GoodsError::write(table, format!("relation \"{}\" does not exist", table))
    }
}

#[async_trait]
impl GoodsStore for MemoryStore {
    async fn ensure_database(&self) -> Result<bool> {
        self.touch();
        if self.fail_provisioning.load(Ordering::SeqCst) {
            return Err(GoodsError::provisioning(
                &self.database,
                "permission denied to create database",
            ));
        }
        Ok(self.lock().databases.insert(self.database.clone()))
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.touch();
        let mut state = self.lock();
        if !state.databases.contains(&self.database) {
            return Err(GoodsError::schema(format!(
                "database \"{}\" does not exist",
                self.database
            )));
        }
        if self.fail_schema.load(Ordering::SeqCst) {
            return Err(GoodsError::schema(format!(
                "permission denied for schema {}",
                self.names.schema
            )));
        }
        state.tables.get_or_insert_with(Tables::default);
        Ok(())
    }

    async fn write_records(&self, good: &GoodRecord, stock: &[StockRecord]) -> Result<()> {
        self.touch();
        let mut state = self.lock();
        let committed = state
            .tables
            .as_mut()
            .ok_or_else(|| self.missing_relation(&self.names.goods))?;

        // Work on a copy; it replaces the committed tables only on success.
        let mut staged = committed.clone();
        staged.goods.insert(good.id, good.clone());

        let fail_at = self.fail_stock_write.load(Ordering::SeqCst);
        for (i, entry) in stock.iter().enumerate() {
            if i + 1 == fail_at {
                return Err(GoodsError::write(
                    &self.names.stock,
                    format!("location '{}': injected failure", entry.location),
                ));
            }
            if !staged.goods.contains_key(&entry.good_id) {
                return Err(GoodsError::write(
                    &self.names.stock,
                    format!(
                        "insert violates foreign key: good {} does not exist",
                        entry.good_id
                    ),
                ));
            }
            staged
                .stock
                .insert((entry.good_id, entry.location.clone()), entry.amount);
        }

        *committed = staged;
        Ok(())
    }

    async fn fetch_good(&self, id: i32) -> Result<Option<GoodRecord>> {
        self.touch();
        let state = self.lock();
        let tables = state
            .tables
            .as_ref()
            .ok_or_else(|| self.missing_relation(&self.names.goods))?;
        Ok(tables.goods.get(&id).cloned())
    }

    async fn fetch_stock(&self, good_id: i32) -> Result<Vec<StockRecord>> {
        self.touch();
        let state = self.lock();
        let tables = state
            .tables
            .as_ref()
            .ok_or_else(|| self.missing_relation(&self.names.stock))?;
        Ok(tables
            .stock
            .iter()
            .filter(|((id, _), _)| *id == good_id)
            .map(|((id, location), amount)| StockRecord {
                good_id: *id,
                location: location.clone(),
                amount: *amount,
            })
            .collect())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn store_type(&self) -> &'static str {
        "memory"
    }
}
