//! PostgreSQL goods store.
//!
//! Uses a deadpool-postgres pool capped at one connection, so every operation
//! of a run shares the same session. The pool is lazy: no connection is made
//! until the first store call, and a rejected document never opens one.

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Transaction};
use tokio_postgres::error::SqlState;
use tokio_postgres::Config as PgConfig;
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, info, warn};

use super::sql;
use super::tls::SslMode;
use super::GoodsStore;
use crate::config::{DatabaseConfig, TableConfig};
use crate::error::{GoodsError, Result};
use crate::model::{GoodRecord, StockRecord};

/// PostgreSQL implementation of [`GoodsStore`].
pub struct PgStore {
    pool: Pool,
    config: DatabaseConfig,
    tables: TableConfig,
    ssl_mode: SslMode,
    tls: Option<MakeRustlsConnect>,
}

impl PgStore {
    /// Create a store for the configured target database.
    pub fn new(config: &DatabaseConfig, tables: &TableConfig) -> Result<Self> {
        let ssl_mode = SslMode::parse(&config.ssl_mode)?;
        let tls = ssl_mode.connector();
        if tls.is_none() {
            warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
        }

        let pool = build_pool(
            config.target_pg_config(),
            ssl_mode,
            tls.clone(),
            "creating target pool",
        )?;

        debug!(
            "PostgreSQL store for {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self {
            pool,
            config: config.clone(),
            tables: tables.clone(),
            ssl_mode,
            tls,
        })
    }

    /// Table names this store writes to.
    pub fn tables(&self) -> &TableConfig {
        &self.tables
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

fn build_pool(
    mut pg_config: PgConfig,
    ssl_mode: SslMode,
    tls: Option<MakeRustlsConnect>,
    context: &str,
) -> Result<Pool> {
    pg_config.ssl_mode(ssl_mode.pg_ssl_mode());
    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };

    let mgr = match tls {
        Some(connector) => Manager::from_config(pg_config, connector, mgr_config),
        None => Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config),
    };

    Pool::builder(mgr)
        .max_size(1)
        .build()
        .map_err(|e| GoodsError::pool(e, context))
}

/// Upsert one goods row; conflict key `id`.
pub async fn write_good(tx: &Transaction<'_>, tables: &TableConfig, good: &GoodRecord) -> Result<()> {
    let stmt = tx
        .prepare_cached(&sql::upsert_good(tables))
        .await
        .map_err(|e| GoodsError::write(&tables.goods, e))?;

    tx.execute(
        &stmt,
        &[
            &good.id,
            &good.name,
            &good.package_height,
            &good.package_width,
        ],
    )
    .await
    .map_err(|e| GoodsError::write(&tables.goods, e))?;

    debug!("Upserted good {}", good.id);
    Ok(())
}

/// Upsert one stock row; conflict key `(good_id, location)`.
pub async fn write_stock(
    tx: &Transaction<'_>,
    tables: &TableConfig,
    stock: &StockRecord,
) -> Result<()> {
    let stmt = tx
        .prepare_cached(&sql::upsert_stock(tables))
        .await
        .map_err(|e| GoodsError::write(&tables.stock, e))?;

    tx.execute(&stmt, &[&stock.good_id, &stock.location, &stock.amount])
        .await
        .map_err(|e| {
            GoodsError::write(
                &tables.stock,
                format!("location '{}': {}", stock.location, e),
            )
        })?;

    debug!(
        "Upserted stock for good {} at {}: {}",
        stock.good_id, stock.location, stock.amount
    );
    Ok(())
}

#[async_trait]
impl GoodsStore for PgStore {
    async fn ensure_database(&self) -> Result<bool> {
        let name = &self.config.database;
        let maintenance = &self.config.maintenance_database;

        let pool = build_pool(
            self.config.maintenance_pg_config(),
            self.ssl_mode,
            self.tls.clone(),
            "creating maintenance pool",
        )?;
        let client = pool.get().await.map_err(|e| {
            GoodsError::provisioning(
                name,
                format!("cannot connect to maintenance database {}: {}", maintenance, e),
            )
        })?;

        let row = client
            .query_one(sql::DATABASE_EXISTS, &[name])
            .await
            .map_err(|e| GoodsError::provisioning(name, e))?;
        let exists: bool = row.get(0);
        if exists {
            info!("Database {} already exists", name);
            return Ok(false);
        }

        match client.batch_execute(&sql::create_database(name)).await {
            Ok(()) => {
                info!("Created database {}", name);
                Ok(true)
            }
            Err(e) if e.code() == Some(&SqlState::DUPLICATE_DATABASE) => {
                info!("Database {} was created concurrently", name);
                Ok(false)
            }
            Err(e) => Err(GoodsError::provisioning(name, e)),
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        let mut client = self.pool.get().await.map_err(|e| {
            GoodsError::schema(format!(
                "cannot connect to database {}: {}",
                self.config.database, e
            ))
        })?;

        let tx = client.transaction().await.map_err(GoodsError::schema)?;

        let statements = sql::create_schema(&self.tables)
            .into_iter()
            .chain([
                sql::create_goods_table(&self.tables),
                sql::create_stock_table(&self.tables),
                sql::create_stock_key_index(&self.tables),
            ]);
        for stmt in statements {
            debug!("Executing DDL: {}", stmt);
            tx.batch_execute(&stmt).await.map_err(GoodsError::schema)?;
        }

        tx.commit().await.map_err(GoodsError::schema)?;

        info!(
            "Tables {} and {} are ready in schema {}",
            self.tables.goods, self.tables.stock, self.tables.schema
        );
        Ok(())
    }

    async fn write_records(&self, good: &GoodRecord, stock: &[StockRecord]) -> Result<()> {
        let mut client = self
            .pool
            .get()
            .await
            .map_err(|e| GoodsError::pool(e, "acquiring connection for upsert"))?;

        let tx = client
            .transaction()
            .await
            .map_err(|e| GoodsError::write(&self.tables.goods, e))?;

        // An early return drops `tx`, which rolls the transaction back.
        write_good(&tx, &self.tables, good).await?;
        for entry in stock {
            write_stock(&tx, &self.tables, entry).await?;
        }

        tx.commit()
            .await
            .map_err(|e| GoodsError::write(&self.tables.goods, format!("commit failed: {}", e)))?;

        info!(
            "Committed good {} with {} stock rows",
            good.id,
            stock.len()
        );
        Ok(())
    }

    async fn fetch_good(&self, id: i32) -> Result<Option<GoodRecord>> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| GoodsError::pool(e, "acquiring connection for read"))?;

        let row = client
            .query_opt(&sql::select_good(&self.tables), &[&id])
            .await?;

        Ok(row.map(|r| GoodRecord {
            id: r.get(0),
            name: r.get(1),
            package_height: r.get(2),
            package_width: r.get(3),
        }))
    }

    async fn fetch_stock(&self, good_id: i32) -> Result<Vec<StockRecord>> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| GoodsError::pool(e, "acquiring connection for read"))?;

        let rows = client
            .query(&sql::select_stock(&self.tables), &[&good_id])
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| StockRecord {
                good_id: r.get(0),
                location: r.get(1),
                amount: r.get(2),
            })
            .collect())
    }

    async fn close(&self) {
        self.pool.close();
    }

    fn store_type(&self) -> &'static str {
        "postgres"
    }
}
