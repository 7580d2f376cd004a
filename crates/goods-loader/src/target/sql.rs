//! PostgreSQL statement builders for the goods tables.
//!
//! All identifiers come from configuration and are quoted; values are always
//! bound as `$n` parameters.

use crate::config::TableConfig;

/// Goods table columns, in bind order.
pub const GOODS_COLUMNS: [&str; 4] = ["id", "name", "package_height", "package_width"];
/// Goods conflict key.
pub const GOODS_KEY: [&str; 1] = ["id"];
/// Stock table columns, in bind order.
pub const STOCK_COLUMNS: [&str; 3] = ["good_id", "location", "amount"];
/// Stock conflict key.
pub const STOCK_KEY: [&str; 2] = ["good_id", "location"];

/// Quote a PostgreSQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Qualify a table name with schema.
pub fn qualify_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

fn quoted_list(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build `INSERT ... ON CONFLICT` for one row.
///
/// Non-key columns are overwritten from `EXCLUDED`; a table whose columns are
/// all key columns gets `DO NOTHING`.
pub fn build_upsert(table: &str, columns: &[&str], conflict_columns: &[&str]) -> String {
    let placeholders = (1..=columns.len())
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO",
        table,
        quoted_list(columns),
        placeholders,
        quoted_list(conflict_columns)
    );

    let update_set = columns
        .iter()
        .filter(|c| !conflict_columns.contains(*c))
        .map(|c| format!("{} = EXCLUDED.{}", quote_ident(c), quote_ident(c)))
        .collect::<Vec<_>>();

    if update_set.is_empty() {
        sql.push_str(" NOTHING");
    } else {
        sql.push_str(&format!(" UPDATE SET {}", update_set.join(", ")));
    }

    sql
}

/// Upsert statement for the goods table.
pub fn upsert_good(tables: &TableConfig) -> String {
    build_upsert(
        &qualify_table(&tables.schema, &tables.goods),
        &GOODS_COLUMNS,
        &GOODS_KEY,
    )
}

/// Upsert statement for the stock table.
pub fn upsert_stock(tables: &TableConfig) -> String {
    build_upsert(
        &qualify_table(&tables.schema, &tables.stock),
        &STOCK_COLUMNS,
        &STOCK_KEY,
    )
}

/// `CREATE SCHEMA IF NOT EXISTS`, or None for `public`.
pub fn create_schema(tables: &TableConfig) -> Option<String> {
    if tables.schema == "public" {
        None
    } else {
        Some(format!(
            "CREATE SCHEMA IF NOT EXISTS {}",
            quote_ident(&tables.schema)
        ))
    }
}

/// DDL for the goods table. The id is supplied by the input, not a sequence.
pub fn create_goods_table(tables: &TableConfig) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
    \"id\" INTEGER PRIMARY KEY,
    \"name\" VARCHAR NOT NULL,
    \"package_height\" DOUBLE PRECISION NOT NULL,
    \"package_width\" DOUBLE PRECISION NOT NULL
)",
        qualify_table(&tables.schema, &tables.goods)
    )
}

/// DDL for the stock table.
pub fn create_stock_table(tables: &TableConfig) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
    \"id\" SERIAL PRIMARY KEY,
    \"good_id\" INTEGER NOT NULL REFERENCES {} (\"id\") ON DELETE CASCADE,
    \"location\" VARCHAR NOT NULL,
    \"amount\" INTEGER NOT NULL
)",
        qualify_table(&tables.schema, &tables.stock),
        qualify_table(&tables.schema, &tables.goods)
    )
}

/// Name of the unique index backing the stock conflict key.
pub fn stock_key_index_name(tables: &TableConfig) -> String {
    format!("{}_good_id_location_key", tables.stock)
}

/// Unique index on `(good_id, location)`.
pub fn create_stock_key_index(tables: &TableConfig) -> String {
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
        quote_ident(&stock_key_index_name(tables)),
        qualify_table(&tables.schema, &tables.stock),
        quoted_list(&STOCK_KEY)
    )
}

/// Existence check against `pg_database`.
pub const DATABASE_EXISTS: &str = "SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)";

/// `CREATE DATABASE` does not accept parameters, so the name is quoted.
pub fn create_database(name: &str) -> String {
    format!("CREATE DATABASE {}", quote_ident(name))
}

/// Read back one good by id.
pub fn select_good(tables: &TableConfig) -> String {
    format!(
        "SELECT {} FROM {} WHERE \"id\" = $1",
        quoted_list(&GOODS_COLUMNS),
        qualify_table(&tables.schema, &tables.goods)
    )
}

/// Read back all stock rows for a good, ordered by location.
pub fn select_stock(tables: &TableConfig) -> String {
    format!(
        "SELECT {} FROM {} WHERE \"good_id\" = $1 ORDER BY \"location\"",
        quoted_list(&STOCK_COLUMNS),
        qualify_table(&tables.schema, &tables.stock)
    )
}
