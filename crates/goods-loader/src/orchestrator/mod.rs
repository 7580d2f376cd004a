//! Run orchestrator: validation, schema definition, then the upsert.
//!
//! A run walks a linear state machine:
//!
//! ```text
//! START -> VALIDATED | REJECTED -> SCHEMA_READY -> WRITTEN -> DONE
//! ```
//!
//! REJECTED is terminal and happens before any store call.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{GoodsError, Result};
use crate::mapper;
use crate::model::GoodDocument;
use crate::target::GoodsStore;
use crate::validator;

/// Position of a run in the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Start,
    Validated,
    Rejected,
    SchemaReady,
    Written,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Start => "START",
            RunState::Validated => "VALIDATED",
            RunState::Rejected => "REJECTED",
            RunState::SchemaReady => "SCHEMA_READY",
            RunState::Written => "WRITTEN",
            RunState::Done => "DONE",
        };
        f.write_str(s)
    }
}

/// Final outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Input failed validation; nothing was written.
    Rejected,
    /// Input is valid; the store was not touched (validate-only run).
    Validated,
    /// Records written into a database created by this run.
    Created,
    /// Records written into a database that already existed.
    Updated,
}

/// Result of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: RunStatus,

    /// States visited, in order.
    pub states: Vec<RunState>,

    /// Id of the written or validated good.
    pub good_id: Option<i32>,

    /// Stock rows written (or that would be written, for validate-only runs).
    pub stock_rows: usize,

    /// Whether the database was created by this run. None if the store was not used.
    pub database_created: Option<bool>,

    /// Provisioning failure that the run continued past.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_error: Option<String>,

    /// Schema violations, for rejected runs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<String>,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,
}

impl RunResult {
    /// User-facing outcome line.
    pub fn message(&self) -> &'static str {
        match self.status {
            RunStatus::Rejected => "Input data is invalid: check the source data and try again.",
            RunStatus::Validated => "Input data is valid.",
            RunStatus::Created => "Records created in the database!",
            RunStatus::Updated => "Records updated in the database!",
        }
    }

    /// Convert to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Tracks a run as it moves through the state machine.
struct Run {
    run_id: String,
    started_at: DateTime<Utc>,
    states: Vec<RunState>,
}

impl Run {
    fn start() -> Self {
        let run_id = uuid::Uuid::new_v4().to_string();
        debug!("Run {} entering {}", run_id, RunState::Start);
        Self {
            run_id,
            started_at: Utc::now(),
            states: vec![RunState::Start],
        }
    }

    fn enter(&mut self, state: RunState) {
        debug!("Run {} entering {}", self.run_id, state);
        self.states.push(state);
    }

    fn finish(self, status: RunStatus) -> RunResult {
        let completed_at = Utc::now();
        let duration_seconds =
            (completed_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        RunResult {
            run_id: self.run_id,
            status,
            states: self.states,
            good_id: None,
            stock_rows: 0,
            database_created: None,
            provisioning_error: None,
            validation_errors: Vec::new(),
            started_at: self.started_at,
            completed_at,
            duration_seconds,
        }
    }
}

/// What the store side of a run produced.
struct Persisted {
    database_created: bool,
    provisioning_error: Option<String>,
    good_id: i32,
    stock_rows: usize,
}

/// Sequences one validate-then-upsert run against a store.
pub struct Orchestrator {
    config: Config,
    store: Arc<dyn GoodsStore>,
}

impl Orchestrator {
    /// Create a new orchestrator.
    pub fn new(config: Config, store: Arc<dyn GoodsStore>) -> Self {
        Self { config, store }
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Validate and map the input without touching the store.
    pub async fn check(&self) -> Result<RunResult> {
        let mut run = Run::start();

        let document = match validator::load_and_validate(&self.config.input) {
            Ok(doc) => doc,
            Err(GoodsError::Validation { errors }) => return Ok(reject(run, errors)),
            Err(e) => return Err(e),
        };
        run.enter(RunState::Validated);

        let (good, stock) = mapper::to_records(&document)?;

        let mut result = run.finish(RunStatus::Validated);
        result.good_id = Some(good.id);
        result.stock_rows = stock.len();
        Ok(result)
    }

    /// Run validation, schema definition and the upsert.
    ///
    /// Rejected input is an `Ok` result with status [`RunStatus::Rejected`].
    /// Schema and write failures are returned as errors.
    pub async fn run(&self) -> Result<RunResult> {
        let mut run = Run::start();
        info!(
            "Starting run {} against {} store",
            run.run_id,
            self.store.store_type()
        );

        let document = match validator::load_and_validate(&self.config.input) {
            Ok(doc) => doc,
            Err(GoodsError::Validation { errors }) => return Ok(reject(run, errors)),
            Err(e) => return Err(e),
        };
        run.enter(RunState::Validated);

        // Every path past this point has used the store and must close it.
        let outcome = self.persist(&mut run, &document).await;
        self.store.close().await;

        let persisted = outcome?;
        run.enter(RunState::Done);

        let status = if persisted.database_created {
            RunStatus::Created
        } else {
            RunStatus::Updated
        };
        let mut result = run.finish(status);
        result.good_id = Some(persisted.good_id);
        result.stock_rows = persisted.stock_rows;
        result.database_created = Some(persisted.database_created);
        result.provisioning_error = persisted.provisioning_error;

        info!(
            "Run {} finished in {:.2}s: {}",
            result.run_id,
            result.duration_seconds,
            result.message()
        );
        Ok(result)
    }

    async fn persist(&self, run: &mut Run, document: &GoodDocument) -> Result<Persisted> {
        let (database_created, provisioning_error) = match self.store.ensure_database().await {
            Ok(created) => (created, None),
            Err(e) => {
                // Table creation below fails loudly if the database is really missing.
                warn!("{}; continuing with table creation", e);
                (false, Some(e.to_string()))
            }
        };

        if let Err(e) = self.store.ensure_schema().await {
            error!("{}", e);
            return Err(e);
        }
        run.enter(RunState::SchemaReady);

        let (good, stock) = mapper::to_records(document)?;
        if let Err(e) = self.store.write_records(&good, &stock).await {
            error!("{}; no changes were committed", e);
            return Err(e);
        }
        run.enter(RunState::Written);

        Ok(Persisted {
            database_created,
            provisioning_error,
            good_id: good.id,
            stock_rows: stock.len(),
        })
    }
}

fn reject(mut run: Run, errors: Vec<String>) -> RunResult {
    run.enter(RunState::Rejected);
    for e in &errors {
        warn!("Validation failed: {}", e);
    }
    let mut result = run.finish(RunStatus::Rejected);
    result.validation_errors = errors;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, InputConfig, TableConfig};
    use crate::target::MemoryStore;
    use serde_json::{json, Value};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn widget() -> Value {
        json!({
            "id": 1,
            "name": "Widget",
            "package_params": {"height": 2.0, "width": 3.0},
            "location_and_quantity": [
                {"location": "A", "amount": 5},
                {"location": "B", "amount": 7}
            ]
        })
    }

    fn data_file(data: &Value) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", data).unwrap();
        file
    }

    fn config_for(data: &NamedTempFile) -> Config {
        Config {
            database: DatabaseConfig {
                host: "localhost".to_string(),
                port: 5432,
                database: "les_sql_19".to_string(),
                user: "postgres".to_string(),
                password: String::new(),
                maintenance_database: "postgres".to_string(),
                ssl_mode: "disable".to_string(),
                connect_timeout_secs: 30,
            },
            input: InputConfig {
                schema_path: None,
                data_path: data.path().to_path_buf(),
            },
            tables: TableConfig::default(),
        }
    }

    async fn run_with(store: &Arc<MemoryStore>, data: &Value) -> Result<RunResult> {
        let file = data_file(data);
        let orchestrator = Orchestrator::new(config_for(&file), store.clone());
        orchestrator.run().await
    }

    #[tokio::test]
    async fn test_end_to_end_fresh_database() {
        let store = Arc::new(MemoryStore::new("les_sql_19"));
        let result = run_with(&store, &widget()).await.unwrap();

        assert_eq!(result.status, RunStatus::Created);
        assert_eq!(result.message(), "Records created in the database!");
        assert_eq!(
            result.states,
            vec![
                RunState::Start,
                RunState::Validated,
                RunState::SchemaReady,
                RunState::Written,
                RunState::Done
            ]
        );
        assert_eq!(result.good_id, Some(1));
        assert_eq!(result.stock_rows, 2);
        assert_eq!(result.database_created, Some(true));

        let good = store.fetch_good(1).await.unwrap().unwrap();
        assert_eq!(good.name, "Widget");
        assert_eq!(good.package_height, 2.0);
        assert_eq!(good.package_width, 3.0);

        let stock = store.fetch_stock(1).await.unwrap();
        let rows: Vec<_> = stock
            .iter()
            .map(|s| (s.good_id, s.location.as_str(), s.amount))
            .collect();
        assert_eq!(rows, vec![(1, "A", 5), (1, "B", 7)]);
        assert!(store.is_closed());
    }

    #[tokio::test]
    async fn test_rerun_updates_instead_of_duplicating() {
        let store = Arc::new(MemoryStore::new("les_sql_19"));
        run_with(&store, &widget()).await.unwrap();

        let mut changed = widget();
        changed["location_and_quantity"][0]["amount"] = json!(10);
        let result = run_with(&store, &changed).await.unwrap();

        assert_eq!(result.status, RunStatus::Updated);
        assert_eq!(result.message(), "Records updated in the database!");
        assert_eq!(result.database_created, Some(false));

        let stock = store.fetch_stock(1).await.unwrap();
        assert_eq!(stock.len(), 2);
        assert_eq!(stock[0].location, "A");
        assert_eq!(stock[0].amount, 10);
        assert_eq!(stock[1].amount, 7);
        assert_eq!(store.stock_count(), 2);
    }

    #[tokio::test]
    async fn test_same_good_twice_keeps_latest_values() {
        let store = Arc::new(MemoryStore::with_existing_database("les_sql_19"));
        run_with(&store, &widget()).await.unwrap();

        let mut renamed = widget();
        renamed["name"] = json!("Widget Mk II");
        renamed["package_params"]["width"] = json!(4.5);
        run_with(&store, &renamed).await.unwrap();

        assert_eq!(store.goods_count(), 1);
        let good = store.fetch_good(1).await.unwrap().unwrap();
        assert_eq!(good.name, "Widget Mk II");
        assert_eq!(good.package_width, 4.5);
    }

    #[tokio::test]
    async fn test_duplicate_location_keeps_latest_amount() {
        let store = Arc::new(MemoryStore::with_existing_database("les_sql_19"));
        let mut data = widget();
        data["location_and_quantity"] = json!([
            {"location": "A", "amount": 5},
            {"location": "A", "amount": 9}
        ]);

        let result = run_with(&store, &data).await.unwrap();
        assert_eq!(result.stock_rows, 2);

        let stock = store.fetch_stock(1).await.unwrap();
        assert_eq!(stock.len(), 1);
        assert_eq!(stock[0].amount, 9);
    }

    #[tokio::test]
    async fn test_invalid_input_never_touches_store() {
        let store = Arc::new(MemoryStore::with_existing_database("les_sql_19"));
        let mut data = widget();
        data.as_object_mut().unwrap().remove("name");

        let result = run_with(&store, &data).await.unwrap();

        assert_eq!(result.status, RunStatus::Rejected);
        assert_eq!(result.states, vec![RunState::Start, RunState::Rejected]);
        assert_eq!(result.validation_errors.len(), 1);
        assert!(result.validation_errors[0].contains("name"));
        assert_eq!(result.database_created, None);
        assert_eq!(store.store_calls(), 0);
        assert!(!store.is_closed());
        assert_eq!(store.goods_count(), 0);
        assert_eq!(store.stock_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_json_is_rejected() {
        let store = Arc::new(MemoryStore::new("les_sql_19"));
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{\"id\": 1,").unwrap();

        let orchestrator = Orchestrator::new(config_for(&file), store.clone());
        let result = orchestrator.run().await.unwrap();

        assert_eq!(result.status, RunStatus::Rejected);
        assert_eq!(store.store_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_data_file_is_io_error() {
        let store = Arc::new(MemoryStore::new("les_sql_19"));
        let file = data_file(&widget());
        let mut config = config_for(&file);
        config.input.data_path = "/nonexistent/goods.data.json".into();

        let err = Orchestrator::new(config, store.clone())
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, GoodsError::Io(_)));
        assert_eq!(store.store_calls(), 0);
    }

    #[tokio::test]
    async fn test_provisioning_failure_is_not_fatal() {
        let store = Arc::new(MemoryStore::with_existing_database("les_sql_19").fail_provisioning());
        let result = run_with(&store, &widget()).await.unwrap();

        assert_eq!(result.status, RunStatus::Updated);
        assert_eq!(result.database_created, Some(false));
        assert!(result
            .provisioning_error
            .as_deref()
            .unwrap()
            .contains("permission denied"));
        assert_eq!(store.stock_count(), 2);
    }

    #[tokio::test]
    async fn test_provisioning_failure_then_missing_database_fails_schema() {
        let store = Arc::new(MemoryStore::new("les_sql_19").fail_provisioning());
        let err = run_with(&store, &widget()).await.unwrap_err();

        assert!(matches!(err, GoodsError::Schema(_)));
        assert!(store.is_closed());
    }

    #[tokio::test]
    async fn test_schema_failure_stops_before_write() {
        let store = Arc::new(MemoryStore::with_existing_database("les_sql_19").fail_schema());
        let err = run_with(&store, &widget()).await.unwrap_err();

        assert!(matches!(err, GoodsError::Schema(_)));
        // ensure_database + ensure_schema, no write attempt
        assert_eq!(store.store_calls(), 2);
        assert!(store.is_closed());
    }

    #[tokio::test]
    async fn test_write_failure_commits_nothing() {
        let store = Arc::new(MemoryStore::new("les_sql_19").fail_stock_write_at(2));
        let err = run_with(&store, &widget()).await.unwrap_err();

        assert!(matches!(err, GoodsError::Write { .. }));
        assert_eq!(store.goods_count(), 0);
        assert_eq!(store.stock_count(), 0);
        assert!(store.is_closed());
    }

    #[tokio::test]
    async fn test_whole_number_floats_written_as_integers() {
        let store = Arc::new(MemoryStore::new("les_sql_19"));
        let mut data = widget();
        data["id"] = json!(1.0);
        data["location_and_quantity"][0]["amount"] = json!(5.0);

        let result = run_with(&store, &data).await.unwrap();

        assert_eq!(result.status, RunStatus::Created);
        assert_eq!(result.good_id, Some(1));
        let stock = store.fetch_stock(1).await.unwrap();
        assert_eq!(stock[0].location, "A");
        assert_eq!(stock[0].amount, 5);
    }

    #[tokio::test]
    async fn test_mapping_failure_after_schema_writes_nothing() {
        // A custom schema without range limits lets an oversized amount through.
        let mut schema = NamedTempFile::new().unwrap();
        write!(schema, "{}", json!({"type": "object"})).unwrap();
        let mut data = widget();
        data["location_and_quantity"][1]["amount"] = json!(3_000_000_000i64);
        let file = data_file(&data);

        let mut config = config_for(&file);
        config.input.schema_path = Some(schema.path().to_path_buf());
        let store = Arc::new(MemoryStore::new("les_sql_19"));

        let err = Orchestrator::new(config, store.clone())
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, GoodsError::Mapping(_)));
        assert!(err.to_string().contains("location_and_quantity[1].amount"));
        // ensure_database + ensure_schema, no write attempt
        assert_eq!(store.store_calls(), 2);
        assert_eq!(store.goods_count(), 0);
        assert!(store.is_closed());
    }

    #[tokio::test]
    async fn test_builtin_schema_rejects_oversized_amount() {
        let store = Arc::new(MemoryStore::new("les_sql_19"));
        let mut data = widget();
        data["location_and_quantity"][1]["amount"] = json!(3_000_000_000i64);

        let result = run_with(&store, &data).await.unwrap();

        assert_eq!(result.status, RunStatus::Rejected);
        assert_eq!(store.store_calls(), 0);
    }

    #[test]
    fn test_orchestrator_exposes_config_and_store_type() {
        let store = Arc::new(MemoryStore::new("les_sql_19"));
        let file = data_file(&widget());
        let orchestrator = Orchestrator::new(config_for(&file), store.clone());

        assert_eq!(orchestrator.config().database.database, "les_sql_19");
        assert_eq!(orchestrator.config().input.data_path, file.path());
        assert_eq!(orchestrator.store.store_type(), "memory");
    }

    #[tokio::test]
    async fn test_check_validates_without_store() {
        let store = Arc::new(MemoryStore::new("les_sql_19"));
        let file = data_file(&widget());
        let orchestrator = Orchestrator::new(config_for(&file), store.clone());

        let result = orchestrator.check().await.unwrap();
        assert_eq!(result.status, RunStatus::Validated);
        assert_eq!(result.states, vec![RunState::Start, RunState::Validated]);
        assert_eq!(result.good_id, Some(1));
        assert_eq!(result.stock_rows, 2);
        assert_eq!(store.store_calls(), 0);
    }

    #[tokio::test]
    async fn test_result_json() {
        let store = Arc::new(MemoryStore::new("les_sql_19"));
        let result = run_with(&store, &widget()).await.unwrap();

        let parsed: Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        assert_eq!(parsed["status"], "created");
        assert_eq!(parsed["states"][2], "schema_ready");
        assert_eq!(parsed["stock_rows"], 2);
        assert!(parsed.get("validation_errors").is_none());
    }
}
