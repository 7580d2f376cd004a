//! goods-loader CLI - validate a goods document and upsert it into PostgreSQL.

use clap::Parser;
use goods_loader::error::{EXIT_SUCCESS, EXIT_VALIDATION_ERROR};
use goods_loader::{Config, GoodsError, Orchestrator, PgStore, RunResult, RunStatus};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "goods-loader")]
#[command(about = "Validate a warehouse goods document and upsert it into PostgreSQL")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Override the JSON Schema path
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Override the data document path
    #[arg(long)]
    data: Option<PathBuf>,

    /// Validate and map the document without touching the database
    #[arg(long)]
    validate_only: bool,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(RunStatus::Rejected) => ExitCode::from(EXIT_VALIDATION_ERROR),
        Ok(_) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<RunStatus, GoodsError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(GoodsError::Config)?;

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    if let Some(schema) = cli.schema {
        config.input.schema_path = Some(schema);
    }
    if let Some(data) = cli.data {
        config.input.data_path = data;
    }

    let store = PgStore::new(&config.database, &config.tables)?;
    let orchestrator = Orchestrator::new(config, Arc::new(store));
    info!(
        "Loading {:?} into {}",
        orchestrator.config().input.data_path,
        orchestrator.config().database.database
    );

    let result = if cli.validate_only {
        orchestrator.check().await?
    } else {
        orchestrator.run().await?
    };

    report(&result, cli.output_json)?;
    Ok(result.status)
}

fn report(result: &RunResult, output_json: bool) -> Result<(), GoodsError> {
    if output_json {
        println!("{}", result.to_json()?);
        return Ok(());
    }

    println!("{}", result.message());
    println!("  Run ID: {}", result.run_id);
    println!("  Duration: {:.2}s", result.duration_seconds);
    if let Some(id) = result.good_id {
        println!("  Good: {} ({} stock rows)", id, result.stock_rows);
    }
    if let Some(err) = &result.provisioning_error {
        println!("  Provisioning warning: {}", err);
    }
    for err in &result.validation_errors {
        println!("  - {}", err);
    }
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("unknown verbosity '{}'", other)),
    };

    // stdout carries the result; logs go to stderr.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("unknown log format '{}'", other)),
    }

    Ok(())
}
