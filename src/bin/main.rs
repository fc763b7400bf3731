//! Quarry CLI - Compile metric queries to warehouse SQL and run them
//!
//! Usage:
//!   quarry compile <explore.json> <query.json> [--dialect <dialect>] [--warehouse <name>]
//!   quarry run <explore.json> <query.json> [--warehouse <name>]
//!   quarry catalog <db.schema.table>... [--warehouse <name>]
//!   quarry types <dialect>
//!
//! Examples:
//!   quarry compile orders.explore.json top_statuses.json --dialect bigquery
//!   quarry run orders.explore.json top_statuses.json --warehouse analytics
//!   quarry catalog analytics.public.orders analytics.public.users

use clap::{Parser, Subcommand, ValueEnum};
use futures::TryStreamExt;
use quarry::compile::CompileError;
use quarry::config::{Settings, SettingsError};
use quarry::model::{CompiledMetricQuery, Explore, WeekDay};
use quarry::sql::Dialect;
use quarry::warehouse::{connect_warehouse, CatalogRequest, WarehouseClient, WarehouseError};
use quarry::worker::{WorkerClient, WorkerConnector, WorkerError};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quarry")]
#[command(about = "Quarry - Compile metric queries to warehouse SQL")]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to quarry.toml or ~/.config/quarry/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a metric query to SQL
    Compile {
        /// Path to the explore JSON file
        explore: PathBuf,

        /// Path to the compiled metric query JSON file
        query: PathBuf,

        /// SQL dialect to generate (ignored when --warehouse is given)
        #[arg(short, long, default_value = "postgres")]
        dialect: DialectArg,

        /// Use the dialect and week start of a configured warehouse
        #[arg(short, long)]
        warehouse: Option<String>,

        /// First day of the week, 0 = Monday through 6 = Sunday
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=6))]
        start_of_week: Option<u8>,

        /// Output format
        #[arg(short, long, default_value = "sql")]
        output: OutputFormat,
    },

    /// Compile a metric query, run it and print rows as NDJSON
    Run {
        /// Path to the explore JSON file
        explore: PathBuf,

        /// Path to the compiled metric query JSON file
        query: PathBuf,

        /// Configured warehouse to run against (defaults to "default" or the first one)
        #[arg(short, long)]
        warehouse: Option<String>,
    },

    /// Fetch column types for tables and print the catalog as JSON
    Catalog {
        /// Tables as database.schema.table
        #[arg(required = true)]
        tables: Vec<String>,

        /// Configured warehouse to introspect
        #[arg(short, long)]
        warehouse: Option<String>,
    },

    /// Show a dialect's native type mapping
    Types {
        /// SQL dialect
        dialect: DialectArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Postgres,
    Redshift,
    Bigquery,
    Snowflake,
    Duckdb,
    Databricks,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Redshift => Dialect::Redshift,
            DialectArg::Bigquery => Dialect::BigQuery,
            DialectArg::Snowflake => Dialect::Snowflake,
            DialectArg::Duckdb => Dialect::DuckDb,
            DialectArg::Databricks => Dialect::Databricks,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Output SQL only
    Sql,
    /// Output SQL with comments
    Verbose,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("Error reading file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Error parsing '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid table '{0}': expected database.schema.table")]
    InvalidTable(String),

    #[error("Configuration error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Compilation error: {0}")]
    Compile(#[from] CompileError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Warehouse error: {0}")]
    Warehouse(#[from] WarehouseError),

    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),

    #[error("Output error: {0}")]
    Encode(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile {
            explore,
            query,
            dialect,
            warehouse,
            start_of_week,
            output,
        } => cmd_compile(
            cli.config.as_deref(),
            &explore,
            &query,
            dialect,
            warehouse.as_deref(),
            start_of_week,
            output,
        ),
        Commands::Run {
            explore,
            query,
            warehouse,
        } => block_on(cmd_run(
            cli.config.as_deref(),
            &explore,
            &query,
            warehouse.as_deref(),
        )),
        Commands::Catalog { tables, warehouse } => block_on(cmd_catalog(
            cli.config.as_deref(),
            &tables,
            warehouse.as_deref(),
        )),
        Commands::Types { dialect } => cmd_types(dialect),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr, filtered by `QUARRY_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_env("QUARRY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn block_on<F: std::future::Future<Output = Result<(), CliError>>>(future: F) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(future)
}

fn load_settings(path: Option<&Path>) -> Result<Settings, CliError> {
    Ok(match path {
        Some(path) => Settings::from_file(path)?,
        None => Settings::load()?,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let source = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&source).map_err(|source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn cmd_compile(
    config: Option<&Path>,
    explore_path: &Path,
    query_path: &Path,
    dialect: DialectArg,
    warehouse: Option<&str>,
    start_of_week: Option<u8>,
    output: OutputFormat,
) -> Result<(), CliError> {
    let explore: Explore = read_json(explore_path)?;
    let query: CompiledMetricQuery = read_json(query_path)?;

    let (dialect, start_of_week) = match warehouse {
        Some(name) => {
            let settings = load_settings(config)?;
            let credentials = settings.get_warehouse(name)?;
            (credentials.dialect(), credentials.policy().start_of_week)
        }
        None => (dialect.into(), start_of_week.and_then(WeekDay::from_index)),
    };

    let sql_dialect = dialect.build(start_of_week);
    let compiled = quarry::compile::build_query(&explore, &query, sql_dialect.as_ref())?;

    match output {
        OutputFormat::Sql => println!("{}", compiled.query),
        OutputFormat::Verbose => {
            println!("-- Quarry Compiled SQL");
            println!("-- Explore: {}", explore.name);
            println!("-- Dialect: {}", dialect);
            println!("-- Fingerprint: {}", compiled.fingerprint());
            if compiled.has_example_metric {
                println!("-- Uses an auto-generated example metric");
            }
            println!();
            println!("{}", compiled.query);
        }
    }
    Ok(())
}

async fn open_client(
    config: Option<&Path>,
    warehouse: Option<&str>,
) -> Result<Box<dyn WarehouseClient>, CliError> {
    let settings = load_settings(config)?;
    let (name, credentials) = settings.warehouse(warehouse)?;
    tracing::info!(warehouse = %name, dialect = %credentials.dialect(), "using warehouse");

    let worker = Arc::new(WorkerClient::spawn_with_settings(&settings).await?);
    let connector = Arc::new(WorkerConnector::new(worker, credentials.clone()));
    Ok(connect_warehouse(credentials, connector, &settings))
}

async fn cmd_run(
    config: Option<&Path>,
    explore_path: &Path,
    query_path: &Path,
    warehouse: Option<&str>,
) -> Result<(), CliError> {
    let explore: Explore = read_json(explore_path)?;
    let mut query: CompiledMetricQuery = read_json(query_path)?;
    query.reference_time.get_or_insert_with(chrono::Utc::now);

    let client = open_client(config, warehouse).await?;
    let compiled = client.compile(&explore, &query)?;
    tracing::debug!(sql = %compiled.query, "compiled query");

    let mut rows = client.run_query(&compiled.query).await?;
    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    while let Some(row) = rows.try_next().await? {
        serde_json::to_writer(&mut out, &row)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

async fn cmd_catalog(
    config: Option<&Path>,
    tables: &[String],
    warehouse: Option<&str>,
) -> Result<(), CliError> {
    let requests = tables
        .iter()
        .map(|t| t.parse::<CatalogRequest>().map_err(|_| CliError::InvalidTable(t.clone())))
        .collect::<Result<Vec<_>, _>>()?;

    let client = open_client(config, warehouse).await?;
    let catalog = client.get_catalog(&requests).await?;
    println!("{}", serde_json::to_string_pretty(&catalog)?);
    Ok(())
}

fn cmd_types(dialect: DialectArg) -> Result<(), CliError> {
    let dialect = Dialect::from(dialect).build(None);
    println!("{:<32} canonical", "native");
    for (native, canonical) in dialect.native_types() {
        println!("{:<32} {}", native, canonical);
    }
    Ok(())
}
