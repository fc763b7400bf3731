//! Per-dialect warehouse clients.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::catalog::{fetch_catalog, CatalogOptions, CatalogRequest, WarehouseCatalog};
use super::error::WarehouseResult;
use super::session::{CursorRequest, OpenCursor, SessionConnector, WarehouseSession};
use super::stream::{with_timeout, QueryState, ResultField, RowStream, StreamOptions};
use crate::compile::{build_query, CompileResult, CompiledQuery};
use crate::config::{SessionPolicy, Settings, WarehouseCredentials};
use crate::model::explore::{Explore, Metric};
use crate::model::query::CompiledMetricQuery;
use crate::model::types::WeekDay;
use crate::sql::dialect::{
    BigQuery, Databricks, Dialect, DuckDb, Postgres, QuoteChars, Redshift, ResultSchema,
    Snowflake, SqlDialect,
};

/// Delay before the first connection retry. Doubles on each attempt.
const RETRY_BASE_DELAY_MS: u64 = 200;

/// Upper bound on the retry delay.
const RETRY_MAX_DELAY_MS: u64 = 5_000;

/// A client for one configured warehouse.
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// The dialect SQL is compiled for.
    fn dialect(&self) -> &dyn SqlDialect;

    fn quote_chars(&self) -> QuoteChars {
        self.dialect().quote_chars()
    }

    fn start_of_week(&self) -> Option<WeekDay> {
        self.dialect().start_of_week()
    }

    /// Aggregate SQL for a metric over `sql`.
    fn metric_expression(&self, sql: &str, metric: &Metric) -> String {
        self.dialect().metric_sql(sql, metric)
    }

    /// Compile a metric query in this warehouse's dialect.
    fn compile(
        &self,
        explore: &Explore,
        query: &CompiledMetricQuery,
    ) -> CompileResult<CompiledQuery> {
        build_query(explore, query, self.dialect())
    }

    /// Open and release a session.
    async fn test_connection(&self) -> WarehouseResult<()>;

    /// Execute one statement and stream its rows.
    async fn run_query(&self, sql: &str) -> WarehouseResult<RowStream>;

    /// Introspect the given tables.
    async fn get_catalog(&self, requests: &[CatalogRequest]) -> WarehouseResult<WarehouseCatalog>;
}

/// Execution settings of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    pub stream: StreamOptions,
    /// Extra connection attempts after a failed one.
    pub retries: u32,
    /// Table fetches in flight per database.
    pub catalog_concurrency: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            stream: StreamOptions::default(),
            retries: 0,
            catalog_concurrency: CatalogOptions::default().concurrency,
        }
    }
}

impl ClientOptions {
    pub fn new(policy: &SessionPolicy, settings: &Settings) -> Self {
        Self {
            stream: StreamOptions {
                page_size: settings.streaming.page_size,
                buffered_pages: settings.streaming.buffered_pages,
                timeout: policy.timeout(),
            },
            retries: policy.retries,
            catalog_concurrency: settings.catalog.concurrency,
        }
    }

    fn catalog(&self) -> CatalogOptions {
        CatalogOptions {
            concurrency: self.catalog_concurrency,
            page_size: self.stream.page_size,
            timeout: self.stream.timeout,
        }
    }
}

/// Warehouse client generic over its dialect.
///
/// Sessions come from the connector; everything dialect-specific (quoting,
/// aggregates, type mapping, schema and catalog strategy) comes from `D`.
pub struct SqlWarehouseClient<D> {
    dialect: D,
    connector: Arc<dyn SessionConnector>,
    options: ClientOptions,
}

pub type PostgresWarehouseClient = SqlWarehouseClient<Postgres>;
pub type RedshiftWarehouseClient = SqlWarehouseClient<Redshift>;
pub type BigQueryWarehouseClient = SqlWarehouseClient<BigQuery>;
pub type SnowflakeWarehouseClient = SqlWarehouseClient<Snowflake>;
pub type DuckDbWarehouseClient = SqlWarehouseClient<DuckDb>;
pub type DatabricksWarehouseClient = SqlWarehouseClient<Databricks>;

impl<D: SqlDialect> SqlWarehouseClient<D> {
    pub fn new(dialect: D, connector: Arc<dyn SessionConnector>, options: ClientOptions) -> Self {
        Self {
            dialect,
            connector,
            options,
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Open a session, retrying connection failures up to the policy's limit.
    async fn open_session(&self, database: Option<&str>) -> WarehouseResult<Arc<dyn WarehouseSession>> {
        let mut attempt = 0;
        loop {
            match self.connector.connect(database).await {
                Ok(session) => {
                    debug!(
                        backend = self.connector.backend(),
                        database = database.unwrap_or_default(),
                        "session opened"
                    );
                    return Ok(session);
                }
                Err(err) if err.is_connection() && attempt < self.options.retries => {
                    let delay = retry_delay(attempt);
                    attempt += 1;
                    warn!(
                        backend = self.connector.backend(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "connection failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Open the statement's cursor and resolve its result fields.
    async fn open(
        &self,
        session: &dyn WarehouseSession,
        sql: &str,
    ) -> WarehouseResult<(OpenCursor, Vec<ResultField>)> {
        let timeout = self.options.stream.timeout;

        let described = match self.dialect.result_schema() {
            ResultSchema::DryRun => {
                let dry = with_timeout(timeout, session.open_cursor(&CursorRequest::dry_run(sql)))
                    .await?;
                if let Err(err) = session.close_cursor(&dry.cursor_id).await {
                    warn!(cursor = %dry.cursor_id, error = %err, "failed to close dry-run cursor");
                }
                Some(dry.columns)
            }
            ResultSchema::ResultMetadata => None,
        };

        let cursor = with_timeout(timeout, session.open_cursor(&CursorRequest::new(sql))).await?;
        let columns = described.as_ref().unwrap_or(&cursor.columns);
        let fields = columns
            .iter()
            .map(|c| ResultField::new(&c.name, self.dialect.map_native_type(&c.data_type)))
            .collect();
        Ok((cursor, fields))
    }
}

fn retry_delay(attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt);
    Duration::from_millis(RETRY_BASE_DELAY_MS.saturating_mul(factor).min(RETRY_MAX_DELAY_MS))
}

#[async_trait]
impl<D: SqlDialect> WarehouseClient for SqlWarehouseClient<D> {
    fn dialect(&self) -> &dyn SqlDialect {
        &self.dialect
    }

    async fn test_connection(&self) -> WarehouseResult<()> {
        self.open_session(None).await.map(|_| ())
    }

    async fn run_query(&self, sql: &str) -> WarehouseResult<RowStream> {
        let (state, _) = watch::channel(QueryState::Idle);
        let session = self.open_session(None).await?;

        state.send_replace(QueryState::Executing);
        info!(dialect = self.dialect.name(), "executing query");

        match self.open(session.as_ref(), sql).await {
            Ok((cursor, fields)) => {
                debug!(cursor = %cursor.cursor_id, columns = fields.len(), "cursor opened");
                Ok(RowStream::spawn(
                    session,
                    cursor.cursor_id,
                    fields,
                    self.options.stream,
                    state,
                ))
            }
            Err(err) => {
                state.send_replace(QueryState::Failed);
                warn!(dialect = self.dialect.name(), error = %err, "query failed");
                Err(err)
            }
        }
    }

    async fn get_catalog(&self, requests: &[CatalogRequest]) -> WarehouseResult<WarehouseCatalog> {
        fetch_catalog(&self.dialect, requests, self.options.catalog(), |database| async move {
            self.open_session(Some(&database)).await
        })
        .await
    }
}

/// Build the client for a set of credentials.
pub fn connect_warehouse(
    credentials: &WarehouseCredentials,
    connector: Arc<dyn SessionConnector>,
    settings: &Settings,
) -> Box<dyn WarehouseClient> {
    let policy = credentials.policy();
    let options = ClientOptions::new(policy, settings);
    let start_of_week = policy.start_of_week;

    match credentials.dialect() {
        Dialect::Postgres => Box::new(PostgresWarehouseClient::new(
            Postgres::new(start_of_week),
            connector,
            options,
        )),
        Dialect::Redshift => Box::new(RedshiftWarehouseClient::new(
            Redshift::new(start_of_week),
            connector,
            options,
        )),
        Dialect::BigQuery => Box::new(BigQueryWarehouseClient::new(
            BigQuery::new(start_of_week),
            connector,
            options,
        )),
        Dialect::Snowflake => Box::new(SnowflakeWarehouseClient::new(
            Snowflake::new(start_of_week),
            connector,
            options,
        )),
        Dialect::DuckDb => Box::new(DuckDbWarehouseClient::new(
            DuckDb::new(start_of_week),
            connector,
            options,
        )),
        Dialect::Databricks => Box::new(DatabricksWarehouseClient::new(
            Databricks::new(start_of_week),
            connector,
            options,
        )),
    }
}
