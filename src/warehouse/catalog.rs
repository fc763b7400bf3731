//! Catalog introspection.
//!
//! Requests are grouped by database. Each database gets one session, shared
//! by that database's table fetches, which run with bounded concurrency.
//! Databases are introspected concurrently.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::try_join_all;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::error::{WarehouseError, WarehouseResult};
use super::session::{CursorRequest, NativeColumn, TableRef, WarehouseSession};
use super::stream::with_timeout;
use crate::model::types::DimensionType;
use crate::sql::dialect::{CatalogSource, SqlDialect};

/// One table to introspect.
pub type CatalogRequest = TableRef;

/// Column name to canonical type.
pub type TableColumns = BTreeMap<String, DimensionType>;

/// database → schema → table → column → canonical type.
pub type WarehouseCatalog = BTreeMap<String, BTreeMap<String, BTreeMap<String, TableColumns>>>;

/// Merge per-table results into a catalog. Later duplicates win.
pub fn merge_catalog<I>(tables: I) -> WarehouseCatalog
where
    I: IntoIterator<Item = (CatalogRequest, TableColumns)>,
{
    let mut catalog = WarehouseCatalog::new();
    for (table, columns) in tables {
        catalog
            .entry(table.database)
            .or_default()
            .entry(table.schema)
            .or_default()
            .insert(table.table, columns);
    }
    catalog
}

/// Map native columns to canonical types with a dialect's type table.
pub fn map_columns(dialect: &dyn SqlDialect, columns: &[NativeColumn]) -> TableColumns {
    columns
        .iter()
        .map(|c| (c.name.clone(), dialect.map_native_type(&c.data_type)))
        .collect()
}

/// How catalog fetches are run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogOptions {
    /// Table fetches in flight per database.
    pub concurrency: usize,
    pub page_size: usize,
    pub timeout: Option<std::time::Duration>,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            page_size: 1000,
            timeout: None,
        }
    }
}

/// Fetch the catalog for a set of tables.
///
/// `connect` opens the session for one database. Missing tables are left out
/// of the result. Any other failure names the table it happened on. When a
/// triple is requested twice, the later request wins.
pub async fn fetch_catalog<F, Fut>(
    dialect: &dyn SqlDialect,
    requests: &[CatalogRequest],
    options: CatalogOptions,
    connect: F,
) -> WarehouseResult<WarehouseCatalog>
where
    F: Fn(String) -> Fut,
    Fut: std::future::Future<Output = WarehouseResult<Arc<dyn WarehouseSession>>>,
{
    let mut by_database: BTreeMap<String, Vec<(usize, CatalogRequest)>> = BTreeMap::new();
    for (index, request) in requests.iter().enumerate() {
        by_database
            .entry(request.database.clone())
            .or_default()
            .push((index, request.clone()));
    }

    info!(
        tables = requests.len(),
        databases = by_database.len(),
        "fetching catalog"
    );

    let groups = by_database.into_iter().map(|(database, tables)| {
        let session = connect(database);
        async move {
            let session = session.await?;
            fetch_database(dialect, session, tables, options).await
        }
    });
    let mut fetched: Vec<_> = try_join_all(groups).await?.into_iter().flatten().collect();
    fetched.sort_by_key(|(index, _, _)| *index);

    let catalog = merge_catalog(
        fetched
            .into_iter()
            .map(|(_, table, columns)| (table, columns)),
    );
    info!(databases = catalog.len(), "catalog fetched");
    Ok(catalog)
}

async fn fetch_database(
    dialect: &dyn SqlDialect,
    session: Arc<dyn WarehouseSession>,
    tables: Vec<(usize, CatalogRequest)>,
    options: CatalogOptions,
) -> WarehouseResult<Vec<(usize, CatalogRequest, TableColumns)>> {
    let mut fetches = stream::iter(tables)
        .map(|(index, table)| {
            let session = Arc::clone(&session);
            async move {
                let result = fetch_table(dialect, session.as_ref(), &table, options).await;
                (index, table, result)
            }
        })
        .buffer_unordered(options.concurrency.max(1));

    let mut found = Vec::new();
    let mut first_error = None;
    while let Some((index, table, result)) = fetches.next().await {
        match result {
            Ok(Some(columns)) => {
                debug!(table = %table, columns = columns.len(), "table metadata fetched");
                let columns = map_columns(dialect, &columns);
                found.push((index, table, columns));
            }
            Ok(None) => {
                debug!(table = %table, "table not found, leaving it out of the catalog");
            }
            Err(err) => {
                let err = err.context(&format!("Failed to fetch table metadata for '{}'", table));
                warn!(table = %table, error = %err, "table metadata fetch failed");
                // A connection failure drops the database's pending fetches.
                if err.is_connection() {
                    return Err(err);
                }
                first_error.get_or_insert(err);
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(found),
    }
}

/// Fetch one table's native columns. `Ok(None)` means the table is missing.
pub async fn fetch_table(
    dialect: &dyn SqlDialect,
    session: &dyn WarehouseSession,
    table: &CatalogRequest,
    options: CatalogOptions,
) -> WarehouseResult<Option<Vec<NativeColumn>>> {
    match dialect.catalog_source() {
        CatalogSource::NativeApi => {
            with_timeout(options.timeout, session.table_columns(table)).await
        }
        CatalogSource::InformationSchema => {
            let sql = dialect.table_columns_sql(&table.database, &table.schema, &table.table);
            let rows = read_all(session, &sql, options).await?;
            let columns = rows
                .into_iter()
                .map(metadata_column)
                .collect::<WarehouseResult<Vec<_>>>()?;
            Ok((!columns.is_empty()).then_some(columns))
        }
    }
}

async fn read_all(
    session: &dyn WarehouseSession,
    sql: &str,
    options: CatalogOptions,
) -> WarehouseResult<Vec<Value>> {
    let cursor = with_timeout(options.timeout, session.open_cursor(&CursorRequest::new(sql))).await?;

    let mut rows = Vec::new();
    let result = loop {
        match with_timeout(
            options.timeout,
            session.fetch_page(&cursor.cursor_id, options.page_size),
        )
        .await
        {
            Ok(page) => {
                rows.extend(page.rows);
                if page.done {
                    break Ok(rows);
                }
            }
            Err(err) => break Err(err),
        }
    };

    if let Err(err) = session.close_cursor(&cursor.cursor_id).await {
        warn!(cursor = %cursor.cursor_id, error = %err, "failed to close cursor");
    }
    result
}

/// Read `(column_name, data_type)` from one metadata row.
fn metadata_column(row: Value) -> WarehouseResult<NativeColumn> {
    let (name, data_type) = match &row {
        Value::Array(cells) => (cells.first(), cells.get(1)),
        Value::Object(cells) => (cells.get("column_name"), cells.get("data_type")),
        _ => (None, None),
    };
    match (name.and_then(Value::as_str), data_type.and_then(Value::as_str)) {
        (Some(name), Some(data_type)) => Ok(NativeColumn::new(name, data_type)),
        _ => Err(WarehouseError::query(format!(
            "Unexpected column metadata row: {}",
            row
        ))),
    }
}
