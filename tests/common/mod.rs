//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use quarry::model::{CompiledTable, Dimension, DimensionType, Explore, Metric, MetricType};
use quarry::sql::SqlDialect;
use quarry::warehouse::{
    CursorRequest, NativeColumn, OpenCursor, ResultPage, SessionConnector, TableRef,
    WarehouseError, WarehouseResult, WarehouseSession,
};

// ============================================================================
// Explore fixture
// ============================================================================

/// `orders` joined to `customers`, with one metric of every common kind.
pub fn orders_explore() -> Explore {
    Explore::new(
        "orders",
        CompiledTable::new("orders", "orders")
            .with_database("analytics")
            .with_schema("public")
            .with_dimension(Dimension::new(
                "orders",
                "status",
                DimensionType::String,
                "${TABLE}.status",
            ))
            .with_dimension(Dimension::new(
                "orders",
                "created",
                DimensionType::Timestamp,
                "${TABLE}.created_at",
            ))
            .with_dimension(Dimension::new(
                "orders",
                "amount",
                DimensionType::Number,
                "${TABLE}.amount",
            ))
            .with_dimension(Dimension::new(
                "orders",
                "is_gift",
                DimensionType::Boolean,
                "${TABLE}.is_gift",
            ))
            .with_metric(Metric::new(
                "orders",
                "count",
                MetricType::Count,
                "${TABLE}.order_id",
            ))
            .with_metric(Metric::new(
                "orders",
                "total_amount",
                MetricType::Sum,
                "${TABLE}.amount",
            ))
            .with_metric(Metric::new(
                "orders",
                "median_amount",
                MetricType::Median,
                "${TABLE}.amount",
            ))
            .with_metric(
                Metric::new(
                    "orders",
                    "p90_amount",
                    MetricType::Percentile,
                    "${TABLE}.amount",
                )
                .with_percentile(90.0),
            ),
    )
    .with_join(
        CompiledTable::new("customers", "customers")
            .with_database("analytics")
            .with_schema("public")
            .with_dimension(Dimension::new(
                "customers",
                "country",
                DimensionType::String,
                "${TABLE}.country",
            ))
            .with_metric(Metric::new(
                "customers",
                "unique_customers",
                MetricType::CountDistinct,
                "${TABLE}.customer_id",
            )),
        "${orders}.customer_id = ${customers}.customer_id",
    )
}

// ============================================================================
// In-memory warehouse
// ============================================================================

#[derive(Debug, Clone)]
struct Statement {
    columns: Vec<NativeColumn>,
    rows: Vec<Value>,
}

/// Backend state shared by every session of a [`MemoryConnector`].
#[derive(Default)]
pub struct MemoryWarehouse {
    statements: Mutex<HashMap<String, Statement>>,
    tables: Mutex<BTreeMap<TableRef, Vec<NativeColumn>>>,
    table_failures: Mutex<HashMap<TableRef, WarehouseError>>,
    statement_failures: Mutex<HashMap<String, WarehouseError>>,
    report_columns_on_open: Mutex<bool>,
    fetch_delay: Mutex<Option<Duration>>,
    cursors: Mutex<HashMap<String, (String, usize)>>,
    next_cursor: AtomicUsize,

    pub opened: Mutex<Vec<CursorRequest>>,
    pub fetches: AtomicUsize,
    pub closes: AtomicUsize,
    pub native_lookups: AtomicUsize,
}

impl MemoryWarehouse {
    pub fn new() -> Arc<Self> {
        let warehouse = Self::default();
        *warehouse.report_columns_on_open.lock().unwrap() = true;
        Arc::new(warehouse)
    }

    /// A result for `sql`. Rows may be positional arrays or keyed objects.
    pub fn with_result(&self, sql: &str, columns: &[(&str, &str)], rows: Vec<Value>) -> &Self {
        self.statements.lock().unwrap().insert(
            sql.to_string(),
            Statement {
                columns: columns
                    .iter()
                    .map(|(name, data_type)| NativeColumn::new(*name, *data_type))
                    .collect(),
                rows,
            },
        );
        self
    }

    /// A table reachable both through the native API and the
    /// information_schema query of `dialect`.
    pub fn with_table(
        &self,
        dialect: &dyn SqlDialect,
        table: &str,
        columns: &[(&str, &str)],
    ) -> &Self {
        let table: TableRef = table.parse().unwrap();
        let native: Vec<NativeColumn> = columns
            .iter()
            .map(|(name, data_type)| NativeColumn::new(*name, *data_type))
            .collect();
        let rows = columns
            .iter()
            .map(|(name, data_type)| serde_json::json!([name, data_type]))
            .collect();
        self.with_result(
            &dialect.table_columns_sql(&table.database, &table.schema, &table.table),
            &[("column_name", "text"), ("data_type", "text")],
            rows,
        );
        self.tables.lock().unwrap().insert(table, native);
        self
    }

    /// Make every lookup of `table` fail.
    pub fn failing_table(&self, dialect: &dyn SqlDialect, table: &str, error: WarehouseError) -> &Self {
        let table: TableRef = table.parse().unwrap();
        self.statement_failures.lock().unwrap().insert(
            dialect.table_columns_sql(&table.database, &table.schema, &table.table),
            error.clone(),
        );
        self.table_failures.lock().unwrap().insert(table, error);
        self
    }

    pub fn failing_statement(&self, sql: &str, error: WarehouseError) -> &Self {
        self.statement_failures
            .lock()
            .unwrap()
            .insert(sql.to_string(), error);
        self
    }

    /// Only dry runs report result columns.
    pub fn columns_only_on_dry_run(&self) -> &Self {
        *self.report_columns_on_open.lock().unwrap() = false;
        self
    }

    pub fn with_fetch_delay(&self, delay: Duration) -> &Self {
        *self.fetch_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn open_cursors(&self) -> usize {
        self.cursors.lock().unwrap().len()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Wait until every cursor has been released.
    pub async fn wait_for_cursors_closed(&self) {
        for _ in 0..200 {
            if self.open_cursors() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("cursors still open: {}", self.open_cursors());
    }
}

pub struct MemorySession {
    warehouse: Arc<MemoryWarehouse>,
}

#[async_trait]
impl WarehouseSession for MemorySession {
    async fn open_cursor(&self, request: &CursorRequest) -> WarehouseResult<OpenCursor> {
        let w = &self.warehouse;
        w.opened.lock().unwrap().push(request.clone());

        if let Some(err) = w.statement_failures.lock().unwrap().get(&request.sql) {
            return Err(err.clone());
        }
        let statement = w
            .statements
            .lock()
            .unwrap()
            .get(&request.sql)
            .cloned()
            .unwrap_or(Statement {
                columns: Vec::new(),
                rows: Vec::new(),
            });

        let cursor_id = format!("cursor-{}", w.next_cursor.fetch_add(1, Ordering::SeqCst));
        w.cursors
            .lock()
            .unwrap()
            .insert(cursor_id.clone(), (request.sql.clone(), if request.dry_run { usize::MAX } else { 0 }));

        let columns = if request.dry_run || *w.report_columns_on_open.lock().unwrap() {
            statement.columns
        } else {
            Vec::new()
        };
        Ok(OpenCursor { cursor_id, columns })
    }

    async fn fetch_page(&self, cursor_id: &str, max_rows: usize) -> WarehouseResult<ResultPage> {
        let w = &self.warehouse;
        w.fetches.fetch_add(1, Ordering::SeqCst);

        let delay = *w.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let (sql, offset) = w
            .cursors
            .lock()
            .unwrap()
            .get(cursor_id)
            .cloned()
            .ok_or_else(|| WarehouseError::query(format!("unknown cursor {}", cursor_id)))?;
        let rows = w
            .statements
            .lock()
            .unwrap()
            .get(&sql)
            .map(|s| s.rows.clone())
            .unwrap_or_default();

        let start = offset.min(rows.len());
        let end = (start + max_rows).min(rows.len());
        w.cursors
            .lock()
            .unwrap()
            .insert(cursor_id.to_string(), (sql, end));

        Ok(ResultPage {
            rows: rows[start..end].to_vec(),
            done: end >= rows.len(),
        })
    }

    async fn close_cursor(&self, cursor_id: &str) -> WarehouseResult<()> {
        let w = &self.warehouse;
        w.closes.fetch_add(1, Ordering::SeqCst);
        w.cursors.lock().unwrap().remove(cursor_id);
        Ok(())
    }

    async fn table_columns(&self, table: &TableRef) -> WarehouseResult<Option<Vec<NativeColumn>>> {
        let w = &self.warehouse;
        w.native_lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = w.table_failures.lock().unwrap().get(table) {
            return Err(err.clone());
        }
        Ok(w.tables.lock().unwrap().get(table).cloned())
    }
}

/// Connector over a [`MemoryWarehouse`], optionally failing the first
/// connection attempts.
pub struct MemoryConnector {
    warehouse: Arc<MemoryWarehouse>,
    failures_left: AtomicU32,
    pub connects: Mutex<Vec<Option<String>>>,
}

impl MemoryConnector {
    pub fn new(warehouse: Arc<MemoryWarehouse>) -> Arc<Self> {
        Self::failing(warehouse, 0)
    }

    pub fn failing(warehouse: Arc<MemoryWarehouse>, failures: u32) -> Arc<Self> {
        Arc::new(Self {
            warehouse,
            failures_left: AtomicU32::new(failures),
            connects: Mutex::new(Vec::new()),
        })
    }

    pub fn attempts(&self) -> usize {
        self.connects.lock().unwrap().len()
    }
}

#[async_trait]
impl SessionConnector for MemoryConnector {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn connect(&self, database: Option<&str>) -> WarehouseResult<Arc<dyn WarehouseSession>> {
        self.connects
            .lock()
            .unwrap()
            .push(database.map(str::to_string));

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(WarehouseError::connection("memory", "connection refused"));
        }

        Ok(Arc::new(MemorySession {
            warehouse: Arc::clone(&self.warehouse),
        }))
    }
}
