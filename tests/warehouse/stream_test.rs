//! Integration tests for streaming query results.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use futures::StreamExt;
use quarry::model::DimensionType;
use quarry::sql::Postgres;
use quarry::warehouse::{
    CellValue, ClientOptions, PostgresWarehouseClient, QueryState, ResultField, StreamOptions,
    WarehouseClient, WarehouseError,
};
use serde_json::json;

use common::{MemoryConnector, MemoryWarehouse};

const SQL: &str = "SELECT status, amount, created_at FROM orders";

fn client(warehouse: &Arc<MemoryWarehouse>, stream: StreamOptions) -> PostgresWarehouseClient {
    PostgresWarehouseClient::new(
        Postgres::default(),
        MemoryConnector::new(Arc::clone(warehouse)),
        ClientOptions {
            stream,
            ..ClientOptions::default()
        },
    )
}

fn paged(page_size: usize, buffered_pages: usize) -> StreamOptions {
    StreamOptions {
        page_size,
        buffered_pages,
        timeout: None,
    }
}

fn orders_result(warehouse: &MemoryWarehouse, rows: usize) {
    let rows = (0..rows)
        .map(|i| json!([format!("status-{}", i), i, "2024-03-15 12:00:00"]))
        .collect();
    warehouse.with_result(
        SQL,
        &[
            ("status", "text"),
            ("amount", "numeric(10,2)"),
            ("created_at", "timestamp"),
        ],
        rows,
    );
}

// ============================================================================
// Decoding
// ============================================================================

#[tokio::test]
async fn test_positional_rows_across_pages() {
    let warehouse = MemoryWarehouse::new();
    orders_result(&warehouse, 5);

    let stream = client(&warehouse, paged(2, 2)).run_query(SQL).await.unwrap();
    assert_eq!(
        stream.fields(),
        &[
            ResultField::new("status", DimensionType::String),
            ResultField::new("amount", DimensionType::Number),
            ResultField::new("created_at", DimensionType::Timestamp),
        ]
    );

    let results = stream.into_results().await.unwrap();
    assert_eq!(results.rows.len(), 5);

    let last = &results.rows[4];
    assert_eq!(last.get("status").and_then(CellValue::as_str), Some("status-4"));
    assert_eq!(last.get("amount").and_then(CellValue::as_f64), Some(4.0));
    assert_eq!(
        last.get("created_at").and_then(CellValue::as_timestamp),
        Some(Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap())
    );

    assert_eq!(warehouse.fetch_count(), 3);
    warehouse.wait_for_cursors_closed().await;
    assert_eq!(warehouse.close_count(), 1);
}

#[tokio::test]
async fn test_keyed_rows_fill_missing_columns_with_null() {
    let warehouse = MemoryWarehouse::new();
    warehouse.with_result(
        SQL,
        &[("status", "text"), ("amount", "integer")],
        vec![
            json!({"status": "complete", "amount": 3}),
            json!({"amount": 7, "extra": "ignored"}),
        ],
    );

    let results = client(&warehouse, StreamOptions::default())
        .run_query(SQL)
        .await
        .unwrap()
        .into_results()
        .await
        .unwrap();

    assert_eq!(results.rows.len(), 2);
    assert_eq!(results.rows[1].columns(), &["status", "amount"]);
    assert!(results.rows[1].get("status").unwrap().is_null());
    assert_eq!(
        serde_json::to_value(&results.rows[1]).unwrap(),
        json!({"status": null, "amount": 7})
    );
}

#[tokio::test]
async fn test_native_wrapped_values() {
    let warehouse = MemoryWarehouse::new();
    warehouse.with_result(
        SQL,
        &[("day", "date"), ("payload", "jsonb")],
        vec![json!([
            {"$type": "date", "value": "2024-03-15"},
            {"a": [1, 2]}
        ])],
    );

    let results = client(&warehouse, StreamOptions::default())
        .run_query(SQL)
        .await
        .unwrap()
        .into_results()
        .await
        .unwrap();

    let row = &results.rows[0];
    assert_eq!(
        row.values()[0].as_timestamp(),
        Some(Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap())
    );
    assert_eq!(row.values()[1].as_str(), Some("{\"a\":[1,2]}"));
}

#[tokio::test]
async fn test_empty_result_completes() {
    let warehouse = MemoryWarehouse::new();
    warehouse.with_result(SQL, &[("status", "text")], vec![]);

    let mut stream = client(&warehouse, StreamOptions::default())
        .run_query(SQL)
        .await
        .unwrap();
    let mut states = stream.state_updates();

    assert!(stream.next().await.is_none());
    states.wait_for(|s| *s == QueryState::Completed).await.unwrap();
    warehouse.wait_for_cursors_closed().await;
}

// ============================================================================
// Backpressure and Cancellation
// ============================================================================

#[tokio::test]
async fn test_producer_waits_for_consumer() {
    let warehouse = MemoryWarehouse::new();
    orders_result(&warehouse, 100);

    let stream = client(&warehouse, paged(10, 1)).run_query(SQL).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // One page buffered, one waiting to be sent.
    assert!(warehouse.fetch_count() <= 3, "fetched {}", warehouse.fetch_count());
    assert_eq!(warehouse.open_cursors(), 1);
    drop(stream);
    warehouse.wait_for_cursors_closed().await;
}

#[tokio::test]
async fn test_dropping_stream_releases_cursor() {
    let warehouse = MemoryWarehouse::new();
    orders_result(&warehouse, 100);

    let mut stream = client(&warehouse, paged(1, 1)).run_query(SQL).await.unwrap();
    let states = stream.state_updates();

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.values()[0].as_str(), Some("status-0"));
    drop(stream);

    warehouse.wait_for_cursors_closed().await;
    assert_eq!(warehouse.close_count(), 1);
    assert!(warehouse.fetch_count() < 10, "fetched {}", warehouse.fetch_count());
    assert!(!states.borrow().is_finished());
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_decode_error_ends_stream() {
    let warehouse = MemoryWarehouse::new();
    warehouse.with_result(
        SQL,
        &[("status", "text"), ("amount", "integer")],
        vec![json!(["a", 1]), json!(["b", 2]), json!(["c"])],
    );

    let mut stream = client(&warehouse, paged(2, 2)).run_query(SQL).await.unwrap();
    let mut states = stream.state_updates();

    assert!(stream.next().await.unwrap().is_ok());
    assert!(stream.next().await.unwrap().is_ok());
    let err = stream.next().await.unwrap().unwrap_err();
    assert_eq!(
        err,
        WarehouseError::query("Row has 1 values but the result has 2 columns")
    );
    assert!(stream.next().await.is_none());

    states.wait_for(|s| *s == QueryState::Failed).await.unwrap();
    warehouse.wait_for_cursors_closed().await;
}

#[tokio::test]
async fn test_failed_stream_releases_cursor_before_the_error_is_read() {
    let warehouse = MemoryWarehouse::new();
    warehouse.with_result(
        SQL,
        &[("status", "text"), ("amount", "integer")],
        vec![json!(["a", 1]), json!(["c"])],
    );

    let mut stream = client(&warehouse, paged(1, 1)).run_query(SQL).await.unwrap();
    let mut states = stream.state_updates();

    // The first page fills the buffer; nothing is read until the cursor is gone.
    states.wait_for(|s| *s == QueryState::Failed).await.unwrap();
    warehouse.wait_for_cursors_closed().await;
    assert_eq!(warehouse.close_count(), 1);

    assert!(stream.next().await.unwrap().is_ok());
    assert!(stream.next().await.unwrap().is_err());
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_fetch_timeout_is_a_query_error() {
    let warehouse = MemoryWarehouse::new();
    orders_result(&warehouse, 3);
    warehouse.with_fetch_delay(Duration::from_millis(500));

    let options = StreamOptions {
        timeout: Some(Duration::from_millis(20)),
        ..StreamOptions::default()
    };
    let err = client(&warehouse, options)
        .run_query(SQL)
        .await
        .unwrap()
        .into_results()
        .await
        .unwrap_err();

    assert!(!err.is_connection());
    assert!(err.to_string().starts_with("Query exceeded the timeout"));
    warehouse.wait_for_cursors_closed().await;
}

#[tokio::test]
async fn test_open_failure_is_reported_before_streaming() {
    let warehouse = MemoryWarehouse::new();
    warehouse.failing_statement(SQL, WarehouseError::query("relation \"orders\" does not exist"));

    let err = client(&warehouse, StreamOptions::default())
        .run_query(SQL)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "relation \"orders\" does not exist");
    assert_eq!(warehouse.fetch_count(), 0);
}
