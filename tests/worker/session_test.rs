//! Worker-backed warehouse sessions against a scripted worker.
//!
//! The fake worker is a shell loop that answers each NDJSON request line
//! and appends the method name to a log file.

#![cfg(unix)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use quarry::config::{DuckDbCredentials, SessionPolicy, WarehouseCredentials};
use quarry::model::DimensionType;
use quarry::sql::DuckDb;
use quarry::warehouse::{
    ClientOptions, DuckDbWarehouseClient, ResultField, SessionConnector, TableRef,
    WarehouseClient, WarehouseSession,
};
use quarry::worker::{WorkerClient, WorkerConnector};

const FAKE_WORKER: &str = r#"
log="$1"
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":"\([^"]*\)".*/\1/p')
  method=$(printf '%s\n' "$line" | sed -n 's/.*"method":"\([^"]*\)".*/\1/p')
  printf '%s\n' "$method" >> "$log"
  case "$method" in
    metadata.get_database_info)
      case "$line" in
        *refused*) body='"success":false,"error":{"code":"CONNECTION_FAILED","message":"connection refused"}' ;;
        *) body='"success":true,"result":{"database":{"product_name":"DuckDB","product_version":"1.1.0","database_name":"memory"}}' ;;
      esac ;;
    metadata.get_columns)
      case "$line" in
        *'"table":"orders"'*) body='"success":true,"result":{"columns":[{"name":"status","position":2,"data_type":"VARCHAR"},{"name":"id","position":1,"data_type":"INTEGER"}]}' ;;
        *) body='"success":false,"error":{"code":"NOT_FOUND","message":"table not found"}' ;;
      esac ;;
    query.open)
      case "$line" in
        *missing_table*) body='"success":false,"error":{"code":"QUERY_FAILED","message":"Table missing_table does not exist"}' ;;
        *) body='"success":true,"result":{"cursor_id":"c1","columns":[{"name":"one","data_type":"INTEGER"},{"name":"label","data_type":"VARCHAR"}]}' ;;
      esac ;;
    query.fetch)
      body='"success":true,"result":{"rows":[[1,"a"],[2,"b"]],"done":true}' ;;
    query.close)
      body='"success":true,"result":{}' ;;
    *)
      body='"success":false,"error":{"code":"METHOD_NOT_FOUND","message":"unknown method"}' ;;
  esac
  printf '{"id":"%s",%s}\n' "$id" "$body"
done
"#;

struct FakeWorker {
    client: Arc<WorkerClient>,
    log: PathBuf,
    dir: PathBuf,
}

impl FakeWorker {
    async fn spawn() -> Self {
        let dir = std::env::temp_dir().join(format!("quarry-worker-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let script = dir.join("worker.sh");
        let log = dir.join("requests.log");
        std::fs::write(&script, FAKE_WORKER).unwrap();
        std::fs::write(&log, "").unwrap();

        let args = vec![
            script.display().to_string(),
            log.display().to_string(),
        ];
        let client = WorkerClient::spawn_with_args("/bin/sh", &args, Duration::from_secs(5))
            .await
            .unwrap();

        Self {
            client: Arc::new(client),
            log,
            dir,
        }
    }

    fn connector(&self, path: &str) -> Arc<WorkerConnector> {
        let credentials = WarehouseCredentials::Duckdb(DuckDbCredentials {
            path: path.to_string(),
            policy: SessionPolicy::default(),
        });
        Arc::new(WorkerConnector::new(Arc::clone(&self.client), credentials))
    }

    fn methods(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    async fn wait_for_method(&self, method: &str) {
        for _ in 0..200 {
            if self.methods().iter().any(|m| m == method) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("worker never saw {}: {:?}", method, self.methods());
    }
}

impl Drop for FakeWorker {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

#[tokio::test]
async fn test_query_runs_through_worker_cursor() {
    let worker = FakeWorker::spawn().await;
    let client = DuckDbWarehouseClient::new(
        DuckDb::default(),
        worker.connector(":memory:"),
        ClientOptions::default(),
    );

    let results = client
        .run_query("SELECT 1 AS one, 'a' AS label")
        .await
        .unwrap()
        .into_results()
        .await
        .unwrap();

    assert_eq!(
        results.fields,
        vec![
            ResultField::new("one", DimensionType::Number),
            ResultField::new("label", DimensionType::String),
        ]
    );
    assert_eq!(results.rows.len(), 2);
    assert_eq!(results.rows[1].get("label").and_then(|c| c.as_str()), Some("b"));

    worker.wait_for_method("query.close").await;
    assert_eq!(
        worker.methods(),
        vec![
            "metadata.get_database_info",
            "query.open",
            "query.fetch",
            "query.close",
        ]
    );
}

#[tokio::test]
async fn test_query_failure_is_a_query_error() {
    let worker = FakeWorker::spawn().await;
    let client = DuckDbWarehouseClient::new(
        DuckDb::default(),
        worker.connector(":memory:"),
        ClientOptions::default(),
    );

    let err = client
        .run_query("SELECT * FROM missing_table")
        .await
        .unwrap_err();
    assert!(!err.is_connection());
    assert_eq!(err.to_string(), "Table missing_table does not exist");
}

#[tokio::test]
async fn test_connection_failure_names_the_backend() {
    let worker = FakeWorker::spawn().await;
    let connector = worker.connector("/data/refused.duckdb");

    let err = match connector.connect(None).await {
        Ok(_) => panic!("connect should fail"),
        Err(err) => err,
    };
    assert!(err.is_connection());
    assert_eq!(
        err.to_string(),
        "Could not connect to /data/refused.duckdb: database connection failed: connection refused"
    );
}

#[tokio::test]
async fn test_table_columns_in_ordinal_order() {
    let worker = FakeWorker::spawn().await;
    let session = worker.connector(":memory:").connect(Some("memory")).await.unwrap();

    let columns = session
        .table_columns(&TableRef::new("memory", "main", "orders"))
        .await
        .unwrap()
        .unwrap();
    let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "status"]);

    let missing = session
        .table_columns(&TableRef::new("memory", "main", "refunds"))
        .await
        .unwrap();
    assert!(missing.is_none());
}
