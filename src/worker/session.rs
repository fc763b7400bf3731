//! Warehouse sessions backed by the worker.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::IgnoredAny;
use tracing::{debug, info};

use super::client::WorkerClient;
use super::error::WorkerError;
use super::protocol::{
    methods, CloseParams, ConnectionParams, FetchParams, FetchResponse, GetColumnsParams,
    GetColumnsResponse, GetDatabaseInfoParams, GetDatabaseInfoResponse, OpenQueryParams,
    OpenQueryResponse,
};
use crate::config::WarehouseCredentials;
use crate::warehouse::{
    CursorRequest, NativeColumn, OpenCursor, ResultPage, SessionConnector, TableRef,
    WarehouseError, WarehouseResult, WarehouseSession,
};

/// Opens worker sessions for one set of credentials.
pub struct WorkerConnector {
    client: Arc<WorkerClient>,
    credentials: WarehouseCredentials,
    backend: String,
}

impl WorkerConnector {
    pub fn new(client: Arc<WorkerClient>, credentials: WarehouseCredentials) -> Self {
        let backend = credentials.backend_identity();
        Self {
            client,
            credentials,
            backend,
        }
    }

    fn connection(&self, database: Option<&str>) -> WarehouseResult<ConnectionParams> {
        let connection_string = self
            .credentials
            .connection_string(database)
            .map_err(|e| WarehouseError::connection(&self.backend, e.to_string()))?;
        Ok(ConnectionParams {
            driver: self.credentials.driver().to_string(),
            connection_string,
        })
    }
}

#[async_trait]
impl SessionConnector for WorkerConnector {
    fn backend(&self) -> &str {
        &self.backend
    }

    async fn connect(&self, database: Option<&str>) -> WarehouseResult<Arc<dyn WarehouseSession>> {
        let connection = self.connection(database)?;

        let info: GetDatabaseInfoResponse = self
            .client
            .request(
                methods::GET_DATABASE_INFO,
                GetDatabaseInfoParams {
                    connection: connection.clone(),
                },
            )
            .await
            .map_err(|e| e.into_warehouse(&self.backend))?;

        info!(
            backend = %self.backend,
            product = %info.database.product_name,
            version = %info.database.product_version,
            database = %info.database.database_name,
            "connected"
        );

        Ok(Arc::new(WorkerSession {
            client: Arc::clone(&self.client),
            connection,
            backend: self.backend.clone(),
        }))
    }
}

/// A session on one database, routed through the worker.
pub struct WorkerSession {
    client: Arc<WorkerClient>,
    connection: ConnectionParams,
    backend: String,
}

impl WorkerSession {
    fn label(&self, err: WorkerError) -> WarehouseError {
        err.into_warehouse(&self.backend)
    }
}

#[async_trait]
impl WarehouseSession for WorkerSession {
    async fn open_cursor(&self, request: &CursorRequest) -> WarehouseResult<OpenCursor> {
        let response: OpenQueryResponse = self
            .client
            .request(
                methods::OPEN_QUERY,
                OpenQueryParams {
                    connection: self.connection.clone(),
                    sql: request.sql.clone(),
                    dry_run: request.dry_run,
                },
            )
            .await
            .map_err(|e| self.label(e))?;

        debug!(cursor = %response.cursor_id, dry_run = request.dry_run, "worker cursor opened");
        Ok(OpenCursor {
            cursor_id: response.cursor_id,
            columns: response.columns.into_iter().map(Into::into).collect(),
        })
    }

    async fn fetch_page(&self, cursor_id: &str, max_rows: usize) -> WarehouseResult<ResultPage> {
        let response: FetchResponse = self
            .client
            .request(
                methods::FETCH,
                FetchParams {
                    cursor_id: cursor_id.to_string(),
                    max_rows,
                },
            )
            .await
            .map_err(|e| self.label(e))?;

        Ok(ResultPage {
            rows: response.rows,
            done: response.done,
        })
    }

    async fn close_cursor(&self, cursor_id: &str) -> WarehouseResult<()> {
        let _: IgnoredAny = self
            .client
            .request(
                methods::CLOSE,
                CloseParams {
                    cursor_id: cursor_id.to_string(),
                },
            )
            .await
            .map_err(|e| self.label(e))?;
        Ok(())
    }

    async fn table_columns(&self, table: &TableRef) -> WarehouseResult<Option<Vec<NativeColumn>>> {
        let result: Result<GetColumnsResponse, WorkerError> = self
            .client
            .request(
                methods::GET_COLUMNS,
                GetColumnsParams {
                    connection: self.connection.clone(),
                    database: table.database.clone(),
                    schema: table.schema.clone(),
                    table: table.table.clone(),
                },
            )
            .await;

        match result {
            Ok(response) => Ok(Some(response.into_native())),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(self.label(err)),
        }
    }
}
