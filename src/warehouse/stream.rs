//! Streaming query results.
//!
//! A producer task fetches pages from a server-side cursor, decodes them and
//! pushes them through a bounded channel. The consumer side is a [`RowStream`].
//!
//! ```text
//! ┌──────────┐ fetch_page ┌────────────┐ Vec<Row> ┌─────────────┐
//! │  cursor  │ ─────────► │  producer  │ ───────► │  RowStream  │
//! │ (backend)│            │  (decode)  │  bounded │  (consumer) │
//! └──────────┘            └────────────┘  channel └─────────────┘
//! ```
//!
//! The producer fetches the next page only after the previous one was
//! accepted by the channel. When the stream is dropped the channel closes,
//! the producer stops and the cursor is released.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::{ready, Stream, TryStreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::cell::{Row, RowDecoder};
use super::error::{WarehouseError, WarehouseResult};
use super::session::WarehouseSession;
use crate::model::types::DimensionType;

/// Lifecycle of one query execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Idle,
    Executing,
    Streaming,
    Completed,
    Failed,
}

impl QueryState {
    pub fn is_finished(&self) -> bool {
        matches!(self, QueryState::Completed | QueryState::Failed)
    }
}

/// A result column and its canonical type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: DimensionType,
}

impl ResultField {
    pub fn new(name: impl Into<String>, field_type: DimensionType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// A fully collected result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResults {
    pub fields: Vec<ResultField>,
    pub rows: Vec<Row>,
}

/// Paging and timeout settings for one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    /// Rows requested per fetch.
    pub page_size: usize,
    /// Decoded pages held in the channel before the producer waits.
    pub buffered_pages: usize,
    /// Limit on each backend call.
    pub timeout: Option<Duration>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            page_size: 500,
            buffered_pages: 2,
            timeout: None,
        }
    }
}

/// Run a backend call under an optional timeout.
pub(crate) async fn with_timeout<T, F>(timeout: Option<Duration>, fut: F) -> WarehouseResult<T>
where
    F: Future<Output = WarehouseResult<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| WarehouseError::query_timeout(limit))?,
        None => fut.await,
    }
}

/// Lazy, forward-only stream of decoded rows.
///
/// Yields `Err` at most once, after which the stream ends.
pub struct RowStream {
    fields: Vec<ResultField>,
    receiver: mpsc::Receiver<WarehouseResult<Vec<Row>>>,
    current: std::vec::IntoIter<Row>,
    state: watch::Receiver<QueryState>,
    _producer: JoinHandle<()>,
}

impl RowStream {
    /// Start streaming from an open cursor.
    pub(crate) fn spawn(
        session: Arc<dyn WarehouseSession>,
        cursor_id: String,
        fields: Vec<ResultField>,
        options: StreamOptions,
        state: watch::Sender<QueryState>,
    ) -> Self {
        let (tx, receiver) = mpsc::channel(options.buffered_pages.max(1));
        let decoder = RowDecoder::new(
            &fields
                .iter()
                .map(|f| (f.name.clone(), f.field_type))
                .collect::<Vec<_>>(),
        );
        let state_rx = state.subscribe();
        let producer = Producer {
            session,
            cursor_id,
            decoder,
            options,
            state,
        };
        let handle = tokio::spawn(producer.run(tx));

        Self {
            fields,
            receiver,
            current: Vec::new().into_iter(),
            state: state_rx,
            _producer: handle,
        }
    }

    /// Result columns in select order with their canonical types.
    pub fn fields(&self) -> &[ResultField] {
        &self.fields
    }

    /// Current execution state.
    pub fn state(&self) -> QueryState {
        *self.state.borrow()
    }

    /// A receiver notified on every state change.
    pub fn state_updates(&self) -> watch::Receiver<QueryState> {
        self.state.clone()
    }

    /// Drain the stream into memory.
    pub async fn into_results(self) -> WarehouseResult<QueryResults> {
        let fields = self.fields.clone();
        let rows: Vec<Row> = self.try_collect().await?;
        Ok(QueryResults { fields, rows })
    }
}

impl Stream for RowStream {
    type Item = WarehouseResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(row) = self.current.next() {
                return Poll::Ready(Some(Ok(row)));
            }
            match ready!(self.receiver.poll_recv(cx)) {
                Some(Ok(page)) => self.current = page.into_iter(),
                Some(Err(err)) => return Poll::Ready(Some(Err(err))),
                None => return Poll::Ready(None),
            }
        }
    }
}

impl std::fmt::Debug for RowStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowStream")
            .field("fields", &self.fields)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

enum PumpOutcome {
    Finished(usize),
    Abandoned,
}

struct Producer {
    session: Arc<dyn WarehouseSession>,
    cursor_id: String,
    decoder: RowDecoder,
    options: StreamOptions,
    state: watch::Sender<QueryState>,
}

impl Producer {
    async fn run(self, tx: mpsc::Sender<WarehouseResult<Vec<Row>>>) {
        let failure = match self.pump(&tx).await {
            Ok(PumpOutcome::Finished(rows)) => {
                self.state.send_replace(QueryState::Completed);
                debug!(cursor = %self.cursor_id, rows, "query completed");
                None
            }
            Ok(PumpOutcome::Abandoned) => {
                debug!(cursor = %self.cursor_id, "result stream dropped before completion");
                None
            }
            Err(err) => {
                self.state.send_replace(QueryState::Failed);
                warn!(cursor = %self.cursor_id, error = %err, "query failed while streaming");
                Some(err)
            }
        };

        // The error send waits on a full buffer, so the cursor is released first.
        match self.session.close_cursor(&self.cursor_id).await {
            Ok(()) => debug!(cursor = %self.cursor_id, "cursor closed"),
            Err(err) => warn!(cursor = %self.cursor_id, error = %err, "failed to close cursor"),
        }

        if let Some(err) = failure {
            let _ = tx.send(Err(err)).await;
        }
    }

    async fn pump(
        &self,
        tx: &mpsc::Sender<WarehouseResult<Vec<Row>>>,
    ) -> WarehouseResult<PumpOutcome> {
        let mut delivered = 0;
        loop {
            let page = tokio::select! {
                _ = tx.closed() => return Ok(PumpOutcome::Abandoned),
                page = with_timeout(
                    self.options.timeout,
                    self.session.fetch_page(&self.cursor_id, self.options.page_size),
                ) => page?,
            };

            let done = page.done;
            let rows = page
                .rows
                .into_iter()
                .map(|raw| self.decoder.decode(raw))
                .collect::<WarehouseResult<Vec<_>>>()?;

            if !rows.is_empty() {
                self.state.send_replace(QueryState::Streaming);
                delivered += rows.len();
                if tx.send(Ok(rows)).await.is_err() {
                    return Ok(PumpOutcome::Abandoned);
                }
            }
            if done {
                return Ok(PumpOutcome::Finished(delivered));
            }
        }
    }
}
