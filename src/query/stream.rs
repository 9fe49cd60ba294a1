//! Streaming reads
//!
//! A [`ReadStream`] is handed back before the query runs. A blocking worker
//! opens its own connection, steps the statement one row at a time and
//! pushes each point into a bounded channel. When the channel is full the
//! worker parks until the consumer takes a point, so at most `buffer` rows
//! are held in memory.
//!
//! The consumer sees points, then either the end of the stream (`None`) or
//! a single `Err(Error::Stream(_))` followed by the end.
//!
//! Dropping or closing the stream raises a cancellation flag that the
//! worker's connection polls while stepping, so a scan skipping over
//! non-matching rows stops too.

use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::BuiltQuery;
use crate::datapoint::DataPoint;
use crate::storage::Database;
use crate::{Error, Result};

/// Points buffered between the worker and the consumer by default
pub const DEFAULT_STREAM_BUFFER: usize = 1;

/// Forward-only, non-restartable sequence of query results
pub struct ReadStream {
    rx: mpsc::Receiver<Result<DataPoint>>,
    worker: Option<JoinHandle<()>>,
    cancelled: Arc<AtomicBool>,
}

impl ReadStream {
    /// Start running `query` on the blocking pool.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(db: Database, query: BuiltQuery, buffer: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let worker = tokio::task::spawn_blocking(move || run_query(db, query, tx, flag));
        Self {
            rx,
            worker: Some(worker),
            cancelled,
        }
    }

    /// Next point, or `None` once the stream has ended
    pub async fn next_point(&mut self) -> Option<Result<DataPoint>> {
        self.rx.recv().await
    }

    /// Drain the stream, stopping at the first error
    pub async fn try_collect_all(mut self) -> Result<Vec<DataPoint>> {
        let mut points = Vec::new();
        while let Some(item) = self.rx.recv().await {
            points.push(item?);
        }
        Ok(points)
    }

    /// Abandon the stream and wait for the worker to release its connection
    pub async fn close(mut self) -> Result<()> {
        self.cancelled.store(true, Ordering::Release);
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
        match self.worker.take() {
            Some(worker) => Ok(worker.await?),
            None => Ok(()),
        }
    }
}

impl Drop for ReadStream {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

impl Stream for ReadStream {
    type Item = Result<DataPoint>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Worker body: runs on a blocking thread, owns the connection
fn run_query(
    db: Database,
    query: BuiltQuery,
    tx: mpsc::Sender<Result<DataPoint>>,
    cancelled: Arc<AtomicBool>,
) {
    tracing::debug!(sql = %query.text, params = query.values.len(), "read stream started");

    let mut sent = 0usize;
    let mut abandoned = false;
    let result = db.connect().and_then(|store| {
        store.cancel_on(cancelled.clone());
        store.scan(&query, |point| {
            tracing::trace!(id = point.id, "streaming data point");
            if tx.blocking_send(Ok(point)).is_err() {
                abandoned = true;
                return ControlFlow::Break(());
            }
            sent += 1;
            ControlFlow::Continue(())
        })
    });

    // A cancelled scan ends in SQLITE_INTERRUPT; nobody is listening for it.
    let abandoned = abandoned || cancelled.load(Ordering::Acquire);

    match result {
        _ if abandoned => {
            tracing::debug!(sent, "read stream abandoned by consumer");
        }
        Ok(()) => {
            tracing::debug!(sent, "read stream finished");
        }
        Err(e) => {
            tracing::warn!(sent, error = %e, "read stream failed");
            let _ = tx.blocking_send(Err(Error::Stream(e)));
        }
    }
}
