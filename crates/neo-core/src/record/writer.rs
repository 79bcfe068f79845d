//! Ordered, fire-and-forget persistence of record mutations.
//!
//! Every record owns one [`WriteQueue`]. Setters push [`Update`]s onto it and
//! return immediately; a background task drains the queue in push order, so
//! two writes to the same record reach the store in the order they were made.
//!
//! A failed write is logged and published on the link's failure channel.
//! It is not retried and the in-memory value is not rolled back.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use super::store::{RecordStore, RowRef, Update};
use super::value::Value;
use crate::error::{StoreError, StoreResult};

const FAILURE_CHANNEL_CAPACITY: usize = 64;

/// A write that did not reach the store.
#[derive(Debug, Clone)]
pub struct PersistFailure {
    pub row: RowRef,
    pub column: &'static str,
    pub error: StoreError,
}

enum Op {
    Write(Update),
    Reset {
        row: RowRef,
        column: &'static str,
        reply: oneshot::Sender<StoreResult<Value>>,
    },
    Flush(oneshot::Sender<()>),
}

// =============================================================================
// RecordLink
// =============================================================================

/// Connects records to their store.
///
/// Cloning is cheap. Every queue created from the same link shares its
/// shutdown token and failure channel.
#[derive(Clone)]
pub struct RecordLink {
    store: Arc<dyn RecordStore>,
    shutdown: CancellationToken,
    failures: broadcast::Sender<PersistFailure>,
}

impl RecordLink {
    /// Creates a link whose pending writes are abandoned once `shutdown` fires.
    pub fn new(store: Arc<dyn RecordStore>, shutdown: CancellationToken) -> Self {
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        Self {
            store,
            shutdown,
            failures,
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Receives every failed write from now on.
    pub fn subscribe_failures(&self) -> broadcast::Receiver<PersistFailure> {
        self.failures.subscribe()
    }

    /// Spawns a new drain task and returns the queue feeding it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn queue(&self) -> WriteQueue {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(drain(
            rx,
            Arc::clone(&self.store),
            self.shutdown.clone(),
            self.failures.clone(),
        ));
        WriteQueue { tx }
    }
}

// =============================================================================
// WriteQueue
// =============================================================================

/// The sending half of a record's persistence queue.
///
/// Dropping the queue does not discard writes already pushed: the drain task
/// finishes them before exiting.
#[derive(Debug)]
pub struct WriteQueue {
    tx: mpsc::UnboundedSender<Op>,
}

impl WriteQueue {
    /// Enqueues `update` without waiting for it.
    pub fn push(&self, update: Update) {
        if let Err(mpsc::error::SendError(Op::Write(update))) = self.tx.send(Op::Write(update)) {
            warn!(
                table = update.row.table,
                column = update.column,
                key = %update.row.key,
                "Write dropped: persistence queue closed"
            );
        }
    }

    /// Enqueues a reset of `column` and waits for the store's new value.
    pub async fn reset(&self, row: RowRef, column: &'static str) -> StoreResult<Value> {
        self.begin_reset(row, column)?.value().await
    }

    /// Enqueues a reset of `column` without waiting for it.
    ///
    /// The reset is ordered after every write pushed before this call.
    pub fn begin_reset(&self, row: RowRef, column: &'static str) -> StoreResult<PendingReset> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Op::Reset { row, column, reply })
            .map_err(|_| StoreError::Closed)?;
        Ok(PendingReset { rx })
    }

    /// Waits until every operation pushed before this call has been handled.
    pub async fn flush(&self) -> StoreResult<()> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Op::Flush(reply)).map_err(|_| StoreError::Closed)?;
        rx.await.map_err(|_| StoreError::Closed)
    }
}

/// A reset queued by [`WriteQueue::begin_reset`].
#[derive(Debug)]
pub struct PendingReset {
    rx: oneshot::Receiver<StoreResult<Value>>,
}

impl PendingReset {
    /// Waits for the column's new value.
    pub async fn value(self) -> StoreResult<Value> {
        self.rx.await.map_err(|_| StoreError::Closed)?
    }
}

impl std::fmt::Debug for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Op::Write(update) => f.debug_tuple("Write").field(update).finish(),
            Op::Reset { row, column, .. } => f
                .debug_struct("Reset")
                .field("row", row)
                .field("column", column)
                .finish(),
            Op::Flush(_) => f.write_str("Flush"),
        }
    }
}

async fn drain(
    mut rx: mpsc::UnboundedReceiver<Op>,
    store: Arc<dyn RecordStore>,
    shutdown: CancellationToken,
    failures: broadcast::Sender<PersistFailure>,
) {
    loop {
        let op = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            op = rx.recv() => match op {
                Some(op) => op,
                None => break,
            },
        };

        match op {
            Op::Write(update) => {
                let result = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    result = store.execute(&update) => result,
                };
                match result {
                    Ok(()) => trace!(statement = %update.statement(), key = %update.row.key, "Record field persisted"),
                    Err(e) => {
                        error!(
                            table = update.row.table,
                            column = update.column,
                            key = %update.row.key,
                            error = %e,
                            "Failed to persist record field"
                        );
                        // No subscribers is fine.
                        let _ = failures.send(PersistFailure {
                            row: update.row,
                            column: update.column,
                            error: e,
                        });
                    }
                }
            }
            Op::Reset { row, column, reply } => {
                let result = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    result = store.reset(&row, column) => result,
                };
                if let Err(e) = &result {
                    error!(table = row.table, column, key = %row.key, error = %e, "Failed to reset record field");
                }
                let _ = reply.send(result);
            }
            Op::Flush(reply) => {
                let _ = reply.send(());
            }
        }
    }

    if shutdown.is_cancelled() {
        let abandoned = rx.len();
        if abandoned > 0 {
            debug!(abandoned, "Pending record writes abandoned at shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::record::MemoryStore;

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new().with_table(
            "profiles",
            "user_id",
            [("timezone", Value::Null), ("hl_timeout", Value::Int(1))],
        ))
    }

    fn update(key: i64, column: &'static str, value: impl Into<Value>) -> Update {
        Update {
            row: RowRef::new("profiles", "user_id", key),
            column,
            value: value.into(),
        }
    }

    #[tokio::test]
    async fn test_writes_drain_in_order() {
        let store = store();
        store.insert(&RowRef::new("profiles", "user_id", 1i64)).await.unwrap();

        let link = RecordLink::new(store.clone(), CancellationToken::new());
        let queue = link.queue();
        for timeout in 2..=5 {
            queue.push(update(1, "hl_timeout", timeout as i64));
        }
        queue.flush().await.unwrap();

        let values: Vec<_> = store.executed().into_iter().map(|u| u.value).collect();
        assert_eq!(values, vec![Value::Int(2), Value::Int(3), Value::Int(4), Value::Int(5)]);
    }

    #[tokio::test]
    async fn test_dropped_queue_still_drains() {
        let store = Arc::new(
            MemoryStore::new()
                .with_table("profiles", "user_id", [("hl_timeout", Value::Int(1))])
                .with_latency(Duration::from_millis(5)),
        );
        store.insert(&RowRef::new("profiles", "user_id", 1i64)).await.unwrap();

        let link = RecordLink::new(store.clone(), CancellationToken::new());
        let queue = link.queue();
        queue.push(update(1, "hl_timeout", 9i64));
        drop(queue);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.executed().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_published() {
        let store = store();
        let link = RecordLink::new(store.clone(), CancellationToken::new());
        let mut failures = link.subscribe_failures();

        // No row for key 7.
        let queue = link.queue();
        queue.push(update(7, "timezone", "UTC"));
        queue.flush().await.unwrap();

        let failure = failures.recv().await.unwrap();
        assert_eq!(failure.column, "timezone");
        assert!(matches!(failure.error, StoreError::RowNotFound { .. }));
    }

    #[tokio::test]
    async fn test_shutdown_abandons_pending() {
        let store = Arc::new(
            MemoryStore::new()
                .with_table("profiles", "user_id", [("hl_timeout", Value::Int(1))])
                .with_latency(Duration::from_millis(20)),
        );
        store.insert(&RowRef::new("profiles", "user_id", 1i64)).await.unwrap();

        let shutdown = CancellationToken::new();
        let link = RecordLink::new(store.clone(), shutdown.clone());
        let queue = link.queue();
        queue.push(update(1, "hl_timeout", 2i64));
        queue.push(update(1, "hl_timeout", 3i64));
        shutdown.cancel();

        assert!(matches!(queue.flush().await, Err(StoreError::Closed)));
        assert!(store.executed().is_empty());
    }

    #[tokio::test]
    async fn test_reset_returns_default() {
        let store = store();
        store.insert(&RowRef::new("profiles", "user_id", 1i64)).await.unwrap();
        let link = RecordLink::new(store.clone(), CancellationToken::new());
        let queue = link.queue();

        queue.push(update(1, "hl_timeout", 30i64));
        let value = queue
            .reset(RowRef::new("profiles", "user_id", 1i64), "hl_timeout")
            .await
            .unwrap();
        assert_eq!(value, Value::Int(1));
        assert_eq!(store.executed().len(), 1);
    }
}
