//! The in-memory owner of all records of one type.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{OnceCell, broadcast};
use tracing::{debug, info, warn};

use super::store::RowRef;
use super::writer::{PersistFailure, RecordLink};
use super::Record;
use crate::error::RecordResult;

/// Records of type `R`, keyed by their row key.
///
/// The cache hands out `Arc<R>`; evicting a record only drops the cache's
/// reference. Writes already queued by the record still reach the store.
pub struct RecordCache<R: Record> {
    link: RecordLink,
    records: RwLock<HashMap<R::Key, Arc<R>>>,
    /// Inserts in flight, so concurrent callers for one key share a row.
    inserting: Mutex<HashMap<R::Key, Arc<OnceCell<Arc<R>>>>>,
}

impl<R: Record> RecordCache<R> {
    pub fn new(link: RecordLink) -> Self {
        Self {
            link,
            records: RwLock::new(HashMap::new()),
            inserting: Mutex::new(HashMap::new()),
        }
    }

    /// Loads every row of `R::TABLE`, replacing cached records with the same key.
    ///
    /// Returns the number of records loaded.
    pub async fn load_all(&self) -> RecordResult<usize> {
        let rows = self.link.store().fetch_all(R::TABLE).await?;
        let records = rows
            .iter()
            .map(|row| R::from_row(row, self.link.queue()).map(Arc::new))
            .collect::<RecordResult<Vec<_>>>()?;

        let count = records.len();
        let mut cached = self.records.write();
        for record in records {
            cached.insert(record.key().clone(), record);
        }
        info!(table = R::TABLE, count, "Records loaded");
        Ok(count)
    }

    pub fn get(&self, key: &R::Key) -> Option<Arc<R>> {
        self.records.read().get(key).cloned()
    }

    /// Returns the cached record, inserting a default row first if there is none.
    ///
    /// Concurrent calls for the same key insert one row and return the same
    /// record.
    pub async fn get_or_insert(&self, key: R::Key) -> RecordResult<Arc<R>> {
        if let Some(record) = self.get(&key) {
            return Ok(record);
        }

        let cell = Arc::clone(self.inserting.lock().entry(key.clone()).or_default());
        let result = cell
            .get_or_try_init(|| self.insert_row(key.clone()))
            .await
            .cloned();

        let mut inserting = self.inserting.lock();
        if inserting.get(&key).is_some_and(|c| Arc::ptr_eq(c, &cell)) {
            inserting.remove(&key);
        }
        result
    }

    async fn insert_row(&self, key: R::Key) -> RecordResult<Arc<R>> {
        // Cached by an insert that finished after the caller's lookup.
        if let Some(record) = self.get(&key) {
            return Ok(record);
        }

        let row_ref = RowRef::new(R::TABLE, R::KEY_COLUMN, key.clone());
        let row = self.link.store().insert(&row_ref).await?;
        let record = Arc::new(R::from_row(&row, self.link.queue())?);
        debug!(table = R::TABLE, key = ?key, "Record inserted");

        let mut cached = self.records.write();
        Ok(Arc::clone(cached.entry(key).or_insert(record)))
    }

    /// Drops the cached record without touching the store.
    pub fn evict(&self, key: &R::Key) -> Option<Arc<R>> {
        self.records.write().remove(key)
    }

    /// Evicts the record and deletes its row.
    ///
    /// Writes the record had already queued are flushed before the delete.
    /// Returns whether the record was cached.
    pub async fn delete(&self, key: &R::Key) -> RecordResult<bool> {
        let evicted = self.evict(key);
        if let Some(record) = &evicted {
            if let Err(e) = record.queue().flush().await {
                warn!(table = R::TABLE, key = ?key, error = %e, "Flush before delete failed");
            }
        }

        let row_ref = RowRef::new(R::TABLE, R::KEY_COLUMN, key.clone());
        self.link.store().delete(&row_ref).await?;
        debug!(table = R::TABLE, key = ?key, "Record deleted");
        Ok(evicted.is_some())
    }

    pub fn keys(&self) -> Vec<R::Key> {
        self.records.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Waits for the queued writes of every cached record.
    ///
    /// Returns the number of records whose queue could not be flushed.
    pub async fn flush_all(&self) -> usize {
        let records: Vec<Arc<R>> = self.records.read().values().cloned().collect();
        let mut failed = 0;
        for record in records {
            if let Err(e) = record.queue().flush().await {
                warn!(table = R::TABLE, key = ?record.key(), error = %e, "Flush failed");
                failed += 1;
            }
        }
        failed
    }

    /// Receives every write of this cache's records that fails from now on.
    pub fn subscribe_failures(&self) -> broadcast::Receiver<PersistFailure> {
        self.link.subscribe_failures()
    }
}

impl<R: Record> fmt::Debug for RecordCache<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordCache")
            .field("table", &R::TABLE)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::record::{MemoryStore, Row, ServerConfig, Value};

    fn cache() -> (Arc<MemoryStore>, RecordCache<ServerConfig>) {
        let store = Arc::new(MemoryStore::new().with_table(
            "servers",
            "server_id",
            ServerConfig::column_defaults("n!"),
        ));
        let link = RecordLink::new(store.clone(), CancellationToken::new());
        (store, RecordCache::new(link))
    }

    fn seed(store: &MemoryStore, id: i64, prefix: &str) {
        let mut row = Row::new();
        row.insert("server_id".into(), Value::Int(id));
        row.insert("prefix".into(), Value::from(prefix));
        store.seed("servers", row).unwrap();
    }

    #[tokio::test]
    async fn test_load_all() {
        let (store, cache) = cache();
        seed(&store, 1, "?");
        seed(&store, 2, "$");

        assert_eq!(cache.load_all().await.unwrap(), 2);
        assert_eq!(cache.get(&1).unwrap().prefix(), "?");
        let mut keys = cache.keys();
        keys.sort();
        assert_eq!(keys, vec![1, 2]);
        assert!(store.executed().is_empty());
    }

    #[tokio::test]
    async fn test_get_or_insert() {
        let (store, cache) = cache();
        let config = cache.get_or_insert(5).await.unwrap();
        assert_eq!(config.prefix(), "n!");
        assert!(store.row("servers", &Value::Int(5)).is_some());

        let again = cache.get_or_insert(5).await.unwrap();
        assert!(Arc::ptr_eq(&config, &again));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_get_or_insert_shares_record() {
        let store = Arc::new(
            MemoryStore::new()
                .with_table("servers", "server_id", ServerConfig::column_defaults("n!"))
                .with_latency(Duration::from_millis(5)),
        );
        let cache =
            RecordCache::<ServerConfig>::new(RecordLink::new(store.clone(), CancellationToken::new()));

        let (a, b) = tokio::join!(cache.get_or_insert(5), cache.get_or_insert(5));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
        assert!(store.row("servers", &Value::Int(5)).is_some());
    }

    #[tokio::test]
    async fn test_evicted_record_still_persists() {
        let (store, cache) = cache();
        let config = cache.get_or_insert(5).await.unwrap();

        assert!(cache.evict(&5).is_some());
        config.set_prefix("!!".into());
        drop(config);

        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.row("servers", &Value::Int(5)).unwrap()["prefix"], Value::from("!!"));
    }

    #[tokio::test]
    async fn test_flush_all() {
        let (store, cache) = cache();
        cache.get_or_insert(1).await.unwrap().set_prefix("a!".into());
        cache.get_or_insert(2).await.unwrap().set_starboard(true);

        assert_eq!(cache.flush_all().await, 0);
        assert_eq!(store.executed().len(), 2);
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, cache) = cache();
        let config = cache.get_or_insert(5).await.unwrap();
        config.set_starboard(true);

        assert!(cache.delete(&5).await.unwrap());
        assert!(cache.is_empty());
        assert!(store.row("servers", &Value::Int(5)).is_none());
        assert_eq!(store.executed().len(), 1);

        assert!(!cache.delete(&5).await.unwrap());
        assert!(!cache.delete(&6).await.unwrap());
    }
}
