//! In-process [`RecordStore`] used by tests and demos.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::store::{RecordStore, RowRef, Update};
use super::value::{Row, Value};
use crate::error::{StoreError, StoreResult};

struct Table {
    key_column: &'static str,
    defaults: Row,
    rows: Vec<(Value, Row)>,
}

impl Table {
    fn position(&self, key: &Value) -> Option<usize> {
        self.rows.iter().position(|(k, _)| k == key)
    }
}

#[derive(Default)]
struct Inner {
    tables: HashMap<&'static str, Table>,
    executed: Vec<Update>,
    fail_next: usize,
    failing: bool,
}

impl Inner {
    fn take_failure(&mut self) -> StoreResult<()> {
        if self.failing {
            return Err(StoreError::Backend("store unavailable".into()));
        }
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(StoreError::Backend("injected failure".into()));
        }
        Ok(())
    }

    fn table_mut(&mut self, name: &str) -> StoreResult<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StoreError::UnknownTable(name.to_owned()))
    }
}

/// A table-per-map store kept in memory.
///
/// Tables must be declared with [`MemoryStore::with_table`]; the declared
/// defaults are what [`RecordStore::insert`] and [`RecordStore::reset`] use.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `table`, keyed by `key_column`, with per-column defaults.
    pub fn with_table(
        self,
        table: &'static str,
        key_column: &'static str,
        defaults: impl IntoIterator<Item = (&'static str, Value)>,
    ) -> Self {
        let defaults = defaults
            .into_iter()
            .map(|(column, value)| (column.to_owned(), value))
            .collect();
        self.inner.lock().tables.insert(
            table,
            Table {
                key_column,
                defaults,
                rows: Vec::new(),
            },
        );
        self
    }

    /// Delays every write by `latency` (tokio time).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Inserts a row directly, filling absent columns from the defaults.
    pub fn seed(&self, table: &'static str, row: Row) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        let table_ref = inner.table_mut(table)?;
        let key = row
            .get(table_ref.key_column)
            .cloned()
            .ok_or_else(|| StoreError::UnknownColumn {
                table: table.to_owned(),
                column: table_ref.key_column.to_owned(),
            })?;
        if table_ref.position(&key).is_some() {
            return Err(StoreError::DuplicateKey {
                table: table.to_owned(),
                key: key.to_string(),
            });
        }
        let mut full = table_ref.defaults.clone();
        full.extend(row);
        table_ref.rows.push((key, full));
        Ok(())
    }

    /// Returns a copy of the row stored under `key`.
    pub fn row(&self, table: &str, key: &Value) -> Option<Row> {
        let inner = self.inner.lock();
        let table = inner.tables.get(table)?;
        table.position(key).map(|i| table.rows[i].1.clone())
    }

    /// Successful updates, in the order they reached the store.
    pub fn executed(&self) -> Vec<Update> {
        self.inner.lock().executed.clone()
    }

    /// Makes the next `count` write operations fail.
    pub fn fail_next(&self, count: usize) {
        self.inner.lock().fail_next = count;
    }

    /// Makes every write operation fail until switched off again.
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().failing = failing;
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn execute(&self, update: &Update) -> StoreResult<()> {
        self.delay().await;

        let mut inner = self.inner.lock();
        inner.take_failure()?;
        let table = inner.table_mut(update.row.table)?;
        let index = table
            .position(&update.row.key)
            .ok_or_else(|| StoreError::RowNotFound {
                table: update.row.table.to_owned(),
                key: update.row.key.to_string(),
            })?;
        let row = &mut table.rows[index].1;
        match row.get_mut(update.column) {
            Some(slot) => *slot = update.value.clone(),
            None => {
                return Err(StoreError::UnknownColumn {
                    table: update.row.table.to_owned(),
                    column: update.column.to_owned(),
                });
            }
        }
        inner.executed.push(update.clone());
        Ok(())
    }

    async fn reset(&self, row: &RowRef, column: &'static str) -> StoreResult<Value> {
        self.delay().await;

        let mut inner = self.inner.lock();
        inner.take_failure()?;
        let table = inner.table_mut(row.table)?;
        let default = table
            .defaults
            .get(column)
            .cloned()
            .ok_or_else(|| StoreError::UnknownColumn {
                table: row.table.to_owned(),
                column: column.to_owned(),
            })?;
        let index = table.position(&row.key).ok_or_else(|| StoreError::RowNotFound {
            table: row.table.to_owned(),
            key: row.key.to_string(),
        })?;
        table.rows[index].1.insert(column.to_owned(), default.clone());
        Ok(default)
    }

    async fn fetch_all(&self, table: &'static str) -> StoreResult<Vec<Row>> {
        let mut inner = self.inner.lock();
        let table = inner.table_mut(table)?;
        Ok(table.rows.iter().map(|(_, row)| row.clone()).collect())
    }

    async fn insert(&self, row: &RowRef) -> StoreResult<Row> {
        self.delay().await;

        let mut inner = self.inner.lock();
        inner.take_failure()?;
        let table = inner.table_mut(row.table)?;
        if table.position(&row.key).is_some() {
            return Err(StoreError::DuplicateKey {
                table: row.table.to_owned(),
                key: row.key.to_string(),
            });
        }
        let mut full = table.defaults.clone();
        full.insert(row.key_column.to_owned(), row.key.clone());
        table.rows.push((row.key.clone(), full.clone()));
        Ok(full)
    }

    async fn delete(&self, row: &RowRef) -> StoreResult<()> {
        self.delay().await;

        let mut inner = self.inner.lock();
        inner.take_failure()?;
        let table = inner.table_mut(row.table)?;
        if let Some(index) = table.position(&row.key) {
            table.rows.remove(index);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::new().with_table(
            "servers",
            "server_id",
            [("prefix", Value::from("n!")), ("starboard", Value::Bool(false))],
        )
    }

    #[tokio::test]
    async fn test_insert_uses_defaults() {
        let store = store();
        let row = store.insert(&RowRef::new("servers", "server_id", 9i64)).await.unwrap();

        assert_eq!(row.get("server_id"), Some(&Value::Int(9)));
        assert_eq!(row.get("prefix"), Some(&Value::from("n!")));
        assert!(matches!(
            store.insert(&RowRef::new("servers", "server_id", 9i64)).await,
            Err(StoreError::DuplicateKey { .. })
        ));
    }

    #[tokio::test]
    async fn test_execute_and_reset() {
        let store = store();
        let row = RowRef::new("servers", "server_id", 1i64);
        store.insert(&row).await.unwrap();

        let update = Update {
            row: row.clone(),
            column: "prefix",
            value: Value::from("?"),
        };
        store.execute(&update).await.unwrap();
        assert_eq!(store.row("servers", &Value::Int(1)).unwrap()["prefix"], Value::from("?"));
        assert_eq!(store.executed(), vec![update]);

        let reset = store.reset(&row, "prefix").await.unwrap();
        assert_eq!(reset, Value::from("n!"));
        assert_eq!(store.row("servers", &Value::Int(1)).unwrap()["prefix"], Value::from("n!"));
    }

    #[tokio::test]
    async fn test_unknown_targets() {
        let store = store();
        assert!(matches!(
            store.fetch_all("profiles").await,
            Err(StoreError::UnknownTable(t)) if t == "profiles"
        ));

        let update = Update {
            row: RowRef::new("servers", "server_id", 404i64),
            column: "prefix",
            value: Value::Null,
        };
        assert!(matches!(store.execute(&update).await, Err(StoreError::RowNotFound { .. })));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = store();
        store.fail_next(1);
        assert!(store.insert(&RowRef::new("servers", "server_id", 1i64)).await.is_err());
        assert!(store.insert(&RowRef::new("servers", "server_id", 1i64)).await.is_ok());

        store.set_failing(true);
        assert!(store.delete(&RowRef::new("servers", "server_id", 1i64)).await.is_err());
        store.set_failing(false);
        store.delete(&RowRef::new("servers", "server_id", 1i64)).await.unwrap();
        assert!(store.fetch_all("servers").await.unwrap().is_empty());

        // Already gone.
        store.delete(&RowRef::new("servers", "server_id", 1i64)).await.unwrap();
    }

    #[tokio::test]
    async fn test_seed_fills_defaults() {
        let store = store();
        let mut row = Row::new();
        row.insert("server_id".into(), Value::Int(3));
        row.insert("starboard".into(), Value::Bool(true));
        store.seed("servers", row).unwrap();

        let stored = store.row("servers", &Value::Int(3)).unwrap();
        assert_eq!(stored["prefix"], Value::from("n!"));
        assert_eq!(stored["starboard"], Value::Bool(true));
    }
}
