//! The persistence interface records write through.

use async_trait::async_trait;

use super::value::{Row, Value};
use crate::error::StoreResult;

/// Locates one row: `table` where `key_column` equals `key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRef {
    pub table: &'static str,
    pub key_column: &'static str,
    pub key: Value,
}

impl RowRef {
    pub fn new(table: &'static str, key_column: &'static str, key: impl Into<Value>) -> Self {
        Self {
            table,
            key_column,
            key: key.into(),
        }
    }
}

/// A single-column update of one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub row: RowRef,
    pub column: &'static str,
    pub value: Value,
}

impl Update {
    /// The parameterised statement a SQL driver runs for this update.
    ///
    /// `$1` binds [`Update::value`], `$2` binds the row key.
    pub fn statement(&self) -> String {
        format!(
            "UPDATE {} SET {}=$1 WHERE {}=$2",
            self.row.table, self.column, self.row.key_column
        )
    }
}

/// Backing store for records.
///
/// Implementations must be safe to call from many tasks at once. Ordering
/// between writes to the same record is provided by the caller.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Writes one column of one row.
    async fn execute(&self, update: &Update) -> StoreResult<()>;

    /// Resets `column` of the row to the table default and returns the new value.
    async fn reset(&self, row: &RowRef, column: &'static str) -> StoreResult<Value>;

    /// Returns every row of `table`.
    async fn fetch_all(&self, table: &'static str) -> StoreResult<Vec<Row>>;

    /// Inserts a row holding only the key and table defaults, returning it.
    async fn insert(&self, row: &RowRef) -> StoreResult<Row>;

    /// Deletes the row. Deleting a missing row is not an error.
    async fn delete(&self, row: &RowRef) -> StoreResult<()>;
}
