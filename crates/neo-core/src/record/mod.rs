//! Write-through records.
//!
//! A record is an in-memory mirror of one store row. Reads are served from
//! memory; every assignment is applied locally and then persisted in the
//! background through the record's [`WriteQueue`]:
//!
//! ```text
//!  setter ──► in-memory field ──► WriteQueue ──► drain task ──► RecordStore
//!                (immediate)       (ordered)      (one per record)
//! ```
//!
//! Record types are declared with [`define_record!`](crate::define_record)
//! and owned by a [`RecordCache`]. Building a record from a row does not
//! write anything back.

mod cache;
mod macros;
mod memory;
mod models;
mod store;
mod value;
mod writer;

use std::fmt::Debug;
use std::hash::Hash;

pub use cache::RecordCache;
pub use memory::MemoryStore;
pub use models::{ServerConfig, UserProfile};
pub use store::{RecordStore, RowRef, Update};
pub use value::{FromValue, Row, Value};
pub use writer::{PendingReset, PersistFailure, RecordLink, WriteQueue};

use crate::error::{RecordError, RecordResult};

#[doc(hidden)]
pub mod __private {
    pub use parking_lot::RwLock;

    /// A field value and the number of assignments made to it.
    pub struct Slot<T> {
        pub value: T,
        pub assignments: u64,
    }

    impl<T> Slot<T> {
        pub fn new(value: T) -> Self {
            Self {
                value,
                assignments: 0,
            }
        }
    }
}

/// A row-backed type generated by [`define_record!`](crate::define_record).
pub trait Record: Send + Sync + Sized + 'static {
    /// Backing table.
    const TABLE: &'static str;
    /// Column holding the key.
    const KEY_COLUMN: &'static str;
    /// Mutable columns, in declaration order.
    const FIELDS: &'static [&'static str];

    type Key: Clone + Eq + Hash + Debug + Into<Value> + FromValue + Send + Sync + 'static;

    fn key(&self) -> &Self::Key;

    /// The queue this record persists through.
    fn queue(&self) -> &WriteQueue;

    /// Builds the record from `row` without persisting anything.
    fn from_row(row: &Row, queue: WriteQueue) -> RecordResult<Self>;

    /// Current values of the key and every field.
    fn snapshot(&self) -> Row;

    fn row_ref(&self) -> RowRef {
        RowRef::new(Self::TABLE, Self::KEY_COLUMN, self.key().clone())
    }
}

/// Reads `column` from `row` as a `T`.
#[doc(hidden)]
pub fn column_value<T: FromValue>(
    row: &Row,
    table: &'static str,
    column: &'static str,
) -> RecordResult<T> {
    let value = row
        .get(column)
        .ok_or(RecordError::MissingColumn { table, column })?;
    convert_value(column, value)
}

#[doc(hidden)]
pub fn convert_value<T: FromValue>(column: &'static str, value: &Value) -> RecordResult<T> {
    T::from_value(value).ok_or(RecordError::TypeMismatch {
        column,
        expected: T::EXPECTED,
        found: value.type_name(),
    })
}
