//! Unified error types for the neo core.
//!
//! Framework-level errors (addons, commands) live in `neo-framework`.

use thiserror::Error;

/// Boxed error used at dynamic boundaries (handlers, hooks, store drivers).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// =============================================================================
// Store Errors
// =============================================================================

/// Errors reported by a [`RecordStore`](crate::record::RecordStore).
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The table is unknown to the store.
    #[error("unknown table '{0}'")]
    UnknownTable(String),

    /// No row exists for the given key.
    #[error("no row in '{table}' for key {key}")]
    RowNotFound {
        /// The table that was queried.
        table: String,
        /// Display form of the key.
        key: String,
    },

    /// The column does not exist in the table.
    #[error("unknown column '{column}' in '{table}'")]
    UnknownColumn {
        /// The table that was queried.
        table: String,
        /// The missing column.
        column: String,
    },

    /// A row with the same key already exists.
    #[error("duplicate key {key} in '{table}'")]
    DuplicateKey {
        /// The table that was written.
        table: String,
        /// Display form of the key.
        key: String,
    },

    /// The write was abandoned because the process is shutting down.
    #[error("write abandoned: store queue closed")]
    Closed,

    /// Driver-level failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

// =============================================================================
// Record Errors
// =============================================================================

/// Errors that can occur while building or mutating a record.
#[derive(Debug, Clone, Error)]
pub enum RecordError {
    /// A declared field is missing from the source row.
    #[error("row for '{table}' is missing column '{column}'")]
    MissingColumn {
        /// Backing table of the record type.
        table: &'static str,
        /// The missing column.
        column: &'static str,
    },

    /// A column holds a value of the wrong type.
    #[error("column '{column}' expected {expected}, found {found}")]
    TypeMismatch {
        /// The offending column.
        column: &'static str,
        /// Expected type name.
        expected: &'static str,
        /// Actual type name.
        found: &'static str,
    },

    /// The field is not declared on the record type.
    #[error("'{record}' has no field '{field}'")]
    UnknownField {
        /// Record type name.
        record: &'static str,
        /// Requested field.
        field: String,
    },

    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// =============================================================================
// Patch Errors
// =============================================================================

/// Errors raised by [`Patch`](crate::patch::Patch) application.
#[derive(Debug, Clone, Error)]
pub enum PatchError {
    /// `patch()` was called on a patch that is already applied.
    #[error("patch '{0}' is already applied")]
    AlreadyApplied(String),

    /// `revert()` was called on a patch that is not applied.
    #[error("patch '{0}' is not applied")]
    NotApplied(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for record operations.
pub type RecordResult<T> = Result<T, RecordError>;

/// Result type for patch operations.
pub type PatchResult<T> = Result<T, PatchError>;
