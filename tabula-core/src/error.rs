//! Error types for tabula operations

use std::time::Duration;
use thiserror::Error;

/// Client-input errors. Raised before any statement runs or any shadow row
/// is written.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid integer for {field}: {value}")]
    InvalidInteger { field: String, value: String },

    #[error("Unknown sort column {column} on table {table}")]
    UnknownSortColumn { table: String, column: String },

    #[error("Table not tracked: {table}")]
    UnknownTable { table: String },

    #[error("Column count mismatch on {table}: expected {expected}, got {got}")]
    ColumnCountMismatch {
        table: String,
        expected: usize,
        got: usize,
    },
}

/// Infrastructure errors from catalog reads, shadow catalog writes and
/// statement execution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Catalog query failed during {operation}: {reason}")]
    QueryFailed { operation: String, reason: String },

    #[error("Shadow catalog write failed during {operation} on {table}: {reason}")]
    WriteFailed {
        operation: String,
        table: String,
        reason: String,
    },

    #[error("Connection unavailable: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Shadow catalog row missing: {what}")]
    RowMissing { what: String },

    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    #[error("Deadline exceeded for {operation} after {after:?}")]
    DeadlineExceeded { operation: String, after: Duration },

    #[error("Catalog lock poisoned")]
    LockPoisoned,
}

/// Master error type for all tabula errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TabulaError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

impl TabulaError {
    /// Whether the caller sent something wrong, as opposed to the database
    /// or the connection failing.
    pub fn is_client_error(&self) -> bool {
        matches!(self, TabulaError::Validation(_))
    }
}

/// Result type alias for tabula operations.
pub type TabulaResult<T> = Result<T, TabulaError>;

// =============================================================================
// TESTS
// =============================================================================
