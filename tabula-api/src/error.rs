//! Error Types for tabula-api
//!
//! This module defines error handling for the PostgreSQL-facing layer:
//! - ApiError struct for structured error output
//! - ErrorCode enum for categorizing errors
//! - Conversions from tabula, driver, pool and JSON errors
//!
//! Infrastructure failures are logged in full and surfaced with an opaque
//! message; client errors keep their description.

use serde::{Deserialize, Serialize};
use std::fmt;
use tabula_core::{CatalogError, TabulaError, ValidationError};

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Client Errors
    // ========================================================================
    /// Request contains invalid input data
    InvalidInput,

    /// Required field is missing from request
    MissingField,

    /// Field value is out of valid range
    InvalidRange,

    /// Field format is incorrect
    InvalidFormat,

    /// Sort column names neither a column nor a label
    UnknownSortColumn,

    /// Table is not tracked by the shadow catalog
    TableNotFound,

    // ========================================================================
    // Server Errors
    // ========================================================================
    /// Internal error
    InternalError,

    /// Database operation failed
    DatabaseError,

    /// Database is unreachable
    ServiceUnavailable,

    /// Database connection pool exhausted
    ConnectionPoolExhausted,

    /// Operation timed out
    Timeout,

    /// Operation aborted by a shutdown signal
    Cancelled,
}

impl ErrorCode {
    /// Whether the caller sent something wrong.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ErrorCode::InvalidInput
                | ErrorCode::MissingField
                | ErrorCode::InvalidRange
                | ErrorCode::InvalidFormat
                | ErrorCode::UnknownSortColumn
                | ErrorCode::TableNotFound
        )
    }

    /// Process exit status for the `tabula` binary (sysexits values).
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorCode::InvalidInput
            | ErrorCode::MissingField
            | ErrorCode::InvalidRange
            | ErrorCode::InvalidFormat
            | ErrorCode::UnknownSortColumn
            | ErrorCode::TableNotFound => 64,

            ErrorCode::ServiceUnavailable | ErrorCode::ConnectionPoolExhausted => 69,

            ErrorCode::InternalError | ErrorCode::DatabaseError => 70,

            ErrorCode::Timeout | ErrorCode::Cancelled => 75,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "Invalid input",
            ErrorCode::MissingField => "Required field missing",
            ErrorCode::InvalidRange => "Value out of range",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::UnknownSortColumn => "Unknown sort column",
            ErrorCode::TableNotFound => "Table not found",
            ErrorCode::InternalError => "Internal error",
            ErrorCode::DatabaseError => "Database operation failed",
            ErrorCode::ServiceUnavailable => "Database unavailable",
            ErrorCode::ConnectionPoolExhausted => "Connection pool exhausted",
            ErrorCode::Timeout => "Operation timed out",
            ErrorCode::Cancelled => "Operation cancelled",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error output, printed as JSON by the binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn is_client_error(&self) -> bool {
        self.code.is_client_error()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    pub fn invalid_range(field: &str, min: impl fmt::Display, max: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidRange,
            format!("Field '{}' must be between {} and {}", field, min, max),
        )
    }

    pub fn invalid_format(field: &str, expected: &str) -> Self {
        Self::new(
            ErrorCode::InvalidFormat,
            format!("Field '{}' has invalid format, expected {}", field, expected),
        )
    }

    pub fn table_not_found(table: &str) -> Self {
        Self::new(ErrorCode::TableNotFound, format!("Table '{}' is not tracked", table))
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    pub fn connection_pool_exhausted() -> Self {
        Self::from_code(ErrorCode::ConnectionPoolExhausted)
    }

    pub fn timeout(operation: &str) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("Operation '{}' timed out", operation),
        )
    }

    pub fn cancelled(operation: &str) -> Self {
        Self::new(
            ErrorCode::Cancelled,
            format!("Operation '{}' was cancelled", operation),
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// CONVERSIONS FROM TABULA ERRORS
// ============================================================================

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        let message = err.to_string();
        match err {
            ValidationError::RequiredFieldMissing { field } => ApiError::missing_field(&field),
            ValidationError::InvalidInteger { .. } => {
                ApiError::new(ErrorCode::InvalidFormat, message)
            }
            ValidationError::InvalidValue { .. } => ApiError::invalid_input(message),
            ValidationError::ColumnCountMismatch {
                table,
                expected,
                got,
            } => ApiError::invalid_input(message).with_details(serde_json::json!({
                "table": table,
                "expected": expected,
                "got": got,
            })),
            ValidationError::UnknownSortColumn { table, column } => {
                ApiError::new(ErrorCode::UnknownSortColumn, message)
                    .with_details(serde_json::json!({ "table": table, "column": column }))
            }
            ValidationError::UnknownTable { table } => ApiError::table_not_found(&table),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match &err {
            CatalogError::Cancelled { operation } => ApiError::cancelled(operation),
            CatalogError::DeadlineExceeded { operation, .. } => ApiError::timeout(operation),
            CatalogError::ConnectionFailed { .. } => {
                tracing::error!("Catalog connection error: {}", err);
                ApiError::service_unavailable("Database connection unavailable")
            }
            CatalogError::QueryFailed { .. } | CatalogError::WriteFailed { .. } => {
                tracing::error!("Catalog error: {}", err);
                ApiError::database_error("Database operation failed")
            }
            CatalogError::RowMissing { .. } | CatalogError::LockPoisoned => {
                tracing::error!("Catalog state error: {}", err);
                ApiError::internal_error("Shadow catalog is inconsistent")
            }
        }
    }
}

impl From<TabulaError> for ApiError {
    fn from(err: TabulaError) -> Self {
        match err {
            TabulaError::Validation(e) => e.into(),
            TabulaError::Catalog(e) => e.into(),
        }
    }
}

// ============================================================================
// CONVERSIONS FROM STANDARD ERRORS
// ============================================================================

/// Convert from tokio_postgres::Error to ApiError.
impl From<tokio_postgres::Error> for ApiError {
    fn from(err: tokio_postgres::Error) -> Self {
        // Log the full error for debugging
        tracing::error!("Database error: {:?}", err);

        if err.is_closed() {
            return ApiError::service_unavailable("Database connection closed");
        }
        ApiError::database_error("Database operation failed")
    }
}

/// Convert from deadpool_postgres::PoolError to ApiError.
impl From<deadpool_postgres::PoolError> for ApiError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        tracing::error!("Connection pool error: {:?}", err);

        match err {
            deadpool_postgres::PoolError::Timeout(_) => ApiError::connection_pool_exhausted(),
            deadpool_postgres::PoolError::Closed => {
                ApiError::service_unavailable("Database connection pool is closed")
            }
            _ => ApiError::service_unavailable("Failed to acquire database connection"),
        }
    }
}

/// Convert from serde_json::Error to ApiError.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {:?}", err);
        ApiError::internal_error(format!("JSON serialization failed: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_client_classification() {
        assert!(ErrorCode::UnknownSortColumn.is_client_error());
        assert!(ErrorCode::MissingField.is_client_error());
        assert!(!ErrorCode::DatabaseError.is_client_error());
        assert!(!ErrorCode::Timeout.is_client_error());
        assert_eq!(ErrorCode::TableNotFound.exit_code(), 64);
        assert_eq!(ErrorCode::ServiceUnavailable.exit_code(), 69);
    }

    #[test]
    fn test_validation_conversion_keeps_message() {
        let err: ApiError = TabulaError::from(ValidationError::UnknownSortColumn {
            table: "orders".to_string(),
            column: "rating".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::UnknownSortColumn);
        assert!(err.message.contains("rating"));
        assert!(err.is_client_error());
        assert_eq!(
            err.details,
            Some(serde_json::json!({ "table": "orders", "column": "rating" }))
        );

        let err: ApiError = ValidationError::InvalidInteger {
            field: "offset".to_string(),
            value: "ten".to_string(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::InvalidFormat);
    }

    #[test]
    fn test_catalog_conversion_is_opaque() {
        let err: ApiError = TabulaError::from(CatalogError::QueryFailed {
            operation: "live_columns(users)".to_string(),
            reason: "relation \"secret_table\" does not exist".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(!err.message.contains("secret_table"));
    }

    #[test]
    fn test_deadline_maps_to_timeout() {
        let err: ApiError = CatalogError::DeadlineExceeded {
            operation: "browse".to_string(),
            after: Duration::from_secs(3),
        }
        .into();
        assert_eq!(err.code, ErrorCode::Timeout);
        assert_eq!(err.code.exit_code(), 75);
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let err = ApiError::missing_field("table");
        let json = serde_json::to_string(&err)?;

        assert!(json.contains("MISSING_FIELD"));
        assert!(json.contains("table"));
        assert!(!json.contains("details"));

        let deserialized: ApiError = serde_json::from_str(&json)?;
        assert_eq!(deserialized, err);
        Ok(())
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::database_error("Connection failed");
        let display = format!("{}", err);

        assert!(display.contains("DatabaseError"));
        assert!(display.contains("Connection failed"));
    }
}
