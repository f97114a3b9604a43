//! API Configuration Module
//!
//! Paging, active schema and deadlines. Configuration is loaded from
//! environment variables with sensible defaults for development.

use crate::error::{ApiError, ApiResult};
use std::time::Duration;

/// Smallest and largest accepted page size.
pub const PAGE_SIZE_RANGE: (i64, i64) = (1, 10_000);

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// Settings shared by sync and browse.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Rows returned per browse page. Not a request parameter.
    pub page_size: i64,

    /// Schema whose tables are tracked.
    pub schema: String,

    /// Upper bound for one reconciliation pass.
    pub sync_timeout: Duration,

    /// Upper bound for one browse statement.
    pub query_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            schema: "public".to_string(),
            sync_timeout: Duration::from_secs(120),
            query_timeout: Duration::from_secs(30),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `TABULA_PAGE_SIZE`: Rows per page (default: 50)
    /// - `TABULA_SCHEMA`: Active schema (default: public)
    /// - `TABULA_SYNC_TIMEOUT_SECS`: Reconciliation deadline (default: 120)
    /// - `TABULA_QUERY_TIMEOUT_SECS`: Browse deadline (default: 30)
    pub fn from_env() -> ApiResult<Self> {
        let defaults = Self::default();

        let page_size = match std::env::var("TABULA_PAGE_SIZE") {
            Ok(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|_| ApiError::invalid_format("TABULA_PAGE_SIZE", "an integer"))?,
            Err(_) => defaults.page_size,
        };

        let schema = std::env::var("TABULA_SCHEMA")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.schema);

        let sync_timeout = std::env::var("TABULA_SYNC_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.sync_timeout);

        let query_timeout = std::env::var("TABULA_QUERY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.query_timeout);

        let config = Self {
            page_size,
            schema,
            sync_timeout,
            query_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> ApiResult<()> {
        let (min, max) = PAGE_SIZE_RANGE;
        if !(min..=max).contains(&self.page_size) {
            return Err(ApiError::invalid_range("TABULA_PAGE_SIZE", min, max));
        }
        if self.sync_timeout.is_zero() || self.query_timeout.is_zero() {
            return Err(ApiError::invalid_input("Timeouts must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.page_size, 50);
        assert_eq!(config.schema, "public");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_page_size_bounds() {
        let mut config = ApiConfig::default();

        config.page_size = 0;
        let err = config.validate().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRange);

        config.page_size = 10_001;
        assert!(config.validate().is_err());

        config.page_size = 10_000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ApiConfig {
            query_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
