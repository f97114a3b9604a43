//! Tabula API - PostgreSQL Backends and Browse Execution
//!
//! Implements the `tabula-storage` catalog traits over `pg_catalog` and a
//! pair of shadow catalog tables, executes compiled browse statements on a
//! pooled connection and maps result rows generically. Also hosts the
//! environment-driven configuration and tracing setup used by the `tabula`
//! binary.

pub mod browse;
pub mod config;
pub mod db;
pub mod error;
pub mod pg_catalog;
pub mod pg_shadow;
pub mod row_mapping;
pub mod telemetry;

pub use browse::BrowseService;
pub use config::ApiConfig;
pub use db::{DbClient, DbConfig, DbHandles};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use pg_catalog::PgCatalogReader;
pub use pg_shadow::{PgShadowStore, SHADOW_TABLES};
pub use row_mapping::{BrowseResponse, RowMapper};

use std::sync::Arc;
use tabula_storage::{BrowsePlanner, SchemaSync};

/// Wired components sharing one read-write pool.
#[derive(Clone)]
pub struct Tabula {
    pub config: ApiConfig,
    pub handles: DbHandles,
    pub catalog: Arc<PgCatalogReader>,
    pub store: Arc<PgShadowStore>,
}

impl Tabula {
    pub fn new(config: ApiConfig, handles: DbHandles) -> Self {
        let catalog = Arc::new(PgCatalogReader::new(
            handles.read_write.clone(),
            config.schema.clone(),
        ));
        let store = Arc::new(PgShadowStore::new(handles.read_write.clone()));
        Self {
            config,
            handles,
            catalog,
            store,
        }
    }

    /// Build from `TABULA_*` environment variables.
    pub fn from_env() -> ApiResult<Self> {
        Ok(Self::new(ApiConfig::from_env()?, DbHandles::from_env()?))
    }

    pub fn schema_sync(&self) -> SchemaSync {
        SchemaSync::new(self.catalog.clone(), self.store.clone())
    }

    pub fn browse_service(&self) -> BrowseService {
        let planner = BrowsePlanner::new(self.catalog.clone(), self.store.clone());
        BrowseService::new(
            self.handles.read_write.clone(),
            planner,
            self.config.page_size,
            self.config.query_timeout,
        )
    }
}
