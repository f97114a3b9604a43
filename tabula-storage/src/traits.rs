//! Async seams between the synchronization engine and its backends.
//!
//! `tabula-api` implements both traits over PostgreSQL; [`crate::mock`]
//! implements them in memory for tests.

use async_trait::async_trait;
use std::collections::BTreeSet;
use tabula_core::{
    ColumnDetail, ColumnId, ForeignKeyEdge, LiveColumn, LiveTable, PhysicalId, TableId,
    TabulaResult, TrackedTable,
};

/// Read-only access to the database's own catalog.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Physical tables in the active schema.
    async fn live_tables(&self) -> TabulaResult<Vec<LiveTable>>;

    /// Columns of `table` ordered by position. Dropped attributes are excluded.
    async fn live_columns(&self, table: &str) -> TabulaResult<Vec<LiveColumn>>;

    /// Single-column foreign keys whose referencing side is `table`.
    ///
    /// Edges come back without a label; [`crate::ForeignKeyResolver`] fills it in.
    async fn foreign_keys(&self, table: &str) -> TabulaResult<Vec<ForeignKeyEdge>>;
}

/// Persistence for the shadow catalog.
#[async_trait]
pub trait ShadowCatalogStore: Send + Sync {
    // ========================================================================
    // TABLE REGISTRY
    // ========================================================================

    /// All tracked tables.
    async fn list_tables(&self) -> TabulaResult<Vec<TrackedTable>>;

    /// Look up a tracked table by its current name.
    async fn get_table(&self, name: &str) -> TabulaResult<Option<TrackedTable>>;

    /// Track a newly observed table, returning its stable id.
    async fn insert_table(&self, name: &str, physical_id: PhysicalId) -> TabulaResult<TableId>;

    async fn rename_table(&self, table_id: TableId, name: &str) -> TabulaResult<()>;

    async fn update_physical_id(&self, table_id: TableId, physical_id: PhysicalId)
        -> TabulaResult<()>;

    /// Delete a tracked table together with its column rows.
    async fn delete_table(&self, table_id: TableId) -> TabulaResult<()>;

    /// Replace the tracked column set and display order of a table.
    async fn save_layout(
        &self,
        table_id: TableId,
        column_ids: &BTreeSet<ColumnId>,
        display_order: &[ColumnId],
    ) -> TabulaResult<()>;

    async fn set_label_column(&self, table_id: TableId, label_column: Option<&str>)
        -> TabulaResult<()>;

    // ========================================================================
    // COLUMN REGISTRY
    // ========================================================================

    /// Column rows of a table, in no particular order.
    async fn list_columns(&self, table_id: TableId) -> TabulaResult<Vec<ColumnDetail>>;

    /// Track a newly observed column, returning its stable id.
    async fn insert_column(&self, table_id: TableId, column: &LiveColumn) -> TabulaResult<ColumnId>;

    /// Overwrite name, type and position of an existing column row.
    async fn update_column(&self, column: &ColumnDetail) -> TabulaResult<()>;

    async fn delete_column(&self, column_id: ColumnId) -> TabulaResult<()>;
}
