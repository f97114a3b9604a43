//! Schema synchronization engine.
//!
//! One pass reconciles the shadow catalog against the live catalog in five
//! ordered steps:
//!
//! 1. rename tracked tables whose physical id now carries a different name
//! 2. refresh the physical id of tracked tables recreated under the same name
//! 3. remove tracked tables that no longer exist
//! 4. track tables seen for the first time
//! 5. reconcile the columns and display order of every tracked table
//!
//! Steps are independent statements, not one transaction. A failure in
//! steps 1-4 aborts the pass; a failure in step 5 skips only that table.
//! Passes must be serialized by the caller.

use crate::cancel::{cancellable, with_deadline};
use crate::traits::{CatalogReader, ShadowCatalogStore};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tabula_core::{
    AppendNewAscending, ColumnDetail, DisplayOrderPolicy, LiveTable, PhysicalId, TabulaError,
    TabulaResult, TrackedTable,
};
use tokio::sync::watch;

/// A table whose column reconciliation failed during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTable {
    pub table: String,
    pub reason: String,
}

/// What one reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub tables_renamed: usize,
    pub tables_refreshed: usize,
    pub tables_removed: usize,
    pub tables_inserted: usize,
    pub columns_inserted: usize,
    pub columns_updated: usize,
    pub columns_deleted: usize,
    pub layouts_saved: usize,
    pub tables_skipped: Vec<SkippedTable>,
}

impl SyncReport {
    /// Number of shadow catalog writes issued. Zero means the pass was a no-op.
    pub fn writes(&self) -> usize {
        self.tables_renamed
            + self.tables_refreshed
            + self.tables_removed
            + self.tables_inserted
            + self.columns_inserted
            + self.columns_updated
            + self.columns_deleted
            + self.layouts_saved
    }
}

/// Drives reconciliation passes over injected backends.
#[derive(Clone)]
pub struct SchemaSync {
    catalog: Arc<dyn CatalogReader>,
    store: Arc<dyn ShadowCatalogStore>,
    policy: Arc<dyn DisplayOrderPolicy>,
}

impl SchemaSync {
    /// Create an engine that appends new columns by ascending id.
    pub fn new(catalog: Arc<dyn CatalogReader>, store: Arc<dyn ShadowCatalogStore>) -> Self {
        Self {
            catalog,
            store,
            policy: Arc::new(AppendNewAscending),
        }
    }

    /// Replace the display order policy.
    pub fn with_policy(mut self, policy: Arc<dyn DisplayOrderPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Run one pass until a shutdown signal is raised.
    ///
    /// Writes issued before the signal persist; the next pass converges.
    pub async fn run_cancellable(
        &self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> TabulaResult<SyncReport> {
        cancellable("schema sync", self.run(), shutdown_rx).await
    }

    /// Run one pass bounded by `deadline`.
    pub async fn run_with_deadline(&self, deadline: Duration) -> TabulaResult<SyncReport> {
        with_deadline("schema sync", self.run(), deadline).await
    }

    /// Run one reconciliation pass.
    pub async fn run(&self) -> TabulaResult<SyncReport> {
        let mut report = SyncReport::default();

        let live = self
            .catalog
            .live_tables()
            .await
            .map_err(|e| step_failed("list live tables", e))?;

        self.detect_renames(&live, &mut report)
            .await
            .map_err(|e| step_failed("rename detection", e))?;
        self.refresh_physical_ids(&live, &mut report)
            .await
            .map_err(|e| step_failed("identifier refresh", e))?;
        self.remove_vanished(&live, &mut report)
            .await
            .map_err(|e| step_failed("removal", e))?;
        self.insert_new(&live, &mut report)
            .await
            .map_err(|e| step_failed("insertion", e))?;

        tracing::info!(
            renamed = report.tables_renamed,
            refreshed = report.tables_refreshed,
            removed = report.tables_removed,
            inserted = report.tables_inserted,
            "Table registry reconciled"
        );

        let tracked = self
            .store
            .list_tables()
            .await
            .map_err(|e| step_failed("list tracked tables", e))?;

        for table in &tracked {
            if let Err(e) = self.reconcile_columns(table, &mut report).await {
                tracing::warn!(table = %table.name, error = %e, "Skipping column reconciliation");
                report.tables_skipped.push(SkippedTable {
                    table: table.name.clone(),
                    reason: e.to_string(),
                });
            }
        }

        tracing::info!(
            tables = tracked.len(),
            columns_inserted = report.columns_inserted,
            columns_updated = report.columns_updated,
            columns_deleted = report.columns_deleted,
            layouts_saved = report.layouts_saved,
            skipped = report.tables_skipped.len(),
            writes = report.writes(),
            "Schema sync pass complete"
        );

        Ok(report)
    }

    // ========================================================================
    // STEPS 1-4: TABLE REGISTRY
    // ========================================================================

    async fn detect_renames(&self, live: &[LiveTable], report: &mut SyncReport) -> TabulaResult<()> {
        let by_physical: BTreeMap<PhysicalId, &LiveTable> =
            live.iter().map(|t| (t.physical_id, t)).collect();

        for table in self.store.list_tables().await? {
            let Some(current) = by_physical.get(&table.physical_id) else {
                continue;
            };
            if current.name != table.name {
                tracing::info!(from = %table.name, to = %current.name, "Table renamed");
                self.store.rename_table(table.table_id, &current.name).await?;
                report.tables_renamed += 1;
            }
        }
        Ok(())
    }

    async fn refresh_physical_ids(
        &self,
        live: &[LiveTable],
        report: &mut SyncReport,
    ) -> TabulaResult<()> {
        let tracked = self.store.list_tables().await?;
        let mut held: HashSet<PhysicalId> = tracked.iter().map(|t| t.physical_id).collect();

        for table in &tracked {
            let Some(current) = live.iter().find(|t| t.name == table.name) else {
                continue;
            };
            // A row already holding the live id was renamed onto this name in step 1.
            if current.physical_id != table.physical_id && !held.contains(&current.physical_id) {
                tracing::info!(
                    table = %table.name,
                    from = table.physical_id,
                    to = current.physical_id,
                    "Table recreated, refreshing physical id"
                );
                self.store
                    .update_physical_id(table.table_id, current.physical_id)
                    .await?;
                // Leftover rows with the same name stay stale and fall to step 3.
                held.insert(current.physical_id);
                report.tables_refreshed += 1;
            }
        }
        Ok(())
    }

    async fn remove_vanished(&self, live: &[LiveTable], report: &mut SyncReport) -> TabulaResult<()> {
        for table in self.store.list_tables().await? {
            if !matches_live(&table, live) {
                tracing::info!(table = %table.name, table_id = table.table_id, "Table removed");
                self.store.delete_table(table.table_id).await?;
                report.tables_removed += 1;
            }
        }
        Ok(())
    }

    async fn insert_new(&self, live: &[LiveTable], report: &mut SyncReport) -> TabulaResult<()> {
        let tracked = self.store.list_tables().await?;

        for table in live {
            let known = tracked
                .iter()
                .any(|t| t.name == table.name && t.physical_id == table.physical_id);
            if !known {
                let table_id = self.store.insert_table(&table.name, table.physical_id).await?;
                tracing::info!(table = %table.name, table_id, "Table tracked");
                report.tables_inserted += 1;
            }
        }
        Ok(())
    }

    // ========================================================================
    // STEP 5: COLUMNS AND DISPLAY ORDER
    // ========================================================================

    async fn reconcile_columns(
        &self,
        table: &TrackedTable,
        report: &mut SyncReport,
    ) -> TabulaResult<()> {
        let live = self.catalog.live_columns(&table.name).await?;
        let mut stored = self.store.list_columns(table.table_id).await?;
        stored.sort_by_key(|c| (c.position, c.column_id));

        let mut by_position: BTreeMap<i16, ColumnDetail> = BTreeMap::new();
        for column in stored {
            if by_position.contains_key(&column.position) {
                tracing::warn!(
                    table = %table.name,
                    position = column.position,
                    column_id = column.column_id,
                    "Deleting duplicate column row"
                );
                self.store.delete_column(column.column_id).await?;
                report.columns_deleted += 1;
                continue;
            }
            by_position.insert(column.position, column);
        }

        let mut column_ids = BTreeSet::new();

        for live_column in &live {
            match by_position.remove(&live_column.position) {
                Some(mut column) => {
                    if column.differs_from(live_column) {
                        tracing::debug!(
                            table = %table.name,
                            column_id = column.column_id,
                            from = %column.name,
                            to = %live_column.name,
                            "Column changed"
                        );
                        column.apply(live_column);
                        self.store.update_column(&column).await?;
                        report.columns_updated += 1;
                    }
                    column_ids.insert(column.column_id);
                }
                None => {
                    let column_id = self.store.insert_column(table.table_id, live_column).await?;
                    tracing::debug!(
                        table = %table.name,
                        column = %live_column.name,
                        column_id,
                        "Column tracked"
                    );
                    report.columns_inserted += 1;
                    column_ids.insert(column_id);
                }
            }
        }

        // Whatever is left has no live column at its position.
        for column in by_position.into_values() {
            tracing::debug!(table = %table.name, column = %column.name, "Column removed");
            self.store.delete_column(column.column_id).await?;
            report.columns_deleted += 1;
        }

        let display_order = self.policy.reconcile(&table.display_order, &column_ids);
        if column_ids != table.column_ids || display_order != table.display_order {
            self.store
                .save_layout(table.table_id, &column_ids, &display_order)
                .await?;
            report.layouts_saved += 1;
        }

        Ok(())
    }
}

fn matches_live(table: &TrackedTable, live: &[LiveTable]) -> bool {
    live.iter()
        .any(|t| t.name == table.name && t.physical_id == table.physical_id)
}

fn step_failed(step: &str, error: TabulaError) -> TabulaError {
    tracing::error!(step, error = %error, "Schema sync aborted");
    error
}
