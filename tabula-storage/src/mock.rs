//! In-memory catalog and shadow store for testing.

use crate::traits::{CatalogReader, ShadowCatalogStore};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tabula_core::{
    CatalogError, ColumnDetail, ColumnId, ForeignKeyEdge, LiveColumn, LiveTable, PhysicalId,
    TableId, TabulaError, TabulaResult, TrackedTable,
};

fn read<T>(lock: &RwLock<T>) -> TabulaResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| TabulaError::Catalog(CatalogError::LockPoisoned))
}

fn write<T>(lock: &RwLock<T>) -> TabulaResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| TabulaError::Catalog(CatalogError::LockPoisoned))
}

fn missing(what: String) -> TabulaError {
    TabulaError::Catalog(CatalogError::RowMissing { what })
}

// ============================================================================
// MOCK CATALOG
// ============================================================================

#[derive(Debug, Default)]
struct LiveState {
    tables: BTreeMap<PhysicalId, LiveTable>,
    columns: HashMap<PhysicalId, Vec<LiveColumn>>,
    foreign_keys: Vec<ForeignKeyEdge>,
    failing_tables: HashSet<String>,
    fail_table_listing: bool,
}

impl LiveState {
    fn id_of(&self, name: &str) -> Option<PhysicalId> {
        self.tables
            .values()
            .find(|t| t.name == name)
            .map(|t| t.physical_id)
    }
}

/// In-memory stand-in for the database catalog. DDL helpers mutate it the
/// way the real statements would.
#[derive(Debug, Clone, Default)]
pub struct MockCatalog {
    state: Arc<RwLock<LiveState>>,
}

impl MockCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// `CREATE TABLE`.
    pub fn create_table(&self, physical_id: PhysicalId, name: &str, columns: Vec<LiveColumn>) {
        if let Ok(mut state) = self.state.write() {
            state.tables.insert(
                physical_id,
                LiveTable {
                    physical_id,
                    name: name.to_string(),
                },
            );
            state.columns.insert(physical_id, columns);
        }
    }

    /// `ALTER TABLE .. RENAME TO`. The physical id is kept.
    pub fn rename_table(&self, from: &str, to: &str) {
        if let Ok(mut state) = self.state.write() {
            if let Some(id) = state.id_of(from) {
                if let Some(table) = state.tables.get_mut(&id) {
                    table.name = to.to_string();
                }
            }
            for edge in &mut state.foreign_keys {
                if edge.referencing_table == from {
                    edge.referencing_table = to.to_string();
                }
                if edge.referenced_table == from {
                    edge.referenced_table = to.to_string();
                }
            }
        }
    }

    /// `DROP TABLE`.
    pub fn drop_table(&self, name: &str) {
        if let Ok(mut state) = self.state.write() {
            if let Some(id) = state.id_of(name) {
                state.tables.remove(&id);
                state.columns.remove(&id);
            }
            state
                .foreign_keys
                .retain(|e| e.referencing_table != name && e.referenced_table != name);
        }
    }

    /// `ALTER TABLE .. ADD COLUMN`.
    pub fn add_column(&self, table: &str, column: LiveColumn) {
        if let Ok(mut state) = self.state.write() {
            if let Some(id) = state.id_of(table) {
                state.columns.entry(id).or_default().push(column);
            }
        }
    }

    /// `ALTER TABLE .. DROP COLUMN`.
    pub fn drop_column(&self, table: &str, position: i16) {
        if let Ok(mut state) = self.state.write() {
            if let Some(id) = state.id_of(table) {
                if let Some(columns) = state.columns.get_mut(&id) {
                    columns.retain(|c| c.position != position);
                }
            }
        }
    }

    /// `ALTER TABLE .. RENAME COLUMN`.
    pub fn rename_column(&self, table: &str, position: i16, to: &str) {
        if let Ok(mut state) = self.state.write() {
            if let Some(id) = state.id_of(table) {
                if let Some(column) = state
                    .columns
                    .get_mut(&id)
                    .and_then(|cols| cols.iter_mut().find(|c| c.position == position))
                {
                    column.name = to.to_string();
                }
            }
        }
    }

    /// `ALTER TABLE .. ADD FOREIGN KEY`. Any label on `edge` is discarded.
    pub fn add_foreign_key(&self, mut edge: ForeignKeyEdge) {
        edge.label = None;
        if let Ok(mut state) = self.state.write() {
            state.foreign_keys.push(edge);
        }
    }

    /// `ALTER TABLE .. DROP CONSTRAINT` for the key on `table.column`.
    pub fn drop_foreign_key(&self, table: &str, column: &str) {
        if let Ok(mut state) = self.state.write() {
            state
                .foreign_keys
                .retain(|e| !(e.referencing_table == table && e.referencing_column == column));
        }
    }

    /// Make column listing for `table` fail.
    pub fn fail_columns_for(&self, table: &str) {
        if let Ok(mut state) = self.state.write() {
            state.failing_tables.insert(table.to_string());
        }
    }

    /// Make table listing fail.
    pub fn fail_table_listing(&self, fail: bool) {
        if let Ok(mut state) = self.state.write() {
            state.fail_table_listing = fail;
        }
    }
}

#[async_trait]
impl CatalogReader for MockCatalog {
    async fn live_tables(&self) -> TabulaResult<Vec<LiveTable>> {
        let state = read(&self.state)?;
        if state.fail_table_listing {
            return Err(CatalogError::QueryFailed {
                operation: "live_tables".to_string(),
                reason: "injected failure".to_string(),
            }
            .into());
        }
        Ok(state.tables.values().cloned().collect())
    }

    async fn live_columns(&self, table: &str) -> TabulaResult<Vec<LiveColumn>> {
        let state = read(&self.state)?;
        if state.failing_tables.contains(table) {
            return Err(CatalogError::QueryFailed {
                operation: format!("live_columns({})", table),
                reason: "injected failure".to_string(),
            }
            .into());
        }

        let mut columns = state
            .id_of(table)
            .and_then(|id| state.columns.get(&id))
            .cloned()
            .unwrap_or_default();
        columns.sort_by_key(|c| c.position);
        Ok(columns)
    }

    async fn foreign_keys(&self, table: &str) -> TabulaResult<Vec<ForeignKeyEdge>> {
        let state = read(&self.state)?;
        Ok(state
            .foreign_keys
            .iter()
            .filter(|e| e.referencing_table == table)
            .cloned()
            .collect())
    }
}

// ============================================================================
// MOCK SHADOW STORE
// ============================================================================

#[derive(Debug, Default)]
struct ShadowState {
    tables: BTreeMap<TableId, TrackedTable>,
    columns: BTreeMap<ColumnId, ColumnDetail>,
    next_table_id: TableId,
    next_column_id: ColumnId,
}

/// In-memory shadow catalog that counts every write it receives.
#[derive(Debug, Clone, Default)]
pub struct MockShadowStore {
    state: Arc<RwLock<ShadowState>>,
    writes: Arc<AtomicUsize>,
}

impl MockShadowStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mutating calls served so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Get count of tracked tables.
    pub fn table_count(&self) -> usize {
        self.state.read().map(|s| s.tables.len()).unwrap_or(0)
    }

    /// Get count of tracked columns across all tables.
    pub fn column_count(&self) -> usize {
        self.state.read().map(|s| s.columns.len()).unwrap_or(0)
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ShadowCatalogStore for MockShadowStore {
    async fn list_tables(&self) -> TabulaResult<Vec<TrackedTable>> {
        Ok(read(&self.state)?.tables.values().cloned().collect())
    }

    async fn get_table(&self, name: &str) -> TabulaResult<Option<TrackedTable>> {
        Ok(read(&self.state)?
            .tables
            .values()
            .find(|t| t.name == name)
            .cloned())
    }

    async fn insert_table(&self, name: &str, physical_id: PhysicalId) -> TabulaResult<TableId> {
        let mut state = write(&self.state)?;
        state.next_table_id += 1;
        let table_id = state.next_table_id;
        state
            .tables
            .insert(table_id, TrackedTable::new(table_id, name, physical_id));
        self.record_write();
        Ok(table_id)
    }

    async fn rename_table(&self, table_id: TableId, name: &str) -> TabulaResult<()> {
        let mut state = write(&self.state)?;
        let table = state
            .tables
            .get_mut(&table_id)
            .ok_or_else(|| missing(format!("table {}", table_id)))?;
        table.name = name.to_string();
        self.record_write();
        Ok(())
    }

    async fn update_physical_id(
        &self,
        table_id: TableId,
        physical_id: PhysicalId,
    ) -> TabulaResult<()> {
        let mut state = write(&self.state)?;
        let table = state
            .tables
            .get_mut(&table_id)
            .ok_or_else(|| missing(format!("table {}", table_id)))?;
        table.physical_id = physical_id;
        self.record_write();
        Ok(())
    }

    async fn delete_table(&self, table_id: TableId) -> TabulaResult<()> {
        let mut state = write(&self.state)?;
        state.tables.remove(&table_id);
        state.columns.retain(|_, c| c.table_id != table_id);
        self.record_write();
        Ok(())
    }

    async fn save_layout(
        &self,
        table_id: TableId,
        column_ids: &BTreeSet<ColumnId>,
        display_order: &[ColumnId],
    ) -> TabulaResult<()> {
        let mut state = write(&self.state)?;
        let table = state
            .tables
            .get_mut(&table_id)
            .ok_or_else(|| missing(format!("table {}", table_id)))?;
        table.column_ids = column_ids.clone();
        table.display_order = display_order.to_vec();
        self.record_write();
        Ok(())
    }

    async fn set_label_column(
        &self,
        table_id: TableId,
        label_column: Option<&str>,
    ) -> TabulaResult<()> {
        let mut state = write(&self.state)?;
        let table = state
            .tables
            .get_mut(&table_id)
            .ok_or_else(|| missing(format!("table {}", table_id)))?;
        table.label_column = label_column.map(str::to_string);
        self.record_write();
        Ok(())
    }

    async fn list_columns(&self, table_id: TableId) -> TabulaResult<Vec<ColumnDetail>> {
        Ok(read(&self.state)?
            .columns
            .values()
            .filter(|c| c.table_id == table_id)
            .cloned()
            .collect())
    }

    async fn insert_column(&self, table_id: TableId, column: &LiveColumn) -> TabulaResult<ColumnId> {
        let mut state = write(&self.state)?;
        if !state.tables.contains_key(&table_id) {
            return Err(missing(format!("table {}", table_id)));
        }
        state.next_column_id += 1;
        let column_id = state.next_column_id;
        state.columns.insert(
            column_id,
            ColumnDetail {
                column_id,
                table_id,
                position: column.position,
                name: column.name.clone(),
                data_type: column.data_type.clone(),
            },
        );
        self.record_write();
        Ok(column_id)
    }

    async fn update_column(&self, column: &ColumnDetail) -> TabulaResult<()> {
        let mut state = write(&self.state)?;
        let stored = state
            .columns
            .get_mut(&column.column_id)
            .ok_or_else(|| missing(format!("column {}", column.column_id)))?;
        *stored = column.clone();
        self.record_write();
        Ok(())
    }

    async fn delete_column(&self, column_id: ColumnId) -> TabulaResult<()> {
        let mut state = write(&self.state)?;
        state.columns.remove(&column_id);
        self.record_write();
        Ok(())
    }
}
