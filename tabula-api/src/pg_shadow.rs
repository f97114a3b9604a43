//! Shadow catalog persisted in two PostgreSQL tables.
//!
//! `tabula_tables` holds one row per tracked table with its column-id set
//! and display order as `jsonb` arrays. `tabula_columns` holds one row per
//! tracked column; rows cascade away with their table.

use crate::db::DbClient;
use crate::pg_catalog::{connection_failed, query_failed};
use async_trait::async_trait;
use std::collections::BTreeSet;
use tabula_core::{
    CatalogError, ColumnDetail, ColumnId, LiveColumn, PhysicalId, TableId, TabulaError,
    TabulaResult, TrackedTable,
};
use tabula_storage::ShadowCatalogStore;
use tokio_postgres::types::Json;
use tokio_postgres::Row;

/// Tables owned by the shadow catalog. Never reported as live tables.
pub const SHADOW_TABLES: &[&str] = &["tabula_tables", "tabula_columns"];

const CREATE_SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS tabula_tables (
    table_id      BIGSERIAL PRIMARY KEY,
    name          TEXT NOT NULL,
    physical_id   OID NOT NULL,
    column_ids    JSONB NOT NULL DEFAULT '[]'::jsonb,
    display_order JSONB NOT NULL DEFAULT '[]'::jsonb,
    label_column  TEXT
);

CREATE TABLE IF NOT EXISTS tabula_columns (
    column_id BIGSERIAL PRIMARY KEY,
    table_id  BIGINT NOT NULL REFERENCES tabula_tables (table_id) ON DELETE CASCADE,
    position  SMALLINT NOT NULL,
    name      TEXT NOT NULL,
    data_type TEXT NOT NULL,
    UNIQUE (table_id, position)
);

CREATE INDEX IF NOT EXISTS tabula_tables_name_idx ON tabula_tables (name);
";

const TABLE_COLUMNS: &str =
    "table_id, name, physical_id, column_ids, display_order, label_column";

const COLUMN_COLUMNS: &str = "column_id, table_id, position, name, data_type";

fn write_failed(operation: &'static str, table: String) -> impl FnOnce(tokio_postgres::Error) -> TabulaError {
    move |err| {
        tracing::error!(
            operation = operation,
            table = %table,
            error = ?err,
            "Shadow catalog write failed"
        );
        CatalogError::WriteFailed {
            operation: operation.to_string(),
            table,
            reason: err.to_string(),
        }
        .into()
    }
}

fn row_missing(what: String) -> TabulaError {
    CatalogError::RowMissing { what }.into()
}

fn decode_failed(operation: &str) -> impl FnOnce(tokio_postgres::Error) -> TabulaError + '_ {
    move |err| {
        CatalogError::QueryFailed {
            operation: operation.to_string(),
            reason: format!("undecodable row: {}", err),
        }
        .into()
    }
}

fn tracked_from_row(row: &Row) -> TabulaResult<TrackedTable> {
    let Json(column_ids): Json<BTreeSet<ColumnId>> =
        row.try_get("column_ids").map_err(decode_failed("tracked table"))?;
    let Json(display_order): Json<Vec<ColumnId>> =
        row.try_get("display_order").map_err(decode_failed("tracked table"))?;

    Ok(TrackedTable {
        table_id: row.try_get("table_id").map_err(decode_failed("tracked table"))?,
        name: row.try_get("name").map_err(decode_failed("tracked table"))?,
        physical_id: row.try_get("physical_id").map_err(decode_failed("tracked table"))?,
        column_ids,
        display_order,
        label_column: row.try_get("label_column").map_err(decode_failed("tracked table"))?,
    })
}

fn column_from_row(row: &Row) -> TabulaResult<ColumnDetail> {
    Ok(ColumnDetail {
        column_id: row.try_get("column_id").map_err(decode_failed("column detail"))?,
        table_id: row.try_get("table_id").map_err(decode_failed("column detail"))?,
        position: row.try_get("position").map_err(decode_failed("column detail"))?,
        name: row.try_get("name").map_err(decode_failed("column detail"))?,
        data_type: row.try_get("data_type").map_err(decode_failed("column detail"))?,
    })
}

/// [`ShadowCatalogStore`] over the read-write pool.
#[derive(Clone)]
pub struct PgShadowStore {
    db: DbClient,
}

impl PgShadowStore {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }

    /// Create the shadow tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> TabulaResult<()> {
        let conn = self.conn().await?;
        conn.batch_execute(CREATE_SCHEMA_SQL)
            .await
            .map_err(write_failed("ensure_schema", SHADOW_TABLES.join(", ")))?;
        tracing::debug!("Shadow catalog schema ready");
        Ok(())
    }

    async fn conn(&self) -> TabulaResult<deadpool_postgres::Object> {
        self.db.pool().get().await.map_err(connection_failed)
    }

    /// Run one single-row update, failing when no row matched.
    async fn update_one(
        &self,
        operation: &'static str,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
        what: String,
    ) -> TabulaResult<()> {
        let conn = self.conn().await?;
        let affected = conn
            .execute(sql, params)
            .await
            .map_err(write_failed(operation, what.clone()))?;
        if affected == 0 {
            return Err(row_missing(what));
        }
        Ok(())
    }
}

#[async_trait]
impl ShadowCatalogStore for PgShadowStore {
    async fn list_tables(&self) -> TabulaResult<Vec<TrackedTable>> {
        let sql = format!("SELECT {} FROM tabula_tables ORDER BY table_id", TABLE_COLUMNS);
        let conn = self.conn().await?;
        let rows = conn
            .query(&sql, &[])
            .await
            .map_err(query_failed("list_tables", &sql))?;
        rows.iter().map(tracked_from_row).collect()
    }

    async fn get_table(&self, name: &str) -> TabulaResult<Option<TrackedTable>> {
        let sql = format!(
            "SELECT {} FROM tabula_tables WHERE name = $1 ORDER BY table_id LIMIT 1",
            TABLE_COLUMNS
        );
        let conn = self.conn().await?;
        let row = conn
            .query_opt(&sql, &[&name])
            .await
            .map_err(query_failed("get_table", &sql))?;
        row.as_ref().map(tracked_from_row).transpose()
    }

    async fn insert_table(&self, name: &str, physical_id: PhysicalId) -> TabulaResult<TableId> {
        let conn = self.conn().await?;
        let row = conn
            .query_one(
                "INSERT INTO tabula_tables (name, physical_id) VALUES ($1, $2) RETURNING table_id",
                &[&name, &physical_id],
            )
            .await
            .map_err(write_failed("insert_table", name.to_string()))?;
        row.try_get(0).map_err(decode_failed("insert_table"))
    }

    async fn rename_table(&self, table_id: TableId, name: &str) -> TabulaResult<()> {
        self.update_one(
            "rename_table",
            "UPDATE tabula_tables SET name = $2 WHERE table_id = $1",
            &[&table_id, &name],
            format!("table {}", table_id),
        )
        .await
    }

    async fn update_physical_id(&self, table_id: TableId, physical_id: PhysicalId) -> TabulaResult<()> {
        self.update_one(
            "update_physical_id",
            "UPDATE tabula_tables SET physical_id = $2 WHERE table_id = $1",
            &[&table_id, &physical_id],
            format!("table {}", table_id),
        )
        .await
    }

    async fn delete_table(&self, table_id: TableId) -> TabulaResult<()> {
        self.update_one(
            "delete_table",
            "DELETE FROM tabula_tables WHERE table_id = $1",
            &[&table_id],
            format!("table {}", table_id),
        )
        .await
    }

    async fn save_layout(
        &self,
        table_id: TableId,
        column_ids: &BTreeSet<ColumnId>,
        display_order: &[ColumnId],
    ) -> TabulaResult<()> {
        self.update_one(
            "save_layout",
            "UPDATE tabula_tables SET column_ids = $2, display_order = $3 WHERE table_id = $1",
            &[&table_id, &Json(column_ids), &Json(display_order)],
            format!("table {}", table_id),
        )
        .await
    }

    async fn set_label_column(&self, table_id: TableId, label_column: Option<&str>) -> TabulaResult<()> {
        self.update_one(
            "set_label_column",
            "UPDATE tabula_tables SET label_column = $2 WHERE table_id = $1",
            &[&table_id, &label_column],
            format!("table {}", table_id),
        )
        .await
    }

    async fn list_columns(&self, table_id: TableId) -> TabulaResult<Vec<ColumnDetail>> {
        let sql = format!(
            "SELECT {} FROM tabula_columns WHERE table_id = $1 ORDER BY position, column_id",
            COLUMN_COLUMNS
        );
        let conn = self.conn().await?;
        let rows = conn
            .query(&sql, &[&table_id])
            .await
            .map_err(query_failed("list_columns", &sql))?;
        rows.iter().map(column_from_row).collect()
    }

    async fn insert_column(&self, table_id: TableId, column: &LiveColumn) -> TabulaResult<ColumnId> {
        let conn = self.conn().await?;
        let row = conn
            .query_one(
                "INSERT INTO tabula_columns (table_id, position, name, data_type) \
                 VALUES ($1, $2, $3, $4) RETURNING column_id",
                &[&table_id, &column.position, &column.name, &column.data_type],
            )
            .await
            .map_err(write_failed("insert_column", format!("table {}", table_id)))?;
        row.try_get(0).map_err(decode_failed("insert_column"))
    }

    async fn update_column(&self, column: &ColumnDetail) -> TabulaResult<()> {
        self.update_one(
            "update_column",
            "UPDATE tabula_columns SET position = $2, name = $3, data_type = $4 \
             WHERE column_id = $1",
            &[&column.column_id, &column.position, &column.name, &column.data_type],
            format!("column {}", column.column_id),
        )
        .await
    }

    async fn delete_column(&self, column_id: ColumnId) -> TabulaResult<()> {
        self.update_one(
            "delete_column",
            "DELETE FROM tabula_columns WHERE column_id = $1",
            &[&column_id],
            format!("column {}", column_id),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_covers_shadow_tables() {
        for table in SHADOW_TABLES {
            assert!(CREATE_SCHEMA_SQL.contains(&format!("CREATE TABLE IF NOT EXISTS {}", table)));
        }
    }

    #[test]
    fn test_columns_cascade_with_table() {
        assert!(CREATE_SCHEMA_SQL.contains("ON DELETE CASCADE"));
        assert!(CREATE_SCHEMA_SQL.contains("UNIQUE (table_id, position)"));
    }

    #[test]
    fn test_row_missing_names_row() {
        let err = row_missing("table 7".to_string());
        assert!(matches!(
            err,
            TabulaError::Catalog(CatalogError::RowMissing { ref what }) if what == "table 7"
        ));
    }
}
