//! `pg_catalog` reader.
//!
//! Tables are ordinary or partitioned relations of the active schema,
//! excluding the shadow catalog's own tables. Dropped attributes and system
//! columns are never reported.

use crate::db::DbClient;
use crate::pg_shadow::SHADOW_TABLES;
use async_trait::async_trait;
use tabula_core::{CatalogError, ForeignKeyEdge, LiveColumn, LiveTable, TabulaError, TabulaResult};
use tabula_storage::CatalogReader;

const LIVE_TABLES_SQL: &str = concat!(
    "SELECT cls.oid AS physical_id, cls.relname AS table_name ",
    "FROM pg_catalog.pg_class cls ",
    "JOIN pg_catalog.pg_namespace ns ",
    "  ON ns.oid = cls.relnamespace ",
    "WHERE ns.nspname = $1 ",
    "  AND cls.relkind IN ('r', 'p') ",
    "  AND NOT (cls.relname = ANY($2)) ",
    "ORDER BY cls.relname"
);

const LIVE_COLUMNS_SQL: &str = concat!(
    "SELECT ",
    "  attr.attnum AS position, ",
    "  attr.attname AS column_name, ",
    "  pg_catalog.format_type(attr.atttypid, attr.atttypmod) AS data_type, ",
    "  NOT attr.attnotnull AS is_nullable, ",
    "  CASE WHEN attr.attgenerated = '' ",
    "    THEN pg_catalog.pg_get_expr(def.adbin, def.adrelid) END AS default_expr, ",
    "  attr.attidentity <> '' AS is_identity, ",
    "  CASE WHEN attr.attgenerated <> '' ",
    "    THEN pg_catalog.pg_get_expr(def.adbin, def.adrelid) END AS generated_expr ",
    "FROM pg_catalog.pg_attribute attr ",
    "JOIN pg_catalog.pg_class cls ",
    "  ON cls.oid = attr.attrelid ",
    "JOIN pg_catalog.pg_namespace ns ",
    "  ON ns.oid = cls.relnamespace ",
    "LEFT JOIN pg_catalog.pg_attrdef def ",
    "  ON def.adrelid = attr.attrelid ",
    " AND def.adnum = attr.attnum ",
    "WHERE ns.nspname = $1 ",
    "  AND cls.relname = $2 ",
    "  AND attr.attnum > 0 ",
    "  AND NOT attr.attisdropped ",
    "ORDER BY attr.attnum"
);

// Composite keys are left out: a label join needs one referencing column.
const FOREIGN_KEYS_SQL: &str = concat!(
    "SELECT ",
    "  source.relname AS referencing_table, ",
    "  source_attr.attname AS referencing_column, ",
    "  target.relname AS referenced_table, ",
    "  target_attr.attname AS referenced_column ",
    "FROM pg_catalog.pg_constraint con ",
    "JOIN pg_catalog.pg_class source ",
    "  ON source.oid = con.conrelid ",
    "JOIN pg_catalog.pg_namespace source_ns ",
    "  ON source_ns.oid = source.relnamespace ",
    "JOIN pg_catalog.pg_class target ",
    "  ON target.oid = con.confrelid ",
    "JOIN pg_catalog.pg_namespace target_ns ",
    "  ON target_ns.oid = target.relnamespace ",
    "JOIN unnest(con.conkey) WITH ORDINALITY AS source_key(attnum, ord) ",
    "  ON TRUE ",
    "JOIN unnest(con.confkey) WITH ORDINALITY AS target_key(attnum, ord) ",
    "  ON source_key.ord = target_key.ord ",
    "JOIN pg_catalog.pg_attribute source_attr ",
    "  ON source_attr.attrelid = source.oid ",
    " AND source_attr.attnum = source_key.attnum ",
    "JOIN pg_catalog.pg_attribute target_attr ",
    "  ON target_attr.attrelid = target.oid ",
    " AND target_attr.attnum = target_key.attnum ",
    "WHERE con.contype = 'f' ",
    "  AND array_length(con.conkey, 1) = 1 ",
    "  AND source_ns.nspname = $1 ",
    "  AND target_ns.nspname = $1 ",
    "  AND source.relname = $2 ",
    "ORDER BY source_attr.attnum, con.conname"
);

/// Map a driver error to a catalog read failure, logging the statement.
pub(crate) fn query_failed(
    operation: &str,
    statement: &str,
) -> impl FnOnce(tokio_postgres::Error) -> TabulaError {
    let operation = operation.to_string();
    let statement = statement.to_string();
    move |err| {
        tracing::error!(
            operation = %operation,
            statement = %statement,
            error = ?err,
            "Catalog query failed"
        );
        CatalogError::QueryFailed {
            operation,
            reason: err.to_string(),
        }
        .into()
    }
}

/// Map a pool checkout failure.
pub(crate) fn connection_failed(err: deadpool_postgres::PoolError) -> TabulaError {
    tracing::error!(error = ?err, "Connection checkout failed");
    CatalogError::ConnectionFailed {
        reason: err.to_string(),
    }
    .into()
}

/// Reads the live schema through `pg_catalog`.
#[derive(Clone)]
pub struct PgCatalogReader {
    db: DbClient,
    schema: String,
}

impl PgCatalogReader {
    pub fn new(db: DbClient, schema: impl Into<String>) -> Self {
        Self {
            db,
            schema: schema.into(),
        }
    }

    async fn conn(&self) -> TabulaResult<deadpool_postgres::Object> {
        self.db.pool().get().await.map_err(connection_failed)
    }
}

#[async_trait]
impl CatalogReader for PgCatalogReader {
    async fn live_tables(&self) -> TabulaResult<Vec<LiveTable>> {
        let conn = self.conn().await?;
        let excluded: Vec<&str> = SHADOW_TABLES.to_vec();
        let rows = conn
            .query(LIVE_TABLES_SQL, &[&self.schema, &excluded])
            .await
            .map_err(query_failed("live_tables", LIVE_TABLES_SQL))?;

        Ok(rows
            .into_iter()
            .map(|row| LiveTable {
                physical_id: row.get("physical_id"),
                name: row.get("table_name"),
            })
            .collect())
    }

    async fn live_columns(&self, table: &str) -> TabulaResult<Vec<LiveColumn>> {
        let conn = self.conn().await?;
        let rows = conn
            .query(LIVE_COLUMNS_SQL, &[&self.schema, &table])
            .await
            .map_err(query_failed(&format!("live_columns({})", table), LIVE_COLUMNS_SQL))?;

        Ok(rows
            .into_iter()
            .map(|row| LiveColumn {
                position: row.get("position"),
                name: row.get("column_name"),
                data_type: row.get("data_type"),
                is_nullable: row.get("is_nullable"),
                default_expr: row.get("default_expr"),
                is_identity: row.get("is_identity"),
                generated_expr: row.get("generated_expr"),
            })
            .collect())
    }

    async fn foreign_keys(&self, table: &str) -> TabulaResult<Vec<ForeignKeyEdge>> {
        let conn = self.conn().await?;
        let rows = conn
            .query(FOREIGN_KEYS_SQL, &[&self.schema, &table])
            .await
            .map_err(query_failed(&format!("foreign_keys({})", table), FOREIGN_KEYS_SQL))?;

        Ok(rows
            .into_iter()
            .map(|row| ForeignKeyEdge {
                referencing_table: row.get("referencing_table"),
                referencing_column: row.get("referencing_column"),
                referenced_table: row.get("referenced_table"),
                referenced_column: row.get("referenced_column"),
                label: None,
            })
            .collect())
    }
}
