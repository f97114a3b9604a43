//! Operator edits to table presentation.

use crate::traits::ShadowCatalogStore;
use tabula_core::{validate_reorder, ColumnId, TabulaResult, TrackedTable, ValidationError};

async fn tracked(store: &dyn ShadowCatalogStore, table: &str) -> TabulaResult<TrackedTable> {
    store.get_table(table).await?.ok_or_else(|| {
        ValidationError::UnknownTable {
            table: table.to_string(),
        }
        .into()
    })
}

/// Replace the display order of `table`.
///
/// `order` must list every tracked column id exactly once. Nothing is
/// written when validation fails.
pub async fn reorder_columns(
    store: &dyn ShadowCatalogStore,
    table: &str,
    order: &[ColumnId],
) -> TabulaResult<()> {
    let tracked = tracked(store, table).await?;
    validate_reorder(table, &tracked.column_ids, order)?;

    store
        .save_layout(tracked.table_id, &tracked.column_ids, order)
        .await?;
    tracing::info!(table, columns = order.len(), "Display order replaced");
    Ok(())
}

/// Configure the column shown for foreign keys that reference `table`.
/// `None` restores the name-based default.
pub async fn set_label_column(
    store: &dyn ShadowCatalogStore,
    table: &str,
    column: Option<&str>,
) -> TabulaResult<()> {
    let tracked = tracked(store, table).await?;

    if let Some(name) = column {
        let columns = store.list_columns(tracked.table_id).await?;
        if !columns.iter().any(|c| c.name == name) {
            return Err(ValidationError::InvalidValue {
                field: "label_column".to_string(),
                reason: format!("{} has no column {}", table, name),
            }
            .into());
        }
    }

    store.set_label_column(tracked.table_id, column).await?;
    tracing::info!(table, label_column = ?column, "Label column configured");
    Ok(())
}
