//! Browse planning: shadow catalog reads feeding the query compiler.

use crate::foreign_keys::ForeignKeyResolver;
use crate::traits::{CatalogReader, ShadowCatalogStore};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tabula_core::{
    compile_browse, AppendNewAscending, BrowseRequest, ColumnDetail, CompiledQuery,
    DisplayOrderPolicy, TabulaResult, TrackedTable, ValidationError,
};

/// Compiles browse requests against the current shadow catalog.
///
/// Read-only: a stale display order is reconciled in memory and never
/// written back. Safe to share across concurrent requests.
#[derive(Clone)]
pub struct BrowsePlanner {
    store: Arc<dyn ShadowCatalogStore>,
    resolver: ForeignKeyResolver,
    policy: Arc<dyn DisplayOrderPolicy>,
}

impl BrowsePlanner {
    pub fn new(catalog: Arc<dyn CatalogReader>, store: Arc<dyn ShadowCatalogStore>) -> Self {
        Self {
            resolver: ForeignKeyResolver::new(catalog, store.clone()),
            store,
            policy: Arc::new(AppendNewAscending),
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn DisplayOrderPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Compile `request` into one statement.
    pub async fn plan(&self, request: &BrowseRequest, page_size: i64) -> TabulaResult<CompiledQuery> {
        let table = self.tracked(&request.table).await?;
        let columns = self.ordered_columns(&table).await?;
        let edges = self.resolver.resolve(&table.name).await?;

        let compiled = compile_browse(request, &columns, &edges, page_size)?;

        if !compiled.ignored_filters.is_empty() {
            tracing::debug!(
                table = %table.name,
                ignored = ?compiled.ignored_filters,
                "Ignoring filters that name no column"
            );
        }
        tracing::debug!(
            table = %table.name,
            statement = %compiled.sql,
            binds = compiled.binds.len(),
            "Compiled browse query"
        );

        Ok(compiled)
    }

    /// Tracked columns of `table` in display order.
    pub async fn ordered_columns(&self, table: &TrackedTable) -> TabulaResult<Vec<ColumnDetail>> {
        let columns = self.store.list_columns(table.table_id).await?;
        let all: BTreeSet<_> = columns.iter().map(|c| c.column_id).collect();
        let order = self.policy.reconcile(&table.display_order, &all);

        let mut by_id: HashMap<_, _> = columns.into_iter().map(|c| (c.column_id, c)).collect();
        Ok(order.into_iter().filter_map(|id| by_id.remove(&id)).collect())
    }

    async fn tracked(&self, name: &str) -> TabulaResult<TrackedTable> {
        self.store.get_table(name).await?.ok_or_else(|| {
            ValidationError::UnknownTable {
                table: name.to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCatalog, MockShadowStore};
    use crate::SchemaSync;
    use tabula_core::{ForeignKeyEdge, LiveColumn, SortOrder, TabulaError};

    async fn setup() -> (MockCatalog, MockShadowStore, BrowsePlanner) {
        let catalog = MockCatalog::new();
        let store = MockShadowStore::new();
        catalog.create_table(
            1,
            "customers",
            vec![LiveColumn::new(1, "id", "integer"), LiveColumn::new(2, "name", "text")],
        );
        catalog.create_table(
            2,
            "orders",
            vec![
                LiveColumn::new(1, "id", "integer"),
                LiveColumn::new(2, "customer_id", "integer"),
                LiveColumn::new(3, "note", "text"),
            ],
        );
        catalog.add_foreign_key(ForeignKeyEdge {
            referencing_table: "orders".to_string(),
            referencing_column: "customer_id".to_string(),
            referenced_table: "customers".to_string(),
            referenced_column: "id".to_string(),
            label: None,
        });

        SchemaSync::new(Arc::new(catalog.clone()), Arc::new(store.clone()))
            .run()
            .await
            .unwrap();

        let planner = BrowsePlanner::new(Arc::new(catalog.clone()), Arc::new(store.clone()));
        (catalog, store, planner)
    }

    #[tokio::test]
    async fn test_plan_with_label_filter_and_sort() {
        let (_catalog, _store, planner) = setup().await;
        let request = BrowseRequest::new("orders")
            .with_filter("customer_name", "acme")
            .with_filter("page", "2")
            .sorted_by("customer_name", SortOrder::Desc);

        let q = planner.plan(&request, 50).await.unwrap();

        assert!(q.sql.contains("LEFT JOIN \"customers\" AS \"customers\""));
        assert!(q.sql.contains("WHERE (\"customers\".\"name\"::text ILIKE $1)"));
        assert!(q.sql.contains("ORDER BY \"customers\".\"name\" DESC"));
        assert_eq!(q.binds, vec!["%acme%"]);
        assert_eq!(q.ignored_filters, vec!["page".to_string()]);
        assert_eq!(
            q.column_meta["customer_id"].label_table.as_deref(),
            Some("customers")
        );
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let (_catalog, _store, planner) = setup().await;
        let err = planner.plan(&BrowseRequest::new("nope"), 50).await.unwrap_err();
        assert!(err.is_client_error());
        assert!(matches!(
            err,
            TabulaError::Validation(ValidationError::UnknownTable { .. })
        ));
    }

    #[tokio::test]
    async fn test_columns_follow_display_order() {
        let (_catalog, store, planner) = setup().await;
        let table = store.get_table("orders").await.unwrap().unwrap();
        let mut reversed = table.display_order.clone();
        reversed.reverse();
        store
            .save_layout(table.table_id, &table.column_ids, &reversed)
            .await
            .unwrap();

        let table = store.get_table("orders").await.unwrap().unwrap();
        let names: Vec<String> = planner
            .ordered_columns(&table)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["note", "customer_id", "id"]);
    }

    #[tokio::test]
    async fn test_planning_writes_nothing() {
        let (_catalog, store, planner) = setup().await;
        let before = store.write_count();
        planner.plan(&BrowseRequest::new("orders"), 10).await.unwrap();
        assert_eq!(store.write_count(), before);
    }
}
