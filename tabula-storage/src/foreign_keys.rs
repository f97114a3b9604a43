//! Foreign-key discovery with label column selection.

use crate::traits::{CatalogReader, ShadowCatalogStore};
use std::collections::HashMap;
use std::sync::Arc;
use tabula_core::{default_label_column, ForeignKeyEdge, LabelColumn, TabulaResult};

/// Resolves the foreign keys of a table and picks a label column on each
/// referenced table.
///
/// Edges are computed fresh on every call; nothing is cached between calls.
#[derive(Clone)]
pub struct ForeignKeyResolver {
    catalog: Arc<dyn CatalogReader>,
    store: Arc<dyn ShadowCatalogStore>,
}

impl ForeignKeyResolver {
    pub fn new(catalog: Arc<dyn CatalogReader>, store: Arc<dyn ShadowCatalogStore>) -> Self {
        Self { catalog, store }
    }

    /// Foreign keys whose referencing side is `table`, each labelled when the
    /// referenced table is tracked and has a usable label column.
    pub async fn resolve(&self, table: &str) -> TabulaResult<Vec<ForeignKeyEdge>> {
        let mut edges = self.catalog.foreign_keys(table).await?;
        let mut labels: HashMap<String, Option<LabelColumn>> = HashMap::new();

        for edge in &mut edges {
            if !labels.contains_key(&edge.referenced_table) {
                let label = self.label_for(&edge.referenced_table).await?;
                labels.insert(edge.referenced_table.clone(), label);
            }
            edge.label = labels.get(&edge.referenced_table).cloned().flatten();
        }

        tracing::debug!(
            table,
            edges = edges.len(),
            labelled = edges.iter().filter(|e| e.label.is_some()).count(),
            "Resolved foreign keys"
        );

        Ok(edges)
    }

    async fn label_for(&self, referenced_table: &str) -> TabulaResult<Option<LabelColumn>> {
        let Some(tracked) = self.store.get_table(referenced_table).await? else {
            return Ok(None);
        };
        let columns = self.store.list_columns(tracked.table_id).await?;

        Ok(
            default_label_column(tracked.label_column.as_deref(), &columns).map(|c| LabelColumn {
                name: c.name.clone(),
                data_type: c.data_type.clone(),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCatalog, MockShadowStore};
    use crate::SchemaSync;
    use tabula_core::LiveColumn;

    fn edge(from: &str, column: &str, to: &str) -> ForeignKeyEdge {
        ForeignKeyEdge {
            referencing_table: from.to_string(),
            referencing_column: column.to_string(),
            referenced_table: to.to_string(),
            referenced_column: "id".to_string(),
            label: None,
        }
    }

    async fn setup() -> (MockCatalog, MockShadowStore, ForeignKeyResolver) {
        let catalog = MockCatalog::new();
        let store = MockShadowStore::new();
        catalog.create_table(
            1,
            "authors",
            vec![
                LiveColumn::new(1, "id", "integer"),
                LiveColumn::new(2, "email", "text"),
                LiveColumn::new(3, "name", "text"),
            ],
        );
        catalog.create_table(2, "tags", vec![LiveColumn::new(1, "id", "integer")]);
        catalog.create_table(
            3,
            "books",
            vec![
                LiveColumn::new(1, "id", "integer"),
                LiveColumn::new(2, "author_id", "integer"),
                LiveColumn::new(3, "tag_id", "integer"),
            ],
        );
        catalog.add_foreign_key(edge("books", "author_id", "authors"));
        catalog.add_foreign_key(edge("books", "tag_id", "tags"));

        SchemaSync::new(Arc::new(catalog.clone()), Arc::new(store.clone()))
            .run()
            .await
            .unwrap();

        let resolver = ForeignKeyResolver::new(Arc::new(catalog.clone()), Arc::new(store.clone()));
        (catalog, store, resolver)
    }

    #[tokio::test]
    async fn test_candidate_priority() {
        let (_catalog, _store, resolver) = setup().await;
        let edges = resolver.resolve("books").await.unwrap();

        let author = edges.iter().find(|e| e.referencing_column == "author_id").unwrap();
        // `name` outranks `email`.
        assert_eq!(author.label.as_ref().map(|l| l.name.as_str()), Some("name"));

        let tag = edges.iter().find(|e| e.referencing_column == "tag_id").unwrap();
        assert!(tag.label.is_none());
    }

    #[tokio::test]
    async fn test_configured_label_wins() {
        let (_catalog, store, resolver) = setup().await;
        let authors = store.get_table("authors").await.unwrap().unwrap();
        store
            .set_label_column(authors.table_id, Some("email"))
            .await
            .unwrap();

        let edges = resolver.resolve("books").await.unwrap();
        let author = edges.iter().find(|e| e.referencing_column == "author_id").unwrap();
        assert_eq!(author.label.as_ref().map(|l| l.name.as_str()), Some("email"));
    }

    #[tokio::test]
    async fn test_dropped_foreign_key_disappears() {
        let (catalog, _store, resolver) = setup().await;
        catalog.drop_foreign_key("books", "author_id");

        let edges = resolver.resolve("books").await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].referencing_column, "tag_id");
    }
}
