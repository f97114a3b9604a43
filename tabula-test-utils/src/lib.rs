//! Tabula Test Utilities
//!
//! Shared test infrastructure for the tabula workspace:
//! - Proptest generators for live schemas, search expressions and orders
//! - Fixtures for a small bookstore schema
//! - Assertions for tabula error classes

// Re-export mock backends from their source crate
pub use tabula_storage::{MockCatalog, MockShadowStore, SchemaSync, SyncReport};

pub use tabula_core::{
    CatalogError, ColumnDetail, ColumnId, ForeignKeyEdge, LiveColumn, LiveTable, PhysicalId,
    TabulaError, TabulaResult, ValidationError,
};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for schemas and search input.

    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    /// Generate a lowercase SQL identifier.
    pub fn arb_identifier() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,11}"
    }

    /// Generate a declared type as `format_type` would print it.
    pub fn arb_data_type() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("integer".to_string()),
            Just("bigint".to_string()),
            Just("text".to_string()),
            Just("boolean".to_string()),
            Just("character varying(64)".to_string()),
            Just("numeric(10,2)".to_string()),
            Just("timestamp with time zone".to_string()),
            Just("jsonb".to_string()),
            Just("uuid".to_string()),
        ]
    }

    /// Generate the columns of one table: unique names, positions from 1.
    pub fn arb_live_columns(max: usize) -> impl Strategy<Value = Vec<LiveColumn>> {
        (
            prop::collection::btree_set(arb_identifier(), 1..=max.max(1)),
            prop::collection::vec(arb_data_type(), max.max(1)),
        )
            .prop_map(|(names, types)| {
                names
                    .into_iter()
                    .zip(types)
                    .enumerate()
                    .map(|(i, (name, data_type))| LiveColumn::new(i as i16 + 1, name, data_type))
                    .collect()
            })
    }

    /// Generate a schema of uniquely named tables with distinct physical ids.
    pub fn arb_schema(max_tables: usize) -> impl Strategy<Value = Vec<(LiveTable, Vec<LiveColumn>)>> {
        prop::collection::btree_map(arb_identifier(), arb_live_columns(6), 1..=max_tables.max(1))
            .prop_map(|tables| {
                tables
                    .into_iter()
                    .enumerate()
                    .map(|(i, (name, columns))| {
                        (
                            LiveTable {
                                physical_id: 16_384 + i as PhysicalId,
                                name,
                            },
                            columns,
                        )
                    })
                    .collect()
            })
    }

    /// Generate a raw filter string out of grammar fragments.
    pub fn arb_search_expression() -> impl Strategy<Value = String> {
        let fragment = prop_oneof![
            "[a-z]{1,6}",
            "[a-z]{1,3}\\*[a-z]{1,3}",
            Just("AND".to_string()),
            Just("or".to_string()),
            "!=[a-z]{1,5}",
            "\"[a-z ]{0,8}\"",
            "'[a-z ]{0,8}'",
            Just("!=\"\"".to_string()),
        ];
        prop::collection::vec(fragment, 0..6).prop_map(|parts| parts.join(" "))
    }

    /// Generate a column-id set and a stale order drawn partly from it.
    pub fn arb_stale_order() -> impl Strategy<Value = (BTreeSet<ColumnId>, Vec<ColumnId>)> {
        (
            prop::collection::btree_set(1i64..200, 0..20),
            prop::collection::vec(1i64..200, 0..25),
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Ready-made schemas.

    use super::*;
    use std::sync::Arc;

    /// Build columns from `(name, type)` pairs, positions from 1.
    pub fn live_columns(spec: &[(&str, &str)]) -> Vec<LiveColumn> {
        spec.iter()
            .enumerate()
            .map(|(i, (name, data_type))| LiveColumn::new(i as i16 + 1, *name, *data_type))
            .collect()
    }

    /// Unlabelled foreign key `from.column -> to.id`.
    pub fn edge(from: &str, column: &str, to: &str) -> ForeignKeyEdge {
        ForeignKeyEdge {
            referencing_table: from.to_string(),
            referencing_column: column.to_string(),
            referenced_table: to.to_string(),
            referenced_column: "id".to_string(),
            label: None,
        }
    }

    /// `authors`, `publishers` and `books`, where books reference authors
    /// twice (writer and editor) and publishers once. Publishers have no
    /// label candidate.
    pub fn bookstore_catalog() -> MockCatalog {
        let catalog = MockCatalog::new();
        catalog.create_table(
            16_384,
            "authors",
            live_columns(&[("id", "integer"), ("name", "text"), ("born", "date")]),
        );
        catalog.create_table(
            16_390,
            "publishers",
            live_columns(&[("id", "integer"), ("code", "character varying(8)")]),
        );
        catalog.create_table(
            16_400,
            "books",
            live_columns(&[
                ("id", "integer"),
                ("title", "text"),
                ("author_id", "integer"),
                ("editor_id", "integer"),
                ("publisher_id", "integer"),
                ("price", "numeric(8,2)"),
            ]),
        );
        catalog.add_foreign_key(edge("books", "author_id", "authors"));
        catalog.add_foreign_key(edge("books", "editor_id", "authors"));
        catalog.add_foreign_key(edge("books", "publisher_id", "publishers"));
        catalog
    }

    /// The bookstore schema after one reconciliation pass.
    pub async fn synced_bookstore() -> TabulaResult<(MockCatalog, MockShadowStore)> {
        let catalog = bookstore_catalog();
        let store = MockShadowStore::new();
        SchemaSync::new(Arc::new(catalog.clone()), Arc::new(store.clone()))
            .run()
            .await?;
        Ok((catalog, store))
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for tabula-specific outcomes.

    use super::*;
    use std::collections::BTreeSet;

    /// Assert that a result failed on client input.
    #[track_caller]
    pub fn assert_client_error<T: std::fmt::Debug>(result: &TabulaResult<T>) {
        match result {
            Err(e) if e.is_client_error() => {}
            other => panic!("Expected client error, got: {:?}", other),
        }
    }

    /// Assert that a result failed because of a shutdown signal.
    #[track_caller]
    pub fn assert_cancelled<T: std::fmt::Debug>(result: &TabulaResult<T>) {
        match result {
            Err(TabulaError::Catalog(CatalogError::Cancelled { .. })) => {}
            other => panic!("Expected Cancelled, got: {:?}", other),
        }
    }

    /// Assert that a result is an unknown sort column error naming `column`.
    #[track_caller]
    pub fn assert_unknown_sort_column<T: std::fmt::Debug>(result: &TabulaResult<T>, column: &str) {
        match result {
            Err(TabulaError::Validation(ValidationError::UnknownSortColumn { column: c, .. })) => {
                assert_eq!(c, column, "Wrong column in UnknownSortColumn");
            }
            other => panic!("Expected UnknownSortColumn({}), got: {:?}", column, other),
        }
    }

    /// Assert that `order` lists every member of `all` exactly once.
    #[track_caller]
    pub fn assert_permutation(order: &[ColumnId], all: &BTreeSet<ColumnId>) {
        assert_eq!(order.len(), all.len(), "Order length differs from column set");
        let distinct: BTreeSet<ColumnId> = order.iter().copied().collect();
        assert_eq!(&distinct, all, "Order is not a permutation of the column set");
    }

    /// Assert that a pass changed nothing.
    #[track_caller]
    pub fn assert_no_writes(report: &SyncReport) {
        assert_eq!(report.writes(), 0, "Expected a no-op pass, got: {:?}", report);
    }
}

// ============================================================================
// TESTS
// ============================================================================
