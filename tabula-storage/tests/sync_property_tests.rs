//! Property-Based Tests for Schema Synchronization
//!
//! For any live schema and any sequence of renames and column drops:
//! - a second pass with no intervening change writes nothing
//! - every tracked table's display order is a permutation of its column set
//! - a renamed table keeps its stable id
//! - reconciling any stale order yields a permutation of the column set

use proptest::prelude::*;
use std::sync::Arc;
use tabula_core::reconcile_display_order;
use tabula_storage::{MockCatalog, MockShadowStore, SchemaSync, ShadowCatalogStore};
use tabula_test_utils::{assertions, fixtures, generators, LiveColumn, LiveTable};
use tokio::sync::watch;

fn load(schema: &[(LiveTable, Vec<LiveColumn>)]) -> MockCatalog {
    let catalog = MockCatalog::new();
    for (table, columns) in schema {
        catalog.create_table(table.physical_id, &table.name, columns.clone());
    }
    catalog
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_reconciled_order_is_permutation((all, stale) in generators::arb_stale_order()) {
        let order = reconcile_display_order(&stale, &all);
        assertions::assert_permutation(&order, &all);

        // Surviving ids keep their relative order.
        let mut survivors = Vec::new();
        for id in &stale {
            if all.contains(id) && !survivors.contains(id) {
                survivors.push(*id);
            }
        }
        prop_assert_eq!(&order[..survivors.len()], &survivors[..]);
    }

    #[test]
    fn prop_second_pass_is_noop(schema in generators::arb_schema(4)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let catalog = load(&schema);
            let store = MockShadowStore::new();
            let sync = SchemaSync::new(Arc::new(catalog), Arc::new(store.clone()));

            let first = sync.run().await.unwrap();
            prop_assert_eq!(first.tables_inserted, schema.len());

            let writes = store.write_count();
            let second = sync.run().await.unwrap();
            assertions::assert_no_writes(&second);
            prop_assert_eq!(store.write_count(), writes);
            Ok(())
        })?;
    }

    #[test]
    fn prop_orders_stay_permutations_across_drift(
        schema in generators::arb_schema(3),
        drop_position in 1i16..6,
        new_type in generators::arb_data_type(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let catalog = load(&schema);
            let store = MockShadowStore::new();
            let sync = SchemaSync::new(Arc::new(catalog.clone()), Arc::new(store.clone()));
            sync.run().await.unwrap();

            for (table, _) in &schema {
                catalog.drop_column(&table.name, drop_position);
                catalog.add_column(&table.name, LiveColumn::new(40, "added_later", new_type.clone()));
            }
            sync.run().await.unwrap();

            for tracked in store.list_tables().await.unwrap() {
                assertions::assert_permutation(&tracked.display_order, &tracked.column_ids);
                let columns = store.list_columns(tracked.table_id).await.unwrap();
                prop_assert_eq!(columns.len(), tracked.column_ids.len());
            }
            Ok(())
        })?;
    }

    #[test]
    fn prop_rename_preserves_table_id(schema in generators::arb_schema(3)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let catalog = load(&schema);
            let store = MockShadowStore::new();
            let sync = SchemaSync::new(Arc::new(catalog.clone()), Arc::new(store.clone()));
            sync.run().await.unwrap();

            let (victim, _) = &schema[0];
            let before = store.get_table(&victim.name).await.unwrap().unwrap();
            // Generated identifiers never contain a dash.
            let renamed = format!("{}-renamed", victim.name);
            catalog.rename_table(&victim.name, &renamed);

            let report = sync.run().await.unwrap();
            prop_assert_eq!(report.tables_renamed, 1);
            prop_assert_eq!(report.tables_removed, 0);

            let after = store.get_table(&renamed).await.unwrap().unwrap();
            prop_assert_eq!(after.table_id, before.table_id);
            prop_assert_eq!(after.column_ids, before.column_ids);
            Ok(())
        })?;
    }
}

#[tokio::test]
async fn test_raised_signal_cancels_pass_without_writes() {
    let catalog = fixtures::bookstore_catalog();
    let store = MockShadowStore::new();
    let sync = SchemaSync::new(Arc::new(catalog), Arc::new(store.clone()));
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    let result = sync.run_cancellable(rx).await;

    assertions::assert_cancelled(&result);
    assert_eq!(store.write_count(), 0);
}
