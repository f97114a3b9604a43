//! Column display order reconciliation.

use crate::catalog::ColumnId;
use crate::error::ValidationError;
use std::collections::BTreeSet;

/// Decides the presentation order of a table's columns after its column set
/// changed.
pub trait DisplayOrderPolicy: Send + Sync {
    /// Produce an order containing every member of `all_columns` exactly once.
    fn reconcile(&self, existing_order: &[ColumnId], all_columns: &BTreeSet<ColumnId>)
        -> Vec<ColumnId>;
}

/// Keeps surviving columns where the user put them and appends new columns
/// by ascending id.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendNewAscending;

impl DisplayOrderPolicy for AppendNewAscending {
    fn reconcile(
        &self,
        existing_order: &[ColumnId],
        all_columns: &BTreeSet<ColumnId>,
    ) -> Vec<ColumnId> {
        reconcile_display_order(existing_order, all_columns)
    }
}

/// Merge a stored display order with the current column set.
///
/// Members of `existing_order` still in `all_columns` keep their relative
/// order; the remaining columns follow in ascending id order. Duplicates in
/// `existing_order` are collapsed to their first occurrence.
pub fn reconcile_display_order(
    existing_order: &[ColumnId],
    all_columns: &BTreeSet<ColumnId>,
) -> Vec<ColumnId> {
    let mut placed = BTreeSet::new();
    let mut order = Vec::with_capacity(all_columns.len());

    for id in existing_order {
        if all_columns.contains(id) && placed.insert(*id) {
            order.push(*id);
        }
    }

    // BTreeSet iterates ascending.
    for id in all_columns {
        if placed.insert(*id) {
            order.push(*id);
        }
    }

    order
}

/// Check that a requested order is a permutation of the table's columns.
pub fn validate_reorder(
    table: &str,
    all_columns: &BTreeSet<ColumnId>,
    requested: &[ColumnId],
) -> Result<(), ValidationError> {
    if requested.len() != all_columns.len() {
        return Err(ValidationError::ColumnCountMismatch {
            table: table.to_string(),
            expected: all_columns.len(),
            got: requested.len(),
        });
    }

    let mut seen = BTreeSet::new();
    for id in requested {
        if !all_columns.contains(id) {
            return Err(ValidationError::InvalidValue {
                field: "display_order".to_string(),
                reason: format!("column {} does not belong to {}", id, table),
            });
        }
        if !seen.insert(*id) {
            return Err(ValidationError::InvalidValue {
                field: "display_order".to_string(),
                reason: format!("column {} listed twice", id),
            });
        }
    }

    Ok(())
}
