//! Shadow catalog and live catalog data model.
//!
//! `TrackedTable` and `ColumnDetail` are the persisted shadow rows; their
//! stable ids survive renames. `LiveTable` and `LiveColumn` are snapshots of
//! the database's own catalog taken at the start of a reconciliation pass.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Stable surrogate id of a tracked table, assigned by the shadow catalog.
pub type TableId = i64;

/// Stable surrogate id of a tracked column, assigned by the shadow catalog.
pub type ColumnId = i64;

/// The engine's own object identifier for a table (a PostgreSQL `oid`).
/// Survives `ALTER TABLE .. RENAME` but not drop and recreate.
pub type PhysicalId = u32;

/// Column names tried, in order, when a referenced table has no configured
/// label column.
pub const LABEL_COLUMN_CANDIDATES: &[&str] =
    &["name", "title", "label", "display_name", "username", "email"];

// ============================================================================
// SHADOW ROWS
// ============================================================================

/// Table registry row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedTable {
    pub table_id: TableId,
    pub name: String,
    /// Physical id observed the last time this row was reconciled.
    pub physical_id: PhysicalId,
    /// Every column id currently tracked for the table.
    pub column_ids: BTreeSet<ColumnId>,
    /// Presentation order. Reconciled against `column_ids`, may be briefly stale.
    pub display_order: Vec<ColumnId>,
    /// Column shown in place of foreign keys that reference this table.
    pub label_column: Option<String>,
}

impl TrackedTable {
    /// A freshly observed table with no columns tracked yet.
    pub fn new(table_id: TableId, name: impl Into<String>, physical_id: PhysicalId) -> Self {
        Self {
            table_id,
            name: name.into(),
            physical_id,
            column_ids: BTreeSet::new(),
            display_order: Vec::new(),
            label_column: None,
        }
    }
}

/// Column registry row. Identity is anchored to `position`, so a renamed
/// column keeps its `column_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDetail {
    pub column_id: ColumnId,
    pub table_id: TableId,
    /// Physical attribute number (`pg_attribute.attnum`).
    pub position: i16,
    pub name: String,
    pub data_type: String,
}

impl ColumnDetail {
    /// Whether the live column at the same position carries different attributes.
    pub fn differs_from(&self, live: &LiveColumn) -> bool {
        self.position != live.position || self.name != live.name || self.data_type != live.data_type
    }

    /// Copy the live attributes onto this row, keeping its identity.
    pub fn apply(&mut self, live: &LiveColumn) {
        self.position = live.position;
        self.name = live.name.clone();
        self.data_type = live.data_type.clone();
    }
}

// ============================================================================
// LIVE CATALOG SNAPSHOTS
// ============================================================================

/// A physical table in the active schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveTable {
    pub physical_id: PhysicalId,
    pub name: String,
}

/// A physical column. Dropped attributes are never reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveColumn {
    pub position: i16,
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub default_expr: Option<String>,
    pub is_identity: bool,
    pub generated_expr: Option<String>,
}

impl LiveColumn {
    /// A nullable column with no default, identity or generation expression.
    pub fn new(position: i16, name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            position,
            name: name.into(),
            data_type: data_type.into(),
            is_nullable: true,
            default_expr: None,
            is_identity: false,
            generated_expr: None,
        }
    }
}

// ============================================================================
// FOREIGN KEYS
// ============================================================================

/// Human-readable column on a referenced table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelColumn {
    pub name: String,
    pub data_type: String,
}

/// One referencing column of a foreign key. Derived per compile, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyEdge {
    pub referencing_table: String,
    pub referencing_column: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub label: Option<LabelColumn>,
}

/// Pick a label column among `columns` of a referenced table.
///
/// A configured name wins when it exists; otherwise the first entry of
/// [`LABEL_COLUMN_CANDIDATES`] present on the table is used.
pub fn default_label_column<'a>(
    configured: Option<&str>,
    columns: &'a [ColumnDetail],
) -> Option<&'a ColumnDetail> {
    if let Some(name) = configured {
        if let Some(column) = columns.iter().find(|c| c.name == name) {
            return Some(column);
        }
    }

    LABEL_COLUMN_CANDIDATES
        .iter()
        .find_map(|candidate| columns.iter().find(|c| c.name == *candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(id: ColumnId, position: i16, name: &str) -> ColumnDetail {
        ColumnDetail {
            column_id: id,
            table_id: 1,
            position,
            name: name.to_string(),
            data_type: "text".to_string(),
        }
    }

    #[test]
    fn test_differs_from_detects_rename() {
        let stored = column(10, 2, "title");
        let live = LiveColumn::new(2, "headline", "text");
        assert!(stored.differs_from(&live));

        let same = LiveColumn::new(2, "title", "text");
        assert!(!stored.differs_from(&same));
    }

    #[test]
    fn test_apply_keeps_identity() {
        let mut stored = column(10, 2, "title");
        stored.apply(&LiveColumn::new(2, "headline", "character varying(80)"));
        assert_eq!(stored.column_id, 10);
        assert_eq!(stored.name, "headline");
        assert_eq!(stored.data_type, "character varying(80)");
    }

    #[test]
    fn test_default_label_column_prefers_configured() {
        let columns = vec![column(1, 1, "id"), column(2, 2, "name"), column(3, 3, "code")];
        let picked = default_label_column(Some("code"), &columns).map(|c| c.name.as_str());
        assert_eq!(picked, Some("code"));
    }

    #[test]
    fn test_default_label_column_falls_back_to_candidates() {
        let columns = vec![column(1, 1, "id"), column(2, 2, "email"), column(3, 3, "title")];
        // Configured name that no longer exists is ignored.
        let picked = default_label_column(Some("gone"), &columns).map(|c| c.name.as_str());
        assert_eq!(picked, Some("title"));
    }

    #[test]
    fn test_default_label_column_none() {
        let columns = vec![column(1, 1, "id"), column(2, 2, "amount")];
        assert!(default_label_column(None, &columns).is_none());
    }
}
