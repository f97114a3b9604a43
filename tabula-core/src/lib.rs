//! Tabula Core - Shadow Catalog Types and Query Compilation
//!
//! Pure data structures and SQL text generation. Nothing in this crate
//! performs I/O: catalog state is handed in by `tabula-storage` and the
//! compiled statements are executed by `tabula-api`.

pub mod catalog;
pub mod error;
pub mod order;
pub mod query;
pub mod search;

pub use catalog::{
    default_label_column, ColumnDetail, ColumnId, ForeignKeyEdge, LabelColumn, LiveColumn,
    LiveTable, PhysicalId, TableId, TrackedTable, LABEL_COLUMN_CANDIDATES,
};
pub use error::{CatalogError, TabulaError, TabulaResult, ValidationError};
pub use order::{reconcile_display_order, validate_reorder, AppendNewAscending, DisplayOrderPolicy};
pub use query::{
    compile_browse, label_display_name, plan_joins, quote_ident, BrowseRequest, ColumnMeta,
    CompiledQuery, JoinPlan, SortOrder,
};
pub use search::{compile_condition, tokenize, CompiledCondition, SearchToken, SearchTokenKind};
