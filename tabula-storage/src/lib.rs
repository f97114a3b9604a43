//! Tabula Storage - Shadow Catalog Traits and Synchronization
//!
//! Defines the catalog and shadow store abstractions, the schema
//! synchronization engine that reconciles them, and the browse planner
//! that feeds `tabula-core`'s query compiler. The PostgreSQL
//! implementations live in tabula-api.

pub mod cancel;
pub mod foreign_keys;
pub mod layout;
pub mod mock;
pub mod planner;
pub mod sync;
pub mod traits;

pub use cancel::{cancellable, wait_for_shutdown, with_deadline};
pub use foreign_keys::ForeignKeyResolver;
pub use layout::{reorder_columns, set_label_column};
pub use mock::{MockCatalog, MockShadowStore};
pub use planner::BrowsePlanner;
pub use sync::{SchemaSync, SkippedTable, SyncReport};
pub use traits::{CatalogReader, ShadowCatalogStore};
