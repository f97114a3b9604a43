//! Browse statement compilation.
//!
//! [`plan_joins`] turns a table's ordered columns and foreign keys into a
//! select list, LEFT JOINs for label columns and a name-to-expression map.
//! [`compile_browse`] adds per-column filters, sorting and paging on top.

pub mod builder;
pub mod joins;

pub use builder::{compile_browse, BrowseRequest, CompiledQuery, SortOrder};
pub use joins::{is_natively_decoded, label_display_name, plan_joins, ColumnMeta, JoinPlan};

/// Double-quote an SQL identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
