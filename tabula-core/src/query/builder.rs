//! Browse request decoding and SELECT assembly.

use super::joins::{plan_joins, ColumnMeta};
use crate::catalog::{ColumnDetail, ForeignKeyEdge};
use crate::error::ValidationError;
use crate::search::{compile_condition, tokenize};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sort direction. Anything other than `DESC` (any case) sorts ascending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("desc") {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// A logical browse request for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseRequest {
    pub table: String,
    /// `(column or label name, search expression)` in arrival order.
    pub filters: Vec<(String, String)>,
    pub sort_column: Option<String>,
    pub sort_order: SortOrder,
    pub offset: i64,
}

impl BrowseRequest {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            sort_column: None,
            sort_order: SortOrder::Asc,
            offset: 0,
        }
    }

    pub fn with_filter(mut self, column: impl Into<String>, expression: impl Into<String>) -> Self {
        self.filters.push((column.into(), expression.into()));
        self
    }

    pub fn sorted_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.sort_column = Some(column.into());
        self.sort_order = order;
        self
    }

    pub fn at_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Decode key/value request parameters.
    ///
    /// `table`, `sort_column`, `sort_order` and `offset` are reserved; every
    /// other key is taken as a filter.
    pub fn from_params<I, K, V>(params: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut table = None;
        let mut request = BrowseRequest::new(String::new());

        for (key, value) in params {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "table" => table = Some(value.trim().to_string()),
                "sort_column" => {
                    let value = value.trim();
                    request.sort_column = (!value.is_empty()).then(|| value.to_string());
                }
                "sort_order" => request.sort_order = SortOrder::parse(value),
                "offset" => request.offset = parse_offset(value)?,
                _ => request.filters.push((key.to_string(), value.to_string())),
            }
        }

        request.table = table
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ValidationError::RequiredFieldMissing {
                field: "table".to_string(),
            })?;

        Ok(request)
    }
}

fn parse_offset(value: &str) -> Result<i64, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0);
    }

    let offset = value
        .parse::<i64>()
        .map_err(|_| ValidationError::InvalidInteger {
            field: "offset".to_string(),
            value: value.to_string(),
        })?;
    check_offset(offset)?;
    Ok(offset)
}

fn check_offset(offset: i64) -> Result<(), ValidationError> {
    if offset < 0 {
        return Err(ValidationError::InvalidValue {
            field: "offset".to_string(),
            reason: "must not be negative".to_string(),
        });
    }
    Ok(())
}

/// A statement ready for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    pub sql: String,
    /// Values for `$1..$n`, all bound as text.
    pub binds: Vec<String>,
    pub column_meta: BTreeMap<String, ColumnMeta>,
    pub page_size: i64,
    /// Filter names that matched neither a column nor a label.
    pub ignored_filters: Vec<String>,
}

/// Compile a browse request.
///
/// `columns` must be in display order. Unknown filter names are skipped;
/// an unknown sort column or a negative offset is an error.
pub fn compile_browse(
    request: &BrowseRequest,
    columns: &[ColumnDetail],
    edges: &[ForeignKeyEdge],
    page_size: i64,
) -> Result<CompiledQuery, ValidationError> {
    check_offset(request.offset)?;
    let plan = plan_joins(&request.table, columns, edges);

    let order_by = match &request.sort_column {
        Some(name) => {
            let expr = plan
                .resolve(name)
                .ok_or_else(|| ValidationError::UnknownSortColumn {
                    table: request.table.clone(),
                    column: name.clone(),
                })?;
            Some(format!("{} {}", expr, request.sort_order.as_sql()))
        }
        None => None,
    };

    let mut conditions = Vec::new();
    let mut binds = Vec::new();
    let mut ignored_filters = Vec::new();
    let mut next_index = 1;

    for (name, expression) in &request.filters {
        let Some(target) = plan.resolve(name) else {
            ignored_filters.push(name.clone());
            continue;
        };

        if let Some(condition) = compile_condition(target, &tokenize(expression), next_index) {
            next_index = condition.next_index;
            binds.extend(condition.binds);
            conditions.push(condition.sql);
        }
    }

    let mut sql = format!(
        "SELECT {} FROM {}",
        plan.select_list.join(", "),
        super::quote_ident(&request.table)
    );
    for join in &plan.joins {
        sql.push(' ');
        sql.push_str(join);
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    if let Some(order_by) = order_by {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order_by);
    }
    sql.push_str(&format!(" LIMIT {} OFFSET {}", page_size, request.offset));

    Ok(CompiledQuery {
        sql,
        binds,
        column_meta: plan.column_meta,
        page_size,
        ignored_filters,
    })
}
