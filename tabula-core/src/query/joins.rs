//! Foreign-key label joins and column expression resolution.

use super::quote_ident;
use crate::catalog::{ColumnDetail, ForeignKeyEdge};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Response metadata for one returned column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub data_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_column: Option<String>,
}

impl ColumnMeta {
    fn plain(data_type: &str) -> Self {
        Self {
            data_type: data_type.to_string(),
            label_table: None,
            label_column: None,
        }
    }
}

/// Select list, joins and name resolution for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinPlan {
    /// Select list entries in output order. Label columns follow their source column.
    pub select_list: Vec<String>,
    /// `LEFT JOIN` clauses in select order.
    pub joins: Vec<String>,
    /// Physical column name to qualified expression.
    pub column_exprs: BTreeMap<String, String>,
    /// Derived label name to qualified label expression.
    pub label_exprs: BTreeMap<String, String>,
    pub column_meta: BTreeMap<String, ColumnMeta>,
}

impl JoinPlan {
    /// Expression for a physical column or a derived label column.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.column_exprs
            .get(name)
            .or_else(|| self.label_exprs.get(name))
            .map(String::as_str)
    }
}

/// Name under which a foreign key's label is returned: `owner_id` and
/// `owner_uid` become `owner_name`, anything else gets `_name` appended.
pub fn label_display_name(column: &str) -> String {
    let stem = column
        .strip_suffix("_uid")
        .or_else(|| column.strip_suffix("_id"))
        .unwrap_or(column);
    format!("{}_name", stem)
}

/// Whether the row mapper decodes this declared type directly. Other types
/// are selected as text.
pub fn is_natively_decoded(data_type: &str) -> bool {
    let base = strip_modifiers(data_type);
    matches!(
        base.trim(),
        "boolean"
            | "smallint"
            | "integer"
            | "bigint"
            | "real"
            | "double precision"
            | "oid"
            | "text"
            | "character varying"
            | "character"
            | "name"
            | "json"
            | "jsonb"
            | "uuid"
            | "timestamp without time zone"
            | "timestamp with time zone"
            | "date"
            | "time without time zone"
            | "bytea"
    )
}

/// `timestamp(3) without time zone` -> `timestamp without time zone`.
fn strip_modifiers(data_type: &str) -> String {
    match (data_type.find('('), data_type.find(')')) {
        (Some(open), Some(close)) if close > open => {
            format!("{}{}", &data_type[..open], &data_type[close + 1..])
        }
        _ => data_type.to_string(),
    }
}

fn select_expr(expr: &str, data_type: &str, output_name: &str) -> String {
    if is_natively_decoded(data_type) {
        format!("{} AS {}", expr, quote_ident(output_name))
    } else {
        format!("{}::text AS {}", expr, quote_ident(output_name))
    }
}

fn unique_alias(base: &str, used: &mut BTreeSet<String>) -> String {
    let mut candidate = base.to_string();
    let mut n = 2;
    while used.contains(&candidate) {
        candidate = format!("{}_{}", base, n);
        n += 1;
    }
    used.insert(candidate.clone());
    candidate
}

/// Plan the select list and label joins for `table`.
///
/// `columns` must already be in display order. Only edges carrying a label
/// produce a join; other columns are selected directly.
pub fn plan_joins(table: &str, columns: &[ColumnDetail], edges: &[ForeignKeyEdge]) -> JoinPlan {
    let base = quote_ident(table);
    let mut plan = JoinPlan::default();

    let mut used_aliases = BTreeSet::new();
    used_aliases.insert(table.to_string());
    let mut taken_names: BTreeSet<String> = columns.iter().map(|c| c.name.clone()).collect();

    for column in columns {
        let expr = format!("{}.{}", base, quote_ident(&column.name));
        plan.select_list
            .push(select_expr(&expr, &column.data_type, &column.name));
        plan.column_exprs.insert(column.name.clone(), expr.clone());

        let mut meta = ColumnMeta::plain(&column.data_type);

        let labelled = edges
            .iter()
            .filter(|e| e.referencing_column == column.name)
            .find_map(|e| e.label.as_ref().map(|label| (e, label)));

        if let Some((edge, label)) = labelled {
            let alias = unique_alias(&edge.referenced_table, &mut used_aliases);
            let quoted_alias = quote_ident(&alias);
            plan.joins.push(format!(
                "LEFT JOIN {} AS {} ON {} = {}.{}",
                quote_ident(&edge.referenced_table),
                quoted_alias,
                expr,
                quoted_alias,
                quote_ident(&edge.referenced_column),
            ));

            let mut label_name = label_display_name(&column.name);
            if taken_names.contains(&label_name) {
                label_name = format!("{}_name", column.name);
            }
            let label_name = unique_alias(&label_name, &mut taken_names);

            let label_expr = format!("{}.{}", quoted_alias, quote_ident(&label.name));
            plan.select_list
                .push(select_expr(&label_expr, &label.data_type, &label_name));
            plan.label_exprs.insert(label_name.clone(), label_expr);
            plan.column_meta
                .insert(label_name, ColumnMeta::plain(&label.data_type));

            meta.label_table = Some(edge.referenced_table.clone());
            meta.label_column = Some(label.name.clone());
        }

        plan.column_meta.insert(column.name.clone(), meta);
    }

    plan
}
