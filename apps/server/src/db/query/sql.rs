//! Compile a [`ListQuery`] into parameterized Postgres SQL.
//!
//! Rows are projected with `jsonb_build_object` so every resource decodes through the same path.
//! Free-text conditions become `ILIKE ... ESCAPE` groups; column names are only ever taken from
//! the resource's static column table, never from input.

use super::bind::{push, BindValue};
use super::{CompareOp, Condition, FilterValue, ListQuery};
use crate::models::{ColumnDef, ColumnKind, Resource};

/// SQL for one page and its total count, sharing the leading bind parameters.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub select_sql: String,
    pub count_sql: String,
    /// Parameters for `select_sql`. `count_sql` uses the first `count_params` of them.
    pub bind_params: Vec<BindValue>,
    pub count_params: usize,
}

pub fn compile(query: &ListQuery) -> CompiledQuery {
    let resource = query.resource;
    let mut bind_params = Vec::new();
    let where_sql = build_where(resource, &query.conditions, &mut bind_params);
    let count_params = bind_params.len();

    let count_sql = format!(
        "SELECT COUNT(*) FROM {} WHERE 1=1{}",
        resource.from_clause(),
        where_sql
    );

    let order_col = resource
        .column(query.order.column)
        .or_else(|| resource.column(resource.default_sort_field()));
    let direction = if query.order.ascending { "ASC" } else { "DESC" };
    let mut order_sql = String::new();
    if let Some(col) = order_col {
        order_sql.push_str(&format!(" ORDER BY {} {} NULLS LAST", col.expr, direction));
        if let Some(id) = resource.column("id").filter(|id| id.name != col.name) {
            order_sql.push_str(&format!(", {} {}", id.expr, direction));
        }
    }

    let limit_idx = push(&mut bind_params, BindValue::BigInt(query.limit.max(0)));
    let offset_idx = push(&mut bind_params, BindValue::BigInt(query.offset.max(0)));

    let select_sql = format!(
        "SELECT {} AS item FROM {} WHERE 1=1{}{} LIMIT ${} OFFSET ${}",
        row_projection(resource),
        resource.from_clause(),
        where_sql,
        order_sql,
        limit_idx,
        offset_idx
    );

    CompiledQuery {
        select_sql,
        count_sql,
        bind_params,
        count_params,
    }
}

fn row_projection(resource: Resource) -> String {
    let fields: Vec<String> = resource
        .columns()
        .iter()
        .map(|c| format!("'{}', {}", c.name, c.expr))
        .collect();
    format!("jsonb_build_object({})", fields.join(", "))
}

fn build_where(
    resource: Resource,
    conditions: &[Condition],
    bind_params: &mut Vec<BindValue>,
) -> String {
    let mut sql = String::new();
    for condition in conditions {
        let clause = match condition {
            Condition::AnyContains { columns, needle } => {
                contains_clause(resource, columns, needle, bind_params)
            }
            Condition::Compare { column, op, value } => match resource.column(column) {
                Some(col) => compare_clause(col, *op, value, bind_params),
                None => "false".to_string(),
            },
        };
        sql.push_str(" AND ");
        sql.push_str(&clause);
    }
    sql
}

fn contains_clause(
    resource: Resource,
    columns: &[&'static str],
    needle: &str,
    bind_params: &mut Vec<BindValue>,
) -> String {
    let cols: Vec<&ColumnDef> = columns.iter().filter_map(|c| resource.column(c)).collect();
    if cols.is_empty() {
        return "false".to_string();
    }

    let pattern = format!("%{}%", escape_like_pattern(needle));
    let idx = push(bind_params, BindValue::Text(pattern));
    let parts: Vec<String> = cols
        .iter()
        .map(|c| format!("{} ILIKE ${} ESCAPE E'\\\\'", text_expr(c), idx))
        .collect();
    format!("({})", parts.join(" OR "))
}

fn compare_clause(
    col: &ColumnDef,
    op: CompareOp,
    value: &FilterValue,
    bind_params: &mut Vec<BindValue>,
) -> String {
    let bind = match value {
        FilterValue::Text(v) => BindValue::Text(v.clone()),
        FilterValue::Bool(v) => BindValue::Bool(*v),
        FilterValue::Timestamp(v) => BindValue::Timestamp(*v),
        FilterValue::Date(v) => BindValue::Date(*v),
    };
    // Text compared against typed columns goes through the column's text form, so a malformed
    // identifier matches nothing instead of raising a cast error.
    let lhs = match value {
        FilterValue::Text(_) => text_expr(col),
        _ => col.expr.to_string(),
    };
    let idx = push(bind_params, bind);
    format!("{} {} ${}", lhs, op.as_sql(), idx)
}

fn text_expr(col: &ColumnDef) -> String {
    match col.kind {
        ColumnKind::Text => col.expr.to_string(),
        _ => format!("{}::text", col.expr),
    }
}

pub(crate) fn escape_like_pattern(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' | '%' | '_' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}
