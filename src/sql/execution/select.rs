use super::aggregate::Aggregator;
use super::expression::{evaluate, is_true, ConstantScope, RowScope, Scope};
use crate::common::Result;
use crate::errinput;
use crate::sql::parser::ast::{Direction, Expression, Select, SelectItem};
use crate::storage::tuple::Row;
use crate::types::{Field, Table};
use itertools::Itertools as _;
use std::cmp::Ordering;

/// The result of a SELECT: column names and the rows, fully materialized.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// Executes a SELECT over the rows of `table`. Rows are filtered, then
/// grouped and aggregated if the query has a GROUP BY or any aggregate,
/// then projected, deduplicated, sorted and limited, in that order.
pub fn select<'r>(
    select: &Select,
    table: &Table,
    rows: impl IntoIterator<Item = &'r Row>,
    params: &[Field],
) -> Result<ResultSet> {
    let columns = output_columns(select, table);
    let limit = select
        .limit
        .as_ref()
        .map(|expr| match evaluate(expr, &ConstantScope, params)? {
            Field::Integer(limit) if limit >= 0 => Ok(limit as usize),
            value => errinput!("LIMIT must be a non-negative integer, got {value}"),
        })
        .transpose()?;

    let mut filtered = Vec::new();
    for row in rows {
        if let Some(predicate) = &select.r#where {
            if !is_true(predicate, &RowScope { table, row }, params)? {
                continue;
            }
        }
        filtered.push(row);
    }

    // Each output row is paired with its sort key.
    let mut output: Vec<(Row, Vec<Field>)> = Vec::new();
    if is_aggregate(select) {
        let expressions = select
            .items
            .iter()
            .filter_map(|item| match item {
                SelectItem::Expression(expr, _) => Some(expr),
                SelectItem::Wildcard => None,
            })
            .chain(select.having.iter())
            .chain(select.order_by.iter().map(|(expr, _)| expr));
        let mut aggregator = Aggregator::new(table, params, &select.group_by, expressions);
        for row in filtered {
            aggregator.add(row)?;
        }
        for group in aggregator.into_groups()? {
            if let Some(having) = &select.having {
                if !is_true(having, &group, params)? {
                    continue;
                }
            }
            let projected = project(select, &group, None, params)?;
            let key = sort_key(select, &columns, &projected, &group, params)?;
            output.push((projected, key));
        }
    } else {
        if select.having.is_some() {
            return errinput!("HAVING requires GROUP BY or an aggregate");
        }
        for row in filtered {
            let scope = RowScope { table, row };
            let projected = project(select, &scope, Some(row), params)?;
            let key = sort_key(select, &columns, &projected, &scope, params)?;
            output.push((projected, key));
        }
    }

    if select.distinct {
        output = output.into_iter().unique_by(|(row, _)| row.clone()).collect();
    }
    if !select.order_by.is_empty() {
        output.sort_by(|(_, a), (_, b)| compare_keys(a, b, &select.order_by));
    }
    let rows = output
        .into_iter()
        .map(|(row, _)| row)
        .take(limit.unwrap_or(usize::MAX))
        .collect();
    Ok(ResultSet { columns, rows })
}

/// Whether the query aggregates: it has a GROUP BY, or an aggregate
/// function anywhere in its output, HAVING or ORDER BY.
fn is_aggregate(select: &Select) -> bool {
    !select.group_by.is_empty()
        || select.having.as_ref().is_some_and(Expression::contains_aggregate)
        || select.order_by.iter().any(|(expr, _)| expr.contains_aggregate())
        || select.items.iter().any(|item| match item {
            SelectItem::Expression(expr, _) => expr.contains_aggregate(),
            SelectItem::Wildcard => false,
        })
}

/// The output column names: the alias if given, otherwise the column or
/// aggregate name. A wildcard expands to every table column.
fn output_columns(select: &Select, table: &Table) -> Vec<String> {
    select
        .items
        .iter()
        .flat_map(|item| match item {
            SelectItem::Wildcard => table.column_names(),
            SelectItem::Expression(_, Some(alias)) => vec![alias.clone()],
            SelectItem::Expression(expr, None) => vec![expr.output_name()],
        })
        .collect()
}

/// Evaluates the SELECT list. `row` is the source row for wildcards, which
/// aren't valid in aggregate queries.
fn project(select: &Select, scope: &dyn Scope, row: Option<&Row>, params: &[Field]) -> Result<Row> {
    let mut values = Vec::with_capacity(select.items.len());
    for item in &select.items {
        match (item, row) {
            (SelectItem::Wildcard, Some(row)) => values.extend(row.iter().cloned()),
            (SelectItem::Wildcard, None) => {
                return errinput!("* can't be used with GROUP BY or aggregates")
            }
            (SelectItem::Expression(expr, _), _) => values.push(evaluate(expr, scope, params)?),
        }
    }
    Ok(Row::from(values))
}

/// Evaluates the ORDER BY expressions. A bare name matching an output
/// column (typically an alias) refers to that column's value.
fn sort_key(
    select: &Select,
    columns: &[String],
    projected: &Row,
    scope: &dyn Scope,
    params: &[Field],
) -> Result<Vec<Field>> {
    select
        .order_by
        .iter()
        .map(|(expr, _)| {
            if let Expression::Column(None, name) = expr {
                if let Some(index) = columns.iter().position(|c| c == name) {
                    return projected.get_field(index);
                }
            }
            evaluate(expr, scope, params)
        })
        .collect()
}

fn compare_keys(a: &[Field], b: &[Field], order_by: &[(Expression, Direction)]) -> Ordering {
    a.iter()
        .zip(b)
        .zip(order_by)
        .map(|((a, b), (_, direction))| match direction {
            Direction::Ascending => a.cmp(b),
            Direction::Descending => b.cmp(a),
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}
