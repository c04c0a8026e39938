use super::expression::{evaluate, RowScope, Scope};
use crate::common::Result;
use crate::errinput;
use crate::sql::parser::ast::{Aggregate, Expression};
use crate::storage::tuple::Row;
use crate::types::{Field, Table};
use itertools::Itertools as _;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Computes bucketed aggregates for rows.
pub struct Aggregator<'a> {
    table: &'a Table,
    params: &'a [Field],
    /// Bucketed accumulators, keyed by the group_by values.
    buckets: BTreeMap<Vec<Field>, Vec<Accumulator>>,
    /// The set of empty accumulators. Used to create new buckets.
    empty: Vec<Accumulator>,
    /// Group by expressions. Indexes map to bucket values.
    group_by: &'a [Expression],
    /// Aggregate expressions (Aggregate or CountAll nodes). Indexes map to
    /// accumulators.
    aggregates: Vec<Expression>,
}

impl<'a> Aggregator<'a> {
    /// Creates an aggregator for the given GROUP BY buckets, computing every
    /// distinct aggregate found in `expressions`.
    pub fn new<'e>(
        table: &'a Table,
        params: &'a [Field],
        group_by: &'a [Expression],
        expressions: impl IntoIterator<Item = &'e Expression>,
    ) -> Self {
        let mut aggregates: Vec<Expression> = Vec::new();
        for expr in expressions {
            expr.walk(&mut |node| {
                if matches!(node, Expression::Aggregate(..) | Expression::CountAll)
                    && !aggregates.contains(node)
                {
                    aggregates.push(node.clone());
                }
                true
            });
        }
        let empty = aggregates.iter().map(Accumulator::new).collect();
        Self {
            table,
            params,
            buckets: BTreeMap::new(),
            empty,
            group_by,
            aggregates,
        }
    }

    /// Adds a row to the aggregator.
    pub fn add(&mut self, row: &Row) -> Result<()> {
        let scope = RowScope {
            table: self.table,
            row,
        };
        let bucket: Vec<Field> = self
            .group_by
            .iter()
            .map(|expr| evaluate(expr, &scope, self.params))
            .try_collect()?;

        let accumulators = self
            .buckets
            .entry(bucket)
            .or_insert_with(|| self.empty.clone());

        for (accumulator, aggregate) in accumulators.iter_mut().zip(&self.aggregates) {
            let value = match aggregate {
                Expression::Aggregate(_, arg) => evaluate(arg, &scope, self.params)?,
                _ => Field::Boolean(true),
            };
            accumulator.add(value)?;
        }
        Ok(())
    }

    /// Returns one group per bucket, in bucket order. If there were no rows
    /// and no GROUP BY, a single group of empty accumulators is returned,
    /// e.g. for SELECT COUNT(*) FROM t WHERE FALSE.
    pub fn into_groups(self) -> Result<Vec<Group<'a>>> {
        let group_by = self.group_by;
        let aggregates = Rc::new(self.aggregates);
        let mut buckets = self.buckets;
        if buckets.is_empty() && group_by.is_empty() {
            buckets.insert(Vec::new(), self.empty);
        }
        buckets
            .into_iter()
            .map(|(keys, accumulators)| {
                Ok(Group {
                    group_by,
                    keys,
                    aggregates: aggregates.clone(),
                    values: accumulators.into_iter().map(|acc| acc.value()).try_collect()?,
                })
            })
            .collect()
    }
}

/// One GROUP BY bucket with its computed aggregates. Used as the scope for
/// the HAVING, SELECT and ORDER BY expressions of an aggregate query.
pub struct Group<'a> {
    group_by: &'a [Expression],
    keys: Vec<Field>,
    aggregates: Rc<Vec<Expression>>,
    values: Vec<Field>,
}

impl Scope for Group<'_> {
    fn resolve(&self, expr: &Expression) -> Result<Option<Field>> {
        if let Some(index) = self.group_by.iter().position(|e| e == expr) {
            return Ok(Some(self.keys[index].clone()));
        }
        match expr {
            Expression::Aggregate(..) | Expression::CountAll => {
                match self.aggregates.iter().position(|e| e == expr) {
                    Some(index) => Ok(Some(self.values[index].clone())),
                    None => errinput!("unknown aggregate {}", expr.output_name()),
                }
            }
            Expression::Column(_, name) => errinput!(
                "column {name} must appear in the GROUP BY clause or be used in an aggregate function"
            ),
            _ => Ok(None),
        }
    }
}

/// Accumulates aggregate values. Uses an enum rather than a trait since we
/// keep these in a vector. NULL inputs are skipped by every aggregate.
#[derive(Clone)]
enum Accumulator {
    Average { count: i64, sum: Field },
    Count(i64),
    Max(Option<Field>),
    Min(Option<Field>),
    Sum(Option<Field>),
}

impl Accumulator {
    fn new(aggregate: &Expression) -> Self {
        match aggregate {
            Expression::Aggregate(Aggregate::Average, _) => Self::Average {
                count: 0,
                sum: Field::Integer(0),
            },
            Expression::Aggregate(Aggregate::Max, _) => Self::Max(None),
            Expression::Aggregate(Aggregate::Min, _) => Self::Min(None),
            Expression::Aggregate(Aggregate::Sum, _) => Self::Sum(None),
            _ => Self::Count(0),
        }
    }

    /// Adds a value to the accumulator.
    fn add(&mut self, value: Field) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        match self {
            Self::Average { count, sum } => {
                *count += 1;
                *sum = sum.checked_add(&value)?;
            }
            Self::Count(count) => *count += 1,
            Self::Max(max @ None) => *max = Some(value),
            Self::Max(Some(max)) => {
                if value.compare(max)?.is_some_and(|o| o.is_gt()) {
                    *max = value
                }
            }
            Self::Min(min @ None) => *min = Some(value),
            Self::Min(Some(min)) => {
                if value.compare(min)?.is_some_and(|o| o.is_lt()) {
                    *min = value
                }
            }
            Self::Sum(sum @ None) => *sum = Some(Field::Integer(0).checked_add(&value)?),
            Self::Sum(Some(sum)) => *sum = sum.checked_add(&value)?,
        }
        Ok(())
    }

    /// Returns the aggregate value. The average of no values is NULL, and
    /// is always a float otherwise.
    fn value(self) -> Result<Field> {
        Ok(match self {
            Self::Average { count: 0, .. } => Field::Null,
            Self::Average { count, sum } => sum.checked_div(&Field::Float(count as f64))?,
            Self::Count(count) => Field::Integer(count),
            Self::Max(value) | Self::Min(value) | Self::Sum(value) => value.unwrap_or(Field::Null),
        })
    }
}
