use crate::common::{Error, Result};
use crate::errinput;
use crate::sql::parser::ast::{Expression, Operator};
use crate::storage::tuple::Row;
use crate::types::{Field, Table};
use std::cmp::Ordering;

/// Resolves the expression nodes whose value depends on where the expression
/// is evaluated: column references, and aggregates once they're computed.
pub trait Scope {
    /// Returns the node's value, or None if the node should be evaluated
    /// from its children.
    fn resolve(&self, expr: &Expression) -> Result<Option<Field>>;
}

/// A scope with no columns, for constant expressions like LIMIT.
pub struct ConstantScope;

impl Scope for ConstantScope {
    fn resolve(&self, expr: &Expression) -> Result<Option<Field>> {
        match expr {
            Expression::Column(_, name) => errinput!("column {name} not allowed here"),
            Expression::Aggregate(..) | Expression::CountAll => {
                errinput!("aggregate functions are not allowed here")
            }
            _ => Ok(None),
        }
    }
}

/// Resolves columns against a single row of a table.
pub struct RowScope<'a> {
    pub table: &'a Table,
    pub row: &'a Row,
}

impl Scope for RowScope<'_> {
    fn resolve(&self, expr: &Expression) -> Result<Option<Field>> {
        match expr {
            Expression::Column(Some(table), _) if !table.eq_ignore_ascii_case(self.table.name()) => {
                errinput!("unknown table {table}")
            }
            Expression::Column(_, name) => match self.table.field_name_to_index(name) {
                Some(index) => Ok(Some(self.row.get_field(index)?)),
                None => errinput!("unknown column {name} in table {}", self.table.name()),
            },
            Expression::Aggregate(..) | Expression::CountAll => {
                errinput!("aggregate functions are not allowed here")
            }
            _ => Ok(None),
        }
    }
}

/// Evaluates an expression. Parameters are 1-based indexes into `params`.
pub fn evaluate(expr: &Expression, scope: &dyn Scope, params: &[Field]) -> Result<Field> {
    use Operator::*;
    if let Some(value) = scope.resolve(expr)? {
        return Ok(value);
    }
    let eval = |expr: &Expression| evaluate(expr, scope, params);
    Ok(match expr {
        Expression::Literal(value) => value.clone(),
        Expression::Param(n) => match params.get(n - 1) {
            Some(value) => value.clone(),
            None => return errinput!("missing parameter ${n}, got {} arguments", params.len()),
        },
        Expression::Column(_, name) => return errinput!("unresolved column {name}"),
        Expression::Aggregate(..) | Expression::CountAll => {
            return errinput!("aggregate functions are not allowed here")
        }

        // Logical operators use three-valued logic: NULL is unknown.
        Expression::Operator(And(lhs, rhs)) => match (eval(lhs)?, eval(rhs)?) {
            (Field::Boolean(false), _) | (_, Field::Boolean(false)) => Field::Boolean(false),
            (Field::Boolean(true), Field::Boolean(true)) => Field::Boolean(true),
            (Field::Null | Field::Boolean(_), Field::Null | Field::Boolean(_)) => Field::Null,
            (lhs, rhs) => return errinput!("can't AND {lhs} and {rhs}"),
        },
        Expression::Operator(Or(lhs, rhs)) => match (eval(lhs)?, eval(rhs)?) {
            (Field::Boolean(true), _) | (_, Field::Boolean(true)) => Field::Boolean(true),
            (Field::Boolean(false), Field::Boolean(false)) => Field::Boolean(false),
            (Field::Null | Field::Boolean(_), Field::Null | Field::Boolean(_)) => Field::Null,
            (lhs, rhs) => return errinput!("can't OR {lhs} and {rhs}"),
        },
        Expression::Operator(Not(expr)) => match eval(expr)? {
            Field::Boolean(b) => Field::Boolean(!b),
            Field::Null => Field::Null,
            value => return errinput!("can't negate {value}"),
        },

        Expression::Operator(Equal(lhs, rhs)) => {
            compare(&eval(lhs)?, &eval(rhs)?, Ordering::is_eq)?
        }
        Expression::Operator(NotEqual(lhs, rhs)) => {
            compare(&eval(lhs)?, &eval(rhs)?, Ordering::is_ne)?
        }
        Expression::Operator(GreaterThan(lhs, rhs)) => {
            compare(&eval(lhs)?, &eval(rhs)?, Ordering::is_gt)?
        }
        Expression::Operator(GreaterThanOrEqual(lhs, rhs)) => {
            compare(&eval(lhs)?, &eval(rhs)?, Ordering::is_ge)?
        }
        Expression::Operator(LessThan(lhs, rhs)) => {
            compare(&eval(lhs)?, &eval(rhs)?, Ordering::is_lt)?
        }
        Expression::Operator(LessThanOrEqual(lhs, rhs)) => {
            compare(&eval(lhs)?, &eval(rhs)?, Ordering::is_le)?
        }
        Expression::Operator(Between(expr, low, high)) => {
            let value = eval(expr)?;
            let above = compare(&value, &eval(low)?, Ordering::is_ge)?;
            let below = compare(&value, &eval(high)?, Ordering::is_le)?;
            match (above, below) {
                (Field::Boolean(false), _) | (_, Field::Boolean(false)) => Field::Boolean(false),
                (Field::Boolean(true), Field::Boolean(true)) => Field::Boolean(true),
                _ => Field::Null,
            }
        }
        Expression::Operator(IsNull(expr)) => Field::Boolean(eval(expr)?.is_null()),

        Expression::Operator(Add(lhs, rhs)) => eval(lhs)?.checked_add(&eval(rhs)?)?,
        Expression::Operator(Subtract(lhs, rhs)) => eval(lhs)?.checked_sub(&eval(rhs)?)?,
        Expression::Operator(Multiply(lhs, rhs)) => eval(lhs)?.checked_mul(&eval(rhs)?)?,
        Expression::Operator(Divide(lhs, rhs)) => eval(lhs)?.checked_div(&eval(rhs)?)?,
        Expression::Operator(Remainder(lhs, rhs)) => eval(lhs)?.checked_mod(&eval(rhs)?)?,
        Expression::Operator(Negate(expr)) => match eval(expr)? {
            Field::Integer(i) => Field::Integer(i.checked_neg().ok_or(Error::OverflowError)?),
            Field::Float(f) => Field::Float(-f),
            Field::Null => Field::Null,
            value => return errinput!("can't negate {value}"),
        },
    })
}

/// Applies a comparison, yielding NULL if either side is NULL.
fn compare(lhs: &Field, rhs: &Field, test: fn(Ordering) -> bool) -> Result<Field> {
    Ok(match lhs.compare(rhs)? {
        Some(ordering) => Field::Boolean(test(ordering)),
        None => Field::Null,
    })
}

/// Evaluates a predicate. Only TRUE passes; FALSE and NULL don't.
pub fn is_true(expr: &Expression, scope: &dyn Scope, params: &[Field]) -> Result<bool> {
    match evaluate(expr, scope, params)? {
        Field::Boolean(b) => Ok(b),
        Field::Null => Ok(false),
        value => errinput!("filter returned {value}, expected boolean"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::parser::ast::Statement;
    use crate::sql::parser::Parser;
    use crate::types::DataType;

    /// Parses the WHERE clause of a SELECT.
    fn predicate(sql: &str) -> Expression {
        match Parser::parse(&format!("SELECT * FROM t WHERE {sql}")).unwrap() {
            Statement::Select(select) => select.r#where.unwrap(),
            statement => panic!("unexpected statement {statement:?}"),
        }
    }

    fn table() -> Table {
        Table::builder()
            .name("t")
            .column("a", DataType::Int)
            .column("b", DataType::Text)
            .build()
            .unwrap()
    }

    #[test]
    fn test_row_scope() {
        let table = table();
        let row = Row::from(vec![Field::from(1042), Field::Null]);
        let scope = RowScope { table: &table, row: &row };
        let params = [Field::from(40), Field::from(49)];

        assert!(is_true(&predicate("a % 1000 BETWEEN $1 AND $2"), &scope, &params).unwrap());
        assert!(is_true(&predicate("t.a = 1042 AND b IS NULL"), &scope, &[]).unwrap());
        assert!(!is_true(&predicate("b = 'x'"), &scope, &[]).unwrap());
        assert!(is_true(&predicate("NOT a < 0 OR b = 'x'"), &scope, &[]).unwrap());
        assert!(evaluate(&predicate("c = 1"), &scope, &[]).is_err());
        assert!(evaluate(&predicate("a = $3"), &scope, &params).is_err());
    }

    #[test]
    fn test_three_valued_logic() {
        let eval = |sql| evaluate(&predicate(sql), &ConstantScope, &[]).unwrap();
        assert_eq!(eval("NULL AND FALSE"), Field::Boolean(false));
        assert_eq!(eval("NULL AND TRUE"), Field::Null);
        assert_eq!(eval("NULL OR TRUE"), Field::Boolean(true));
        assert_eq!(eval("NOT NULL"), Field::Null);
        assert_eq!(eval("NULL BETWEEN 1 AND 2"), Field::Null);
        assert_eq!(eval("5 BETWEEN 1 AND 2"), Field::Boolean(false));
        assert_eq!(eval("1.5 > 1"), Field::Boolean(true));
    }
}
