use super::ast::{self, Aggregate, Direction, Expression, Operator, SelectItem, Statement};
use crate::common::Result;
use crate::errinput;
use crate::types::{Column, DataType, Field};
use sqlparser::ast::{
    BinaryOperator, ColumnDef, ColumnOption, CreateTable, Distinct, DuplicateTreatment, Expr,
    FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr, Ident, ObjectName, OnCommit,
    Query, SetExpr, TableFactor, UnaryOperator, Value,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser as SqlParser;

/// Parses SQL with sqlparser's PostgreSQL dialect and lowers the result into
/// the statements the memory backend executes. Anything outside that subset
/// is rejected here rather than at execution time.
pub struct Parser;

impl Parser {
    /// Parses the input string into a single statement. An optional trailing
    /// semicolon is allowed.
    pub fn parse(sql: &str) -> Result<Statement> {
        let mut statements = SqlParser::parse_sql(&PostgreSqlDialect {}, sql)?;
        if statements.len() != 1 {
            return errinput!("expected one statement, got {}", statements.len());
        }
        match statements.remove(0) {
            sqlparser::ast::Statement::CreateTable(create) => lower_create_table(create),
            sqlparser::ast::Statement::Query(query) => lower_query(*query),
            statement => errinput!("unsupported statement: {statement}"),
        }
    }
}

/// Unquoted identifiers fold to lower case, quoted ones keep theirs.
fn ident(ident: &Ident) -> String {
    match ident.quote_style {
        Some(_) => ident.value.clone(),
        None => ident.value.to_lowercase(),
    }
}

/// Table and function names must be unqualified.
fn object_name(name: &ObjectName) -> Result<String> {
    match name.0.as_slice() {
        [name] => Ok(ident(name)),
        _ => errinput!("qualified names are not supported: {name}"),
    }
}

fn lower_create_table(create: CreateTable) -> Result<Statement> {
    if create.query.is_some() || !create.constraints.is_empty() {
        return errinput!("only plain column definitions are supported in CREATE TABLE");
    }
    let on_commit_drop = match create.on_commit {
        None => false,
        Some(OnCommit::Drop) if create.temporary => true,
        Some(OnCommit::Drop) => {
            return errinput!("ON COMMIT can only be used on temporary tables");
        }
        Some(_) => return errinput!("only ON COMMIT DROP is supported"),
    };
    let columns = create.columns.iter().map(lower_column).collect::<Result<_>>()?;
    Ok(Statement::CreateTable {
        name: object_name(&create.name)?,
        columns,
        temporary: create.temporary,
        on_commit_drop,
    })
}

fn lower_column(column: &ColumnDef) -> Result<Column> {
    let data_type: DataType = column.data_type.to_string().parse()?;
    let mut nullable = true;
    for option in &column.options {
        match option.option {
            ColumnOption::Null => nullable = true,
            ColumnOption::NotNull => nullable = false,
            ref option => return errinput!("unsupported column option {option}"),
        }
    }
    Ok(Column::new(&ident(&column.name), data_type, nullable))
}

fn lower_query(query: Query) -> Result<Statement> {
    if query.with.is_some() || query.offset.is_some() || query.fetch.is_some() {
        return errinput!("WITH, OFFSET and FETCH are not supported");
    }
    let SetExpr::Select(select) = *query.body else {
        return errinput!("only simple SELECT queries are supported");
    };

    let from = match select.from.as_slice() {
        [table] if table.joins.is_empty() => match &table.relation {
            TableFactor::Table {
                name, alias: None, ..
            } => object_name(name)?,
            relation => return errinput!("unsupported FROM item {relation}"),
        },
        _ => return errinput!("SELECT requires exactly one table in FROM"),
    };

    let distinct = match &select.distinct {
        None => false,
        Some(Distinct::Distinct) => true,
        Some(Distinct::On(_)) => return errinput!("DISTINCT ON is not supported"),
    };

    if select.projection.is_empty() {
        return errinput!("SELECT requires at least one output column");
    }
    let items = select
        .projection
        .iter()
        .map(|item| match item {
            sqlparser::ast::SelectItem::Wildcard(_) => Ok(SelectItem::Wildcard),
            sqlparser::ast::SelectItem::UnnamedExpr(expr) => {
                Ok(SelectItem::Expression(lower_expr(expr)?, None))
            }
            sqlparser::ast::SelectItem::ExprWithAlias { expr, alias } => {
                Ok(SelectItem::Expression(lower_expr(expr)?, Some(ident(alias))))
            }
            item => errinput!("unsupported select item {item}"),
        })
        .collect::<Result<_>>()?;

    let group_by = match &select.group_by {
        GroupByExpr::Expressions(exprs, modifiers) if modifiers.is_empty() => {
            exprs.iter().map(lower_expr).collect::<Result<_>>()?
        }
        group_by => return errinput!("unsupported {group_by}"),
    };

    let order_by = query
        .order_by
        .iter()
        .flat_map(|order_by| &order_by.exprs)
        .map(|order| {
            let direction = match order.asc {
                Some(false) => Direction::Descending,
                _ => Direction::Ascending,
            };
            Ok((lower_expr(&order.expr)?, direction))
        })
        .collect::<Result<_>>()?;

    Ok(Statement::Select(ast::Select {
        distinct,
        items,
        from,
        r#where: select.selection.as_ref().map(lower_expr).transpose()?,
        group_by,
        having: select.having.as_ref().map(lower_expr).transpose()?,
        order_by,
        limit: query.limit.as_ref().map(lower_expr).transpose()?,
    }))
}

fn boxed(expr: &Expr) -> Result<Box<Expression>> {
    Ok(Box::new(lower_expr(expr)?))
}

/// Lowers an expression.
fn lower_expr(expr: &Expr) -> Result<Expression> {
    Ok(match expr {
        Expr::Identifier(column) => Expression::Column(None, ident(column)),
        Expr::CompoundIdentifier(parts) => match parts.as_slice() {
            [table, column] => Expression::Column(Some(ident(table)), ident(column)),
            _ => return errinput!("unsupported column reference {expr}"),
        },
        Expr::Value(value) => lower_value(value)?,
        Expr::Nested(expr) => lower_expr(expr)?,

        Expr::IsNull(expr) => Operator::IsNull(boxed(expr)?).into(),
        Expr::IsNotNull(expr) => {
            Operator::Not(Box::new(Operator::IsNull(boxed(expr)?).into())).into()
        }
        Expr::Between {
            expr,
            negated,
            low,
            high,
        } => {
            let between = Operator::Between(boxed(expr)?, boxed(low)?, boxed(high)?).into();
            match negated {
                true => Operator::Not(Box::new(between)).into(),
                false => between,
            }
        }

        Expr::UnaryOp { op, expr } => match op {
            UnaryOperator::Not => Operator::Not(boxed(expr)?).into(),
            UnaryOperator::Minus => Operator::Negate(boxed(expr)?).into(),
            UnaryOperator::Plus => lower_expr(expr)?,
            op => return errinput!("unsupported operator {op}"),
        },
        Expr::BinaryOp { left, op, right } => {
            let (lhs, rhs) = (boxed(left)?, boxed(right)?);
            match op {
                BinaryOperator::And => Operator::And(lhs, rhs),
                BinaryOperator::Or => Operator::Or(lhs, rhs),
                BinaryOperator::Eq => Operator::Equal(lhs, rhs),
                BinaryOperator::NotEq => Operator::NotEqual(lhs, rhs),
                BinaryOperator::Gt => Operator::GreaterThan(lhs, rhs),
                BinaryOperator::GtEq => Operator::GreaterThanOrEqual(lhs, rhs),
                BinaryOperator::Lt => Operator::LessThan(lhs, rhs),
                BinaryOperator::LtEq => Operator::LessThanOrEqual(lhs, rhs),
                BinaryOperator::Plus => Operator::Add(lhs, rhs),
                BinaryOperator::Minus => Operator::Subtract(lhs, rhs),
                BinaryOperator::Multiply => Operator::Multiply(lhs, rhs),
                BinaryOperator::Divide => Operator::Divide(lhs, rhs),
                BinaryOperator::Modulo => Operator::Remainder(lhs, rhs),
                op => return errinput!("unsupported operator {op}"),
            }
            .into()
        }

        Expr::Function(function) => {
            let name = object_name(&function.name)?;
            let Some(aggregate) = Aggregate::from_name(&name) else {
                return errinput!("unknown function {name}");
            };
            if function.over.is_some() || function.filter.is_some() {
                return errinput!("window and filtered aggregates are not supported");
            }
            let FunctionArguments::List(list) = &function.args else {
                return errinput!("{name} takes one argument");
            };
            if let Some(DuplicateTreatment::Distinct) = list.duplicate_treatment {
                return errinput!("DISTINCT aggregates are not supported");
            }
            match list.args.as_slice() {
                [FunctionArg::Unnamed(FunctionArgExpr::Wildcard)]
                    if aggregate == Aggregate::Count =>
                {
                    Expression::CountAll
                }
                [FunctionArg::Unnamed(FunctionArgExpr::Expr(arg))] => {
                    Expression::Aggregate(aggregate, boxed(arg)?)
                }
                _ => return errinput!("{name} takes one argument"),
            }
        }

        expr => return errinput!("unsupported expression {expr}"),
    })
}

/// Lowers a literal or a `$n` parameter.
fn lower_value(value: &Value) -> Result<Expression> {
    Ok(match value {
        Value::Number(n, _) if n.chars().all(|c| c.is_ascii_digit()) => {
            Field::Integer(n.parse()?).into()
        }
        Value::Number(n, _) => Field::Float(n.parse()?).into(),
        Value::SingleQuotedString(s) => Field::String(s.clone()).into(),
        Value::Boolean(b) => Field::Boolean(*b).into(),
        Value::Null => Field::Null.into(),
        Value::Placeholder(p) => match p.strip_prefix('$').map(str::parse::<usize>) {
            Some(Ok(n)) if n > 0 => Expression::Param(n),
            _ => return errinput!("invalid parameter {p}, expected $1, $2, ..."),
        },
        value => return errinput!("unsupported literal {value}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str) -> Box<Expression> {
        Box::new(Expression::Column(None, name.to_string()))
    }

    fn select(sql: &str) -> ast::Select {
        match Parser::parse(sql).unwrap() {
            Statement::Select(select) => select,
            statement => panic!("expected select, got {statement:?}"),
        }
    }

    #[test]
    fn test_create_temporary_table() {
        let statement = Parser::parse(
            "CREATE TEMPORARY TABLE results (\nuser_id integer NOT NULL,\ntotal double precision\n) ON COMMIT DROP",
        )
        .unwrap();
        assert_eq!(
            statement,
            Statement::CreateTable {
                name: "results".to_string(),
                columns: vec![
                    Column::new("user_id", DataType::Int, false),
                    Column::new("total", DataType::Float, true),
                ],
                temporary: true,
                on_commit_drop: true,
            }
        );
    }

    #[test]
    fn test_create_table_checks() {
        assert!(Parser::parse("CREATE TABLE t (a integer) ON COMMIT DROP").is_err());
        assert!(Parser::parse("CREATE TEMP TABLE t (a integer) ON COMMIT DELETE ROWS").is_err());
        assert!(Parser::parse("CREATE TABLE t (a integer DEFAULT 1)").is_err());
        assert!(Parser::parse("CREATE TABLE t (a blob)").is_err());
        assert_eq!(
            Parser::parse("CREATE TEMP TABLE T (\"A\" numeric(10, 2) NULL)").unwrap(),
            Statement::CreateTable {
                name: "t".to_string(),
                columns: vec![Column::new("A", DataType::Float, true)],
                temporary: true,
                on_commit_drop: false,
            }
        );
    }

    #[test]
    fn test_between_binds_tighter_than_and() {
        let select = select("SELECT * FROM t WHERE a % 10 BETWEEN $1 AND $2 AND b = 1");
        let between = Operator::Between(
            Box::new(Operator::Remainder(column("a"), Box::new(Field::Integer(10).into())).into()),
            Box::new(Expression::Param(1)),
            Box::new(Expression::Param(2)),
        );
        let equal = Operator::Equal(column("b"), Box::new(Field::Integer(1).into()));
        assert_eq!(
            select.r#where,
            Some(Operator::And(Box::new(between.into()), Box::new(equal.into())).into())
        );
    }

    #[test]
    fn test_select_clauses() {
        let select = select(
            "SELECT user_id, count(*) AS n FROM tx GROUP BY user_id HAVING count(*) >= 3 ORDER BY n DESC, user_id LIMIT 5;",
        );
        assert_eq!(select.from, "tx");
        assert_eq!(select.items.len(), 2);
        assert_eq!(
            select.items[1],
            SelectItem::Expression(Expression::CountAll, Some("n".to_string()))
        );
        assert_eq!(select.group_by, vec![*column("user_id")]);
        assert!(select.having.as_ref().is_some_and(|h| h.contains_aggregate()));
        assert_eq!(
            select.order_by,
            vec![
                (*column("n"), Direction::Descending),
                (*column("user_id"), Direction::Ascending)
            ]
        );
        assert_eq!(select.limit, Some(Field::Integer(5).into()));
    }

    #[test]
    fn test_expressions() {
        let select = select("SELECT 1 + 2 * -3, T.A, sum(dough) FROM t WHERE b IS NOT NULL");
        let arithmetic: Expression = Operator::Add(
            Box::new(Field::Integer(1).into()),
            Box::new(
                Operator::Multiply(
                    Box::new(Field::Integer(2).into()),
                    Box::new(Operator::Negate(Box::new(Field::Integer(3).into())).into()),
                )
                .into(),
            ),
        )
        .into();
        assert_eq!(
            select.items,
            vec![
                SelectItem::Expression(arithmetic, None),
                SelectItem::Expression(Expression::Column(Some("t".into()), "a".into()), None),
                SelectItem::Expression(Expression::Aggregate(Aggregate::Sum, column("dough")), None),
            ]
        );
        assert_eq!(
            select.r#where,
            Some(Operator::Not(Box::new(Operator::IsNull(column("b")).into())).into())
        );
    }

    #[test]
    fn test_errors() {
        assert!(Parser::parse("").is_err());
        assert!(Parser::parse("SELECT a FROM t; SELECT b FROM t").is_err());
        assert!(Parser::parse("SELECT a FROM t extra tokens").is_err());
        assert!(Parser::parse("SELECT a FROM t JOIN u ON t.a = u.a").is_err());
        assert!(Parser::parse("SELECT nope(a) FROM t").is_err());
        assert!(Parser::parse("SELECT count(DISTINCT a) FROM t").is_err());
        assert!(Parser::parse("SELECT a FROM t WHERE a = $0").is_err());
        assert!(Parser::parse("DROP TABLE t").is_err());
    }
}
