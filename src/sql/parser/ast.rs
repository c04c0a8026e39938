use crate::types::{Column, Field};

/// The statements the memory backend executes.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    /// CREATE [TEMP|TEMPORARY] TABLE name (columns) [ON COMMIT DROP].
    CreateTable {
        name: String,
        columns: Vec<Column>,
        /// Temporary tables are private to the transaction that created them.
        temporary: bool,
        /// Only valid on temporary tables: drop the table at commit too, not
        /// just at rollback.
        on_commit_drop: bool,
    },
    Select(Select),
}

/// A SELECT statement.
#[derive(Clone, Debug, PartialEq)]
pub struct Select {
    pub distinct: bool,
    pub items: Vec<SelectItem>,
    pub from: String,
    pub r#where: Option<Expression>,
    pub group_by: Vec<Expression>,
    pub having: Option<Expression>,
    pub order_by: Vec<(Expression, Direction)>,
    pub limit: Option<Expression>,
}

/// A SELECT list entry.
#[derive(Clone, Debug, PartialEq)]
pub enum SelectItem {
    /// `*`, every column of the source table.
    Wildcard,
    Expression(Expression, Option<String>),
}

/// ORDER BY direction.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// Expressions. Can be nested.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    /// A column reference, optionally qualified with a table name.
    Column(Option<String>, String),
    Literal(Field),
    /// A positional parameter, 1-based.
    Param(usize),
    Aggregate(Aggregate, Box<Expression>),
    /// COUNT(*), which counts rows regardless of their values.
    CountAll,
    Operator(Operator),
}

/// Aggregate functions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Aggregate {
    Average,
    Count,
    Max,
    Min,
    Sum,
}

impl Aggregate {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "avg" => Self::Average,
            "count" => Self::Count,
            "max" => Self::Max,
            "min" => Self::Min,
            "sum" => Self::Sum,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Average => "avg",
            Self::Count => "count",
            Self::Max => "max",
            Self::Min => "min",
            Self::Sum => "sum",
        }
    }
}

/// Expression operators.
#[derive(Clone, Debug, PartialEq)]
pub enum Operator {
    And(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    Or(Box<Expression>, Box<Expression>),

    Equal(Box<Expression>, Box<Expression>),
    GreaterThan(Box<Expression>, Box<Expression>),
    GreaterThanOrEqual(Box<Expression>, Box<Expression>),
    LessThan(Box<Expression>, Box<Expression>),
    LessThanOrEqual(Box<Expression>, Box<Expression>),
    NotEqual(Box<Expression>, Box<Expression>),
    /// `expr BETWEEN low AND high`, inclusive on both ends.
    Between(Box<Expression>, Box<Expression>, Box<Expression>),
    IsNull(Box<Expression>),

    Add(Box<Expression>, Box<Expression>),
    Divide(Box<Expression>, Box<Expression>),
    Multiply(Box<Expression>, Box<Expression>),
    Negate(Box<Expression>),
    Remainder(Box<Expression>, Box<Expression>),
    Subtract(Box<Expression>, Box<Expression>),
}

impl From<Operator> for Expression {
    fn from(op: Operator) -> Self {
        Self::Operator(op)
    }
}

impl From<Field> for Expression {
    fn from(value: Field) -> Self {
        Self::Literal(value)
    }
}

impl Expression {
    /// Walks the expression tree depth-first, calling a closure for every
    /// node. Halts and returns false if the closure returns false.
    pub fn walk(&self, visitor: &mut impl FnMut(&Expression) -> bool) -> bool {
        use Operator::*;
        if !visitor(self) {
            return false;
        }
        match self {
            Self::Operator(Add(lhs, rhs))
            | Self::Operator(And(lhs, rhs))
            | Self::Operator(Divide(lhs, rhs))
            | Self::Operator(Equal(lhs, rhs))
            | Self::Operator(GreaterThan(lhs, rhs))
            | Self::Operator(GreaterThanOrEqual(lhs, rhs))
            | Self::Operator(LessThan(lhs, rhs))
            | Self::Operator(LessThanOrEqual(lhs, rhs))
            | Self::Operator(Multiply(lhs, rhs))
            | Self::Operator(NotEqual(lhs, rhs))
            | Self::Operator(Or(lhs, rhs))
            | Self::Operator(Remainder(lhs, rhs))
            | Self::Operator(Subtract(lhs, rhs)) => lhs.walk(visitor) && rhs.walk(visitor),

            Self::Operator(Between(expr, low, high)) => {
                expr.walk(visitor) && low.walk(visitor) && high.walk(visitor)
            }

            Self::Operator(IsNull(expr))
            | Self::Operator(Negate(expr))
            | Self::Operator(Not(expr))
            | Self::Aggregate(_, expr) => expr.walk(visitor),

            Self::Column(..) | Self::Literal(_) | Self::Param(_) | Self::CountAll => true,
        }
    }

    /// Returns true if the expression or any of its children is an aggregate.
    pub fn contains_aggregate(&self) -> bool {
        !self.walk(&mut |expr| !matches!(expr, Self::Aggregate(..) | Self::CountAll))
    }

    /// The column name a SELECT item gets when it has no alias.
    pub fn output_name(&self) -> String {
        match self {
            Self::Column(_, name) => name.clone(),
            Self::Aggregate(aggregate, _) => aggregate.name().to_string(),
            Self::CountAll => Aggregate::Count.name().to_string(),
            _ => "?column?".to_string(),
        }
    }
}
