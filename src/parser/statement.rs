use std::fmt;

use crate::types::Value;

/// A parsed SELECT statement
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub distinct: bool,
    pub columns: Vec<SelectColumn>,
    pub from: Option<TableRef>,
    pub filter: Option<Condition>,
    pub group_by: Vec<Expression>,
    pub having: Option<Condition>,
    pub order_by: Vec<OrderByColumn>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectColumn {
    pub expression: Expression,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByColumn {
    pub expression: Expression,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// `SELECT *`, expanded to the source columns when the table is opened
    Wildcard,
    Column {
        qualifier: Option<String>,
        name: String,
    },
    Literal(Value),
    Add(Box<Expression>, Box<Expression>),
    Aggregate(AggregateFunction),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregateFunction {
    Count(CountTarget),
    Sum(Box<Expression>),
    Avg(Box<Expression>),
    Min(Box<Expression>),
    Max(Box<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CountTarget {
    All,                     // COUNT(*)
    Expression(Box<Expression>), // COUNT(expr), nulls skipped
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare(CompareOp, Expression, Expression),
    Between(Expression, Expression, Expression),
    Like(Expression, String),
    IsNull(Expression),
    Not(Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

impl Statement {
    /// True when rows are partitioned into groups: GROUP BY, HAVING, or an
    /// aggregate select list (a single whole-table group)
    pub fn is_grouped(&self) -> bool {
        !self.group_by.is_empty()
            || self.having.is_some()
            || self.columns.iter().any(|c| c.expression.contains_aggregate())
    }

    /// Rewrites `t.col` references: a qualifier naming the table or its alias
    /// is dropped, any other qualifier stays part of a dotted column name
    pub(crate) fn resolve_qualifiers(&mut self) {
        let Some(table) = self.from.clone() else {
            for column in &mut self.columns {
                column.expression.resolve_qualifier(None);
            }
            return;
        };
        let table = Some(&table);
        for column in &mut self.columns {
            column.expression.resolve_qualifier(table);
        }
        if let Some(filter) = &mut self.filter {
            filter.resolve_qualifiers(table);
        }
        for expr in &mut self.group_by {
            expr.resolve_qualifier(table);
        }
        if let Some(having) = &mut self.having {
            having.resolve_qualifiers(table);
        }
        for item in &mut self.order_by {
            item.expression.resolve_qualifier(table);
        }
    }
}

impl SelectColumn {
    /// Output name: the alias if given, otherwise derived from the expression
    pub fn name(&self) -> String {
        match (&self.alias, &self.expression) {
            (Some(alias), _) => alias.clone(),
            (None, Expression::Column { name, .. }) => name.clone(),
            (None, Expression::Literal(value)) => value.to_string(),
            (None, expr) => expr.to_string(),
        }
    }
}

impl Expression {
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column {
            qualifier: None,
            name: name.into(),
        }
    }

    pub fn contains_aggregate(&self) -> bool {
        match self {
            Self::Aggregate(_) => true,
            Self::Add(left, right) => left.contains_aggregate() || right.contains_aggregate(),
            _ => false,
        }
    }

    /// Collect referenced column names, skipping those inside aggregates when asked
    pub fn column_names<'a>(&'a self, into_aggregates: bool, out: &mut Vec<&'a str>) {
        match self {
            Self::Column { name, .. } => out.push(name),
            Self::Add(left, right) => {
                left.column_names(into_aggregates, out);
                right.column_names(into_aggregates, out);
            }
            Self::Aggregate(func) if into_aggregates => {
                if let Some(arg) = func.argument() {
                    arg.column_names(true, out);
                }
            }
            _ => {}
        }
    }

    fn resolve_qualifier(&mut self, table: Option<&TableRef>) {
        match self {
            Self::Column { qualifier, name } => {
                if let Some(q) = qualifier.take() {
                    let matches_table = table.is_some_and(|t| {
                        t.name.eq_ignore_ascii_case(&q)
                            || t.alias.as_ref().is_some_and(|a| a.eq_ignore_ascii_case(&q))
                    });
                    if !matches_table {
                        *name = format!("{q}.{name}");
                    }
                }
            }
            Self::Add(left, right) => {
                left.resolve_qualifier(table);
                right.resolve_qualifier(table);
            }
            Self::Aggregate(func) => {
                if let Some(arg) = func.argument_mut() {
                    arg.resolve_qualifier(table);
                }
            }
            Self::Wildcard | Self::Literal(_) => {}
        }
    }
}

impl AggregateFunction {
    pub fn argument(&self) -> Option<&Expression> {
        match self {
            Self::Count(CountTarget::All) => None,
            Self::Count(CountTarget::Expression(e))
            | Self::Sum(e)
            | Self::Avg(e)
            | Self::Min(e)
            | Self::Max(e) => Some(e),
        }
    }

    fn argument_mut(&mut self) -> Option<&mut Expression> {
        match self {
            Self::Count(CountTarget::All) => None,
            Self::Count(CountTarget::Expression(e))
            | Self::Sum(e)
            | Self::Avg(e)
            | Self::Min(e)
            | Self::Max(e) => Some(e),
        }
    }
}

impl Condition {
    fn resolve_qualifiers(&mut self, table: Option<&TableRef>) {
        match self {
            Self::Compare(_, left, right) => {
                left.resolve_qualifier(table);
                right.resolve_qualifier(table);
            }
            Self::Between(expr, low, high) => {
                expr.resolve_qualifier(table);
                low.resolve_qualifier(table);
                high.resolve_qualifier(table);
            }
            Self::Like(expr, _) | Self::IsNull(expr) => expr.resolve_qualifier(table),
            Self::Not(inner) => inner.resolve_qualifiers(table),
            Self::And(left, right) | Self::Or(left, right) => {
                left.resolve_qualifiers(table);
                right.resolve_qualifiers(table);
            }
        }
    }
}

// Prefix notation, e.g. `AND = [A] '20' = [B] 'AA'`

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::LtEq => "<=",
            Self::GtEq => ">=",
        };
        write!(f, "{op}")
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wildcard => write!(f, "*"),
            Self::Column { qualifier: Some(q), name } => {
                write!(f, "[{}.{}]", q.to_uppercase(), name.to_uppercase())
            }
            Self::Column { qualifier: None, name } => write!(f, "[{}]", name.to_uppercase()),
            Self::Literal(Value::Text(s)) => write!(f, "'{s}'"),
            Self::Literal(value) => write!(f, "{value}"),
            Self::Add(left, right) => write!(f, "+ {left} {right}"),
            Self::Aggregate(func) => write!(f, "{func}"),
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(CountTarget::All) => write!(f, "COUNT(*)"),
            Self::Count(CountTarget::Expression(e)) => write!(f, "COUNT({e})"),
            Self::Sum(e) => write!(f, "SUM({e})"),
            Self::Avg(e) => write!(f, "AVG({e})"),
            Self::Min(e) => write!(f, "MIN({e})"),
            Self::Max(e) => write!(f, "MAX({e})"),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compare(op, left, right) => write!(f, "{op} {left} {right}"),
            Self::Between(expr, low, high) => write!(f, "B {expr} {low} {high}"),
            Self::Like(expr, pattern) => write!(f, "L {expr} '{pattern}'"),
            Self::IsNull(expr) => write!(f, "N {expr}"),
            Self::Not(inner) => write!(f, "NOT {inner}"),
            Self::And(left, right) => write!(f, "AND {left} {right}"),
            Self::Or(left, right) => write!(f, "OR {left} {right}"),
        }
    }
}
