use super::common::{
    bareword, comparison_operator, identifier, keyword, literal, string_literal, table_name,
    usize_literal, ws,
};
use super::statement::{
    AggregateFunction, CompareOp, Condition, CountTarget, Expression, OrderByColumn,
    SelectColumn, SortOrder, Statement, TableRef,
};
use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{char, multispace0},
    combinator::{map, opt},
    error::{Error, ErrorKind},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

// Parse a column reference, possibly qualified: name, t.name, "quoted name"
fn column_ref(input: &str) -> IResult<&str, Expression> {
    map(
        pair(identifier, many0(preceded(char('.'), identifier))),
        |(first, rest)| {
            if rest.is_empty() {
                Expression::column(first)
            } else {
                Expression::Column {
                    qualifier: Some(first),
                    name: rest.join("."),
                }
            }
        },
    )(input)
}

// Aggregate argument: a column or literal, never another aggregate
fn aggregate_argument(input: &str) -> IResult<&str, Box<Expression>> {
    map(
        delimited(
            ws(char('(')),
            alt((map(literal, Expression::Literal), column_ref)),
            ws(char(')')),
        ),
        Box::new,
    )(input)
}

// Parse aggregate functions: COUNT(*), COUNT(col), SUM(col), AVG(col), MIN(col), MAX(col)
fn aggregate_function(input: &str) -> IResult<&str, AggregateFunction> {
    alt((
        map(
            preceded(
                pair(tag_no_case("COUNT"), multispace0),
                delimited(
                    char('('),
                    alt((
                        map(ws(char('*')), |_| CountTarget::All),
                        map(ws(column_ref), |e| CountTarget::Expression(Box::new(e))),
                    )),
                    char(')'),
                ),
            ),
            AggregateFunction::Count,
        ),
        map(
            preceded(tag_no_case("SUM"), aggregate_argument),
            AggregateFunction::Sum,
        ),
        map(
            preceded(tag_no_case("AVG"), aggregate_argument),
            AggregateFunction::Avg,
        ),
        map(
            preceded(tag_no_case("MIN"), aggregate_argument),
            AggregateFunction::Min,
        ),
        map(
            preceded(tag_no_case("MAX"), aggregate_argument),
            AggregateFunction::Max,
        ),
    ))(input)
}

fn term(input: &str) -> IResult<&str, Expression> {
    ws(alt((
        map(aggregate_function, Expression::Aggregate),
        map(literal, Expression::Literal),
        delimited(char('('), expression, char(')')),
        column_ref,
    )))(input)
}

// term ( '+' term )*, left-associative
pub fn expression(input: &str) -> IResult<&str, Expression> {
    let (input, first) = term(input)?;
    let (input, rest) = many0(preceded(char('+'), term))(input)?;
    let expr = rest.into_iter().fold(first, |left, right| {
        Expression::Add(Box::new(left), Box::new(right))
    });
    Ok((input, expr))
}

fn not_keyword(input: &str) -> IResult<&str, bool> {
    map(opt(ws(keyword("NOT"))), |n| n.is_some())(input)
}

fn negate(negated: bool, condition: Condition) -> Condition {
    if negated {
        Condition::Not(Box::new(condition))
    } else {
        condition
    }
}

// Parse a simple predicate: comparison, IS [NOT] NULL, [NOT] BETWEEN, [NOT] LIKE
fn predicate(input: &str) -> IResult<&str, Condition> {
    let (input, left) = expression(input)?;

    // IS NULL / IS NOT NULL
    if let Ok((rest, (_, negated, _))) =
        tuple((ws(keyword("IS")), not_keyword, ws(keyword("NULL"))))(input)
    {
        return Ok((rest, negate(negated, Condition::IsNull(left))));
    }

    // BETWEEN low AND high
    if let Ok((rest, (negated, _, low, _, high))) = tuple((
        not_keyword,
        ws(keyword("BETWEEN")),
        expression,
        ws(keyword("AND")),
        expression,
    ))(input)
    {
        return Ok((rest, negate(negated, Condition::Between(left, low, high))));
    }

    // LIKE 'pattern'
    if let Ok((rest, (negated, _, pattern))) =
        tuple((not_keyword, ws(keyword("LIKE")), ws(string_literal)))(input)
    {
        return Ok((rest, negate(negated, Condition::Like(left, pattern))));
    }

    let (input, op) = ws(comparison_operator)(input)?;
    let op = match op {
        "=" => CompareOp::Eq,
        "<>" => CompareOp::NotEq,
        "<" => CompareOp::Lt,
        ">" => CompareOp::Gt,
        "<=" => CompareOp::LtEq,
        _ => CompareOp::GtEq,
    };
    let (input, right) = if op == CompareOp::Eq {
        alt((map(ws(bareword), Expression::Literal), expression))(input)?
    } else {
        expression(input)?
    };
    Ok((input, Condition::Compare(op, left, right)))
}

fn condition_primary(input: &str) -> IResult<&str, Condition> {
    alt((
        delimited(ws(char('(')), condition, ws(char(')'))),
        predicate,
    ))(input)
}

fn condition_not(input: &str) -> IResult<&str, Condition> {
    alt((
        map(preceded(ws(keyword("NOT")), condition_not), |c| {
            Condition::Not(Box::new(c))
        }),
        condition_primary,
    ))(input)
}

// Parse AND conditions (higher priority than OR)
fn condition_and(input: &str) -> IResult<&str, Condition> {
    let (input, first) = condition_not(input)?;
    let (input, rest) = opt(preceded(ws(keyword("AND")), condition_and))(input)?;

    match rest {
        Some(right) => Ok((input, Condition::And(Box::new(first), Box::new(right)))),
        None => Ok((input, first)),
    }
}

// Parse OR conditions (lower priority than AND)
pub fn condition(input: &str) -> IResult<&str, Condition> {
    let (input, first) = condition_and(input)?;
    let (input, rest) = opt(preceded(ws(keyword("OR")), condition))(input)?;

    match rest {
        Some(right) => Ok((input, Condition::Or(Box::new(first), Box::new(right)))),
        None => Ok((input, first)),
    }
}

fn alias(input: &str) -> IResult<&str, Option<String>> {
    opt(preceded(opt(ws(keyword("AS"))), ws(identifier)))(input)
}

// Parse select column; computed columns must be named
fn select_column(input: &str) -> IResult<&str, SelectColumn> {
    let (rest, expression) = expression(input)?;
    let (rest, alias) = alias(rest)?;
    if alias.is_none() && matches!(expression, Expression::Add(..)) {
        return Err(nom::Err::Failure(Error::new(input, ErrorKind::Verify)));
    }
    Ok((rest, SelectColumn { expression, alias }))
}

fn select_list(input: &str) -> IResult<&str, Vec<SelectColumn>> {
    alt((
        map(ws(char('*')), |_| {
            vec![SelectColumn {
                expression: Expression::Wildcard,
                alias: None,
            }]
        }),
        separated_list1(ws(char(',')), select_column),
    ))(input)
}

fn from_clause(input: &str) -> IResult<&str, Option<TableRef>> {
    opt(map(
        preceded(ws(keyword("FROM")), pair(ws(table_name), alias)),
        |(name, alias)| TableRef { name, alias },
    ))(input)
}

// Parse optional WHERE clause
pub fn where_clause(input: &str) -> IResult<&str, Option<Condition>> {
    opt(preceded(ws(keyword("WHERE")), condition))(input)
}

// Parse optional GROUP BY clause
pub fn group_by(input: &str) -> IResult<&str, Vec<Expression>> {
    map(
        opt(preceded(
            pair(ws(keyword("GROUP")), ws(keyword("BY"))),
            separated_list1(ws(char(',')), expression),
        )),
        Option::unwrap_or_default,
    )(input)
}

pub fn having(input: &str) -> IResult<&str, Option<Condition>> {
    opt(preceded(ws(keyword("HAVING")), condition))(input)
}

// Parse optional ORDER BY clause
pub fn order_by(input: &str) -> IResult<&str, Vec<OrderByColumn>> {
    let item = map(
        pair(
            expression,
            opt(alt((
                map(ws(keyword("ASC")), |_| SortOrder::Asc),
                map(ws(keyword("DESC")), |_| SortOrder::Desc),
            ))),
        ),
        |(expression, order)| OrderByColumn {
            expression,
            order: order.unwrap_or(SortOrder::Asc),
        },
    );
    map(
        opt(preceded(
            pair(ws(keyword("ORDER")), ws(keyword("BY"))),
            separated_list1(ws(char(',')), item),
        )),
        Option::unwrap_or_default,
    )(input)
}

// Parse optional LIMIT clause
pub fn limit(input: &str) -> IResult<&str, Option<usize>> {
    opt(preceded(ws(keyword("LIMIT")), ws(usize_literal)))(input)
}

pub fn offset(input: &str) -> IResult<&str, Option<usize>> {
    opt(preceded(ws(keyword("OFFSET")), ws(usize_literal)))(input)
}

pub fn select(input: &str) -> IResult<&str, Statement> {
    let (input, _) = ws(keyword("SELECT"))(input)?;

    // Parse optional DISTINCT keyword
    let (input, distinct) = opt(ws(keyword("DISTINCT")))(input)?;
    let distinct = distinct.is_some();

    let (input, columns) = select_list(input)?;
    let (input, from) = from_clause(input)?;
    let (input, filter) = where_clause(input)?;
    let (input, group_by) = group_by(input)?;
    let (input, having) = having(input)?;
    let (input, order_by) = order_by(input)?;
    let (input, limit) = limit(input)?;
    let (input, offset) = offset(input)?;

    let mut statement = Statement {
        distinct,
        columns,
        from,
        filter,
        group_by,
        having,
        order_by,
        limit,
        offset,
    };
    statement.resolve_qualifiers();
    Ok((input, statement))
}
