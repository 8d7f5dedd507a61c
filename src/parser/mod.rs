// Module declarations
mod statement;
mod common;
mod queries;

// Re-export all public types
pub use statement::{
    Statement,
    TableRef,
    SelectColumn,
    OrderByColumn,
    SortOrder,
    Expression,
    AggregateFunction,
    CountTarget,
    CompareOp,
    Condition,
};

use crate::types::QueryError;
use nom::error::ErrorKind;

/// Parse one SELECT statement; trailing input is rejected with its position
pub fn parse_statement(sql: &str) -> Result<Statement, QueryError> {
    let leading = sql.len() - sql.trim_start().len();
    let body = sql.trim().trim_end_matches(';');
    let position_of = |rest: &str| leading + body.len() - rest.trim_start().len();

    match queries::select(body) {
        Ok((remaining, stmt)) => {
            if remaining.trim().is_empty() {
                Ok(stmt)
            } else {
                Err(unexpected_input(remaining, position_of(remaining)))
            }
        }
        Err(nom::Err::Failure(e)) if e.code == ErrorKind::Verify => Err(QueryError::Syntax {
            position: position_of(e.input),
            message: "computed column requires an alias".to_string(),
        }),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
            Err(unexpected_input(e.input, position_of(e.input)))
        }
        Err(nom::Err::Incomplete(_)) => Err(QueryError::Syntax {
            position: sql.len(),
            message: "unexpected end of input".to_string(),
        }),
    }
}

fn unexpected_input(rest: &str, position: usize) -> QueryError {
    let rest = rest.trim_start();
    match rest.chars().next() {
        Some(op @ ('-' | '*' | '/' | '%')) => QueryError::Syntax {
            position,
            message: format!("unsupported operator '{op}', only '+' is allowed"),
        },
        Some(_) => QueryError::Syntax {
            position,
            message: format!(
                "unexpected '{}'",
                rest.split_whitespace().next().unwrap_or(rest)
            ),
        },
        None => QueryError::Syntax {
            position,
            message: "unexpected end of input".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    fn filter_of(sql: &str) -> String {
        parse_statement(sql).unwrap().filter.unwrap().to_string()
    }

    #[test]
    fn test_parse_select() {
        let stmt = parse_statement("SELECT * FROM users WHERE id = 1").unwrap();
        assert_eq!(stmt.columns.len(), 1);
        assert_eq!(stmt.columns[0].expression, Expression::Wildcard);
        assert_eq!(stmt.from.unwrap().name, "users");
    }

    #[test]
    fn test_parse_aliases() {
        let stmt = parse_statement(
            "SELECT location, parameter, ts, name.suffix as value FROM total",
        )
        .unwrap();
        let names: Vec<String> = stmt.columns.iter().map(SelectColumn::name).collect();
        assert_eq!(names, vec!["location", "parameter", "ts", "value"]);
        assert_eq!(stmt.columns[3].expression, Expression::column("name.suffix"));

        let stmt = parse_statement("SELECT A+B AS SUM, B+C+'123' t12 FROM foo").unwrap();
        assert_eq!(stmt.columns[0].name(), "SUM");
        assert_eq!(stmt.columns[1].name(), "t12");
        assert_eq!(stmt.columns[1].expression.to_string(), "+ + [B] [C] '123'");
    }

    #[test]
    fn test_parse_literal_columns() {
        let stmt = parse_statement("SELECT 'abc' as FLD_A, 123 as FLD_B FROM foo").unwrap();
        assert_eq!(
            stmt.columns[0].expression,
            Expression::Literal(Value::Text("abc".to_string()))
        );
        assert_eq!(
            stmt.columns[1].expression,
            Expression::Literal(Value::Integer(123))
        );
    }

    #[test]
    fn test_computed_column_requires_alias() {
        let err = parse_statement("SELECT location+parameter FROM total").unwrap_err();
        assert!(matches!(err, QueryError::Syntax { position: 7, .. }));
    }

    #[test]
    fn test_unsupported_operators() {
        assert!(matches!(
            parse_statement("SELECT location-parameter FROM total"),
            Err(QueryError::Syntax { .. })
        ));
        assert!(matches!(
            parse_statement("SELECT location*parameter FROM total"),
            Err(QueryError::Syntax { .. })
        ));
        assert!(matches!(
            parse_statement("SELECT a % b AS m FROM total"),
            Err(QueryError::Syntax { .. })
        ));
        assert!(matches!(
            parse_statement("SELECT location!parameter FROM total"),
            Err(QueryError::Syntax { .. })
        ));
    }

    #[test]
    fn test_malformed_where_chains() {
        for sql in [
            "SELECT * FROM t WHERE FLD_A = '20' AND AND = 'AA'",
            "SELECT * FROM t WHERE = 'AA'",
            "SELECT * FROM t WHERE FLD_A = '20' = 'AA'",
            "SELECT * FROM t WHERE a=0 AND FLD_A",
        ] {
            assert!(
                matches!(parse_statement(sql), Err(QueryError::Syntax { .. })),
                "{sql}"
            );
        }
    }

    #[test]
    fn test_where_prefix_rendering() {
        assert_eq!(filter_of("SELECT * FROM t WHERE A='20'"), "= [A] '20'");
        assert_eq!(
            filter_of("SELECT * FROM t WHERE A='20' AND B='AA'"),
            "AND = [A] '20' = [B] 'AA'"
        );
        assert_eq!(
            filter_of("SELECT * FROM t WHERE A='20' OR B='AA' AND c=1"),
            "OR = [A] '20' AND = [B] 'AA' = [C] 1"
        );
        assert_eq!(
            filter_of("SELECT * FROM t WHERE (A='20' OR B='AA') AND c=1"),
            "AND OR = [A] '20' = [B] 'AA' = [C] 1"
        );
        assert_eq!(
            filter_of(
                "SELECT * FROM t WHERE B IS NULL OR B BETWEEN '20' AND 'AA' AND B LIKE '20 AND AA'"
            ),
            "OR N [B] AND B [B] '20' 'AA' L [B] '20 AND AA'"
        );
        assert_eq!(
            filter_of("SELECT * FROM t WHERE NOT B IS NOT NULL"),
            "NOT NOT N [B]"
        );
    }

    #[test]
    fn test_bareword_right_hand_side() {
        assert_eq!(
            filter_of("SELECT * FROM sample4 WHERE Job = Project Manager"),
            "= [JOB] 'Project Manager'"
        );
        assert_eq!(
            filter_of("SELECT * FROM sample4 WHERE Job = Project Manager ORDER BY id"),
            "= [JOB] 'Project Manager'"
        );
    }

    #[test]
    fn test_qualified_columns() {
        let stmt =
            parse_statement("SELECT c.Country, c.Name FROM countries c WHERE c.Country = 'NO'")
                .unwrap();
        assert_eq!(stmt.columns[0].expression, Expression::column("Country"));
        assert_eq!(stmt.from.as_ref().unwrap().alias.as_deref(), Some("c"));
        assert_eq!(stmt.filter.unwrap().to_string(), "= [COUNTRY] 'NO'");
    }

    #[test]
    fn test_table_names() {
        let stmt = parse_statement("SELECT * FROM \"C D\"").unwrap();
        assert_eq!(stmt.from.unwrap().name, "C D");
        let stmt = parse_statement("SELECT * FROM ./sub/sample-2 WHERE id = 1").unwrap();
        assert_eq!(stmt.from.unwrap().name, "./sub/sample-2");
    }

    #[test]
    fn test_clauses() {
        let stmt = parse_statement(
            "select distinct job, count(*) n from t where id > 1 group by job having count(*) > 1 \
             order by n desc, job limit 5 offset 2;",
        )
        .unwrap();
        assert!(stmt.distinct);
        assert_eq!(stmt.group_by, vec![Expression::column("job")]);
        assert_eq!(stmt.having.unwrap().to_string(), "> COUNT(*) 1");
        assert_eq!(stmt.order_by.len(), 2);
        assert_eq!(stmt.order_by[0].order, SortOrder::Desc);
        assert_eq!(stmt.order_by[1].order, SortOrder::Asc);
        assert_eq!(stmt.limit, Some(5));
        assert_eq!(stmt.offset, Some(2));
    }

    #[test]
    fn test_select_without_from() {
        let stmt = parse_statement("SELECT 1 AS one, 'x' AS two").unwrap();
        assert!(stmt.from.is_none());
        assert_eq!(stmt.columns.len(), 2);
    }
}
