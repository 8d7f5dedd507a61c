/// Aggregate computation for GROUP BY, HAVING and whole-table aggregates
use std::cmp::Ordering;

use super::conditions::compare_values;
use super::expression::{evaluate, Environment};
use crate::parser::{AggregateFunction, CountTarget, Expression, SelectColumn};
use crate::types::{QueryError, Row, Value};

/// One partition of qualifying rows; column references resolve against the
/// first row (or a select alias), aggregates against all of them
pub struct GroupEnv<'a> {
    pub rows: &'a [Row],
    pub columns: &'a [SelectColumn],
    pub outputs: &'a [Value],
}

impl Environment for GroupEnv<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.rows.first().and_then(|row| row.get(name)) {
            return Some(value.clone());
        }
        self.columns
            .iter()
            .position(|c| {
                c.alias
                    .as_ref()
                    .is_some_and(|alias| alias.eq_ignore_ascii_case(name))
            })
            .and_then(|idx| self.outputs.get(idx).cloned())
    }

    fn aggregate(&self, func: &AggregateFunction) -> Result<Value, QueryError> {
        compute_aggregate(func, self.rows)
    }
}

pub fn compute_aggregate(func: &AggregateFunction, rows: &[Row]) -> Result<Value, QueryError> {
    match func {
        AggregateFunction::Count(CountTarget::All) => Ok(Value::Integer(rows.len() as i64)),
        AggregateFunction::Count(CountTarget::Expression(expr)) => {
            let mut count = 0;
            for row in rows {
                if !evaluate(expr, row)?.is_null() {
                    count += 1;
                }
            }
            Ok(Value::Integer(count))
        }
        AggregateFunction::Sum(expr) => {
            let values = non_null_values(expr, rows)?;
            sum(&values, func)
        }
        AggregateFunction::Avg(expr) => {
            let values = non_null_values(expr, rows)?;
            if values.is_empty() {
                return Ok(Value::Null);
            }
            let total = match sum(&values, func)? {
                Value::Integer(i) => i as f64,
                Value::Double(d) => d,
                _ => 0.0,
            };
            Ok(Value::Double(total / values.len() as f64))
        }
        AggregateFunction::Min(expr) => Ok(extreme(non_null_values(expr, rows)?, Ordering::Less)),
        AggregateFunction::Max(expr) => {
            Ok(extreme(non_null_values(expr, rows)?, Ordering::Greater))
        }
    }
}

fn non_null_values(expr: &Expression, rows: &[Row]) -> Result<Vec<Value>, QueryError> {
    let mut values = Vec::with_capacity(rows.len());
    for row in rows {
        let value = evaluate(expr, row)?;
        if !value.is_null() {
            values.push(value);
        }
    }
    Ok(values)
}

// Integers stay integral until a double shows up
fn sum(values: &[Value], func: &AggregateFunction) -> Result<Value, QueryError> {
    if values.is_empty() {
        return Ok(Value::Null);
    }
    let mut sum_int: i64 = 0;
    let mut sum_real: Option<f64> = None;

    for value in values {
        match value {
            Value::Integer(i) => {
                sum_int = sum_int
                    .checked_add(*i)
                    .ok_or_else(|| QueryError::Type(format!("integer overflow in {func}")))?;
            }
            other => {
                let d = other.as_f64().ok_or_else(|| {
                    QueryError::Type(format!("{func} over non-numeric value '{other}'"))
                })?;
                sum_real = Some(sum_real.unwrap_or(0.0) + d);
            }
        }
    }

    Ok(match sum_real {
        Some(r) => Value::Double(r + sum_int as f64),
        None => Value::Integer(sum_int),
    })
}

fn extreme(values: Vec<Value>, wanted: Ordering) -> Value {
    let mut best: Option<Value> = None;
    for value in values {
        best = match best {
            Some(current) if compare_values(&value, &current) != Some(wanted) => Some(current),
            _ => Some(value),
        };
    }
    best.unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnSet;
    use std::rc::Rc;

    fn rows(values: &[Value]) -> Vec<Row> {
        let columns = Rc::new(ColumnSet::new(vec!["N".to_string()]));
        values
            .iter()
            .map(|v| Row::new(Rc::clone(&columns), vec![v.clone()]))
            .collect()
    }

    fn arg() -> Box<Expression> {
        Box::new(Expression::column("n"))
    }

    #[test]
    fn test_count_skips_nulls() {
        let rows = rows(&[Value::Integer(1), Value::Null, Value::Integer(3)]);
        assert_eq!(
            compute_aggregate(&AggregateFunction::Count(CountTarget::All), &rows).unwrap(),
            Value::Integer(3)
        );
        assert_eq!(
            compute_aggregate(
                &AggregateFunction::Count(CountTarget::Expression(arg())),
                &rows
            )
            .unwrap(),
            Value::Integer(2)
        );
    }

    #[test]
    fn test_sum_avg_min_max() {
        let rows = rows(&[Value::Integer(4), Value::Double(1.5), Value::Integer(2)]);
        assert_eq!(
            compute_aggregate(&AggregateFunction::Sum(arg()), &rows).unwrap(),
            Value::Double(7.5)
        );
        assert_eq!(
            compute_aggregate(&AggregateFunction::Avg(arg()), &rows).unwrap(),
            Value::Double(2.5)
        );
        assert_eq!(
            compute_aggregate(&AggregateFunction::Min(arg()), &rows).unwrap(),
            Value::Double(1.5)
        );
        assert_eq!(
            compute_aggregate(&AggregateFunction::Max(arg()), &rows).unwrap(),
            Value::Integer(4)
        );
    }

    #[test]
    fn test_sum_rejects_text() {
        let rows = rows(&[Value::Text("abc".to_string())]);
        assert!(matches!(
            compute_aggregate(&AggregateFunction::Sum(arg()), &rows),
            Err(QueryError::Type(_))
        ));
    }

    #[test]
    fn test_empty_group() {
        assert_eq!(
            compute_aggregate(&AggregateFunction::Sum(arg()), &[]).unwrap(),
            Value::Null
        );
        assert_eq!(
            compute_aggregate(&AggregateFunction::Count(CountTarget::All), &[]).unwrap(),
            Value::Integer(0)
        );
    }
}
