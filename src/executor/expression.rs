/// Evaluation of select-list and predicate operands
///
/// Expressions resolve column names through an [`Environment`]: a plain row
/// while scanning, or a group of rows when aggregates are being computed.
use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::parser::{AggregateFunction, Expression, SelectColumn};
use crate::types::{QueryError, Row, Value};

pub trait Environment {
    /// Value bound to a column name (case-insensitive), `None` when unknown
    fn lookup(&self, name: &str) -> Option<Value>;

    /// Aggregate over the rows this environment stands for
    fn aggregate(&self, func: &AggregateFunction) -> Result<Value, QueryError> {
        Err(QueryError::UnsupportedFeature(format!(
            "aggregate {func} outside of a grouped query"
        )))
    }
}

impl Environment for Row {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Environment for HashMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(&name.to_uppercase())
            .or_else(|| self.get(name))
            .cloned()
    }
}

/// A source row that also exposes the select-list aliases, so WHERE can
/// refer to `J` in `SELECT Job J ... WHERE J = 'x'`
pub struct AliasedRow<'a> {
    pub row: &'a Row,
    pub columns: &'a [SelectColumn],
}

impl Environment for AliasedRow<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.row.get(name) {
            return Some(value.clone());
        }
        self.columns
            .iter()
            .find(|c| {
                c.alias
                    .as_ref()
                    .is_some_and(|alias| alias.eq_ignore_ascii_case(name))
            })
            .filter(|c| !c.expression.contains_aggregate())
            .and_then(|c| evaluate(&c.expression, self.row).ok())
    }
}

pub fn evaluate(expr: &Expression, env: &dyn Environment) -> Result<Value, QueryError> {
    match expr {
        Expression::Column { name, .. } => env
            .lookup(name)
            .ok_or_else(|| QueryError::UnknownColumn(name.clone())),
        Expression::Literal(value) => Ok(value.clone()),
        Expression::Add(left, right) => {
            add_values(evaluate(left, env)?, evaluate(right, env)?)
        }
        Expression::Aggregate(func) => env.aggregate(func),
        Expression::Wildcard => Err(QueryError::UnsupportedFeature(
            "'*' is only allowed as the whole select list".to_string(),
        )),
    }
}

/// `+` over runtime types: integer addition, double addition, string
/// concatenation, or date plus time of day
pub fn add_values(left: Value, right: Value) -> Result<Value, QueryError> {
    match (left, right) {
        (Value::Text(l), r) => Ok(Value::Text(l + &text_of(&r))),
        (l, Value::Text(r)) => Ok(Value::Text(text_of(&l) + &r)),
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Integer(l), Value::Integer(r)) => l
            .checked_add(r)
            .map(Value::Integer)
            .ok_or_else(|| QueryError::Type(format!("integer overflow in {l} + {r}"))),
        (Value::Integer(l), Value::Double(r)) => Ok(Value::Double(l as f64 + r)),
        (Value::Double(l), Value::Integer(r)) => Ok(Value::Double(l + r as f64)),
        (Value::Double(l), Value::Double(r)) => Ok(Value::Double(l + r)),
        (Value::Date(d), Value::Time(t)) | (Value::Time(t), Value::Date(d)) => {
            Ok(Value::Timestamp(NaiveDateTime::new(d, t)))
        }
        (l, r) => Err(QueryError::Type(format!(
            "cannot add {} and {}",
            type_name(&l),
            type_name(&r)
        ))),
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NULL",
        Value::Integer(_) => "Integer",
        Value::Double(_) => "Double",
        Value::Text(_) => "String",
        Value::Date(_) => "Date",
        Value::Time(_) => "Time",
        Value::Timestamp(_) => "Timestamp",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    #[test]
    fn test_add_numbers() {
        assert_eq!(
            add_values(Value::Integer(2), Value::Integer(3)).unwrap(),
            Value::Integer(5)
        );
        assert_eq!(
            add_values(Value::Integer(2), Value::Double(0.5)).unwrap(),
            Value::Double(2.5)
        );
        assert!(add_values(Value::Integer(i64::MAX), Value::Integer(1)).is_err());
    }

    #[test]
    fn test_add_concatenates_text() {
        assert_eq!(
            add_values(Value::Text("AA".to_string()), Value::Integer(12)).unwrap(),
            Value::Text("AA12".to_string())
        );
        assert_eq!(
            add_values(Value::Integer(12), Value::Text("123".to_string())).unwrap(),
            Value::Text("12123".to_string())
        );
    }

    #[test]
    fn test_add_date_and_time() {
        let date = NaiveDate::from_ymd_opt(2001, 4, 2).unwrap();
        let time = NaiveTime::from_hms_opt(12, 30, 0).unwrap();
        assert_eq!(
            add_values(Value::Date(date), Value::Time(time)).unwrap(),
            Value::Timestamp(NaiveDateTime::new(date, time))
        );
    }

    #[test]
    fn test_timestamp_arithmetic_is_rejected() {
        let ts = NaiveDate::from_ymd_opt(2001, 4, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert!(matches!(
            add_values(Value::Timestamp(ts), Value::Integer(1)),
            Err(QueryError::Type(_))
        ));
    }

    #[test]
    fn test_evaluate_against_map() {
        let mut env = HashMap::new();
        env.insert("A".to_string(), Value::Integer(1));
        env.insert("B".to_string(), Value::Integer(2));
        let expr = Expression::Add(
            Box::new(Expression::column("a")),
            Box::new(Expression::column("b")),
        );
        assert_eq!(evaluate(&expr, &env).unwrap(), Value::Integer(3));
        assert!(matches!(
            evaluate(&Expression::column("z"), &env),
            Err(QueryError::UnknownColumn(_))
        ));
    }
}
