/// Condition evaluation for WHERE and HAVING clauses
///
/// Supports: =, <>, <, >, <=, >=, BETWEEN, LIKE, IS NULL, NOT, AND, OR.
/// A comparison touching NULL or an unknown column is false, never an error.
use std::cmp::Ordering;
use std::collections::HashMap;

use regex::Regex;

use super::expression::{evaluate, Environment};
use crate::parser::{CompareOp, Condition, Expression};
use crate::types::{QueryError, Value};

#[derive(Default)]
pub struct ConditionEvaluator {
    // LIKE patterns compiled once per query execution
    like_cache: HashMap<String, Regex>,
}

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evaluate(
        &mut self,
        condition: &Condition,
        env: &dyn Environment,
    ) -> Result<bool, QueryError> {
        match condition {
            Condition::Compare(op, left, right) => {
                let (Some(left), Some(right)) = (operand(left, env)?, operand(right, env)?) else {
                    return Ok(false);
                };
                Ok(compare_values(&left, &right).is_some_and(|ord| matches_op(*op, ord)))
            }
            Condition::Between(expr, low, high) => {
                let (Some(value), Some(low), Some(high)) =
                    (operand(expr, env)?, operand(low, env)?, operand(high, env)?)
                else {
                    return Ok(false);
                };
                let above = compare_values(&value, &low).is_some_and(Ordering::is_ge);
                let below = compare_values(&value, &high).is_some_and(Ordering::is_le);
                Ok(above && below)
            }
            Condition::Like(expr, pattern) => {
                let Some(value) = operand(expr, env)? else {
                    return Ok(false);
                };
                let regex = self.like_regex(pattern)?;
                Ok(regex.is_match(&value.to_string()))
            }
            Condition::IsNull(expr) => match evaluate(expr, env) {
                Ok(value) => Ok(value.is_null()),
                Err(QueryError::UnknownColumn(_)) => Ok(true),
                Err(e) => Err(e),
            },
            Condition::Not(inner) => Ok(!self.evaluate(inner, env)?),
            Condition::And(left, right) => {
                Ok(self.evaluate(left, env)? && self.evaluate(right, env)?)
            }
            Condition::Or(left, right) => {
                Ok(self.evaluate(left, env)? || self.evaluate(right, env)?)
            }
        }
    }

    fn like_regex(&mut self, pattern: &str) -> Result<&Regex, QueryError> {
        if !self.like_cache.contains_key(pattern) {
            let regex = like_to_regex(pattern)?;
            self.like_cache.insert(pattern.to_string(), regex);
        }
        self.like_cache
            .get(pattern)
            .ok_or_else(|| QueryError::Type(format!("invalid LIKE pattern '{pattern}'")))
    }
}

// Non-null operand value; unknown columns read as missing
fn operand(expr: &Expression, env: &dyn Environment) -> Result<Option<Value>, QueryError> {
    match evaluate(expr, env) {
        Ok(Value::Null) | Err(QueryError::UnknownColumn(_)) => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(e) => Err(e),
    }
}

const fn matches_op(op: CompareOp, ord: Ordering) -> bool {
    match op {
        CompareOp::Eq => ord.is_eq(),
        CompareOp::NotEq => ord.is_ne(),
        CompareOp::Lt => ord.is_lt(),
        CompareOp::Gt => ord.is_gt(),
        CompareOp::LtEq => ord.is_le(),
        CompareOp::GtEq => ord.is_ge(),
    }
}

/// Ordering between two runtime values: numerically when both sides are
/// numbers (or one side is text holding a number), otherwise as strings
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Integer(l), Value::Integer(r)) => Some(l.cmp(r)),
        (Value::Date(l), Value::Date(r)) => Some(l.cmp(r)),
        (Value::Time(l), Value::Time(r)) => Some(l.cmp(r)),
        (Value::Timestamp(l), Value::Timestamp(r)) => Some(l.cmp(r)),
        (Value::Text(l), Value::Text(r)) => Some(l.cmp(r)),
        (l, r) if l.is_numeric() || r.is_numeric() => match (l.as_f64(), r.as_f64()) {
            (Some(l), Some(r)) => l.partial_cmp(&r),
            _ => Some(l.to_string().cmp(&r.to_string())),
        },
        (l, r) => Some(l.to_string().cmp(&r.to_string())),
    }
}

/// Translate SQL wildcards: `%` matches any run, `_` any single character
fn like_to_regex(pattern: &str) -> Result<Regex, QueryError> {
    let mut regex = String::with_capacity(pattern.len() + 8);
    regex.push_str("(?s)^");
    for c in pattern.chars() {
        match c {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            c => regex.push_str(&regex::escape(&c.to_string())),
        }
    }
    regex.push('$');
    Regex::new(&regex).map_err(|e| QueryError::Type(format!("invalid LIKE pattern: {e}")))
}
