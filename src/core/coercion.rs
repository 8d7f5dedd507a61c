/// Conversion of raw text fields into typed values
///
/// Columns carry either a declared type or one inferred from the first data
/// row. Declared types are strict; inferred types degrade to text when a later
/// value does not fit.
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::data_type::DataType;
use super::error::QueryError;
use super::value::{looks_numeric, Value};

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";
pub const DEFAULT_TIME_FORMAT: &str = "%H:%M:%S";
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct Coercer {
    pub date_format: String,
    pub time_format: String,
    pub timestamp_format: String,
}

impl Default for Coercer {
    fn default() -> Self {
        Self {
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }
}

impl Coercer {
    /// Guess a column type from one raw value; first successful parse wins
    pub fn infer_type(&self, raw: &str) -> DataType {
        let raw = raw.trim();
        DataType::INFERENCE_ORDER
            .into_iter()
            .find(|data_type| self.parse(raw, *data_type).is_some())
            .unwrap_or(DataType::String)
    }

    /// Strict coercion for declared column types
    pub fn coerce(&self, raw: &str, data_type: DataType) -> Result<Value, QueryError> {
        if data_type == DataType::String {
            return Ok(Value::Text(raw.to_string()));
        }
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Value::Null);
        }
        self.parse(trimmed, data_type).ok_or_else(|| {
            QueryError::Type(format!("cannot convert '{raw}' to {data_type}"))
        })
    }

    /// Lenient coercion for inferred column types
    pub fn coerce_inferred(&self, raw: &str, data_type: DataType) -> Value {
        self.coerce(raw, data_type)
            .unwrap_or_else(|_| Value::Text(raw.to_string()))
    }

    fn parse(&self, raw: &str, data_type: DataType) -> Option<Value> {
        match data_type {
            DataType::String => Some(Value::Text(raw.to_string())),
            DataType::Integer => raw.parse::<i64>().ok().map(Value::Integer),
            DataType::Double => {
                if looks_numeric(raw) {
                    raw.parse::<f64>().ok().map(Value::Double)
                } else {
                    None
                }
            }
            DataType::Date => NaiveDate::parse_from_str(raw, &self.date_format)
                .ok()
                .map(Value::Date),
            DataType::Time => NaiveTime::parse_from_str(raw, &self.time_format)
                .ok()
                .map(Value::Time),
            DataType::Timestamp => NaiveDateTime::parse_from_str(raw, &self.timestamp_format)
                .ok()
                .map(Value::Timestamp),
        }
    }
}
