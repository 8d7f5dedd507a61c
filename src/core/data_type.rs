use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::error::QueryError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DataType {
    String,
    Integer,
    Double,
    Date,
    Time,
    Timestamp,
}

impl DataType {
    /// Order in which undeclared column types are guessed from the first data row
    pub const INFERENCE_ORDER: [Self; 5] = [
        Self::Integer,
        Self::Double,
        Self::Date,
        Self::Time,
        Self::Timestamp,
    ];

    /// Parses a comma-separated declaration list such as `"String,Integer,Date"`
    pub fn parse_list(list: &str) -> Result<Vec<Self>, QueryError> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::from_str)
            .collect()
    }
}

impl FromStr for DataType {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "STRING" | "VARCHAR" | "TEXT" | "CHAR" => Ok(Self::String),
            "INTEGER" | "INT" | "LONG" | "SHORT" | "BYTE" | "BIGINT" => Ok(Self::Integer),
            "DOUBLE" | "FLOAT" | "REAL" => Ok(Self::Double),
            "DATE" => Ok(Self::Date),
            "TIME" => Ok(Self::Time),
            "TIMESTAMP" | "DATETIME" => Ok(Self::Timestamp),
            other => Err(QueryError::InvalidConfiguration(format!(
                "unknown column type '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::String => "String",
            Self::Integer => "Integer",
            Self::Double => "Double",
            Self::Date => "Date",
            Self::Time => "Time",
            Self::Timestamp => "Timestamp",
        };
        write!(f, "{name}")
    }
}
