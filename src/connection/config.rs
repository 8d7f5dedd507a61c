use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::types::{Coercer, QueryError};

/// Connection settings; every table of a connection shares them unless a
/// `[tables.<name>]` entry overrides its header or column types
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Directory holding the table files
    #[serde(default = "default_path")]
    pub path: PathBuf,
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default = "default_separator")]
    pub separator: char,
    #[serde(default = "default_quote_char")]
    pub quote_char: Option<char>,
    #[serde(default)]
    pub comment_char: Option<char>,
    #[serde(default)]
    pub header_line: Option<String>,
    #[serde(default)]
    pub suppress_headers: bool,
    #[serde(default = "default_true")]
    pub trim_headers: bool,
    #[serde(default)]
    pub skip_leading_lines: usize,
    #[serde(default)]
    pub skip_leading_data_lines: usize,
    #[serde(default)]
    pub ignore_unparseable_lines: bool,
    #[serde(default)]
    pub defective_headers: bool,

    /// Positional list such as `"String,Integer,Date"`
    #[serde(default)]
    pub column_types: Option<String>,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default = "default_time_format")]
    pub time_format: String,
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,

    /// Ranges such as `"1-16,17-24,29"`; switches tables to fixed-width parsing
    #[serde(default)]
    pub fixed_widths: Option<String>,

    #[serde(default)]
    pub transposed_lines: usize,
    #[serde(default)]
    pub transposed_fields_to_skip: usize,

    /// Treat every file named `<table><tail><extension>` as part of the table
    #[serde(default)]
    pub indexed_files: bool,
    #[serde(default)]
    pub file_tail_pattern: Option<String>,
    #[serde(default)]
    pub file_tail_parts: Vec<String>,
    #[serde(default)]
    pub file_tail_prepend: bool,

    #[serde(default)]
    pub cipher: Option<CipherConfig>,
    /// Buffer every result so cursors can scroll
    #[serde(default)]
    pub scrollable: bool,

    #[serde(default)]
    pub tables: HashMap<String, TableConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CipherConfig {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableConfig {
    #[serde(default)]
    pub header_line: Option<String>,
    #[serde(default)]
    pub column_types: Option<String>,
}

fn default_path() -> PathBuf { PathBuf::from(".") }
fn default_extension() -> String { ".csv".to_string() }
fn default_separator() -> char { ',' }
fn default_quote_char() -> Option<char> { Some('"') }
fn default_true() -> bool { true }
fn default_date_format() -> String { crate::core::coercion::DEFAULT_DATE_FORMAT.to_string() }
fn default_time_format() -> String { crate::core::coercion::DEFAULT_TIME_FORMAT.to_string() }
fn default_timestamp_format() -> String {
    crate::core::coercion::DEFAULT_TIMESTAMP_FORMAT.to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new(default_path())
    }
}

impl ConnectionConfig {
    /// Defaults for tables under `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            extension: default_extension(),
            separator: default_separator(),
            quote_char: default_quote_char(),
            comment_char: None,
            header_line: None,
            suppress_headers: false,
            trim_headers: true,
            skip_leading_lines: 0,
            skip_leading_data_lines: 0,
            ignore_unparseable_lines: false,
            defective_headers: false,
            column_types: None,
            date_format: default_date_format(),
            time_format: default_time_format(),
            timestamp_format: default_timestamp_format(),
            fixed_widths: None,
            transposed_lines: 0,
            transposed_fields_to_skip: 0,
            indexed_files: false,
            file_tail_pattern: None,
            file_tail_parts: Vec::new(),
            file_tail_prepend: false,
            cipher: None,
            scrollable: false,
            tables: HashMap::new(),
        }
    }

    /// Load with priority: ENV (`FLATSQL_*`, `__` for nesting) > config file > defaults
    pub fn load(file: Option<&Path>) -> Result<Self, QueryError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(
            Environment::with_prefix("FLATSQL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|e| QueryError::InvalidConfiguration(e.to_string()))
    }

    /// Per-table overrides, table names compared case-insensitively
    pub fn table(&self, name: &str) -> Option<&TableConfig> {
        self.tables
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, table)| table)
    }

    pub fn header_line_for(&self, table: &str) -> Option<&str> {
        self.table(table)
            .and_then(|t| t.header_line.as_deref())
            .or(self.header_line.as_deref())
    }

    pub fn column_types_for(&self, table: &str) -> Option<&str> {
        self.table(table)
            .and_then(|t| t.column_types.as_deref())
            .or(self.column_types.as_deref())
    }

    pub fn coercer(&self) -> Coercer {
        Coercer {
            date_format: self.date_format.clone(),
            time_format: self.time_format.clone(),
            timestamp_format: self.timestamp_format.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ConnectionConfig::new("data");
        assert_eq!(config.path, PathBuf::from("data"));
        assert_eq!(config.extension, ".csv");
        assert_eq!(config.separator, ',');
        assert_eq!(config.quote_char, Some('"'));
        assert!(config.trim_headers);
        assert!(config.header_line_for("t").is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("flatsql.toml");
        fs::write(
            &file,
            r#"
path = "/srv/tables"
separator = ";"
suppress_headers = true
column_types = "Integer,String"

[cipher]
name = "XORCipher"
parameters = ["key"]

[tables.People]
header_line = "ID;NAME"
"#,
        )
        .unwrap();

        let config = ConnectionConfig::load(Some(&file)).unwrap();
        assert_eq!(config.path, PathBuf::from("/srv/tables"));
        assert_eq!(config.separator, ';');
        assert!(config.suppress_headers);
        assert_eq!(config.extension, ".csv");
        assert_eq!(config.cipher.as_ref().unwrap().parameters, vec!["key"]);
        assert_eq!(config.header_line_for("PEOPLE"), Some("ID;NAME"));
        assert_eq!(config.column_types_for("people"), Some("Integer,String"));
        assert_eq!(config.header_line_for("other"), None);
    }
}
