/// Connection - table resolution and query entry points
///
/// A connection owns validated configuration only; every query opens its own
/// row source, so cursors from the same connection never share file handles
/// or cipher state.
mod config;

pub use self::config::{CipherConfig, ConnectionConfig, TableConfig};

use std::io::Read;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::crypto::{Cipher, CipherRegistry, DecryptingReader};
use crate::executor::{Cursor, ExecutionOptions, QueryExecutor};
use crate::parser::parse_statement;
use crate::reader::{
    DelimitedSplitter, FileSetLineReader, FileSetOptions, FileSetSource, FileTail,
    FixedWidthSplitter, LineReader, MemorySource, RecordSplitter, RowSource, StreamLineReader,
    TextOptions, TextSource, TransposedSource,
};
use crate::types::{DataType, QueryError};

/// Caller-supplied table storage: maps a table name to its raw bytes
pub trait TableReader {
    fn reader(&self, table: &str) -> Result<Box<dyn Read>, QueryError>;
}

pub struct Connection {
    config: ConnectionConfig,
    cipher: Option<Cipher>,
    fixed_widths: Option<FixedWidthSplitter>,
    table_reader: Option<Box<dyn TableReader>>,
}

impl Connection {
    pub fn open(config: ConnectionConfig) -> Result<Self, QueryError> {
        Self::open_with_registry(config, &CipherRegistry::default())
    }

    /// Validate the configuration up front: fixed-width ranges, declared
    /// types and the cipher all fail here rather than at first read
    pub fn open_with_registry(
        config: ConnectionConfig,
        registry: &CipherRegistry,
    ) -> Result<Self, QueryError> {
        let fixed_widths = config
            .fixed_widths
            .as_deref()
            .map(FixedWidthSplitter::parse)
            .transpose()?;

        if let Some(types) = &config.column_types {
            DataType::parse_list(types)?;
        }
        for table in config.tables.values() {
            if let Some(types) = &table.column_types {
                DataType::parse_list(types)?;
            }
        }

        let cipher = config
            .cipher
            .as_ref()
            .map(|c| registry.resolve(&c.name, &c.parameters))
            .transpose()?;

        info!(
            path = %config.path.display(),
            fixed_width = fixed_widths.is_some(),
            indexed = config.indexed_files,
            cipher = cipher.as_ref().map(Cipher::name),
            "connection opened"
        );

        Ok(Self {
            config,
            cipher,
            fixed_widths,
            table_reader: None,
        })
    }

    /// Read tables through `reader` instead of the file system
    pub fn with_table_reader(mut self, reader: Box<dyn TableReader>) -> Self {
        self.table_reader = Some(reader);
        self
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Run a query; the cursor streams whenever the statement allows it
    pub fn execute_query(&self, sql: &str) -> Result<Cursor, QueryError> {
        self.run(sql, self.config.scrollable)
    }

    /// Run a query into a fully buffered, scrollable cursor
    pub fn execute_scrollable_query(&self, sql: &str) -> Result<Cursor, QueryError> {
        self.run(sql, true)
    }

    fn run(&self, sql: &str, scrollable: bool) -> Result<Cursor, QueryError> {
        let statement = parse_statement(sql)?;
        debug!(sql = %sql, "executing query");

        let (source, column_types): (Box<dyn RowSource>, _) = match &statement.from {
            Some(table) => {
                let types = self
                    .config
                    .column_types_for(&table.name)
                    .map(DataType::parse_list)
                    .transpose()?
                    .unwrap_or_default();
                (self.open_table(&table.name)?, types)
            }
            None => (Box::new(MemorySource::single_empty_row()), Vec::new()),
        };

        let options = ExecutionOptions {
            column_types,
            coercer: self.config.coercer(),
            scrollable,
        };
        QueryExecutor::execute(statement, source, &options)
    }

    /// Build the row source for `table` from the connection settings
    pub fn open_table(&self, table: &str) -> Result<Box<dyn RowSource>, QueryError> {
        let config = &self.config;
        let (lines, tail) = self.open_lines(table)?;

        let splitter: Box<dyn RecordSplitter> = match &self.fixed_widths {
            Some(widths) => Box::new(widths.clone()),
            None => Box::new(DelimitedSplitter::new(config.separator, config.quote_char)),
        };

        let transposed = config.transposed_lines > 0;
        let header_line = config.header_line_for(table).map(str::to_string);
        let options = TextOptions {
            separator: config.separator,
            quote_char: config.quote_char,
            comment_char: config.comment_char,
            // A transposed table's header describes the melted rows, not the file
            header_line: if transposed { None } else { header_line.clone() },
            suppress_headers: config.suppress_headers,
            trim_headers: config.trim_headers,
            skip_leading_lines: config.skip_leading_lines,
            skip_leading_data_lines: config.skip_leading_data_lines,
            ignore_unparseable_lines: config.ignore_unparseable_lines && !transposed,
            defective_headers: config.defective_headers,
        };
        let text = Box::new(TextSource::new(lines, splitter, options)?);
        debug!(table, transposed, "opened table");

        // File name values are ordinary fields by the time rows are melted
        let source: Box<dyn RowSource> = match tail {
            Some(tail) => Box::new(FileSetSource::new(
                text,
                tail,
                &config.file_tail_parts,
                config.file_tail_prepend,
            )),
            None => text,
        };
        if !transposed {
            return Ok(source);
        }
        let header = header_line
            .map(|line| {
                DelimitedSplitter::new(config.separator, config.quote_char).tokenize(
                    &line,
                    config.trim_headers,
                    None,
                )
            })
            .transpose()?;
        Ok(Box::new(TransposedSource::new(
            source,
            config.transposed_lines,
            config.transposed_fields_to_skip,
            header,
        )?))
    }

    /// Line stream of `table`, with the file name values of an indexed set
    fn open_lines(
        &self,
        table: &str,
    ) -> Result<(Box<dyn LineReader>, Option<FileTail>), QueryError> {
        let config = &self.config;

        if let Some(reader) = &self.table_reader {
            let input = reader.reader(table)?;
            let lines = match &self.cipher {
                Some(cipher) => StreamLineReader::new(DecryptingReader::new(
                    input,
                    cipher.new_filter()?,
                )),
                None => StreamLineReader::new(input),
            };
            return Ok((Box::new(lines), None));
        }

        let path = config.path.join(table);
        if config.indexed_files {
            let directory = path
                .parent()
                .map_or_else(|| config.path.clone(), PathBuf::from);
            let base = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let pattern = format!(
                "{}{}{}",
                regex::escape(&base),
                config.file_tail_pattern.as_deref().unwrap_or(""),
                regex::escape(&config.extension)
            );
            let reader = FileSetLineReader::new(FileSetOptions {
                directory,
                pattern,
                comment_char: config.comment_char,
                suppress_headers: config.suppress_headers,
                skip_leading_lines: config.skip_leading_lines,
                lines_to_skip: config.skip_leading_data_lines + config.transposed_lines,
                cipher: self.cipher.clone(),
            })
            .map_err(|e| match e {
                QueryError::Io(_) => QueryError::TableNotFound(table.to_string()),
                other => other,
            })?;
            if reader.file_count() == 0 {
                return Err(QueryError::TableNotFound(table.to_string()));
            }
            let tail = reader.tail();
            return Ok((Box::new(reader), Some(tail)));
        }

        let file = PathBuf::from(format!("{}{}", path.display(), config.extension));
        if !file.is_file() {
            return Err(QueryError::TableNotFound(table.to_string()));
        }
        let filter = self.cipher.as_ref().map(Cipher::new_filter).transpose()?;
        Ok((Box::new(StreamLineReader::open(&file, filter)?), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;
    use std::collections::HashMap;
    use std::fs;
    use std::io::Cursor as IoCursor;
    use tempfile::TempDir;

    fn connection(dir: &TempDir) -> Connection {
        Connection::open(ConnectionConfig::new(dir.path())).unwrap()
    }

    #[test]
    fn test_missing_table() {
        let dir = TempDir::new().unwrap();
        let conn = connection(&dir);
        assert!(matches!(
            conn.execute_query("SELECT * FROM nothing"),
            Err(QueryError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_select_without_from() {
        let dir = TempDir::new().unwrap();
        let conn = connection(&dir);
        let mut cursor = conn.execute_query("SELECT 1 AS one, 'x' AS two").unwrap();
        assert_eq!(cursor.column_names(), ["one", "two"]);
        assert_eq!(
            cursor.fetch_all().unwrap(),
            vec![vec![Value::Integer(1), Value::Text("x".to_string())]]
        );
    }

    #[test]
    fn test_invalid_settings_fail_at_open() {
        let mut config = ConnectionConfig::new(".");
        config.fixed_widths = Some("3-1".to_string());
        assert!(matches!(
            Connection::open(config),
            Err(QueryError::InvalidConfiguration(_))
        ));

        let mut config = ConnectionConfig::new(".");
        config.column_types = Some("Integer,Decimal".to_string());
        assert!(Connection::open(config).is_err());

        let mut config = ConnectionConfig::new(".");
        config.cipher = Some(CipherConfig {
            name: "RotCipher".to_string(),
            parameters: Vec::new(),
        });
        assert!(matches!(
            Connection::open(config),
            Err(QueryError::UnknownCipher(_))
        ));
    }

    struct InMemoryTables(HashMap<String, String>);

    impl TableReader for InMemoryTables {
        fn reader(&self, table: &str) -> Result<Box<dyn Read>, QueryError> {
            self.0
                .get(table)
                .map(|text| Box::new(IoCursor::new(text.clone())) as Box<dyn Read>)
                .ok_or_else(|| QueryError::TableNotFound(table.to_string()))
        }
    }

    #[test]
    fn test_table_reader() {
        let tables = HashMap::from([("people".to_string(), "id,name\n1,uno\n2,due\n".to_string())]);
        let conn = Connection::open(ConnectionConfig::new("."))
            .unwrap()
            .with_table_reader(Box::new(InMemoryTables(tables)));

        let mut cursor = conn.execute_query("SELECT name FROM people WHERE id = 2").unwrap();
        assert!(cursor.next().unwrap());
        assert_eq!(cursor.get_string("NAME").unwrap().as_deref(), Some("due"));
        assert!(!cursor.next().unwrap());

        assert!(matches!(
            conn.execute_query("SELECT * FROM other"),
            Err(QueryError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_per_table_header() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("raw.csv"), "1,uno\n2,due\n").unwrap();
        let mut config = ConnectionConfig::new(dir.path());
        config.suppress_headers = true;
        config.tables.insert(
            "RAW".to_string(),
            TableConfig {
                header_line: Some("ID,NAME".to_string()),
                column_types: Some("Integer,String".to_string()),
            },
        );
        let conn = Connection::open(config).unwrap();
        let mut cursor = conn.execute_query("SELECT id FROM raw ORDER BY id DESC").unwrap();
        assert_eq!(
            cursor.fetch_all().unwrap(),
            vec![vec![Value::Integer(2)], vec![Value::Integer(1)]]
        );
    }
}
