use std::collections::HashSet;

use tracing::debug;

use super::delimited::DelimitedSplitter;
use super::{synthesized_names, LineReader, RowSource};
use crate::types::QueryError;

/// Turns one logical line into raw fields, pulling continuation lines when needed
pub trait RecordSplitter {
    fn split(
        &self,
        line: &str,
        lines: &mut dyn LineReader,
        trim: bool,
    ) -> Result<Vec<String>, QueryError>;
}

#[derive(Debug, Clone)]
pub struct TextOptions {
    pub separator: char,
    pub quote_char: Option<char>,
    pub comment_char: Option<char>,
    /// Column names given in configuration, split with `separator`
    pub header_line: Option<String>,
    pub suppress_headers: bool,
    pub trim_headers: bool,
    pub skip_leading_lines: usize,
    pub skip_leading_data_lines: usize,
    pub ignore_unparseable_lines: bool,
    pub defective_headers: bool,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            separator: ',',
            quote_char: Some('"'),
            comment_char: None,
            header_line: None,
            suppress_headers: false,
            trim_headers: true,
            skip_leading_lines: 0,
            skip_leading_data_lines: 0,
            ignore_unparseable_lines: false,
            defective_headers: false,
        }
    }
}

/// Row source over delimited or fixed-width text
pub struct TextSource {
    lines: Box<dyn LineReader>,
    splitter: Box<dyn RecordSplitter>,
    options: TextOptions,
    columns: Vec<String>,
    // Known once the header has been settled; drives unparseable-line skipping
    columns_known: bool,
    fields: Vec<String>,
    // First data line read ahead to synthesize column names
    pending: Option<Vec<String>>,
    comments_active: bool,
    exhausted: bool,
}

impl TextSource {
    pub fn new(
        lines: Box<dyn LineReader>,
        splitter: Box<dyn RecordSplitter>,
        options: TextOptions,
    ) -> Result<Self, QueryError> {
        let comments_active = options.comment_char.is_some();
        let mut source = Self {
            lines,
            splitter,
            options,
            columns: Vec::new(),
            columns_known: false,
            fields: Vec::new(),
            pending: None,
            comments_active,
            exhausted: false,
        };
        source.read_header()?;
        Ok(source)
    }

    fn read_header(&mut self) -> Result<(), QueryError> {
        for _ in 0..self.options.skip_leading_lines {
            if self.lines.read_line()?.is_none() {
                break;
            }
        }

        let trim = self.options.trim_headers;
        let configured = self.options.header_line.as_deref().map(|header| {
            DelimitedSplitter::new(self.options.separator, self.options.quote_char)
                .tokenize(header, trim, None)
        });

        let mut columns = if self.options.suppress_headers {
            match configured {
                Some(columns) => {
                    self.skip_data_lines()?;
                    columns?
                }
                None => {
                    self.skip_data_lines()?;
                    let first = self.next_data_record(false)?;
                    let count = first.as_ref().map_or(0, Vec::len);
                    self.pending = first;
                    synthesized_names(count)
                }
            }
        } else {
            // A configured header replaces the file's own header line
            let header = self.next_data_record(trim)?.unwrap_or_default();
            self.skip_data_lines()?;
            match configured {
                Some(columns) => columns?,
                None => header,
            }
        };

        if self.options.defective_headers {
            for (i, name) in columns.iter_mut().enumerate() {
                if name.is_empty() {
                    *name = format!("COLUMN{}", i + 1);
                }
            }
        }

        let mut seen = HashSet::new();
        for name in &columns {
            if !seen.insert(name.to_uppercase()) {
                return Err(QueryError::DuplicateColumn(name.clone()));
            }
        }

        debug!(columns = ?columns, "text source header settled");
        self.columns = columns;
        self.columns_known = true;
        Ok(())
    }

    fn skip_data_lines(&mut self) -> Result<(), QueryError> {
        for _ in 0..self.options.skip_leading_data_lines {
            if self.lines.read_line()?.is_none() {
                break;
            }
        }
        Ok(())
    }

    /// Next logical line split into fields, honouring the comment preamble
    /// and unparseable-line skipping
    fn next_data_record(&mut self, trim: bool) -> Result<Option<Vec<String>>, QueryError> {
        loop {
            let Some(line) = self.lines.read_line()? else {
                return Ok(None);
            };

            if self.comments_active {
                if let Some(comment) = self.options.comment_char {
                    if line.is_empty() || line.starts_with(comment) {
                        continue;
                    }
                }
                self.comments_active = false;
            }

            let fields = self.splitter.split(&line, self.lines.as_mut(), trim);
            if !self.options.ignore_unparseable_lines {
                return fields.map(Some);
            }

            match fields {
                Ok(fields) => {
                    let parseable = if self.columns_known {
                        fields.len() == self.columns.len()
                    } else {
                        fields.len() != 1
                    };
                    if parseable {
                        return Ok(Some(fields));
                    }
                    debug!(line = %line, "skipping line with unexpected field count");
                }
                Err(e) if e.is_tokenizer_error() => {
                    debug!(line = %line, error = %e, "skipping unparseable line");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl RowSource for TextSource {
    fn column_names(&self) -> &[String] {
        &self.columns
    }

    fn next_record(&mut self) -> Result<bool, QueryError> {
        if self.exhausted {
            return Ok(false);
        }
        let record = match self.pending.take() {
            Some(record) => Some(record),
            None => self.next_data_record(false)?,
        };
        match record {
            Some(fields) => {
                self.fields = fields;
                Ok(true)
            }
            None => {
                self.exhausted = true;
                self.fields.clear();
                Ok(false)
            }
        }
    }

    fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(|f| f.trim())
    }

    fn field_count(&self) -> usize {
        self.fields.len()
    }

    fn close(&mut self) {
        self.exhausted = true;
        self.lines.close();
    }
}
