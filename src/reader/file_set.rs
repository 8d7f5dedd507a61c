use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use regex::Regex;
use tracing::debug;

use super::{closed_stream_error, LineReader, RowSource, StreamLineReader};
use crate::crypto::Cipher;
use crate::types::QueryError;

#[derive(Debug, Clone)]
pub struct FileSetOptions {
    pub directory: PathBuf,
    /// Regular expression matched against whole file names; its capture
    /// groups become extra columns
    pub pattern: String,
    pub comment_char: Option<char>,
    pub suppress_headers: bool,
    /// Lines dropped from the top of every file after the first, before any
    /// comment preamble or header
    pub skip_leading_lines: usize,
    /// Lines dropped from every file after the first, past its header
    pub lines_to_skip: usize,
    pub cipher: Option<Cipher>,
}

/// Capture values of the file a [`FileSetLineReader`] is reading from
#[derive(Debug, Clone, Default)]
pub struct FileTail(Rc<RefCell<Vec<String>>>);

impl FileTail {
    fn set(&self, values: Vec<String>) {
        *self.0.borrow_mut() = values;
    }

    pub fn values(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

/// One line stream over every file of a directory matching a name pattern,
/// in file name order. Later files lose their preamble and header, so the
/// stream reads like a single file.
pub struct FileSetLineReader {
    options: FileSetOptions,
    files: VecDeque<(PathBuf, Vec<String>)>,
    current: Option<StreamLineReader>,
    // First line of a later file, read while skipping its comment preamble
    pending: Option<String>,
    tail: FileTail,
    opened_any: bool,
    closed: bool,
}

impl FileSetLineReader {
    pub fn new(options: FileSetOptions) -> Result<Self, QueryError> {
        let pattern = Regex::new(&format!("^(?:{})$", options.pattern)).map_err(|e| {
            QueryError::InvalidConfiguration(format!("invalid file name pattern: {e}"))
        })?;

        let mut files = Vec::new();
        for entry in fs::read_dir(&options.directory)? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if let Some(caps) = pattern.captures(&name) {
                let values = (1..caps.len())
                    .map(|i| caps.get(i).map_or("", |m| m.as_str()).to_string())
                    .collect();
                files.push((entry.path(), values));
            }
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));
        debug!(
            directory = %options.directory.display(),
            pattern = %options.pattern,
            files = files.len(),
            "indexed file set"
        );

        Ok(Self {
            options,
            files: files.into(),
            current: None,
            pending: None,
            tail: FileTail::default(),
            opened_any: false,
            closed: false,
        })
    }

    /// Matching files not yet exhausted
    pub fn file_count(&self) -> usize {
        self.files.len() + usize::from(self.current.is_some())
    }

    /// Handle on the capture values of the file currently read
    pub fn tail(&self) -> FileTail {
        self.tail.clone()
    }

    fn open_next(&mut self) -> Result<bool, QueryError> {
        let Some((path, values)) = self.files.pop_front() else {
            return Ok(false);
        };
        let filter = match &self.options.cipher {
            Some(cipher) => Some(cipher.new_filter()?),
            None => None,
        };
        let mut reader = StreamLineReader::open(&path, filter)?;
        if self.opened_any {
            self.pending = self.skip_preamble(&mut reader)?;
        }

        debug!(file = %path.display(), values = ?values, "switched to next file in set");
        self.tail.set(values);
        self.opened_any = true;
        self.current = Some(reader);
        Ok(true)
    }

    /// Drop what the text source already consumed from the first file:
    /// leading lines, the comment preamble, the header and skipped data lines.
    /// Returns a data line read ahead while looking for the end of the preamble.
    fn skip_preamble(&self, reader: &mut StreamLineReader) -> Result<Option<String>, QueryError> {
        for _ in 0..self.options.skip_leading_lines {
            if reader.read_line()?.is_none() {
                return Ok(None);
            }
        }

        if !self.options.suppress_headers {
            // The first line past the comments is this file's header
            if self.next_uncommented(reader)?.is_none() {
                return Ok(None);
            }
        }
        for _ in 0..self.options.lines_to_skip {
            if reader.read_line()?.is_none() {
                return Ok(None);
            }
        }
        if self.options.suppress_headers {
            return self.next_uncommented(reader);
        }
        Ok(None)
    }

    fn next_uncommented(&self, reader: &mut StreamLineReader) -> Result<Option<String>, QueryError> {
        loop {
            let Some(line) = reader.read_line()? else {
                return Ok(None);
            };
            match self.options.comment_char {
                Some(comment) if line.is_empty() || line.starts_with(comment) => {}
                _ => return Ok(Some(line)),
            }
        }
    }
}

impl LineReader for FileSetLineReader {
    fn read_line(&mut self) -> Result<Option<String>, QueryError> {
        if self.closed {
            return Err(closed_stream_error());
        }
        loop {
            if self.current.is_none() && !self.open_next()? {
                return Ok(None);
            }
            if let Some(line) = self.pending.take() {
                return Ok(Some(line));
            }
            let Some(reader) = self.current.as_mut() else {
                return Ok(None);
            };
            match reader.read_line()? {
                Some(line) => return Ok(Some(line)),
                // Exhausted files are dropped, closing their handle
                None => self.current = None,
            }
        }
    }

    fn read_continuation(&mut self) -> Result<Option<String>, QueryError> {
        if self.closed {
            return Err(closed_stream_error());
        }
        match self.current.as_mut() {
            Some(reader) => reader.read_line(),
            None => Ok(None),
        }
    }

    fn line_number(&self) -> usize {
        self.current.as_ref().map_or(0, |reader| reader.line_number())
    }

    fn close(&mut self) {
        self.current = None;
        self.pending = None;
        self.files.clear();
        self.closed = true;
    }
}

/// Adds the file name capture values of an indexed file set to every record
/// of the wrapped source, before or after its own fields
pub struct FileSetSource {
    inner: Box<dyn RowSource>,
    tail: FileTail,
    columns: Vec<String>,
    prepend: bool,
    values: Vec<String>,
}

impl FileSetSource {
    pub fn new(
        inner: Box<dyn RowSource>,
        tail: FileTail,
        group_names: &[String],
        prepend: bool,
    ) -> Self {
        let own = inner.column_names().iter().cloned();
        let columns = if prepend {
            group_names.iter().cloned().chain(own).collect()
        } else {
            own.chain(group_names.iter().cloned()).collect()
        };
        Self {
            inner,
            tail,
            columns,
            prepend,
            values: Vec::new(),
        }
    }
}

impl FileSetSource {
    // Short records keep the values under their own columns; wide ones
    // (transposed value rows) carry them past the last field
    fn own_width(&self) -> usize {
        self.inner
            .field_count()
            .max(self.inner.column_names().len())
    }
}

impl RowSource for FileSetSource {
    fn column_names(&self) -> &[String] {
        &self.columns
    }

    fn next_record(&mut self) -> Result<bool, QueryError> {
        if !self.inner.next_record()? {
            self.values.clear();
            return Ok(false);
        }
        // A record never spans files, so the tail now names its file
        self.values = self.tail.values();
        Ok(true)
    }

    fn field(&self, index: usize) -> Option<&str> {
        let own = self.own_width();
        if self.prepend {
            match index.checked_sub(self.values.len()) {
                Some(i) => self.inner.field(i),
                None => self.values.get(index).map(String::as_str),
            }
        } else if index < own {
            self.inner.field(index)
        } else {
            self.values.get(index - own).map(String::as_str)
        }
    }

    fn field_count(&self) -> usize {
        self.own_width() + self.values.len()
    }

    fn close(&mut self) {
        self.inner.close();
    }
}
