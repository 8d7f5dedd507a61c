/// Row sources - pull-based readers turning file encodings into raw records
///
/// Structure:
/// - lines: physical line reading over any byte stream
/// - delimited: quote-aware separator tokenizing, multi-line quoted fields
/// - fixed_width: column slicing by character ranges
/// - text: header discovery and data-line selection shared by both text formats
/// - transposed: melting key blocks against wide value rows
/// - file_set: many files read as one line stream, file name parts added per record
/// - memory: rows held in memory (queries without FROM, custom tables)
mod lines;
mod delimited;
mod fixed_width;
mod text;
mod transposed;
mod file_set;
mod memory;

pub use lines::StreamLineReader;
pub use delimited::DelimitedSplitter;
pub use fixed_width::FixedWidthSplitter;
pub use text::{RecordSplitter, TextOptions, TextSource};
pub use transposed::TransposedSource;
pub use file_set::{FileSetLineReader, FileSetOptions, FileSetSource, FileTail};
pub use memory::MemorySource;

use crate::types::QueryError;

/// Uniform access to records of a table, whatever the file encoding
pub trait RowSource {
    /// Column names, fixed once the source is constructed
    fn column_names(&self) -> &[String];

    /// Advance to the next record; false once exhausted
    fn next_record(&mut self) -> Result<bool, QueryError>;

    /// Field of the current record, trimmed; `None` past the end of a short record
    fn field(&self, index: usize) -> Option<&str>;

    /// Number of raw fields in the current record
    fn field_count(&self) -> usize;

    /// Release the underlying stream. Safe to call more than once.
    fn close(&mut self);
}

/// Physical lines of some byte stream, terminators stripped
pub trait LineReader {
    fn read_line(&mut self) -> Result<Option<String>, QueryError>;

    /// Next line of a record already in progress. Readers spanning several
    /// files never cross into the next file here.
    fn read_continuation(&mut self) -> Result<Option<String>, QueryError> {
        self.read_line()
    }

    /// Physical lines returned so far from the current file
    fn line_number(&self) -> usize;

    fn close(&mut self);
}

pub(crate) fn closed_stream_error() -> QueryError {
    QueryError::Io(std::io::Error::other("stream closed"))
}

pub(crate) fn synthesized_names(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("COLUMN{i}")).collect()
}
