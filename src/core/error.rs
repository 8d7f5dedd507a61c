use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),
    /// `line` is the record's first physical line (1-based), `position` a
    /// character offset into the whole record, continuation lines included
    #[error("Malformed quote at line {line}, position {position}: {message}")]
    MalformedQuote {
        line: usize,
        position: usize,
        message: String,
    },
    #[error("EOF reached inside quoted mode. Line: {0}")]
    UnterminatedQuote(String),
    #[error("Table contains duplicated column name '{0}'")]
    DuplicateColumn(String),
    #[error("Truncated transposed block: expected {expected} key lines, found {found}")]
    TruncatedBlock { expected: usize, found: usize },
    #[error("Could not find codec class {0}")]
    UnknownCipher(String),
    #[error("Type error: {0}")]
    Type(String),
    #[error("Column '{0}' not found")]
    UnknownColumn(String),
    #[error("Table '{0}' not found")]
    TableNotFound(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("No current row")]
    NoCurrentRow,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl QueryError {
    /// Tokenizer failures that `ignore_unparseable_lines` turns into skips
    pub const fn is_tokenizer_error(&self) -> bool {
        matches!(self, Self::MalformedQuote { .. } | Self::UnterminatedQuote(_))
    }
}
