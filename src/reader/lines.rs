use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use tracing::debug;

use super::{closed_stream_error, LineReader};
use crate::crypto::{CryptoFilter, DecryptingReader};
use crate::types::QueryError;

/// Line reader over any byte stream; invalid UTF-8 is replaced, `\n` and
/// `\r\n` terminators are stripped
pub struct StreamLineReader {
    input: Option<BufReader<Box<dyn Read>>>,
    buffer: Vec<u8>,
    line_number: usize,
}

impl StreamLineReader {
    pub fn new<R: Read + 'static>(input: R) -> Self {
        let input: Box<dyn Read> = Box::new(input);
        Self {
            input: Some(BufReader::new(input)),
            buffer: Vec::new(),
            line_number: 0,
        }
    }

    /// Open a file, decrypting it through `filter` when one is given
    pub fn open(path: &Path, filter: Option<Box<dyn CryptoFilter>>) -> Result<Self, QueryError> {
        let file = File::open(path)?;
        debug!(path = %path.display(), encrypted = filter.is_some(), "opened table file");
        Ok(match filter {
            Some(filter) => Self::new(DecryptingReader::new(file, filter)),
            None => Self::new(file),
        })
    }
}

impl LineReader for StreamLineReader {
    fn read_line(&mut self) -> Result<Option<String>, QueryError> {
        let input = self.input.as_mut().ok_or_else(closed_stream_error)?;
        self.buffer.clear();
        if input.read_until(b'\n', &mut self.buffer)? == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        if self.buffer.last() == Some(&b'\n') {
            self.buffer.pop();
            if self.buffer.last() == Some(&b'\r') {
                self.buffer.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&self.buffer).into_owned()))
    }

    fn line_number(&self) -> usize {
        self.line_number
    }

    fn close(&mut self) {
        self.input = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_line_terminators() {
        let mut reader = StreamLineReader::new(Cursor::new("a,b\r\nc,d\ne"));
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("a,b"));
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("c,d"));
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("e"));
        assert_eq!(reader.line_number(), 3);
        assert_eq!(reader.read_line().unwrap(), None);
        assert_eq!(reader.line_number(), 3);
    }

    #[test]
    fn test_read_after_close_fails() {
        let mut reader = StreamLineReader::new(Cursor::new("a\nb\n"));
        reader.read_line().unwrap();
        reader.close();
        reader.close();
        assert!(matches!(reader.read_line(), Err(QueryError::Io(_))));
    }
}
