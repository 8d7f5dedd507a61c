use super::text::RecordSplitter;
use super::LineReader;
use crate::types::QueryError;

/// Separator/quote tokenizer. A field opening with the quote character is
/// quoted: a doubled quote inside stands for one quote, the closing quote must
/// be followed by the separator, and a line ending inside quotes continues on
/// the next physical line joined with `\n`.
#[derive(Debug, Clone)]
pub struct DelimitedSplitter {
    separator: char,
    quote: Option<char>,
}

impl DelimitedSplitter {
    pub const fn new(separator: char, quote: Option<char>) -> Self {
        Self { separator, quote }
    }

    pub fn tokenize(
        &self,
        line: &str,
        trim: bool,
        mut continuation: Option<&mut dyn LineReader>,
    ) -> Result<Vec<String>, QueryError> {
        let mut values = Vec::new();
        let mut value = String::new();
        let mut in_quotes = false;
        let mut chunk: Vec<char> = line.chars().collect();
        // Errors point into the whole record: its first physical line, then
        // a character offset counting earlier chunks
        let first_line = continuation.as_ref().map_or(1, |lines| lines.line_number().max(1));
        let mut offset = 0;

        loop {
            // A trailing separator flushes the last field
            chunk.push(self.separator);
            let mut pos = 0;
            while pos < chunk.len() {
                let c = chunk[pos];
                if Some(c) == self.quote {
                    if value.is_empty() && !in_quotes {
                        in_quotes = true;
                        pos += 1;
                        continue;
                    }
                    let next = chunk.get(pos + 1).copied();
                    if next == Some(c) {
                        value.push(c);
                        pos += 2;
                        continue;
                    }
                    if !in_quotes {
                        return Err(QueryError::MalformedQuote {
                            line: first_line,
                            position: offset + pos,
                            message: format!("unexpected '{c}'"),
                        });
                    }
                    if next != Some(self.separator) {
                        return Err(QueryError::MalformedQuote {
                            line: first_line,
                            position: offset + pos + 1,
                            message: format!("expecting '{}'", self.separator),
                        });
                    }
                    values.push(finish(&mut value, trim));
                    in_quotes = false;
                    pos += 2;
                    continue;
                }
                if c == self.separator && !in_quotes {
                    values.push(finish(&mut value, trim));
                } else {
                    value.push(c);
                }
                pos += 1;
            }

            if !in_quotes {
                return Ok(values);
            }

            // Drop the flushing separator picked up inside quotes, then join the next line
            value.pop();
            offset += chunk.len() - 1;
            let next_line = match continuation.as_mut() {
                Some(lines) => lines.read_continuation()?,
                None => None,
            };
            let Some(next_line) = next_line else {
                return Err(QueryError::UnterminatedQuote(line.to_string()));
            };
            chunk = std::iter::once('\n').chain(next_line.chars()).collect();
        }
    }
}

fn finish(value: &mut String, trim: bool) -> String {
    let field = std::mem::take(value);
    if trim { field.trim().to_string() } else { field }
}

impl RecordSplitter for DelimitedSplitter {
    fn split(
        &self,
        line: &str,
        lines: &mut dyn LineReader,
        trim: bool,
    ) -> Result<Vec<String>, QueryError> {
        self.tokenize(line, trim, Some(lines))
    }
}
