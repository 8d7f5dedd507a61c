use super::text::RecordSplitter;
use super::LineReader;
use crate::types::QueryError;

/// Slices each physical line by 1-based inclusive character ranges, kept in
/// declaration order; ranges past the end of a line read as empty
#[derive(Debug, Clone)]
pub struct FixedWidthSplitter {
    ranges: Vec<(usize, usize)>,
}

impl FixedWidthSplitter {
    pub const fn new(ranges: Vec<(usize, usize)>) -> Self {
        Self { ranges }
    }

    /// Parse `"1-16,17-24,29"`; a lone number is a one-character column
    pub fn parse(list: &str) -> Result<Self, QueryError> {
        let invalid = |part: &str| {
            QueryError::InvalidConfiguration(format!("invalid fixed width range '{part}'"))
        };
        let mut ranges = Vec::new();
        for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (start, end) = match part.split_once('-') {
                Some((start, end)) => (start.trim(), end.trim()),
                None => (part, part),
            };
            let start: usize = start.parse().map_err(|_| invalid(part))?;
            let end: usize = end.parse().map_err(|_| invalid(part))?;
            if start == 0 || end < start {
                return Err(invalid(part));
            }
            ranges.push((start, end));
        }
        if ranges.is_empty() {
            return Err(invalid(list));
        }
        Ok(Self::new(ranges))
    }

    pub fn slice(&self, line: &str, trim: bool) -> Vec<String> {
        let chars: Vec<char> = line.chars().collect();
        self.ranges
            .iter()
            .map(|&(start, end)| {
                let from = (start - 1).min(chars.len());
                let to = end.min(chars.len());
                let field: String = chars[from..to].iter().collect();
                if trim { field.trim().to_string() } else { field }
            })
            .collect()
    }
}

impl RecordSplitter for FixedWidthSplitter {
    fn split(
        &self,
        line: &str,
        _lines: &mut dyn LineReader,
        trim: bool,
    ) -> Result<Vec<String>, QueryError> {
        Ok(self.slice(line, trim))
    }
}
