use super::{synthesized_names, RowSource};
use crate::types::QueryError;

/// Melts a transposed layout into long rows.
///
/// The first `key_lines` records of the inner source are key rows; after
/// dropping `fields_to_skip` leading fields each holds one value per key
/// column. Every later record holds the regular fields followed by one value
/// per key column, and yields one output row per key column:
/// `(key_1[j], .., key_n[j], regular.., value[j])`.
pub struct TransposedSource {
    inner: Box<dyn RowSource>,
    columns: Vec<String>,
    keys: Vec<Vec<String>>,
    key_columns: usize,
    regular_count: usize,
    data: Vec<String>,
    // Key column to emit next for the current data record
    position: usize,
    current: Vec<String>,
}

impl TransposedSource {
    pub fn new(
        mut inner: Box<dyn RowSource>,
        key_lines: usize,
        fields_to_skip: usize,
        header: Option<Vec<String>>,
    ) -> Result<Self, QueryError> {
        let mut keys = Vec::with_capacity(key_lines);
        for found in 0..key_lines {
            if !inner.next_record()? {
                inner.close();
                return Err(QueryError::TruncatedBlock {
                    expected: key_lines,
                    found,
                });
            }
            keys.push(raw_fields(inner.as_ref(), fields_to_skip));
        }
        let key_columns = keys.first().map_or(0, Vec::len);

        let mut source = Self {
            inner,
            columns: Vec::new(),
            keys,
            key_columns,
            regular_count: 0,
            data: Vec::new(),
            position: key_columns,
            current: Vec::new(),
        };

        match header {
            Some(header) => {
                if header.len() < key_lines + 1 {
                    source.inner.close();
                    return Err(QueryError::InvalidConfiguration(format!(
                        "transposed header needs {} key columns and a value column, got {}",
                        key_lines,
                        header.len()
                    )));
                }
                source.regular_count = header.len() - key_lines - 1;
                source.columns = header;
            }
            None => {
                // Regular field count comes from the first data record
                let width = if source.load_data()? { source.data.len() } else { key_columns };
                source.regular_count = width.saturating_sub(key_columns);
                source.columns = synthesized_names(key_lines + source.regular_count + 1);
            }
        }
        Ok(source)
    }

    fn load_data(&mut self) -> Result<bool, QueryError> {
        if !self.inner.next_record()? {
            self.data.clear();
            return Ok(false);
        }
        self.data = raw_fields(self.inner.as_ref(), 0);
        self.position = 0;
        Ok(true)
    }
}

fn raw_fields(source: &dyn RowSource, skip: usize) -> Vec<String> {
    (skip..source.field_count())
        .map(|i| source.field(i).unwrap_or_default().to_string())
        .collect()
}

impl RowSource for TransposedSource {
    fn column_names(&self) -> &[String] {
        &self.columns
    }

    fn next_record(&mut self) -> Result<bool, QueryError> {
        if self.key_columns == 0 {
            return Ok(false);
        }
        if self.position >= self.key_columns && !self.load_data()? {
            self.current.clear();
            return Ok(false);
        }

        let j = self.position;
        let mut row = Vec::with_capacity(self.columns.len());
        for key in &self.keys {
            row.push(key.get(j).cloned().unwrap_or_default());
        }
        for i in 0..self.regular_count {
            row.push(self.data.get(i).cloned().unwrap_or_default());
        }
        row.push(
            self.data
                .get(self.regular_count + j)
                .cloned()
                .unwrap_or_default(),
        );
        self.current = row;
        self.position += 1;
        Ok(true)
    }

    fn field(&self, index: usize) -> Option<&str> {
        self.current.get(index).map(String::as_str)
    }

    fn field_count(&self) -> usize {
        self.current.len()
    }

    fn close(&mut self) {
        self.inner.close();
    }
}
