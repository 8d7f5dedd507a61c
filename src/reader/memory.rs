use super::RowSource;
use crate::types::QueryError;

/// Rows held in memory
pub struct MemorySource {
    columns: Vec<String>,
    rows: std::vec::IntoIter<Vec<String>>,
    current: Vec<String>,
}

impl MemorySource {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            columns,
            rows: rows.into_iter(),
            current: Vec::new(),
        }
    }

    /// One row without columns, the input of a SELECT without FROM
    pub fn single_empty_row() -> Self {
        Self::new(Vec::new(), vec![Vec::new()])
    }
}

impl RowSource for MemorySource {
    fn column_names(&self) -> &[String] {
        &self.columns
    }

    fn next_record(&mut self) -> Result<bool, QueryError> {
        match self.rows.next() {
            Some(row) => {
                self.current = row;
                Ok(true)
            }
            None => {
                self.current.clear();
                Ok(false)
            }
        }
    }

    fn field(&self, index: usize) -> Option<&str> {
        self.current.get(index).map(|f| f.trim())
    }

    fn field_count(&self) -> usize {
        self.current.len()
    }

    fn close(&mut self) {
        self.rows = Vec::new().into_iter();
    }
}
