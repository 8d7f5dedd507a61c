use std::collections::HashMap;
use std::rc::Rc;

use super::value::Value;

/// Ordered column names with case-insensitive lookup
#[derive(Debug, Clone, Default)]
pub struct ColumnSet {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl ColumnSet {
    pub fn new(names: Vec<String>) -> Self {
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            // First occurrence wins for duplicated output names
            index.entry(name.to_uppercase()).or_insert(i);
        }
        Self { names, index }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(&name.to_uppercase()).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A typed record pulled from a row source
#[derive(Debug, Clone)]
pub struct Row {
    pub columns: Rc<ColumnSet>,
    pub values: Vec<Value>,
}

impl Row {
    pub const fn new(columns: Rc<ColumnSet>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .position(name)
            .and_then(|idx| self.values.get(idx))
    }
}
