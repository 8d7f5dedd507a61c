/// Result cursor over a query
///
/// A streaming cursor pulls rows from its source on demand and moves forward
/// only. A buffered cursor holds the whole result and can be positioned
/// anywhere, JDBC style: position 0 is before the first row, `len + 1` after
/// the last.
use std::collections::HashSet;
use std::rc::Rc;

use super::queries::{row_key, ScanPlan};
use crate::reader::RowSource;
use crate::types::{ColumnSet, QueryError, Value, ValueKey};

pub struct StreamingScan {
    source: Box<dyn RowSource>,
    plan: ScanPlan,
    seen: Option<HashSet<Vec<ValueKey>>>,
    to_skip: usize,
    remaining: Option<usize>,
    current: Option<Vec<Value>>,
    finished: bool,
}

impl StreamingScan {
    pub fn new(source: Box<dyn RowSource>, plan: ScanPlan) -> Self {
        let (offset, limit) = plan.window();
        let seen = plan.distinct().then(HashSet::new);
        Self {
            source,
            plan,
            seen,
            to_skip: offset.unwrap_or(0),
            remaining: limit,
            current: None,
            finished: false,
        }
    }

    fn advance(&mut self) -> Result<bool, QueryError> {
        if self.finished {
            return Ok(false);
        }
        match self.pull() {
            Ok(Some(values)) => {
                self.current = Some(values);
                Ok(true)
            }
            Ok(None) => {
                self.finish();
                Ok(false)
            }
            Err(e) => {
                self.finish();
                Err(e)
            }
        }
    }

    fn pull(&mut self) -> Result<Option<Vec<Value>>, QueryError> {
        loop {
            if self.remaining == Some(0) {
                return Ok(None);
            }
            let Some(row) = self.plan.next_row(self.source.as_mut())? else {
                return Ok(None);
            };
            let values = self.plan.project(&row)?;
            if let Some(seen) = &mut self.seen {
                if !seen.insert(row_key(&values)) {
                    continue;
                }
            }
            if self.to_skip > 0 {
                self.to_skip -= 1;
                continue;
            }
            if let Some(remaining) = &mut self.remaining {
                *remaining -= 1;
            }
            return Ok(Some(values));
        }
    }

    fn finish(&mut self) {
        self.current = None;
        if !self.finished {
            self.finished = true;
            self.source.close();
        }
    }
}

enum CursorState {
    Streaming(Box<StreamingScan>),
    Buffered { rows: Vec<Vec<Value>>, position: usize },
}

pub struct Cursor {
    columns: Rc<ColumnSet>,
    state: CursorState,
    closed: bool,
}

impl Cursor {
    pub fn streaming(columns: Rc<ColumnSet>, scan: StreamingScan) -> Self {
        Self {
            columns,
            state: CursorState::Streaming(Box::new(scan)),
            closed: false,
        }
    }

    pub const fn buffered(columns: Rc<ColumnSet>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            state: CursorState::Buffered { rows, position: 0 },
            closed: false,
        }
    }

    pub fn column_names(&self) -> &[String] {
        self.columns.names()
    }

    pub const fn is_scrollable(&self) -> bool {
        matches!(self.state, CursorState::Buffered { .. })
    }

    /// Advance to the next row; false at the end
    pub fn next(&mut self) -> Result<bool, QueryError> {
        if self.closed {
            return Ok(false);
        }
        match &mut self.state {
            CursorState::Streaming(scan) => scan.advance(),
            CursorState::Buffered { rows, position } => {
                if *position <= rows.len() {
                    *position += 1;
                }
                Ok(*position <= rows.len())
            }
        }
    }

    pub fn previous(&mut self) -> Result<bool, QueryError> {
        let (len, position) = self.buffer_position()?;
        let target = position.saturating_sub(1);
        self.set_position(target);
        Ok(target >= 1 && target <= len)
    }

    /// Move to row `n` (1-based); negative counts back from the last row
    pub fn absolute(&mut self, n: i64) -> Result<bool, QueryError> {
        let (len, _) = self.buffer_position()?;
        let target = if n >= 0 {
            (n as usize).min(len + 1)
        } else {
            (len as i64 + 1).saturating_add(n).max(0) as usize
        };
        self.set_position(target);
        Ok(target >= 1 && target <= len)
    }

    pub fn relative(&mut self, n: i64) -> Result<bool, QueryError> {
        let (len, position) = self.buffer_position()?;
        let target = (position as i64).saturating_add(n).clamp(0, len as i64 + 1) as usize;
        self.set_position(target);
        Ok(target >= 1 && target <= len)
    }

    pub fn first(&mut self) -> Result<bool, QueryError> {
        self.absolute(1)
    }

    pub fn last(&mut self) -> Result<bool, QueryError> {
        self.absolute(-1)
    }

    pub fn before_first(&mut self) -> Result<(), QueryError> {
        self.buffer_position()?;
        self.set_position(0);
        Ok(())
    }

    pub fn after_last(&mut self) -> Result<(), QueryError> {
        let (len, _) = self.buffer_position()?;
        self.set_position(len + 1);
        Ok(())
    }

    /// 1-based number of the current row, 0 when not on a row
    pub fn row_number(&self) -> usize {
        match &self.state {
            CursorState::Buffered { rows, position } if *position <= rows.len() => *position,
            _ => 0,
        }
    }

    fn buffer_position(&self) -> Result<(usize, usize), QueryError> {
        match &self.state {
            CursorState::Buffered { rows, position } if !self.closed => Ok((rows.len(), *position)),
            CursorState::Buffered { .. } => Err(QueryError::Io(std::io::Error::other(
                "cursor is closed",
            ))),
            CursorState::Streaming(_) => Err(QueryError::UnsupportedFeature(
                "cursor is forward-only".to_string(),
            )),
        }
    }

    fn set_position(&mut self, target: usize) {
        if let CursorState::Buffered { position, .. } = &mut self.state {
            *position = target;
        }
    }

    fn current_row(&self) -> Option<&[Value]> {
        if self.closed {
            return None;
        }
        match &self.state {
            CursorState::Streaming(scan) => scan.current.as_deref(),
            CursorState::Buffered { rows, position } => position
                .checked_sub(1)
                .and_then(|idx| rows.get(idx))
                .map(Vec::as_slice),
        }
    }

    /// Field of the current row by output name, case-insensitive
    pub fn get(&self, name: &str) -> Result<&Value, QueryError> {
        let idx = self
            .columns
            .position(name)
            .ok_or_else(|| QueryError::UnknownColumn(name.to_string()))?;
        self.current_row()
            .and_then(|row| row.get(idx))
            .ok_or(QueryError::NoCurrentRow)
    }

    /// Field of the current row by 1-based position
    pub fn get_index(&self, index: usize) -> Result<&Value, QueryError> {
        if index == 0 || index > self.columns.len() {
            return Err(QueryError::UnknownColumn(index.to_string()));
        }
        self.current_row()
            .and_then(|row| row.get(index - 1))
            .ok_or(QueryError::NoCurrentRow)
    }

    pub fn get_string(&self, name: &str) -> Result<Option<String>, QueryError> {
        Ok(match self.get(name)? {
            Value::Null => None,
            value => Some(value.to_string()),
        })
    }

    pub fn get_i64(&self, name: &str) -> Result<Option<i64>, QueryError> {
        match self.get(name)? {
            Value::Null => Ok(None),
            Value::Integer(i) => Ok(Some(*i)),
            Value::Double(d) => Ok(Some(*d as i64)),
            Value::Text(s) if s.trim().is_empty() => Ok(None),
            Value::Text(s) => s.trim().parse::<i64>().map(Some).map_err(|_| {
                QueryError::Type(format!("cannot read '{s}' in column {name} as an integer"))
            }),
            other => Err(QueryError::Type(format!(
                "cannot read '{other}' in column {name} as an integer"
            ))),
        }
    }

    pub fn get_f64(&self, name: &str) -> Result<Option<f64>, QueryError> {
        match self.get(name)? {
            Value::Null => Ok(None),
            Value::Text(s) if s.trim().is_empty() => Ok(None),
            value => value.as_f64().map(Some).ok_or_else(|| {
                QueryError::Type(format!("cannot read '{value}' in column {name} as a number"))
            }),
        }
    }

    /// Drain the remaining rows
    pub fn fetch_all(&mut self) -> Result<Vec<Vec<Value>>, QueryError> {
        let mut rows = Vec::new();
        while self.next()? {
            if let Some(row) = self.current_row() {
                rows.push(row.to_vec());
            }
        }
        Ok(rows)
    }

    /// Release the row source. Safe to call more than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        match &mut self.state {
            CursorState::Streaming(scan) => scan.finish(),
            CursorState::Buffered { rows, position } => {
                rows.clear();
                *position = 0;
            }
        }
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(values: &[i64]) -> Cursor {
        let columns = Rc::new(ColumnSet::new(vec!["N".to_string()]));
        Cursor::buffered(
            columns,
            values.iter().map(|v| vec![Value::Integer(*v)]).collect(),
        )
    }

    #[test]
    fn test_forward_iteration() {
        let mut c = cursor(&[1, 2]);
        assert!(matches!(c.get("n"), Err(QueryError::NoCurrentRow)));
        assert!(c.next().unwrap());
        assert_eq!(c.get("n").unwrap(), &Value::Integer(1));
        assert_eq!(c.get_index(1).unwrap(), &Value::Integer(1));
        assert!(c.next().unwrap());
        assert!(!c.next().unwrap());
        assert!(!c.next().unwrap());
        assert_eq!(c.row_number(), 0);
    }

    #[test]
    fn test_scrolling() {
        let mut c = cursor(&[10, 20, 30]);
        assert!(c.last().unwrap());
        assert_eq!(c.get_i64("N").unwrap(), Some(30));
        assert!(c.previous().unwrap());
        assert_eq!(c.row_number(), 2);
        assert!(c.absolute(-3).unwrap());
        assert_eq!(c.get_i64("N").unwrap(), Some(10));
        assert!(!c.relative(-1).unwrap());
        assert!(c.relative(2).unwrap());
        assert_eq!(c.get_f64("N").unwrap(), Some(20.0));
        assert!(!c.absolute(7).unwrap());
        assert!(c.previous().unwrap());
        assert_eq!(c.row_number(), 3);
        c.before_first().unwrap();
        assert!(c.next().unwrap());
        assert_eq!(c.row_number(), 1);
    }

    #[test]
    fn test_extreme_offsets_clamp() {
        let mut c = cursor(&[1, 2]);
        assert!(c.next().unwrap());
        assert!(!c.relative(i64::MAX).unwrap());
        assert!(c.previous().unwrap());
        assert_eq!(c.row_number(), 2);

        assert!(!c.relative(i64::MIN).unwrap());
        assert!(c.next().unwrap());
        assert_eq!(c.row_number(), 1);

        assert!(!c.absolute(i64::MIN).unwrap());
        assert!(c.next().unwrap());
        assert_eq!(c.row_number(), 1);

        assert!(!c.absolute(i64::MAX).unwrap());
        assert!(c.previous().unwrap());
        assert_eq!(c.row_number(), 2);
    }

    #[test]
    fn test_unknown_column_and_index() {
        let mut c = cursor(&[1]);
        c.next().unwrap();
        assert!(matches!(c.get("other"), Err(QueryError::UnknownColumn(_))));
        assert!(matches!(c.get_index(0), Err(QueryError::UnknownColumn(_))));
        assert!(matches!(c.get_index(2), Err(QueryError::UnknownColumn(_))));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut c = cursor(&[1]);
        c.close();
        c.close();
        assert!(!c.next().unwrap());
        assert!(matches!(c.get("n"), Err(QueryError::NoCurrentRow)));
    }
}
