use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::debug;

use super::aggregate::GroupEnv;
use super::conditions::{compare_values, ConditionEvaluator};
use super::cursor::{Cursor, StreamingScan};
use super::expression::{evaluate, AliasedRow, Environment};
use crate::parser::{Expression, SelectColumn, SortOrder, Statement};
use crate::reader::RowSource;
use crate::types::{Coercer, ColumnSet, DataType, QueryError, Row, Value, ValueKey};

/// Per-table settings that shape how raw fields become typed values
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Declared types by column position; missing entries are inferred
    pub column_types: Vec<DataType>,
    pub coercer: Coercer,
    /// Always buffer the result so the cursor can move backwards
    pub scrollable: bool,
}

/// Row-level part of a query: typing, filtering and projection
pub struct ScanPlan {
    statement: Statement,
    columns: Vec<SelectColumn>,
    output: Rc<ColumnSet>,
    source_columns: Rc<ColumnSet>,
    declared: Vec<DataType>,
    // Settled from the first data row
    types: Option<Vec<(DataType, bool)>>,
    coercer: Coercer,
    evaluator: ConditionEvaluator,
}

struct OutputRow {
    values: Vec<Value>,
    sort_keys: Vec<Value>,
}

impl ScanPlan {
    pub fn new(
        statement: Statement,
        source_names: &[String],
        options: &ExecutionOptions,
    ) -> Result<Self, QueryError> {
        let source_columns = Rc::new(ColumnSet::new(source_names.to_vec()));

        let columns: Vec<SelectColumn> = statement
            .columns
            .iter()
            .flat_map(|column| match column.expression {
                Expression::Wildcard => source_names
                    .iter()
                    .map(|name| SelectColumn {
                        expression: Expression::column(name.clone()),
                        alias: None,
                    })
                    .collect(),
                _ => vec![column.clone()],
            })
            .collect();
        let output = Rc::new(ColumnSet::new(columns.iter().map(SelectColumn::name).collect()));

        let plan = Self {
            statement,
            columns,
            output,
            source_columns,
            declared: options.column_types.clone(),
            types: None,
            coercer: options.coercer.clone(),
            evaluator: ConditionEvaluator::new(),
        };
        plan.validate()?;
        Ok(plan)
    }

    fn is_alias(&self, name: &str) -> bool {
        self.columns.iter().any(|c| {
            c.alias
                .as_ref()
                .is_some_and(|alias| alias.eq_ignore_ascii_case(name))
        })
    }

    fn validate(&self) -> Result<(), QueryError> {
        let known = |name: &str| self.source_columns.position(name).is_some();

        let mut names = Vec::new();
        for column in &self.columns {
            column.expression.column_names(true, &mut names);
        }
        if let Some(missing) = names.iter().find(|name| !known(name)) {
            return Err(QueryError::UnknownColumn((*missing).to_string()));
        }

        let mut names = Vec::new();
        for expr in &self.statement.group_by {
            expr.column_names(true, &mut names);
        }
        if let Some(missing) = names
            .iter()
            .find(|name| !known(name) && !self.is_alias(name))
        {
            return Err(QueryError::UnknownColumn((*missing).to_string()));
        }

        if self.statement.is_grouped() && self.statement.group_by.is_empty() {
            let mut plain = Vec::new();
            for column in &self.columns {
                column.expression.column_names(false, &mut plain);
            }
            if !plain.is_empty() {
                return Err(QueryError::UnsupportedFeature(format!(
                    "column '{}' must appear in GROUP BY when aggregates are selected",
                    plain[0]
                )));
            }
        }

        for item in &self.statement.order_by {
            match &item.expression {
                Expression::Literal(Value::Integer(n)) => {
                    if *n < 1 || *n as usize > self.output.len() {
                        return Err(QueryError::UnknownColumn(n.to_string()));
                    }
                }
                Expression::Column { name, .. } => {
                    let in_output = self.output.position(name).is_some();
                    if !in_output && (self.statement.is_grouped() || !known(name)) {
                        return Err(QueryError::UnknownColumn(name.clone()));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn output_columns(&self) -> Rc<ColumnSet> {
        Rc::clone(&self.output)
    }

    /// Streaming needs neither grouping nor sorting
    pub fn is_streamable(&self) -> bool {
        !self.statement.is_grouped() && self.statement.order_by.is_empty()
    }

    pub const fn distinct(&self) -> bool {
        self.statement.distinct
    }

    pub const fn window(&self) -> (Option<usize>, Option<usize>) {
        (self.statement.offset, self.statement.limit)
    }

    /// Pull the next typed source row that passes WHERE
    pub fn next_row(&mut self, source: &mut dyn RowSource) -> Result<Option<Row>, QueryError> {
        while source.next_record()? {
            let row = self.typed_row(source)?;
            let keep = match &self.statement.filter {
                Some(filter) => {
                    let env = AliasedRow {
                        row: &row,
                        columns: &self.columns,
                    };
                    self.evaluator.evaluate(filter, &env)?
                }
                None => true,
            };
            if keep {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn typed_row(&mut self, source: &dyn RowSource) -> Result<Row, QueryError> {
        let count = self.source_columns.len();
        if self.types.is_none() {
            let types = (0..count)
                .map(|i| match self.declared.get(i) {
                    Some(declared) => (*declared, true),
                    None => (
                        self.coercer.infer_type(source.field(i).unwrap_or_default()),
                        false,
                    ),
                })
                .collect::<Vec<_>>();
            debug!(types = ?types, "column types settled");
            self.types = Some(types);
        }
        let types = self.types.as_deref().unwrap_or_default();

        let mut values = Vec::with_capacity(count);
        for (i, (data_type, declared)) in types.iter().enumerate() {
            let value = match source.field(i) {
                None => Value::Null,
                Some(raw) if *declared => self.coercer.coerce(raw, *data_type)?,
                Some(raw) => self.coercer.coerce_inferred(raw, *data_type),
            };
            values.push(value);
        }
        Ok(Row::new(Rc::clone(&self.source_columns), values))
    }

    pub fn project(&self, row: &Row) -> Result<Vec<Value>, QueryError> {
        self.columns
            .iter()
            .map(|c| evaluate(&c.expression, row))
            .collect()
    }

    fn sort_keys(&self, values: &[Value], env: &dyn Environment) -> Result<Vec<Value>, QueryError> {
        self.statement
            .order_by
            .iter()
            .map(|item| match &item.expression {
                Expression::Literal(Value::Integer(n)) => {
                    Ok(values.get(*n as usize - 1).cloned().unwrap_or(Value::Null))
                }
                Expression::Column { name, .. } if self.output.position(name).is_some() => {
                    Ok(self
                        .output
                        .position(name)
                        .and_then(|idx| values.get(idx).cloned())
                        .unwrap_or(Value::Null))
                }
                expr => evaluate(expr, env),
            })
            .collect()
    }

    fn compare_rows(&self, a: &OutputRow, b: &OutputRow) -> Ordering {
        for (item, (left, right)) in self
            .statement
            .order_by
            .iter()
            .zip(a.sort_keys.iter().zip(&b.sort_keys))
        {
            // NULLs sort first
            let ord = match (left, right) {
                (Value::Null, Value::Null) => Ordering::Equal,
                (Value::Null, _) => Ordering::Less,
                (_, Value::Null) => Ordering::Greater,
                (l, r) => compare_values(l, r).unwrap_or(Ordering::Equal),
            };
            let ord = match item.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

pub fn row_key(values: &[Value]) -> Vec<ValueKey> {
    values.iter().map(Value::key).collect()
}

pub struct QueryExecutor;

impl QueryExecutor {
    /// Run `statement` over `source`. Streams when the statement allows it,
    /// otherwise buffers the whole result; the source is closed on any error.
    pub fn execute(
        statement: Statement,
        mut source: Box<dyn RowSource>,
        options: &ExecutionOptions,
    ) -> Result<Cursor, QueryError> {
        let mut plan = match ScanPlan::new(statement, source.column_names(), options) {
            Ok(plan) => plan,
            Err(e) => {
                source.close();
                return Err(e);
            }
        };
        let columns = plan.output_columns();

        if plan.is_streamable() && !options.scrollable {
            debug!(columns = ?columns.names(), "streaming query");
            return Ok(Cursor::streaming(columns, StreamingScan::new(source, plan)));
        }

        let rows = Self::materialize(&mut plan, source.as_mut());
        source.close();
        let rows = rows?;
        debug!(columns = ?columns.names(), rows = rows.len(), "buffered query");
        Ok(Cursor::buffered(columns, rows))
    }

    fn materialize(
        plan: &mut ScanPlan,
        source: &mut dyn RowSource,
    ) -> Result<Vec<Vec<Value>>, QueryError> {
        let mut rows = if plan.statement.is_grouped() {
            Self::group(plan, source)?
        } else {
            let mut rows = Vec::new();
            while let Some(row) = plan.next_row(source)? {
                let values = plan.project(&row)?;
                let env = AliasedRow {
                    row: &row,
                    columns: &plan.columns,
                };
                let sort_keys = plan.sort_keys(&values, &env)?;
                rows.push(OutputRow { values, sort_keys });
            }
            rows
        };

        if plan.statement.distinct {
            let mut seen = HashSet::new();
            rows.retain(|row| seen.insert(row_key(&row.values)));
        }

        if !plan.statement.order_by.is_empty() {
            // Stable: ties keep scan order
            rows.sort_by(|a, b| plan.compare_rows(a, b));
        }

        let (offset, limit) = plan.window();
        Ok(rows
            .into_iter()
            .skip(offset.unwrap_or(0))
            .take(limit.unwrap_or(usize::MAX))
            .map(|row| row.values)
            .collect())
    }

    fn group(
        plan: &mut ScanPlan,
        source: &mut dyn RowSource,
    ) -> Result<Vec<OutputRow>, QueryError> {
        let mut groups: Vec<Vec<Row>> = Vec::new();
        let mut index: HashMap<Vec<ValueKey>, usize> = HashMap::new();

        while let Some(row) = plan.next_row(source)? {
            let env = AliasedRow {
                row: &row,
                columns: &plan.columns,
            };
            let key = plan
                .statement
                .group_by
                .iter()
                .map(|expr| evaluate(expr, &env).map(|v| v.key()))
                .collect::<Result<Vec<_>, _>>()?;
            match index.get(&key) {
                Some(&i) => groups[i].push(row),
                None => {
                    index.insert(key, groups.len());
                    groups.push(vec![row]);
                }
            }
        }

        // Whole-table aggregates still produce one row over an empty table
        if groups.is_empty() && plan.statement.group_by.is_empty() {
            groups.push(Vec::new());
        }

        let mut out = Vec::with_capacity(groups.len());
        for rows in &groups {
            let env = GroupEnv {
                rows,
                columns: &plan.columns,
                outputs: &[],
            };
            let values = plan
                .columns
                .iter()
                .map(|c| evaluate(&c.expression, &env))
                .collect::<Result<Vec<_>, _>>()?;

            let env = GroupEnv {
                rows,
                columns: &plan.columns,
                outputs: &values,
            };
            if let Some(having) = &plan.statement.having {
                if !plan.evaluator.evaluate(having, &env)? {
                    continue;
                }
            }
            let sort_keys = plan.sort_keys(&values, &env)?;
            out.push(OutputRow { values, sort_keys });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_statement;
    use crate::reader::MemorySource;

    fn table() -> Box<dyn RowSource> {
        let rows = [
            ["1", "Juan", "Project Manager", "2001-04-02"],
            ["2", "Mauricio", "Finance Manager", "1999-01-15"],
            ["3", "Felipe", "Project Manager", "2004-12-31"],
            ["4", "Ana", "Sales", ""],
            ["5", "Maria", "Finance Manager", "2002-03-03"],
        ]
        .iter()
        .map(|r| r.iter().map(|s| (*s).to_string()).collect())
        .collect();
        let columns = ["ID", "Name", "Job", "Start"].map(String::from).to_vec();
        Box::new(MemorySource::new(columns, rows))
    }

    fn run(sql: &str) -> Result<Vec<Vec<Value>>, QueryError> {
        let statement = parse_statement(sql)?;
        QueryExecutor::execute(statement, table(), &ExecutionOptions::default())?.fetch_all()
    }

    fn texts(rows: &[Vec<Value>]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(ToString::to_string).collect())
            .collect()
    }

    #[test]
    fn test_filter_and_project() {
        let rows = run("SELECT Name, ID FROM t WHERE Job = 'Project Manager'").unwrap();
        assert_eq!(texts(&rows), vec![vec!["Juan", "1"], vec!["Felipe", "3"]]);
    }

    #[test]
    fn test_where_on_alias() {
        let rows = run("SELECT ID, Job J FROM t WHERE J = 'Sales'").unwrap();
        assert_eq!(texts(&rows), vec![vec!["4", "Sales"]]);
    }

    #[test]
    fn test_inferred_types() {
        let rows = run("SELECT ID + 10 AS n, Start FROM t WHERE ID = 1").unwrap();
        assert_eq!(rows[0][0], Value::Integer(11));
        assert!(matches!(rows[0][1], Value::Date(_)));
        let rows = run("SELECT Start FROM t WHERE ID = 4").unwrap();
        assert_eq!(rows[0][0], Value::Null);
    }

    #[test]
    fn test_distinct_order_limit_offset() {
        let rows = run("SELECT DISTINCT Job FROM t ORDER BY Job LIMIT 1 OFFSET 1").unwrap();
        assert_eq!(texts(&rows), vec![vec!["Project Manager"]]);
    }

    #[test]
    fn test_order_by_desc_and_source_column() {
        let rows = run("SELECT Name FROM t ORDER BY ID DESC LIMIT 2").unwrap();
        assert_eq!(texts(&rows), vec![vec!["Maria"], vec!["Ana"]]);
        let rows = run("SELECT Name, Job FROM t ORDER BY 2, 1").unwrap();
        assert_eq!(rows[0][0], Value::Text("Maria".to_string()));
        assert_eq!(rows[1][0], Value::Text("Mauricio".to_string()));
        assert_eq!(rows[4][0], Value::Text("Ana".to_string()));
    }

    #[test]
    fn test_group_by_having() {
        let rows = run(
            "SELECT Job, COUNT(*) AS n, MAX(ID) top FROM t GROUP BY Job HAVING n > 1 ORDER BY Job",
        )
        .unwrap();
        assert_eq!(
            texts(&rows),
            vec![vec!["Finance Manager", "2", "5"], vec!["Project Manager", "2", "3"]]
        );
    }

    #[test]
    fn test_whole_table_aggregate() {
        let rows = run("SELECT COUNT(*) AS c, SUM(ID) AS s, AVG(ID) a FROM t").unwrap();
        assert_eq!(
            rows,
            vec![vec![Value::Integer(5), Value::Integer(15), Value::Double(3.0)]]
        );
        let rows = run("SELECT COUNT(*) AS c FROM t WHERE ID > 99").unwrap();
        assert_eq!(rows, vec![vec![Value::Integer(0)]]);
    }

    #[test]
    fn test_aggregate_with_plain_column_needs_group_by() {
        assert!(matches!(
            run("SELECT Name, COUNT(*) AS c FROM t"),
            Err(QueryError::UnsupportedFeature(_))
        ));
    }

    #[test]
    fn test_unknown_columns() {
        assert!(matches!(
            run("SELECT Salary FROM t"),
            Err(QueryError::UnknownColumn(_))
        ));
        assert!(matches!(
            run("SELECT Name FROM t ORDER BY Salary"),
            Err(QueryError::UnknownColumn(_))
        ));
        assert!(run("SELECT Name FROM t WHERE Salary = 1").unwrap().is_empty());
    }

    #[test]
    fn test_declared_type_mismatch() {
        let options = ExecutionOptions {
            column_types: vec![DataType::Integer, DataType::Integer],
            ..ExecutionOptions::default()
        };
        let statement = parse_statement("SELECT * FROM t").unwrap();
        let mut cursor = QueryExecutor::execute(statement, table(), &options).unwrap();
        assert!(matches!(cursor.next(), Err(QueryError::Type(_))));
    }

    #[test]
    fn test_select_without_from() {
        let statement = parse_statement("SELECT 'a' AS x, 1 + 2 AS y").unwrap();
        let rows = QueryExecutor::execute(
            statement,
            Box::new(MemorySource::single_empty_row()),
            &ExecutionOptions::default(),
        )
        .unwrap()
        .fetch_all()
        .unwrap();
        assert_eq!(
            rows,
            vec![vec![Value::Text("a".to_string()), Value::Integer(3)]]
        );
    }
}
