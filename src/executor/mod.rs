/// Executor module - runs a parsed SELECT over a row source
///
/// Structure:
/// - expression: value expressions, column lookup and `+`
/// - conditions: WHERE/HAVING evaluation, comparison and LIKE
/// - aggregate: COUNT/SUM/AVG/MIN/MAX over a group of rows
/// - queries: typing, projection, grouping, DISTINCT, ORDER BY, LIMIT/OFFSET
/// - cursor: streaming and scrollable result cursors
pub mod expression;
pub mod conditions;
pub mod aggregate;
pub mod queries;
pub mod cursor;

pub use expression::Environment;
pub use conditions::ConditionEvaluator;
pub use queries::{ExecutionOptions, QueryExecutor};
pub use cursor::Cursor;
