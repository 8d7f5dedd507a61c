// Module declarations
pub mod error;
pub mod value;
pub mod data_type;
pub mod row;
pub mod coercion;

// Re-exports for convenience
pub use error::QueryError;
pub use value::{Value, ValueKey};
pub use data_type::DataType;
pub use row::{ColumnSet, Row};
pub use coercion::Coercer;

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Integer(42).to_string(), "42");
        assert_eq!(Value::Double(3.25).to_string(), "3.25");
        assert_eq!(Value::Double(4.0).to_string(), "4.0");
        assert_eq!(Value::Text("hello".to_string()).to_string(), "hello");
    }

    #[test]
    fn test_value_as_f64() {
        assert_eq!(Value::Integer(2).as_f64(), Some(2.0));
        assert_eq!(Value::Text("1.5".to_string()).as_f64(), Some(1.5));
        assert_eq!(Value::Text("abc".to_string()).as_f64(), None);
        assert_eq!(Value::Text("inf".to_string()).as_f64(), None);
    }

    #[test]
    fn test_data_type_parse_list() {
        let types = DataType::parse_list("String, integer,DOUBLE,Date").unwrap();
        assert_eq!(
            types,
            vec![DataType::String, DataType::Integer, DataType::Double, DataType::Date]
        );
        assert!(DataType::parse_list("String,Blob").is_err());
    }

    #[test]
    fn test_row_lookup_is_case_insensitive() {
        let columns = Rc::new(ColumnSet::new(vec!["Id".to_string(), "Name".to_string()]));
        let row = Row::new(
            columns,
            vec![Value::Integer(1), Value::Text("uno".to_string())],
        );
        assert_eq!(row.get("NAME"), Some(&Value::Text("uno".to_string())));
        assert_eq!(row.get("id"), Some(&Value::Integer(1)));
        assert_eq!(row.get("missing"), None);
    }
}
