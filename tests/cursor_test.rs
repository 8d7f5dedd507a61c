// Cursor positioning, accessors and independence of sibling cursors
use std::fs;

use flatsql::{Connection, ConnectionConfig, QueryError, Value};
use tempfile::TempDir;

fn connection() -> (TempDir, Connection) {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("nums.csv"),
        "n,word,ratio\n1,one,0.5\n2,two,1.5\n3,three,\n4,four,4\n",
    )
    .unwrap();
    let conn = Connection::open(ConnectionConfig::new(dir.path())).unwrap();
    (dir, conn)
}

#[test]
fn test_streaming_cursor_is_forward_only() {
    let (_dir, conn) = connection();
    let mut cursor = conn.execute_query("SELECT n FROM nums").unwrap();
    assert!(!cursor.is_scrollable());
    assert!(matches!(cursor.get("n"), Err(QueryError::NoCurrentRow)));
    assert!(cursor.next().unwrap());
    assert!(matches!(
        cursor.previous(),
        Err(QueryError::UnsupportedFeature(_))
    ));
    assert!(matches!(cursor.first(), Err(QueryError::UnsupportedFeature(_))));
}

#[test]
fn test_scrollable_cursor() {
    let (_dir, conn) = connection();
    let mut cursor = conn
        .execute_scrollable_query("SELECT n, word FROM nums WHERE n > 1")
        .unwrap();
    assert!(cursor.is_scrollable());

    assert!(cursor.last().unwrap());
    assert_eq!(cursor.row_number(), 3);
    assert_eq!(cursor.get_string("word").unwrap().as_deref(), Some("four"));

    assert!(cursor.absolute(-2).unwrap());
    assert_eq!(cursor.get_i64("N").unwrap(), Some(3));

    assert!(cursor.relative(-1).unwrap());
    assert_eq!(cursor.get_index(2).unwrap(), &Value::Text("two".to_string()));

    assert!(!cursor.previous().unwrap());
    assert!(matches!(cursor.get("n"), Err(QueryError::NoCurrentRow)));

    cursor.after_last().unwrap();
    assert!(!cursor.next().unwrap());
    assert!(cursor.previous().unwrap());
    assert_eq!(cursor.get_i64("n").unwrap(), Some(4));

    assert!(cursor.first().unwrap());
    assert_eq!(cursor.get_i64("n").unwrap(), Some(2));
}

#[test]
fn test_relative_past_either_end() {
    let (_dir, conn) = connection();
    let mut cursor = conn
        .execute_scrollable_query("SELECT n FROM nums WHERE n <= 2")
        .unwrap();
    assert!(cursor.next().unwrap());
    assert!(!cursor.relative(i64::MAX).unwrap());
    assert!(matches!(cursor.get("n"), Err(QueryError::NoCurrentRow)));
    assert!(cursor.previous().unwrap());
    assert_eq!(cursor.get_i64("n").unwrap(), Some(2));

    assert!(!cursor.relative(i64::MIN).unwrap());
    assert!(cursor.next().unwrap());
    assert_eq!(cursor.get_i64("n").unwrap(), Some(1));
}

#[test]
fn test_typed_accessors() {
    let (_dir, conn) = connection();
    let mut cursor = conn.execute_query("SELECT n, ratio, word FROM nums").unwrap();

    assert!(cursor.next().unwrap());
    assert_eq!(cursor.get_f64("ratio").unwrap(), Some(0.5));
    assert_eq!(cursor.get_f64("n").unwrap(), Some(1.0));
    assert!(matches!(cursor.get_i64("word"), Err(QueryError::Type(_))));

    cursor.next().unwrap();
    cursor.next().unwrap();
    assert_eq!(cursor.get_f64("ratio").unwrap(), None);
    assert_eq!(cursor.get("ratio").unwrap(), &Value::Null);

    cursor.next().unwrap();
    assert_eq!(cursor.get("ratio").unwrap(), &Value::Double(4.0));
    assert!(!cursor.next().unwrap());
    assert!(matches!(cursor.get("n"), Err(QueryError::NoCurrentRow)));
}

#[test]
fn test_sibling_cursors_are_independent() {
    let (_dir, conn) = connection();
    let mut first = conn.execute_query("SELECT n FROM nums").unwrap();
    let mut second = conn.execute_query("SELECT n FROM nums WHERE n >= 3").unwrap();

    assert!(first.next().unwrap());
    assert!(second.next().unwrap());
    assert!(first.next().unwrap());
    assert_eq!(first.get_i64("n").unwrap(), Some(2));
    assert_eq!(second.get_i64("n").unwrap(), Some(3));

    second.close();
    second.close();
    assert!(!second.next().unwrap());

    assert!(first.next().unwrap());
    assert_eq!(first.get_i64("n").unwrap(), Some(3));
    drop(first);

    let mut third = conn.execute_query("SELECT COUNT(*) AS c FROM nums").unwrap();
    assert!(third.next().unwrap());
    assert_eq!(third.get_i64("c").unwrap(), Some(4));
}
