use bqlite_functions::register_all;
use rusqlite::types::Value;
use rusqlite::Connection;

fn connection() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    register_all(&conn).unwrap();
    conn
}

fn scalar(conn: &Connection, sql: &str) -> Value {
    conn.query_row(sql, [], |row| row.get::<_, Value>(0)).unwrap()
}

#[test]
fn test_safe_arithmetic_through_sql() {
    let conn = connection();
    assert_eq!(scalar(&conn, "SELECT SAFE_ADD(1, 2)"), Value::Integer(3));
    assert_eq!(scalar(&conn, "SELECT SAFE_DIVIDE(10, 0)"), Value::Null);
    assert_eq!(scalar(&conn, "SELECT SAFE_DIVIDE(9, 3)"), Value::Real(3.0));
    assert_eq!(
        scalar(&conn, "SELECT SAFE_ADD(9223372036854775807, 1)"),
        Value::Null
    );
    assert_eq!(
        scalar(&conn, "SELECT SAFE_MULTIPLY(9223372036854775807, 2)"),
        Value::Null
    );
    assert_eq!(
        scalar(
            &conn,
            "SELECT SAFE_NEGATE(SAFE_SUBTRACT(-9223372036854775807, 1))"
        ),
        Value::Null
    );
    assert_eq!(scalar(&conn, "SELECT SAFE_SUBTRACT(NULL, 1)"), Value::Null);
}

#[test]
fn test_timestamp_trunc_through_sql() {
    let conn = connection();
    assert_eq!(
        scalar(&conn, "SELECT TIMESTAMP_TRUNC('2023-12-25 10:30:45', 'DAY')"),
        Value::Text("2023-12-25 00:00:00".to_string())
    );
    assert_eq!(
        scalar(&conn, "SELECT TIMESTAMP_TRUNC('2023-12-25 10:30:45', 'YEAR')"),
        Value::Text("2023-01-01 00:00:00".to_string())
    );
    assert_eq!(
        scalar(&conn, "SELECT TIMESTAMP_TRUNC('2023-12-25 10:30:45', 'DECADE')"),
        Value::Null
    );
}

#[test]
fn test_date_overrides_builtin() {
    let conn = connection();
    assert_eq!(scalar(&conn, "SELECT DATE(2024, 2, 30)"), Value::Null);
    assert_eq!(
        scalar(&conn, "SELECT DATE(2024, 2, 29)"),
        Value::Text("2024-02-29".to_string())
    );
    assert_eq!(
        scalar(&conn, "SELECT DATE('2024-01-15T10:00:00Z')"),
        Value::Text("2024-01-15".to_string())
    );
}

#[test]
fn test_zoned_functions() {
    let conn = connection();
    assert_eq!(
        scalar(&conn, "SELECT TIMESTAMP('2023-12-25 10:30:45', 'Asia/Tokyo')"),
        Value::Text("2023-12-25 01:30:45+00:00".to_string())
    );
    assert_eq!(
        scalar(
            &conn,
            "SELECT FORMAT_TIMESTAMP('%Y-%m-%d %H:%M', '2023-12-25 10:30:00', 'Asia/Tokyo')"
        ),
        Value::Text("2023-12-25 19:30".to_string())
    );
    match scalar(&conn, "SELECT _CURRENT_DATE('Asia/Tokyo')") {
        Value::Text(date) => assert_eq!(date.len(), 10),
        other => panic!("expected a date, got {:?}", other),
    }
}

#[test]
fn test_date_add_through_sql() {
    let conn = connection();
    assert_eq!(
        scalar(&conn, "SELECT DATE_ADD('2024-01-15', 10, 'DAY')"),
        Value::Text("2024-01-25".to_string())
    );
    assert_eq!(
        scalar(&conn, "SELECT DATE_SUB('2024-03-31', 1, 'MONTH')"),
        Value::Text("2024-02-29".to_string())
    );
}

#[test]
fn test_countif() {
    let conn = connection();
    conn.execute_batch(
        "CREATE TABLE t (n INTEGER);
         INSERT INTO t VALUES (1), (2), (3), (4), (NULL);",
    )
    .unwrap();
    assert_eq!(
        scalar(&conn, "SELECT COUNTIF(n > 2) FROM t"),
        Value::Integer(2)
    );
    assert_eq!(
        scalar(&conn, "SELECT COUNTIF(n > 2) FROM t WHERE n > 100"),
        Value::Integer(0)
    );
}
