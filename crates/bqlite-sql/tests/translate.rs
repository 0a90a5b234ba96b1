use bqlite_catalog::MemoryCatalog;
use bqlite_core::schema::parse_schema;
use bqlite_core::{Error, FieldSchema, Mode, NativeValue, TableSchema, TypeTag};
use bqlite_sql::{classify, infer_schema, translate, StatementKind};

fn catalog() -> MemoryCatalog {
    MemoryCatalog::new().with_table(
        "test-project",
        "shop",
        "orders",
        TableSchema::new(
            parse_schema(
                "id INT64 NOT NULL, customer STRING, total FLOAT64, placed TIMESTAMP, tags ARRAY<STRING>, address STRUCT<city STRING, zip STRING>",
            )
            .unwrap(),
        ),
    )
}

fn engine_sql(sql: &str) -> String {
    translate(sql).unwrap().sql().join("; ")
}

fn infer(sql: &str, columns: &[&str], row: Vec<NativeValue>) -> Vec<FieldSchema> {
    let translation = translate(sql).unwrap();
    let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    infer_schema(
        &columns,
        Some(&row),
        translation.statements.last(),
        &catalog(),
        translation.table_ref(),
    )
}

#[test]
fn test_select_from_dotted_table() {
    assert_eq!(
        engine_sql("SELECT id FROM shop.orders WHERE total > 10"),
        "SELECT id FROM `shop.orders` WHERE total > 10"
    );
    assert_eq!(
        engine_sql("SELECT id FROM `test-project.shop.orders`"),
        "SELECT id FROM `shop.orders`"
    );
}

#[test]
fn test_unnest_with_offset_translation() {
    assert_eq!(
        engine_sql("SELECT num, offset FROM UNNEST([10, 20]) AS num WITH OFFSET"),
        "SELECT num.value AS `num`, num.key AS `offset` FROM json_each(json_array(10, 20)) AS num"
    );
}

#[test]
fn test_in_unnest_translation() {
    assert_eq!(
        engine_sql("SELECT id FROM shop.orders WHERE id IN UNNEST(@ids)"),
        "SELECT id FROM `shop.orders` WHERE id IN (SELECT value FROM json_each(@ids))"
    );
}

#[test]
fn test_delete_translation() {
    assert_eq!(
        engine_sql("DELETE shop.orders WHERE id = 1"),
        "DELETE FROM `shop.orders` WHERE id = 1"
    );
}

#[test]
fn test_statement_classification() {
    let translation = translate(
        "CREATE TABLE IF NOT EXISTS shop.items (id INT64); INSERT INTO shop.items (id) VALUES (1); DROP TABLE shop.items",
    )
    .unwrap();
    let kinds: Vec<StatementKind> = translation.statements.iter().map(classify).collect();
    assert_eq!(
        kinds,
        vec![
            StatementKind::CreateTable {
                dataset: "shop".to_string(),
                table: "items".to_string(),
                if_not_exists: true,
            },
            StatementKind::Insert {
                dataset: "shop".to_string(),
                table: "items".to_string(),
            },
            StatementKind::DropTable {
                tables: vec![("shop".to_string(), "items".to_string())],
                if_exists: false,
            },
        ]
    );
}

#[test]
fn test_parse_errors_are_query_errors() {
    let err = translate("SELEC id FROM shop.orders").unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
    assert_eq!(err.reason(), "invalidQuery");
}

#[test]
fn test_catalog_types_for_wildcard() {
    let fields = infer(
        "SELECT * FROM shop.orders",
        &["id", "customer", "total", "placed", "tags", "address"],
        vec![
            NativeValue::Integer(1),
            NativeValue::String("ann".into()),
            NativeValue::Float(20.0),
            NativeValue::String("2024-01-01T00:00:00.000Z".into()),
            NativeValue::String("[]".into()),
            NativeValue::String("{}".into()),
        ],
    );
    let shape: Vec<(&str, TypeTag, Mode)> = fields
        .iter()
        .map(|f| (f.name.as_str(), f.field_type, f.mode))
        .collect();
    assert_eq!(
        shape,
        vec![
            ("id", TypeTag::Integer, Mode::Required),
            ("customer", TypeTag::String, Mode::Nullable),
            ("total", TypeTag::Float, Mode::Nullable),
            ("placed", TypeTag::Timestamp, Mode::Nullable),
            ("tags", TypeTag::String, Mode::Repeated),
            ("address", TypeTag::Struct, Mode::Nullable),
        ]
    );
    assert_eq!(fields[5].fields.len(), 2);
}

#[test]
fn test_catalog_wins_over_first_row_value() {
    // an integral float would otherwise read as INTEGER
    let fields = infer(
        "SELECT total FROM shop.orders",
        &["total"],
        vec![NativeValue::Float(20.0)],
    );
    assert_eq!(fields[0].field_type, TypeTag::Float);
}

#[test]
fn test_unnest_of_catalog_array_column() {
    let fields = infer(
        "SELECT id, tag FROM shop.orders, UNNEST(tags) AS tag",
        &["id", "tag"],
        vec![NativeValue::Integer(1), NativeValue::String("x".into())],
    );
    assert_eq!(fields[1].name, "tag");
    assert_eq!(fields[1].field_type, TypeTag::String);
    assert_eq!(fields[1].mode, Mode::Nullable);
}

#[test]
fn test_derived_table_provenance() {
    let fields = infer(
        "SELECT n, label FROM (SELECT COUNT(*) AS n, UPPER(customer) AS label FROM shop.orders GROUP BY customer) AS s",
        &["n", "label"],
        vec![NativeValue::Integer(2), NativeValue::String("ANN".into())],
    );
    assert_eq!(fields[0].field_type, TypeTag::Integer);
    assert_eq!(fields[1].field_type, TypeTag::String);
}

#[test]
fn test_cte_chain_provenance() {
    let fields = infer(
        "WITH a AS (SELECT placed FROM shop.orders), b AS (SELECT placed AS p FROM a) SELECT p FROM b",
        &["p"],
        vec![NativeValue::String("2024-01-01T00:00:00.000Z".into())],
    );
    assert_eq!(fields[0].field_type, TypeTag::Timestamp);
}

#[test]
fn test_value_fallback_without_evidence() {
    let fields = infer(
        "SELECT json_extract('{\"a\": 1.5}', '$.a') AS a",
        &["a"],
        vec![NativeValue::Float(1.5)],
    );
    assert_eq!(fields[0].field_type, TypeTag::Float);
}

#[test]
fn test_aggregate_and_safe_math_types() {
    let fields = infer(
        "SELECT COUNTIF(total > 5) AS c, AVG(total) AS a, SUM(total) AS s, SAFE_MULTIPLY(id, 2) AS m FROM shop.orders",
        &["c", "a", "s", "m"],
        vec![
            NativeValue::Integer(1),
            NativeValue::Float(3.0),
            NativeValue::Float(6.0),
            NativeValue::Integer(2),
        ],
    );
    let types: Vec<TypeTag> = fields.iter().map(|f| f.field_type).collect();
    assert_eq!(
        types,
        vec![TypeTag::Integer, TypeTag::Float, TypeTag::Float, TypeTag::Integer]
    );
}
