//! Translation throughput for typical query shapes.

use std::hint::black_box;

use bqlite_catalog::MemoryCatalog;
use bqlite_core::schema::parse_schema;
use bqlite_core::{NativeValue, TableSchema};
use bqlite_sql::{infer_schema, translate};
use criterion::{criterion_group, criterion_main, Criterion};

const QUERIES: &[(&str, &str)] = &[
    ("simple", "SELECT id, name FROM analytics.events WHERE id > 10"),
    (
        "unnest",
        "SELECT num, offset FROM UNNEST([10, 20, 30]) AS num WITH OFFSET ORDER BY offset",
    ),
    (
        "temporal",
        "SELECT TIMESTAMP_TRUNC(TIMESTAMP '2023-12-25 10:30:45', DAY) AS d, DATE_ADD('2024-01-31', INTERVAL 1 MONTH) AS m",
    ),
    (
        "cte",
        "WITH t AS (SELECT id, [1, 2] AS tags FROM analytics.events) SELECT id, tag FROM t, UNNEST(t.tags) AS tag",
    ),
];

fn bench_translate(c: &mut Criterion) {
    for (name, sql) in QUERIES {
        c.bench_function(&format!("translate/{}", name), |b| {
            b.iter(|| black_box(translate(black_box(sql))))
        });
    }
}

fn bench_infer(c: &mut Criterion) {
    let catalog = MemoryCatalog::new().with_table(
        "bench",
        "analytics",
        "events",
        TableSchema::new(
            parse_schema("id INT64, name STRING, ts TIMESTAMP, tags ARRAY<STRING>")
                .unwrap_or_default(),
        ),
    );
    let Ok(translation) = translate("SELECT * FROM analytics.events") else {
        return;
    };
    let columns: Vec<String> = ["id", "name", "ts", "tags"].iter().map(|c| c.to_string()).collect();
    let row = vec![
        NativeValue::Integer(1),
        NativeValue::String("a".to_string()),
        NativeValue::String("2024-01-01T00:00:00.000Z".to_string()),
        NativeValue::String("[]".to_string()),
    ];

    c.bench_function("infer/catalog_wildcard", |b| {
        b.iter(|| {
            black_box(infer_schema(
                &columns,
                Some(&row),
                translation.statements.last(),
                &catalog,
                translation.table_ref(),
            ))
        })
    });
}

criterion_group!(benches, bench_translate, bench_infer);
criterion_main!(benches);
