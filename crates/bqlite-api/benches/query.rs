//! End-to-end query latency and streaming insert throughput.

use std::hint::black_box;

use bqlite::wire::{Dataset, InsertAllRequest, QueryRequest, Table};
use bqlite::Engine;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use serde_json::{json, Map, Value};

const PROJECT: &str = "bench";

fn rows(count: usize) -> Vec<Map<String, Value>> {
    (0..count)
        .filter_map(|i| {
            json!({
                "id": i,
                "name": format!("user{}", i),
                "ts": "2024-01-01T00:00:00Z",
                "tags": ["a", "b"],
            })
            .as_object()
            .cloned()
        })
        .collect()
}

fn seeded_engine(row_count: usize) -> Option<Engine> {
    let mut engine = Engine::in_memory().ok()?;
    engine.create_dataset(PROJECT, &Dataset::new("bench")).ok()?;
    engine
        .create_table(
            PROJECT,
            "bench",
            &Table::with_definition(
                "events",
                "id INT64, name STRING, ts TIMESTAMP, tags ARRAY<STRING>",
            ),
        )
        .ok()?;
    engine
        .insert_all(
            PROJECT,
            "bench",
            "events",
            &InsertAllRequest::from_rows(rows(row_count)),
        )
        .ok()?;
    Some(engine)
}

fn bench_queries(c: &mut Criterion) {
    let Some(mut engine) = seeded_engine(1_000) else {
        return;
    };
    let queries = [
        ("literal", "SELECT 1"),
        ("scan", "SELECT id, name, ts FROM bench.events"),
        (
            "aggregate",
            "SELECT COUNTIF(id > 500) AS big, SUM(id) AS total FROM bench.events",
        ),
        (
            "unnest",
            "SELECT id, tag FROM bench.events, UNNEST(tags) AS tag WHERE id < 100",
        ),
    ];
    for (name, sql) in queries {
        let request = QueryRequest::new(sql);
        c.bench_function(&format!("query/{}", name), |b| {
            b.iter(|| black_box(engine.run_query(black_box(&request), PROJECT)))
        });
    }
}

fn bench_insert_all(c: &mut Criterion) {
    let request = InsertAllRequest::from_rows(rows(100));
    c.bench_function("insert_all/100_rows", |b| {
        b.iter_batched(
            || seeded_engine(0),
            |engine| {
                if let Some(mut engine) = engine {
                    black_box(engine.insert_all(PROJECT, "bench", "events", &request)).ok();
                }
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_queries, bench_insert_all);
criterion_main!(benches);
