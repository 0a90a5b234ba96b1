#![no_main]

use arbitrary::Arbitrary;
use bqlite::wire::{Dataset, InsertAllRequest, QueryRequest, Table};
use bqlite::Engine;
use libfuzzer_sys::fuzz_target;
use serde_json::{Map, Value};

#[derive(Arbitrary, Debug)]
enum EngineOp {
    Query { sql: String },
    Insert { id: i64, name: String, flag: bool },
    List { max_results: u8 },
}

fuzz_target!(|ops: Vec<EngineOp>| {
    let Ok(mut engine) = Engine::in_memory() else {
        return;
    };
    if engine.create_dataset("fuzz", &Dataset::new("d")).is_err()
        || engine
            .create_table("fuzz", "d", &Table::with_definition("t", "id INT64, name STRING, flag BOOL"))
            .is_err()
    {
        return;
    }

    // Limit operations to prevent timeout
    for op in ops.iter().take(50) {
        match op {
            EngineOp::Query { sql } => {
                if sql.len() <= 1024 {
                    let _ = engine.run_query(&QueryRequest::new(sql.as_str()), "fuzz");
                }
            }
            EngineOp::Insert { id, name, flag } => {
                let mut row = Map::new();
                row.insert("id".to_string(), Value::from(*id));
                row.insert("name".to_string(), Value::from(name.as_str()));
                row.insert("flag".to_string(), Value::from(*flag));
                let _ = engine.insert_all("fuzz", "d", "t", &InsertAllRequest::from_rows(vec![row]));
            }
            EngineOp::List { max_results } => {
                let options = bqlite::PageOptions::with_max_results(usize::from(*max_results));
                let _ = engine.list_table_data("fuzz", "d", "t", &options);
            }
        }
    }
});
