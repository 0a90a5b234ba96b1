// Common test utilities for engine integration tests

use std::path::PathBuf;

use bqlite::wire::{Dataset, QueryRequest, QueryResponse};
use bqlite::{Engine, EngineConfig};
use serde_json::Value;
use tempfile::TempDir;

pub const PROJECT: &str = "test-project";
pub const DATASET: &str = "d";

/// Test fixture that places a database file in a temporary directory
pub struct EngineFixture {
    #[allow(dead_code)]
    pub temp_dir: TempDir,
    pub db_path: PathBuf,
}

impl EngineFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("data").join("warehouse.db");
        Self { temp_dir, db_path }
    }

    /// Opens (or reopens) the file-backed engine
    pub fn open(&self) -> Engine {
        Engine::open(EngineConfig::file(&self.db_path).with_project(PROJECT))
            .expect("Failed to open engine")
    }

    /// Opens the engine with dataset `d` created
    #[allow(dead_code)]
    pub fn seeded(&self) -> Engine {
        let mut engine = self.open();
        engine
            .create_dataset(PROJECT, &Dataset::new(DATASET))
            .expect("Failed to create dataset");
        engine
    }
}

impl Default for EngineFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `sql` and fails the test on an `Err` or on errors in the response
#[allow(dead_code)]
pub fn query(engine: &mut Engine, sql: &str) -> QueryResponse {
    let response = engine
        .run_query(&QueryRequest::new(sql), PROJECT)
        .expect("Failed to run query");
    assert!(
        !response.has_errors(),
        "query {:?} failed: {:?}",
        sql,
        response.errors
    );
    response
}

/// Cell values of a response, row by row
#[allow(dead_code)]
pub fn cells(response: &QueryResponse) -> Vec<Vec<Value>> {
    response
        .rows
        .iter()
        .map(|row| row.f.iter().map(|cell| cell.v.clone()).collect())
        .collect()
}

/// `(name, type)` pairs of the response schema
#[allow(dead_code)]
pub fn field_types(response: &QueryResponse) -> Vec<(String, &'static str)> {
    response
        .fields()
        .iter()
        .map(|field| (field.name.clone(), field.field_type.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_database_file() {
        let fixture = EngineFixture::new();
        let _engine = fixture.open();
        assert!(fixture.db_path.exists());
    }
}
