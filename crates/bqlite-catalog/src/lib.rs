//! # bqlite Catalog
//!
//! Metadata for datasets, tables and jobs.
//!
//! Query translation only needs declared table schemas, which it reads
//! through the [`SchemaCatalog`] trait. [`SqliteCatalog`] keeps everything in
//! bookkeeping tables inside the engine database; [`MemoryCatalog`] is a
//! plain map for tests and tools.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod memory;
mod sqlite;

pub use memory::MemoryCatalog;
pub use sqlite::SqliteCatalog;

use bqlite_core::{Result, TableSchema};
use serde::{Deserialize, Serialize};

/// Read/write access to declared table schemas.
///
/// A `project` of `None` matches any project.
pub trait SchemaCatalog {
    /// Declared schema of `dataset.table`, if the table is registered.
    fn table_schema(
        &self,
        project: Option<&str>,
        dataset: &str,
        table: &str,
    ) -> Result<Option<TableSchema>>;

    /// Registers or replaces the schema of `dataset.table`.
    fn put_table_schema(
        &mut self,
        project: &str,
        dataset: &str,
        table: &str,
        schema: &TableSchema,
    ) -> Result<()>;

    /// True when `dataset.table` is registered.
    fn table_exists(&self, project: Option<&str>, dataset: &str, table: &str) -> Result<bool> {
        Ok(self.table_schema(project, dataset, table)?.is_some())
    }

    /// True when `dataset` is registered.
    fn dataset_exists(&self, project: Option<&str>, dataset: &str) -> Result<bool>;
}

/// A registered dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    /// Owning project
    pub project_id: String,
    /// Dataset id
    pub dataset_id: String,
    /// Creation time, epoch milliseconds
    pub created_at: i64,
    /// Last modification time, epoch milliseconds
    pub updated_at: i64,
}

/// A registered table and its declared schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    /// Owning project
    pub project_id: String,
    /// Dataset id
    pub dataset_id: String,
    /// Table id
    pub table_id: String,
    /// Declared schema
    pub schema: TableSchema,
    /// Creation time, epoch milliseconds
    pub created_at: i64,
    /// Last modification time, epoch milliseconds
    pub updated_at: i64,
}

impl TableRecord {
    /// Name of the engine table backing this table.
    ///
    /// The project is not part of the name: `p1:d.t` and `p2:d.t` share one
    /// engine table, and unqualified schema lookups may find either record.
    pub fn engine_table(&self) -> String {
        format!("{}.{}", self.dataset_id, self.table_id)
    }
}

/// A stored job: the response it produced, kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Owning project
    pub project_id: String,
    /// Job id
    pub job_id: String,
    /// Stored query response document
    pub response: serde_json::Value,
    /// Creation time, epoch milliseconds
    pub created_at: i64,
}
