use bqlite_core::{Error, Result, TableSchema};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use crate::{DatasetRecord, JobRecord, SchemaCatalog, TableRecord};

const CATALOG_DDL: &str = "
CREATE TABLE IF NOT EXISTS _bq_datasets (
    project_id TEXT NOT NULL,
    dataset_id TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (project_id, dataset_id)
);
CREATE TABLE IF NOT EXISTS _bq_tables (
    project_id TEXT NOT NULL,
    dataset_id TEXT NOT NULL,
    table_id TEXT NOT NULL,
    schema JSON NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (project_id, dataset_id, table_id)
);
CREATE TABLE IF NOT EXISTS _bq_jobs (
    project_id TEXT NOT NULL,
    job_id TEXT NOT NULL,
    response JSON NOT NULL,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (project_id, job_id)
);
";

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn dataset_from_row(row: &Row<'_>) -> rusqlite::Result<DatasetRecord> {
    Ok(DatasetRecord {
        project_id: row.get(0)?,
        dataset_id: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

struct RawTable {
    project_id: String,
    dataset_id: String,
    table_id: String,
    schema: String,
    created_at: i64,
    updated_at: i64,
}

impl RawTable {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<RawTable> {
        Ok(RawTable {
            project_id: row.get(0)?,
            dataset_id: row.get(1)?,
            table_id: row.get(2)?,
            schema: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn decode(self) -> Result<TableRecord> {
        Ok(TableRecord {
            schema: serde_json::from_str(&self.schema)?,
            project_id: self.project_id,
            dataset_id: self.dataset_id,
            table_id: self.table_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const TABLE_COLUMNS: &str = "project_id, dataset_id, table_id, schema, created_at, updated_at";

/// Catalog stored in `_bq_*` tables of the engine database.
pub struct SqliteCatalog<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteCatalog<'c> {
    /// Wraps a connection. Call [`SqliteCatalog::init`] once per database.
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Creates the bookkeeping tables if they do not exist.
    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(CATALOG_DDL)?;
        Ok(())
    }

    /// Registers a dataset.
    pub fn create_dataset(&self, project: &str, dataset: &str) -> Result<DatasetRecord> {
        if self.get_dataset(project, dataset)?.is_some() {
            return Err(Error::AlreadyExists(format!("Dataset {}:{}", project, dataset)));
        }
        let now = now_millis();
        self.conn.execute(
            "INSERT INTO _bq_datasets (project_id, dataset_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
            params![project, dataset, now],
        )?;
        info!(project = %project, dataset = %dataset, "dataset created");
        Ok(DatasetRecord {
            project_id: project.to_string(),
            dataset_id: dataset.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Looks up a dataset.
    pub fn get_dataset(&self, project: &str, dataset: &str) -> Result<Option<DatasetRecord>> {
        Ok(self
            .conn
            .query_row(
                "SELECT project_id, dataset_id, created_at, updated_at FROM _bq_datasets
                 WHERE project_id = ?1 AND dataset_id = ?2",
                params![project, dataset],
                dataset_from_row,
            )
            .optional()?)
    }

    /// Datasets of a project, ordered by id.
    pub fn list_datasets(&self, project: &str) -> Result<Vec<DatasetRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT project_id, dataset_id, created_at, updated_at FROM _bq_datasets
             WHERE project_id = ?1 ORDER BY dataset_id",
        )?;
        let rows = stmt.query_map(params![project], dataset_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Removes a dataset and its table registrations. Returns the removed
    /// tables so the caller can drop their engine tables.
    pub fn delete_dataset(&self, project: &str, dataset: &str) -> Result<Vec<TableRecord>> {
        if self.get_dataset(project, dataset)?.is_none() {
            return Err(Error::NotFound(format!("Dataset {}:{}", project, dataset)));
        }
        let tables = self.list_tables(project, dataset)?;
        self.conn.execute(
            "DELETE FROM _bq_tables WHERE project_id = ?1 AND dataset_id = ?2",
            params![project, dataset],
        )?;
        self.conn.execute(
            "DELETE FROM _bq_datasets WHERE project_id = ?1 AND dataset_id = ?2",
            params![project, dataset],
        )?;
        info!(project = %project, dataset = %dataset, tables = tables.len(), "dataset deleted");
        Ok(tables)
    }

    /// Registers a new table. The dataset must exist.
    pub fn register_table(
        &self,
        project: &str,
        dataset: &str,
        table: &str,
        schema: &TableSchema,
    ) -> Result<TableRecord> {
        if self.get_dataset(project, dataset)?.is_none() {
            return Err(Error::NotFound(format!("Dataset {}:{}", project, dataset)));
        }
        if self.get_table(project, dataset, table)?.is_some() {
            return Err(Error::AlreadyExists(format!(
                "Table {}:{}.{}",
                project, dataset, table
            )));
        }
        let now = now_millis();
        self.conn.execute(
            "INSERT INTO _bq_tables (project_id, dataset_id, table_id, schema, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![project, dataset, table, serde_json::to_string(schema)?, now],
        )?;
        info!(project = %project, dataset = %dataset, table = %table, "table registered");
        Ok(TableRecord {
            project_id: project.to_string(),
            dataset_id: dataset.to_string(),
            table_id: table.to_string(),
            schema: schema.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Looks up a table.
    pub fn get_table(&self, project: &str, dataset: &str, table: &str) -> Result<Option<TableRecord>> {
        self.find_table(Some(project), dataset, table)
    }

    fn find_table(
        &self,
        project: Option<&str>,
        dataset: &str,
        table: &str,
    ) -> Result<Option<TableRecord>> {
        let raw = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM _bq_tables
                     WHERE (?1 IS NULL OR project_id = ?1) AND dataset_id = ?2 AND table_id = ?3
                     LIMIT 1",
                    TABLE_COLUMNS
                ),
                params![project, dataset, table],
                RawTable::from_row,
            )
            .optional()?;
        raw.map(RawTable::decode).transpose()
    }

    /// Tables of a dataset, ordered by id.
    pub fn list_tables(&self, project: &str, dataset: &str) -> Result<Vec<TableRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM _bq_tables WHERE project_id = ?1 AND dataset_id = ?2 ORDER BY table_id",
            TABLE_COLUMNS
        ))?;
        let raws = stmt
            .query_map(params![project, dataset], RawTable::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawTable::decode).collect()
    }

    /// Removes a table registration. Returns false when it was absent.
    pub fn delete_table(&self, project: &str, dataset: &str, table: &str) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM _bq_tables WHERE project_id = ?1 AND dataset_id = ?2 AND table_id = ?3",
            params![project, dataset, table],
        )?;
        if removed > 0 {
            info!(project = %project, dataset = %dataset, table = %table, "table unregistered");
        }
        Ok(removed > 0)
    }

    /// Stores the response of a finished job.
    pub fn put_job(&self, project: &str, job_id: &str, response: &serde_json::Value) -> Result<JobRecord> {
        let now = now_millis();
        self.conn.execute(
            "INSERT INTO _bq_jobs (project_id, job_id, response, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![project, job_id, response.to_string(), now],
        )?;
        Ok(JobRecord {
            project_id: project.to_string(),
            job_id: job_id.to_string(),
            response: response.clone(),
            created_at: now,
        })
    }

    /// Looks up a stored job.
    pub fn get_job(&self, project: &str, job_id: &str) -> Result<Option<JobRecord>> {
        let raw = self
            .conn
            .query_row(
                "SELECT project_id, job_id, response, created_at FROM _bq_jobs
                 WHERE project_id = ?1 AND job_id = ?2",
                params![project, job_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;
        match raw {
            Some((project_id, job_id, response, created_at)) => Ok(Some(JobRecord {
                project_id,
                job_id,
                response: serde_json::from_str(&response)?,
                created_at,
            })),
            None => Ok(None),
        }
    }
}

impl SchemaCatalog for SqliteCatalog<'_> {
    fn table_schema(
        &self,
        project: Option<&str>,
        dataset: &str,
        table: &str,
    ) -> Result<Option<TableSchema>> {
        Ok(self.find_table(project, dataset, table)?.map(|record| record.schema))
    }

    fn put_table_schema(
        &mut self,
        project: &str,
        dataset: &str,
        table: &str,
        schema: &TableSchema,
    ) -> Result<()> {
        let now = now_millis();
        self.conn.execute(
            "INSERT INTO _bq_tables (project_id, dataset_id, table_id, schema, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT (project_id, dataset_id, table_id)
             DO UPDATE SET schema = excluded.schema, updated_at = excluded.updated_at",
            params![project, dataset, table, serde_json::to_string(schema)?, now],
        )?;
        Ok(())
    }

    fn dataset_exists(&self, project: Option<&str>, dataset: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM _bq_datasets WHERE (?1 IS NULL OR project_id = ?1) AND dataset_id = ?2 LIMIT 1",
                params![project, dataset],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
