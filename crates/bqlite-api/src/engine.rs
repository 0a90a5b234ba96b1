//! The engine handle and query execution.

use std::path::Path;

use bqlite_catalog::{SchemaCatalog, SqliteCatalog};
use bqlite_core::schema::create_table_sql;
use bqlite_core::wire::{JobReference, QueryRequest, QueryResponse};
use bqlite_core::{Error, NativeValue, Result, TableSchema};
use bqlite_sql::dialect::{self, create_table_fields};
use bqlite_sql::{classify, infer_schema, translate, StatementKind, Translation};
use chrono::Utc;
use rusqlite::Connection;
use sqlparser::ast::Statement;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{EngineConfig, StorageMode};
use crate::params::ParameterBinder;
use crate::response::{build_response, error_response, page};
use crate::validation::validate_query;

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn new_job_id() -> String {
    format!("job_{}", Uuid::new_v4().simple())
}

/// Result of the statements of one request.
enum Outcome {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<NativeValue>>,
        statement: usize,
    },
    Affected(usize),
    Done,
}

/// A warehouse emulator over one SQLite database.
///
/// ```rust
/// use bqlite::Engine;
/// use bqlite::wire::QueryRequest;
///
/// let mut engine = Engine::in_memory()?;
/// let response = engine.run_query(&QueryRequest::new("SELECT 1"), "my-project")?;
/// assert_eq!(response.total_rows, "1");
/// assert_eq!(response.fields()[0].name, "f0_");
/// # Ok::<(), bqlite::Error>(())
/// ```
pub struct Engine {
    pub(crate) conn: Connection,
    pub(crate) config: EngineConfig,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Opens an engine with `config`: creates the database if needed,
    /// registers the function library and the catalog tables.
    pub fn open(config: EngineConfig) -> Result<Self> {
        let conn = match &config.storage {
            StorageMode::Memory => Connection::open_in_memory()?,
            StorageMode::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                Connection::open(path)?
            }
        };
        bqlite_functions::register_all(&conn)?;
        SqliteCatalog::new(&conn).init()?;
        info!(storage = ?config.storage, project = %config.default_project, "engine opened");
        Ok(Self { conn, config })
    }

    /// In-memory engine with default configuration
    pub fn in_memory() -> Result<Self> {
        Self::open(EngineConfig::memory())
    }

    /// File-backed engine with default configuration
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(EngineConfig::file(path.as_ref()))
    }

    /// Configuration the engine was opened with
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn catalog(&self) -> SqliteCatalog<'_> {
        SqliteCatalog::new(&self.conn)
    }

    /// `project_id`, or the default project when empty.
    pub(crate) fn project<'a>(&'a self, project_id: &'a str) -> &'a str {
        if project_id.is_empty() {
            &self.config.default_project
        } else {
            project_id
        }
    }

    pub(crate) fn job_reference(&self, project_id: &str, job_id: &str) -> JobReference {
        JobReference {
            project_id: project_id.to_string(),
            job_id: job_id.to_string(),
            location: Some(self.config.location.clone()),
        }
    }

    /// Runs a query and returns the response.
    ///
    /// Parse and engine errors are reported inside the response; catalog
    /// misses, invalid requests and internal failures are returned as `Err`.
    pub fn run_query(&mut self, request: &QueryRequest, project_id: &str) -> Result<QueryResponse> {
        let project = self.project(project_id).to_string();
        let response = self.query_as_job(request, &project, &new_job_id())?;
        Ok(match request.max_results {
            Some(max) => page(&response, 0, Some(max as usize)),
            None => response,
        })
    }

    /// Runs a query under a given job id and returns the full response.
    pub(crate) fn query_as_job(
        &mut self,
        request: &QueryRequest,
        project: &str,
        job_id: &str,
    ) -> Result<QueryResponse> {
        validate_query(&request.query)?;
        let job_reference = self.job_reference(project, job_id);
        let started = now_millis();

        let result = if request.use_legacy_sql == Some(true) {
            Err(Error::InvalidOperation(
                "Legacy SQL queries are not supported".to_string(),
            ))
        } else {
            translate(&request.query).and_then(|translation| {
                let outcome = self.execute(&translation, request, project)?;
                Ok((translation, outcome))
            })
        };

        let mut response = match result {
            Ok((translation, outcome)) => self.respond(&translation, outcome, job_reference),
            Err(e) if e.is_query_error() => {
                warn!(error = %e, job_id = %job_id, "query failed");
                error_response(job_reference, &e)
            }
            Err(e) => return Err(e),
        };
        response.creation_time = Some(started.to_string());
        response.start_time = Some(started.to_string());
        response.end_time = Some(now_millis().to_string());
        debug!(
            job_id = %job_id,
            rows = response.rows.len(),
            elapsed_ms = now_millis() - started,
            "query finished"
        );
        Ok(response)
    }

    fn respond(
        &self,
        translation: &Translation,
        outcome: Outcome,
        job_reference: JobReference,
    ) -> QueryResponse {
        match outcome {
            Outcome::Rows {
                columns,
                rows,
                statement,
            } => {
                let fields = match rows.first() {
                    Some(first) => infer_schema(
                        &columns,
                        Some(first.as_slice()),
                        translation.statements.get(statement),
                        &self.catalog(),
                        translation.table_ref(),
                    ),
                    None => Vec::new(),
                };
                build_response(&columns, &rows, &fields, job_reference)
            }
            Outcome::Affected(count) => {
                let mut response = QueryResponse::empty(job_reference);
                response.num_dml_affected_rows = Some(count.to_string());
                response
            }
            Outcome::Done => QueryResponse::empty(job_reference),
        }
    }

    /// Runs every statement in order. There is no wrapping transaction: a
    /// failing statement leaves the earlier ones applied.
    fn execute(
        &self,
        translation: &Translation,
        request: &QueryRequest,
        project: &str,
    ) -> Result<Outcome> {
        let mut binder =
            ParameterBinder::new(&request.query_parameters, request.parameter_mode.as_deref())?;
        let mut rows_outcome = None;
        let mut affected = None;

        for (index, statement) in translation.statements.iter().enumerate() {
            match classify(statement) {
                StatementKind::CreateTable {
                    dataset,
                    table,
                    if_not_exists,
                } => {
                    if let Statement::CreateTable(create) = statement {
                        let fields = create_table_fields(create)?;
                        self.create_engine_table(project, &dataset, &table, fields, if_not_exists)?;
                    }
                    continue;
                }
                StatementKind::Insert { dataset, table } => {
                    if !self.catalog().table_exists(Some(project), &dataset, &table)? {
                        return Err(Error::NotFound(format!(
                            "Table {}:{}.{}",
                            project, dataset, table
                        )));
                    }
                }
                StatementKind::DropTable { tables, if_exists } => {
                    for (dataset, table) in tables {
                        self.drop_engine_table(project, &dataset, &table, if_exists)?;
                    }
                    continue;
                }
                StatementKind::Other => {}
            }

            let sql = dialect::to_sql(statement);
            debug!(sql = %sql, "executing statement");
            let mut stmt = self.conn.prepare(&sql)?;
            binder.bind(&mut stmt)?;
            if stmt.column_count() > 0 {
                let columns: Vec<String> =
                    stmt.column_names().into_iter().map(str::to_string).collect();
                let mut rows = Vec::new();
                let mut cursor = stmt.raw_query();
                while let Some(row) = cursor.next()? {
                    let values = (0..columns.len())
                        .map(|i| row.get_ref(i).map(NativeValue::from))
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    rows.push(values);
                }
                rows_outcome = Some(Outcome::Rows {
                    columns,
                    rows,
                    statement: index,
                });
            } else {
                affected = Some(stmt.raw_execute()?);
            }
        }

        Ok(rows_outcome
            .or(affected.map(Outcome::Affected))
            .unwrap_or(Outcome::Done))
    }

    /// Creates the engine table for `dataset.table` and registers its schema.
    pub(crate) fn create_engine_table(
        &self,
        project: &str,
        dataset: &str,
        table: &str,
        fields: Vec<bqlite_core::FieldSchema>,
        if_not_exists: bool,
    ) -> Result<()> {
        let catalog = self.catalog();
        if !catalog.dataset_exists(Some(project), dataset)? {
            return Err(Error::NotFound(format!("Dataset {}:{}", project, dataset)));
        }
        if if_not_exists && catalog.table_exists(Some(project), dataset, table)? {
            debug!(dataset = %dataset, table = %table, "table exists, skipping create");
            return Ok(());
        }
        let schema = TableSchema::new(fields);
        schema.validate()?;
        catalog.register_table(project, dataset, table, &schema)?;
        // Engine tables are keyed by `dataset.table` only, shared across projects.
        let ddl = create_table_sql(dataset, table, &schema.fields);
        debug!(sql = %ddl, "creating engine table");
        if let Err(e) = self.conn.execute_batch(&ddl) {
            catalog.delete_table(project, dataset, table)?;
            return Err(e.into());
        }
        Ok(())
    }

    /// Drops the engine table for `dataset.table` and its registration.
    pub(crate) fn drop_engine_table(
        &self,
        project: &str,
        dataset: &str,
        table: &str,
        if_exists: bool,
    ) -> Result<()> {
        let catalog = self.catalog();
        if !catalog.delete_table(project, dataset, table)? && !if_exists {
            return Err(Error::NotFound(format!(
                "Table {}:{}.{}",
                project, dataset, table
            )));
        }
        self.conn
            .execute_batch(&format!("DROP TABLE IF EXISTS `{}.{}`", dataset, table))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_literal_select() {
        let mut engine = Engine::in_memory().unwrap();
        let response = engine.run_query(&QueryRequest::new("SELECT 1"), "").unwrap();
        assert_eq!(response.job_reference.project_id, "test-project");
        assert!(response.job_reference.job_id.starts_with("job_"));
        assert_eq!(response.fields()[0].name, "f0_");
        assert_eq!(response.rows[0].f[0].v, json!("1"));
        assert!(response.creation_time.is_some());
    }

    #[test]
    fn test_parse_error_in_response() {
        let mut engine = Engine::in_memory().unwrap();
        let response = engine.run_query(&QueryRequest::new("SELEC 1"), "p").unwrap();
        assert!(response.job_complete);
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].reason, "invalidQuery");
        assert!(response.rows.is_empty());
    }

    #[test]
    fn test_engine_error_in_response() {
        let mut engine = Engine::in_memory().unwrap();
        let response = engine
            .run_query(&QueryRequest::new("SELECT * FROM missing.table_x"), "p")
            .unwrap();
        assert_eq!(response.errors[0].reason, "invalidQuery");
    }

    #[test]
    fn test_legacy_sql_rejected() {
        let mut engine = Engine::in_memory().unwrap();
        let mut request = QueryRequest::new("SELECT 1");
        request.use_legacy_sql = Some(true);
        let response = engine.run_query(&request, "p").unwrap();
        assert!(response.has_errors());
    }

    #[test]
    fn test_empty_query_is_invalid() {
        let mut engine = Engine::in_memory().unwrap();
        let err = engine.run_query(&QueryRequest::new("  "), "p").unwrap_err();
        assert_eq!(err.reason(), "invalid");
    }

    #[test]
    fn test_create_table_without_dataset() {
        let mut engine = Engine::in_memory().unwrap();
        let err = engine
            .run_query(&QueryRequest::new("CREATE TABLE nope.t (id INT64)"), "p")
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_max_results_pages_response() {
        let mut engine = Engine::in_memory().unwrap();
        let mut request = QueryRequest::new("SELECT n FROM UNNEST([1, 2, 3]) AS n");
        request.max_results = Some(2);
        let response = engine.run_query(&request, "p").unwrap();
        assert_eq!(response.rows.len(), 2);
        assert_eq!(response.total_rows, "3");
        assert_eq!(response.page_token.as_deref(), Some("2"));
    }
}
