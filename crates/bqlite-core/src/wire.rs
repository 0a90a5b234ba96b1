//! Warehouse REST wire format.
//!
//! Field names follow the warehouse JSON resources (`camelCase`, 64-bit
//! integers as decimal strings).

use serde::{Deserialize, Serialize};

use crate::schema::{FieldSchema, TableSchema};

/// One cell of a result row: `{ "v": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Wire value: scalar, `null`, list of cells or name/value object
    pub v: serde_json::Value,
}

impl Cell {
    /// Wraps a wire value.
    pub fn new(v: serde_json::Value) -> Self {
        Self { v }
    }
}

/// One result row: `{ "f": [cell, ...] }`, positional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    /// Cells in column order
    pub f: Vec<Cell>,
}

/// Error entry of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorProto {
    /// Short error code (`invalidQuery`, `notFound`, ...)
    pub reason: String,
    /// Where the error occurred, empty when unknown
    #[serde(default)]
    pub location: String,
    /// Debugging information
    #[serde(default)]
    pub debug_info: String,
    /// Human-readable message
    pub message: String,
}

/// Identifies a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReference {
    /// Owning project
    pub project_id: String,
    /// Job id
    pub job_id: String,
    /// Processing location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Response of `jobs.query` and `jobs.getQueryResults`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    /// Resource kind
    pub kind: String,
    /// Output column schema
    pub schema: TableSchema,
    /// Job that produced the result
    pub job_reference: JobReference,
    /// Number of rows in the complete result
    pub total_rows: String,
    /// Result rows (possibly one page)
    pub rows: Vec<TableRow>,
    /// Token for the next page, when more rows remain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
    /// Errors, empty on success
    #[serde(default)]
    pub errors: Vec<ErrorProto>,
    /// Always true, execution is synchronous
    pub job_complete: bool,
    /// Always false
    #[serde(default)]
    pub cache_hit: bool,
    /// Rows touched by the last DML statement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_dml_affected_rows: Option<String>,
    /// Bytes processed (always "0")
    #[serde(default)]
    pub total_bytes_processed: String,
    /// Creation time, epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    /// Start time, epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    /// End time, epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}

impl QueryResponse {
    /// Resource kind of a query response.
    pub const KIND: &'static str = "bigquery#queryResponse";

    /// An empty, complete response for `job_reference`.
    pub fn empty(job_reference: JobReference) -> Self {
        Self {
            kind: Self::KIND.to_string(),
            schema: TableSchema::default(),
            job_reference,
            total_rows: "0".to_string(),
            rows: Vec::new(),
            page_token: None,
            errors: Vec::new(),
            job_complete: true,
            cache_hit: false,
            num_dml_affected_rows: None,
            total_bytes_processed: "0".to_string(),
            creation_time: None,
            start_time: None,
            end_time: None,
        }
    }

    /// Field list of the result.
    pub fn fields(&self) -> &[FieldSchema] {
        &self.schema.fields
    }

    /// True when the response carries at least one error.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Scalar, array or struct parameter type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParameterType {
    /// Type name (`INT64`, `STRING`, `ARRAY`, `STRUCT`, ...)
    #[serde(rename = "type")]
    pub type_name: String,
    /// Element type for arrays
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_type: Option<Box<QueryParameterType>>,
    /// Member types for structs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub struct_types: Vec<StructParameterType>,
}

impl QueryParameterType {
    /// A scalar type.
    pub fn scalar<S: Into<String>>(type_name: S) -> Self {
        Self {
            type_name: type_name.into(),
            array_type: None,
            struct_types: Vec::new(),
        }
    }

    /// An array of `element`.
    pub fn array(element: QueryParameterType) -> Self {
        Self {
            type_name: "ARRAY".to_string(),
            array_type: Some(Box::new(element)),
            struct_types: Vec::new(),
        }
    }
}

/// One member of a struct parameter type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructParameterType {
    /// Member name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Member type
    #[serde(rename = "type")]
    pub member_type: QueryParameterType,
}

/// Parameter value, mirroring [`QueryParameterType`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParameterValue {
    /// Scalar value as text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Array elements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_values: Option<Vec<QueryParameterValue>>,
    /// Struct members by name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub struct_values: Option<serde_json::Map<String, serde_json::Value>>,
}

impl QueryParameterValue {
    /// A scalar value.
    pub fn scalar<S: Into<String>>(value: S) -> Self {
        Self {
            value: Some(value.into()),
            ..Default::default()
        }
    }

    /// An array value.
    pub fn array(values: Vec<QueryParameterValue>) -> Self {
        Self {
            array_values: Some(values),
            ..Default::default()
        }
    }
}

/// A query parameter; `name` is absent in positional mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParameter {
    /// Parameter name without the `@`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Declared type
    pub parameter_type: QueryParameterType,
    /// Value
    pub parameter_value: QueryParameterValue,
}

/// Default dataset of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetReference {
    /// Owning project
    #[serde(default)]
    pub project_id: String,
    /// Dataset id
    pub dataset_id: String,
}

/// Body of `jobs.query`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// SQL text
    pub query: String,
    /// `NAMED` or `POSITIONAL`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_mode: Option<String>,
    /// Bound parameters
    #[serde(default)]
    pub query_parameters: Vec<QueryParameter>,
    /// Page size of the first page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,
    /// Legacy SQL flag (only standard SQL is supported)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_legacy_sql: Option<bool>,
    /// Default dataset for unqualified table names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_dataset: Option<DatasetReference>,
    /// Requested location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl QueryRequest {
    /// A request for `query` without parameters.
    pub fn new<S: Into<String>>(query: S) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Adds a named parameter
    pub fn with_param<S: Into<String>>(
        mut self,
        name: S,
        parameter_type: QueryParameterType,
        parameter_value: QueryParameterValue,
    ) -> Self {
        self.parameter_mode = Some("NAMED".to_string());
        self.query_parameters.push(QueryParameter {
            name: Some(name.into()),
            parameter_type,
            parameter_value,
        });
        self
    }

    /// Adds a positional parameter
    pub fn with_positional_param(
        mut self,
        parameter_type: QueryParameterType,
        parameter_value: QueryParameterValue,
    ) -> Self {
        self.parameter_mode = Some("POSITIONAL".to_string());
        self.query_parameters.push(QueryParameter {
            name: None,
            parameter_type,
            parameter_value,
        });
        self
    }
}

/// `configuration.query` of a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfigurationQuery {
    /// SQL text
    pub query: String,
    /// `NAMED` or `POSITIONAL`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_mode: Option<String>,
    /// Bound parameters
    #[serde(default)]
    pub query_parameters: Vec<QueryParameter>,
    /// Legacy SQL flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_legacy_sql: Option<bool>,
}

/// Job configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfiguration {
    /// Query job settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<JobConfigurationQuery>,
}

/// Job state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    /// Always `DONE`
    pub state: String,
    /// Fatal error of the job, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_result: Option<ErrorProto>,
    /// All errors encountered
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorProto>,
}

/// A job resource: the body of `jobs.insert` and the result of `jobs.get`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Resource kind
    #[serde(default = "Job::default_kind")]
    pub kind: String,
    /// `project:jobId`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Job reference (assigned when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_reference: Option<JobReference>,
    /// Configuration
    #[serde(default)]
    pub configuration: JobConfiguration,
    /// Status, present once the job ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
}

impl Job {
    /// Resource kind of a job.
    pub const KIND: &'static str = "bigquery#job";

    fn default_kind() -> String {
        Self::KIND.to_string()
    }

    /// A job body running `query`.
    pub fn query<S: Into<String>>(query: S) -> Self {
        Self {
            kind: Self::default_kind(),
            id: None,
            job_reference: None,
            configuration: JobConfiguration {
                query: Some(JobConfigurationQuery {
                    query: query.into(),
                    ..Default::default()
                }),
            },
            status: None,
        }
    }
}

/// Dataset reference as used in dataset resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    /// Resource kind
    #[serde(default = "Dataset::default_kind")]
    pub kind: String,
    /// `project:dataset`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Reference
    pub dataset_reference: DatasetReference,
    /// Location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Creation time, epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    /// Last modification time, epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_time: Option<String>,
}

impl Dataset {
    /// Resource kind of a dataset.
    pub const KIND: &'static str = "bigquery#dataset";

    fn default_kind() -> String {
        Self::KIND.to_string()
    }

    /// A dataset body for `dataset_id`.
    pub fn new<S: Into<String>>(dataset_id: S) -> Self {
        Self {
            kind: Self::default_kind(),
            id: None,
            dataset_reference: DatasetReference {
                project_id: String::new(),
                dataset_id: dataset_id.into(),
            },
            location: None,
            creation_time: None,
            last_modified_time: None,
        }
    }
}

/// Result of `datasets.list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetList {
    /// Resource kind
    pub kind: String,
    /// Datasets of the project
    pub datasets: Vec<Dataset>,
}

impl DatasetList {
    /// Resource kind of a dataset list.
    pub const KIND: &'static str = "bigquery#datasetList";
}

/// Identifies a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableReference {
    /// Owning project
    #[serde(default)]
    pub project_id: String,
    /// Dataset id
    #[serde(default)]
    pub dataset_id: String,
    /// Table id
    pub table_id: String,
}

/// Schema of a table body: either a field list or a DDL string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableSchemaInput {
    /// `{ "fields": [...] }`
    Fields(TableSchema),
    /// `"id INT64, name STRING"`
    Definition(String),
}

/// A table resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    /// Resource kind
    #[serde(default = "Table::default_kind")]
    pub kind: String,
    /// `project:dataset.table`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Reference
    pub table_reference: TableReference,
    /// Schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<TableSchemaInput>,
    /// Always `TABLE`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub table_type: Option<String>,
    /// Location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Row count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_rows: Option<String>,
    /// Creation time, epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    /// Last modification time, epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_time: Option<String>,
}

impl Table {
    /// Resource kind of a table.
    pub const KIND: &'static str = "bigquery#table";

    fn default_kind() -> String {
        Self::KIND.to_string()
    }

    /// A table body with a field schema.
    pub fn new<S: Into<String>>(table_id: S, fields: Vec<FieldSchema>) -> Self {
        Self {
            kind: Self::default_kind(),
            id: None,
            table_reference: TableReference {
                project_id: String::new(),
                dataset_id: String::new(),
                table_id: table_id.into(),
            },
            schema: Some(TableSchemaInput::Fields(TableSchema::new(fields))),
            table_type: None,
            location: None,
            num_rows: None,
            creation_time: None,
            last_modified_time: None,
        }
    }

    /// A table body whose schema is a DDL definition string.
    pub fn with_definition<S: Into<String>, D: Into<String>>(table_id: S, definition: D) -> Self {
        let mut table = Self::new(table_id, Vec::new());
        table.schema = Some(TableSchemaInput::Definition(definition.into()));
        table
    }
}

/// Result of `tables.list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableList {
    /// Resource kind
    pub kind: String,
    /// Tables of the dataset
    pub tables: Vec<Table>,
    /// Number of tables
    pub total_items: u64,
}

impl TableList {
    /// Resource kind of a table list.
    pub const KIND: &'static str = "bigquery#tableList";
}

/// One row of an `insertAll` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertAllRow {
    /// Deduplication id (ignored)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_id: Option<String>,
    /// Column values by name
    pub json: serde_json::Map<String, serde_json::Value>,
}

/// Body of `tabledata.insertAll`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertAllRequest {
    /// Rows to insert
    #[serde(default)]
    pub rows: Vec<InsertAllRow>,
    /// Insert valid rows even if some rows are invalid
    #[serde(default)]
    pub skip_invalid_rows: bool,
    /// Drop values for unknown columns instead of failing the row
    #[serde(default)]
    pub ignore_unknown_values: bool,
}

impl InsertAllRequest {
    /// Builds a request from JSON objects.
    pub fn from_rows(rows: Vec<serde_json::Map<String, serde_json::Value>>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|json| InsertAllRow { insert_id: None, json })
                .collect(),
            ..Default::default()
        }
    }
}

/// Errors for one rejected row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertErrors {
    /// Row index in the request
    pub index: u64,
    /// Errors
    pub errors: Vec<ErrorProto>,
}

/// Result of `tabledata.insertAll`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertAllResponse {
    /// Resource kind
    pub kind: String,
    /// Rejected rows
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insert_errors: Vec<InsertErrors>,
}

impl InsertAllResponse {
    /// Resource kind of a streaming insert response.
    pub const KIND: &'static str = "bigquery#tableDataInsertAllResponse";
}

/// Result of `tabledata.list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDataList {
    /// Resource kind
    pub kind: String,
    /// Rows in the table
    pub total_rows: String,
    /// Token for the next page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
    /// Rows of this page
    pub rows: Vec<TableRow>,
}

impl TableDataList {
    /// Resource kind of a table data page.
    pub const KIND: &'static str = "bigquery#tableDataList";
}
