//! Query response assembly and paging.

use bqlite_core::wire::{Cell, JobReference, QueryResponse, TableRow};
use bqlite_core::{Error, FieldSchema, NativeValue, Result, TableSchema, TypeTag};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::coerce::coerce_value;

/// Paging of result and table-data reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageOptions {
    /// First row to return
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_index: Option<usize>,
    /// Maximum rows per page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
    /// Token from a previous page; takes precedence over `start_index`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
}

impl PageOptions {
    /// Pages of `max_results` rows
    pub fn with_max_results(max_results: usize) -> Self {
        Self {
            max_results: Some(max_results),
            ..Default::default()
        }
    }

    /// Continue from `token`
    pub fn with_page_token<S: Into<String>>(mut self, token: S) -> Self {
        self.page_token = Some(token.into());
        self
    }

    /// Start row of the page.
    pub fn start(&self) -> Result<usize> {
        match self.page_token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => token
                .parse()
                .map_err(|_| Error::InvalidInput(format!("Invalid page token '{}'", token))),
            None => Ok(self.start_index.unwrap_or(0)),
        }
    }
}

/// Renders one row in field order. Missing cells are `null`.
pub fn table_row(values: &[NativeValue], fields: &[FieldSchema]) -> TableRow {
    TableRow {
        f: fields
            .iter()
            .enumerate()
            .map(|(i, field)| {
                let value = values.get(i).unwrap_or(&NativeValue::Null);
                Cell::new(coerce_value(value, field))
            })
            .collect(),
    }
}

/// Builds the response envelope for a row-returning statement.
///
/// With zero rows the field list stays empty. Columns without a field are
/// declared as STRING.
pub fn build_response(
    columns: &[String],
    rows: &[Vec<NativeValue>],
    fields: &[FieldSchema],
    job_reference: JobReference,
) -> QueryResponse {
    let mut response = QueryResponse::empty(job_reference);
    if rows.is_empty() {
        return response;
    }
    let mut fields = fields.to_vec();
    if fields.len() != columns.len() {
        warn!(
            columns = columns.len(),
            fields = fields.len(),
            "field count does not match column count"
        );
        fields.truncate(columns.len());
        for column in &columns[fields.len()..] {
            fields.push(FieldSchema::new(column.clone(), TypeTag::String));
        }
    }
    response.rows = rows.iter().map(|row| table_row(row, &fields)).collect();
    response.total_rows = rows.len().to_string();
    response.schema = TableSchema::new(fields);
    response
}

/// A response carrying a single query error.
pub fn error_response(job_reference: JobReference, error: &Error) -> QueryResponse {
    let mut response = QueryResponse::empty(job_reference);
    response.errors.push(error.to_error_proto());
    response
}

/// Slices the rows of `response` to one page. `pageToken` is set to the next
/// start index while rows remain.
pub fn page(response: &QueryResponse, start_index: usize, max_results: Option<usize>) -> QueryResponse {
    let mut paged = response.clone();
    let total = response.rows.len();
    let start = start_index.min(total);
    let end = max_results.map_or(total, |max| start.saturating_add(max).min(total));
    paged.rows = response.rows[start..end].to_vec();
    paged.page_token = (end < total).then(|| end.to_string());
    paged
}
