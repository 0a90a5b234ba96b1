//! `tabledata.*` operations: streaming inserts and row listing.

use bqlite_core::temporal::{
    format_timestamp_iso, from_epoch_seconds, normalize_date, normalize_datetime,
    normalize_timestamp,
};
use bqlite_core::wire::{InsertAllRequest, InsertAllResponse, InsertErrors, TableDataList};
use bqlite_core::{Error, FieldSchema, Mode, NativeValue, Result, TypeTag};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::engine::Engine;
use crate::response::{table_row, PageOptions};

/// Engine value stored for a JSON cell of a streamed row.
///
/// Arrays and records become JSON text; temporal values are normalized to
/// their stored text forms.
fn storage_value(value: &Value, field: &FieldSchema) -> NativeValue {
    if value.is_null() {
        return NativeValue::Null;
    }
    if field.is_repeated() || field.is_record() || value.is_array() || value.is_object() {
        return NativeValue::String(value.to_string());
    }
    let normalized = match (field.field_type, value) {
        (TypeTag::Timestamp, Value::String(s)) => normalize_timestamp(s),
        (TypeTag::Timestamp, Value::Number(n)) => n
            .as_f64()
            .and_then(from_epoch_seconds)
            .map(|dt| format_timestamp_iso(&dt)),
        (TypeTag::Date, Value::String(s)) => normalize_date(s),
        (TypeTag::Datetime, Value::String(s)) => normalize_datetime(s),
        (TypeTag::Bool, Value::String(s)) => {
            return NativeValue::from_json(value)
                .truthy()
                .map_or_else(|| NativeValue::String(s.clone()), NativeValue::Bool);
        }
        _ => return NativeValue::from_json(value),
    };
    match normalized {
        Some(text) => NativeValue::String(text),
        None => {
            warn!(field = %field.name, value = %value, "temporal value does not parse, storing as-is");
            NativeValue::from_json(value)
        }
    }
}

fn row_values(
    json: &Map<String, Value>,
    fields: &[FieldSchema],
    ignore_unknown_values: bool,
) -> Result<Vec<NativeValue>> {
    if !ignore_unknown_values {
        if let Some(unknown) = json.keys().find(|key| !fields.iter().any(|f| &f.name == *key)) {
            return Err(Error::InvalidInput(format!("no such field: {}", unknown)));
        }
    }
    fields
        .iter()
        .map(|field| {
            let value = json.get(&field.name).unwrap_or(&Value::Null);
            if value.is_null() && field.mode == Mode::Required {
                return Err(Error::InvalidInput(format!(
                    "Missing required field: {}",
                    field.name
                )));
            }
            Ok(storage_value(value, field))
        })
        .collect()
}

fn column_list(fields: &[FieldSchema]) -> String {
    fields
        .iter()
        .map(|f| format!("`{}`", f.name))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Engine {
    /// Streams rows into a table, in schema field order.
    ///
    /// Invalid rows are reported by index. Unless `skipInvalidRows` is set,
    /// one invalid row rejects the whole request.
    pub fn insert_all(
        &mut self,
        project_id: &str,
        dataset_id: &str,
        table_id: &str,
        request: &InsertAllRequest,
    ) -> Result<InsertAllResponse> {
        let project = self.project(project_id).to_string();
        let record = self.table_record(&project, dataset_id, table_id)?;
        let fields = &record.schema.fields;

        let mut insert_errors = Vec::new();
        let mut rows = Vec::with_capacity(request.rows.len());
        for (index, row) in request.rows.iter().enumerate() {
            match row_values(&row.json, fields, request.ignore_unknown_values) {
                Ok(values) => rows.push(values),
                Err(e) => insert_errors.push(InsertErrors {
                    index: index as u64,
                    errors: vec![e.to_error_proto()],
                }),
            }
        }
        if !insert_errors.is_empty() {
            warn!(
                table = %record.engine_table(),
                rejected = insert_errors.len(),
                "insertAll rows rejected"
            );
        }

        if insert_errors.is_empty() || request.skip_invalid_rows {
            let placeholders = vec!["?"; fields.len()].join(", ");
            let sql = format!(
                "INSERT INTO `{}` ({}) VALUES ({})",
                record.engine_table(),
                column_list(fields),
                placeholders
            );
            let tx = self.conn.transaction()?;
            {
                let mut stmt = tx.prepare(&sql)?;
                for values in &rows {
                    stmt.execute(rusqlite::params_from_iter(values.iter()))?;
                }
            }
            tx.commit()?;
            debug!(table = %record.engine_table(), rows = rows.len(), "rows streamed");
        }

        Ok(InsertAllResponse {
            kind: InsertAllResponse::KIND.to_string(),
            insert_errors,
        })
    }

    /// Lists table rows in insertion order, rendered with the cell coercion
    /// rules of the table schema.
    pub fn list_table_data(
        &self,
        project_id: &str,
        dataset_id: &str,
        table_id: &str,
        options: &PageOptions,
    ) -> Result<TableDataList> {
        let record = self.table_record(self.project(project_id), dataset_id, table_id)?;
        let fields = &record.schema.fields;
        let total = self.row_count(&record)?;
        let start = options.start()?;
        let limit = options
            .max_results
            .or(self.config.default_page_size)
            .map_or(-1, |max| max as i64);

        let sql = format!(
            "SELECT {} FROM `{}` ORDER BY rowid LIMIT ?1 OFFSET ?2",
            column_list(fields),
            record.engine_table()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut cursor = stmt.query(rusqlite::params![limit, start as i64])?;
        let mut rows = Vec::new();
        while let Some(row) = cursor.next()? {
            let values = (0..fields.len())
                .map(|i| row.get_ref(i).map(NativeValue::from))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.push(table_row(&values, fields));
        }

        let next = start as u64 + rows.len() as u64;
        Ok(TableDataList {
            kind: TableDataList::KIND.to_string(),
            total_rows: total.to_string(),
            page_token: (next < total).then(|| next.to_string()),
            rows,
        })
    }
}
