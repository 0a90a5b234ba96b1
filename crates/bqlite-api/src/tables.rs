//! `tables.*` operations.

use bqlite_catalog::TableRecord;
use bqlite_core::schema::parse_schema;
use bqlite_core::wire::{Table, TableList, TableReference, TableSchemaInput};
use bqlite_core::{Error, Result};

use crate::engine::Engine;
use crate::validation::{validate_dataset_id, validate_table_id};

impl Engine {
    pub(crate) fn row_count(&self, record: &TableRecord) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM `{}`", record.engine_table()),
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn table_resource(&self, record: TableRecord) -> Result<Table> {
        let num_rows = self.row_count(&record)?;
        Ok(Table {
            kind: Table::KIND.to_string(),
            id: Some(format!(
                "{}:{}.{}",
                record.project_id, record.dataset_id, record.table_id
            )),
            table_reference: TableReference {
                project_id: record.project_id,
                dataset_id: record.dataset_id,
                table_id: record.table_id,
            },
            schema: Some(TableSchemaInput::Fields(record.schema)),
            table_type: Some("TABLE".to_string()),
            location: Some(self.config.location.clone()),
            num_rows: Some(num_rows.to_string()),
            creation_time: Some(record.created_at.to_string()),
            last_modified_time: Some(record.updated_at.to_string()),
        })
    }

    pub(crate) fn table_record(
        &self,
        project: &str,
        dataset_id: &str,
        table_id: &str,
    ) -> Result<TableRecord> {
        if self.catalog().get_dataset(project, dataset_id)?.is_none() {
            return Err(Error::NotFound(format!("Dataset {}:{}", project, dataset_id)));
        }
        self.catalog()
            .get_table(project, dataset_id, table_id)?
            .ok_or_else(|| {
                Error::NotFound(format!("Table {}:{}.{}", project, dataset_id, table_id))
            })
    }

    /// Creates a table from a field list or a DDL definition string.
    pub fn create_table(&mut self, project_id: &str, dataset_id: &str, table: &Table) -> Result<Table> {
        let project = self.project(project_id).to_string();
        let table_id = &table.table_reference.table_id;
        validate_dataset_id(dataset_id)?;
        validate_table_id(table_id)?;
        let fields = match &table.schema {
            Some(TableSchemaInput::Fields(schema)) => schema.fields.clone(),
            Some(TableSchemaInput::Definition(definition)) => parse_schema(definition)?,
            None => Vec::new(),
        };
        if fields.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Table {} needs at least one field",
                table_id
            )));
        }
        self.create_engine_table(&project, dataset_id, table_id, fields, false)?;
        self.get_table(&project, dataset_id, table_id)
    }

    /// Looks up a table, including its current row count.
    pub fn get_table(&self, project_id: &str, dataset_id: &str, table_id: &str) -> Result<Table> {
        let record = self.table_record(self.project(project_id), dataset_id, table_id)?;
        self.table_resource(record)
    }

    /// Lists the tables of a dataset.
    pub fn list_tables(&self, project_id: &str, dataset_id: &str) -> Result<TableList> {
        let project = self.project(project_id);
        if self.catalog().get_dataset(project, dataset_id)?.is_none() {
            return Err(Error::NotFound(format!("Dataset {}:{}", project, dataset_id)));
        }
        let tables = self
            .catalog()
            .list_tables(project, dataset_id)?
            .into_iter()
            .map(|record| self.table_resource(record))
            .collect::<Result<Vec<_>>>()?;
        Ok(TableList {
            kind: TableList::KIND.to_string(),
            total_items: tables.len() as u64,
            tables,
        })
    }

    /// Deletes a table and its data.
    pub fn delete_table(&mut self, project_id: &str, dataset_id: &str, table_id: &str) -> Result<()> {
        let project = self.project(project_id).to_string();
        self.table_record(&project, dataset_id, table_id)?;
        self.drop_engine_table(&project, dataset_id, table_id, false)
    }
}
