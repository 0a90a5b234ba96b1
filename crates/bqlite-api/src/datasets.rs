//! `datasets.*` operations.

use bqlite_catalog::DatasetRecord;
use bqlite_core::wire::{Dataset, DatasetList, DatasetReference};
use bqlite_core::{Error, Result};
use tracing::info;

use crate::engine::Engine;
use crate::validation::{validate_dataset_id, validate_project_id};

impl Engine {
    fn dataset_resource(&self, record: DatasetRecord) -> Dataset {
        Dataset {
            kind: Dataset::KIND.to_string(),
            id: Some(format!("{}:{}", record.project_id, record.dataset_id)),
            dataset_reference: DatasetReference {
                project_id: record.project_id,
                dataset_id: record.dataset_id,
            },
            location: Some(self.config.location.clone()),
            creation_time: Some(record.created_at.to_string()),
            last_modified_time: Some(record.updated_at.to_string()),
        }
    }

    /// Creates a dataset. The body's project, when set, wins over
    /// `project_id`.
    pub fn create_dataset(&mut self, project_id: &str, dataset: &Dataset) -> Result<Dataset> {
        let project = match dataset.dataset_reference.project_id.as_str() {
            "" => self.project(project_id).to_string(),
            own => own.to_string(),
        };
        validate_project_id(&project)?;
        validate_dataset_id(&dataset.dataset_reference.dataset_id)?;
        let record = self
            .catalog()
            .create_dataset(&project, &dataset.dataset_reference.dataset_id)?;
        Ok(self.dataset_resource(record))
    }

    /// Looks up a dataset.
    pub fn get_dataset(&self, project_id: &str, dataset_id: &str) -> Result<Dataset> {
        let project = self.project(project_id);
        self.catalog()
            .get_dataset(project, dataset_id)?
            .map(|record| self.dataset_resource(record))
            .ok_or_else(|| Error::NotFound(format!("Dataset {}:{}", project, dataset_id)))
    }

    /// Lists the datasets of a project.
    pub fn list_datasets(&self, project_id: &str) -> Result<DatasetList> {
        let records = self.catalog().list_datasets(self.project(project_id))?;
        Ok(DatasetList {
            kind: DatasetList::KIND.to_string(),
            datasets: records
                .into_iter()
                .map(|record| self.dataset_resource(record))
                .collect(),
        })
    }

    /// Deletes a dataset together with all of its tables.
    pub fn delete_dataset(&mut self, project_id: &str, dataset_id: &str) -> Result<()> {
        let project = self.project(project_id).to_string();
        let tables = self.catalog().delete_dataset(&project, dataset_id)?;
        for table in &tables {
            self.conn
                .execute_batch(&format!("DROP TABLE IF EXISTS `{}`", table.engine_table()))?;
        }
        info!(project = %project, dataset = %dataset_id, tables = tables.len(), "dataset dropped");
        Ok(())
    }
}
