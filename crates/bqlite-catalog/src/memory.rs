use std::collections::{BTreeMap, BTreeSet};

use bqlite_core::{Result, TableSchema};

use crate::SchemaCatalog;

type TableKey = (String, String, String);

/// Map-backed catalog.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    datasets: BTreeSet<(String, String)>,
    tables: BTreeMap<TableKey, TableSchema>,
}

impl MemoryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a dataset.
    pub fn add_dataset(&mut self, project: &str, dataset: &str) {
        self.datasets
            .insert((project.to_string(), dataset.to_string()));
    }

    /// Registers a table (and its dataset), builder style.
    pub fn with_table(mut self, project: &str, dataset: &str, table: &str, schema: TableSchema) -> Self {
        self.add_dataset(project, dataset);
        self.tables.insert(
            (project.to_string(), dataset.to_string(), table.to_string()),
            schema,
        );
        self
    }

    /// Number of registered tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// True when no table is registered.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl SchemaCatalog for MemoryCatalog {
    fn table_schema(
        &self,
        project: Option<&str>,
        dataset: &str,
        table: &str,
    ) -> Result<Option<TableSchema>> {
        Ok(self
            .tables
            .iter()
            .find(|((p, d, t), _)| {
                project.map_or(true, |project| project == p) && d == dataset && t == table
            })
            .map(|(_, schema)| schema.clone()))
    }

    fn put_table_schema(
        &mut self,
        project: &str,
        dataset: &str,
        table: &str,
        schema: &TableSchema,
    ) -> Result<()> {
        self.add_dataset(project, dataset);
        self.tables.insert(
            (project.to_string(), dataset.to_string(), table.to_string()),
            schema.clone(),
        );
        Ok(())
    }

    fn dataset_exists(&self, project: Option<&str>, dataset: &str) -> Result<bool> {
        Ok(self
            .datasets
            .iter()
            .any(|(p, d)| project.map_or(true, |project| project == p) && d == dataset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bqlite_core::schema::parse_schema;

    #[test]
    fn test_lookup_with_and_without_project() {
        let schema = TableSchema::new(parse_schema("id INT64").unwrap());
        let catalog = MemoryCatalog::new().with_table("p", "d", "t", schema.clone());
        assert_eq!(catalog.table_schema(None, "d", "t").unwrap(), Some(schema.clone()));
        assert_eq!(catalog.table_schema(Some("p"), "d", "t").unwrap(), Some(schema));
        assert_eq!(catalog.table_schema(Some("other"), "d", "t").unwrap(), None);
        assert!(catalog.dataset_exists(None, "d").unwrap());
        assert!(!catalog.table_exists(None, "d", "missing").unwrap());
    }

    #[test]
    fn test_put_replaces() {
        let mut catalog = MemoryCatalog::new();
        catalog
            .put_table_schema("p", "d", "t", &TableSchema::new(parse_schema("a STRING").unwrap()))
            .unwrap();
        catalog
            .put_table_schema("p", "d", "t", &TableSchema::new(parse_schema("b STRING").unwrap()))
            .unwrap();
        assert_eq!(catalog.len(), 1);
        let schema = catalog.table_schema(None, "d", "t").unwrap().unwrap();
        assert!(schema.field("b").is_some());
    }
}
