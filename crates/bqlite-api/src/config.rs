//! Engine configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::logging::LogConfig;

/// Where the engine database lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageMode {
    /// Private in-memory database, gone when the engine is dropped
    Memory,
    /// Database file, created if missing
    File(PathBuf),
}

/// Engine configuration
///
/// ```rust
/// use bqlite::{EngineConfig, StorageMode};
///
/// let config = EngineConfig::default()
///     .with_project("local-project")
///     .with_page_size(500);
/// assert_eq!(config.storage, StorageMode::Memory);
/// assert_eq!(config.location, "US");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Database location
    pub storage: StorageMode,
    /// Project used when a request names none
    pub default_project: String,
    /// Location reported on jobs, datasets and tables
    pub location: String,
    /// Page size for result and table-data reads without `maxResults`
    pub default_page_size: Option<usize>,
    /// Logging setup, applied by [`EngineConfig::init_logging`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<LogConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage: StorageMode::Memory,
            default_project: "test-project".to_string(),
            location: "US".to_string(),
            default_page_size: None,
            log: None,
        }
    }
}

impl EngineConfig {
    /// In-memory configuration
    pub fn memory() -> Self {
        Self::default()
    }

    /// File-backed configuration
    pub fn file<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            storage: StorageMode::File(path.into()),
            ..Default::default()
        }
    }

    /// Set the default project
    pub fn with_project<S: Into<String>>(mut self, project: S) -> Self {
        self.default_project = project.into();
        self
    }

    /// Set the reported location
    pub fn with_location<S: Into<String>>(mut self, location: S) -> Self {
        self.location = location.into();
        self
    }

    /// Set the default page size
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.default_page_size = Some(page_size);
        self
    }

    /// Set the logging configuration
    pub fn with_logging(mut self, log: LogConfig) -> Self {
        self.log = Some(log);
        self
    }

    /// Installs the configured subscriber, if any.
    pub fn init_logging(&self) -> Option<tracing_appender::non_blocking::WorkerGuard> {
        self.log.clone().and_then(LogConfig::init)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builders() {
        let config = EngineConfig::file("/tmp/bq.db")
            .with_project("p")
            .with_location("EU")
            .with_page_size(10)
            .with_logging(LogConfig::warn());
        assert_eq!(config.storage, StorageMode::File(PathBuf::from("/tmp/bq.db")));
        assert_eq!(config.default_project, "p");
        assert_eq!(config.location, "EU");
        assert_eq!(config.default_page_size, Some(10));
        assert_eq!(config.log.map(|l| l.level), Some("warn".to_string()));
    }

    #[test]
    fn test_config_serde() {
        let config = EngineConfig::default().with_page_size(3);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["defaultProject"], "test-project");
        assert_eq!(json["defaultPageSize"], 3);
        let back: EngineConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }
}
