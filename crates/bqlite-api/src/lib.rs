//! # bqlite
//!
//! A BigQuery-compatible query engine embedded on SQLite.
//!
//! bqlite accepts warehouse SQL, translates it into SQL the embedded engine
//! runs, and shapes the results into the warehouse REST response format:
//! inferred schemas, string-encoded cells, `{"f": [{"v": ...}]}` rows and
//! error protos.
//!
//! - **Queries**: [`Engine::run_query`] with named or positional parameters
//! - **Jobs**: [`Engine::run_job`], [`Engine::get_job`], [`Engine::get_query_results`]
//! - **Resources**: datasets, tables and streaming inserts
//! - **Storage**: in-memory or a single database file
//!
//! ## Quick Start
//!
//! ```rust
//! use bqlite::wire::{Dataset, InsertAllRequest, QueryRequest, Table};
//! use bqlite::{Engine, EngineConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut engine = Engine::open(EngineConfig::memory().with_project("demo"))?;
//! engine.create_dataset("demo", &Dataset::new("shop"))?;
//! engine.create_table("demo", "shop", &Table::with_definition("items", "id INT64, name STRING"))?;
//!
//! let row = serde_json::json!({"id": 1, "name": "apple"});
//! let rows = vec![row.as_object().cloned().unwrap_or_default()];
//! engine.insert_all("demo", "shop", "items", &InsertAllRequest::from_rows(rows))?;
//!
//! let response = engine.run_query(
//!     &QueryRequest::new("SELECT id, name FROM shop.items"),
//!     "demo",
//! )?;
//! assert_eq!(response.rows[0].f[0].v, "1");
//! assert_eq!(response.rows[0].f[1].v, "apple");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod coerce;
pub mod config;
mod datasets;
mod engine;
mod jobs;
pub mod logging;
pub mod params;
pub mod response;
mod tabledata;
mod tables;
pub mod validation;

pub use bqlite_core::{wire, Error, FieldSchema, Mode, NativeValue, Result, TableSchema, TypeTag};
pub use config::{EngineConfig, StorageMode};
pub use engine::Engine;
pub use logging::{LogConfig, LogFormat, LogOutput};
pub use response::PageOptions;
