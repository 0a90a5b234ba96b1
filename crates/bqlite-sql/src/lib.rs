//! # bqlite SQL
//!
//! Translation of warehouse SQL into SQL the embedded engine executes, and
//! inference of result schemas.
//!
//! ```rust
//! use bqlite_sql::translate;
//!
//! let translation = translate("SELECT [1, 2] AS a FROM d.t").unwrap();
//! assert_eq!(translation.sql(), vec!["SELECT json_array(1, 2) AS a FROM `d.t`"]);
//! assert_eq!(translation.table_ref(), Some(("d", "t")));
//! ```
//!
//! The pipeline is [`preprocess`] (text rewrites), [`dialect::parse`]
//! (warehouse dialect), then [`transform`] (AST rewrites).
//! [`infer::infer_schema`] runs after execution with the result columns and
//! the transformed statement.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dialect;
pub mod infer;
pub mod preprocess;
pub mod transform;

pub use dialect::{classify, StatementKind};
pub use infer::infer_schema;
pub use preprocess::preprocess;
pub use transform::transform;

use bqlite_core::Result;
use sqlparser::ast::Statement;
use tracing::debug;

/// A translated query.
#[derive(Debug, Clone)]
pub struct Translation {
    /// Query text after the text-level rewrites
    pub preprocessed: String,
    /// Transformed statements, ready to render
    pub statements: Vec<Statement>,
    table: Option<(String, String)>,
}

impl Translation {
    /// Engine SQL of every statement.
    pub fn sql(&self) -> Vec<String> {
        self.statements.iter().map(dialect::to_sql).collect()
    }

    /// `(dataset, table)` the query reads from, found in the preprocessed
    /// text.
    pub fn table_ref(&self) -> Option<(&str, &str)> {
        self.table
            .as_ref()
            .map(|(dataset, table)| (dataset.as_str(), table.as_str()))
    }
}

/// Runs the whole translation pipeline over `sql`.
pub fn translate(sql: &str) -> Result<Translation> {
    let preprocessed = preprocess(sql);
    let statements = transform(dialect::parse(&preprocessed)?);
    let table = preprocess::table_reference(&preprocessed);
    debug!(statements = statements.len(), table = ?table, "translated query");
    Ok(Translation {
        preprocessed,
        statements,
        table,
    })
}
