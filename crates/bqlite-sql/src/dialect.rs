//! Parsing, unparsing and statement helpers on top of `sqlparser`.

use bqlite_core::schema::parse_schema;
use bqlite_core::{Error, FieldSchema, Result};
use sqlparser::ast::{ColumnOption, CreateTable, ObjectName, Statement};
use sqlparser::dialect::BigQueryDialect;
use sqlparser::parser::{Parser, ParserError};

/// Maps a parser failure onto the query error reported to clients.
pub fn parse_error(err: ParserError) -> Error {
    match err {
        ParserError::TokenizerError(msg) | ParserError::ParserError(msg) => Error::Parse(msg),
        ParserError::RecursionLimitExceeded => {
            Error::Parse("query is nested too deeply".to_string())
        }
    }
}

/// Parses warehouse SQL (one or more `;`-separated statements).
pub fn parse(sql: &str) -> Result<Vec<Statement>> {
    let statements = Parser::parse_sql(&BigQueryDialect {}, sql).map_err(parse_error)?;
    if statements.is_empty() {
        return Err(Error::Parse("query is empty".to_string()));
    }
    Ok(statements)
}

/// Renders a statement as engine SQL.
pub fn to_sql(statement: &Statement) -> String {
    statement.to_string()
}

/// Splits an engine table name (`dataset.table`, possibly quoted) into its
/// parts.
pub fn split_table_name(name: &ObjectName) -> Option<(String, String)> {
    let joined = name
        .0
        .iter()
        .map(|ident| ident.value.as_str())
        .collect::<Vec<_>>()
        .join(".");
    let mut parts = joined.rsplitn(2, '.');
    let table = parts.next()?.to_string();
    let dataset = parts.next()?;
    let dataset = dataset.rsplit('.').next().unwrap_or(dataset).to_string();
    if dataset.is_empty() || table.is_empty() {
        return None;
    }
    Some((dataset, table))
}

/// Statement kinds the engine treats specially.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    /// `CREATE TABLE d.t (...)`
    CreateTable {
        /// Target dataset
        dataset: String,
        /// Target table
        table: String,
        /// `IF NOT EXISTS` was given
        if_not_exists: bool,
    },
    /// `INSERT INTO d.t ...`
    Insert {
        /// Target dataset
        dataset: String,
        /// Target table
        table: String,
    },
    /// `DROP TABLE d.t`
    DropTable {
        /// Dropped tables
        tables: Vec<(String, String)>,
        /// `IF EXISTS` was given
        if_exists: bool,
    },
    /// Anything else
    Other,
}

/// Classifies a (transformed) statement.
pub fn classify(statement: &Statement) -> StatementKind {
    match statement {
        Statement::CreateTable(create) if create.query.is_none() => {
            match split_table_name(&create.name) {
                Some((dataset, table)) => StatementKind::CreateTable {
                    dataset,
                    table,
                    if_not_exists: create.if_not_exists,
                },
                None => StatementKind::Other,
            }
        }
        Statement::Insert(insert) => match split_table_name(&insert.table_name) {
            Some((dataset, table)) => StatementKind::Insert { dataset, table },
            None => StatementKind::Other,
        },
        Statement::Drop {
            object_type: sqlparser::ast::ObjectType::Table,
            names,
            if_exists,
            ..
        } => StatementKind::DropTable {
            tables: names.iter().filter_map(split_table_name).collect(),
            if_exists: *if_exists,
        },
        _ => StatementKind::Other,
    }
}

/// Declared fields of a `CREATE TABLE` statement, read back through the
/// table DDL grammar.
pub fn create_table_fields(create: &CreateTable) -> Result<Vec<FieldSchema>> {
    let definition = create
        .columns
        .iter()
        .map(|column| {
            let not_null = column
                .options
                .iter()
                .any(|def| matches!(def.option, ColumnOption::NotNull));
            format!(
                "`{}` {}{}",
                column.name.value,
                column.data_type,
                if not_null { " NOT NULL" } else { "" }
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    parse_schema(&definition)
}
