//! Output schema inference.
//!
//! Every result column gets a declared type from, in order:
//!
//! 1. the expression that produced it (literals, casts, known functions,
//!    operators), following column references through CTEs and FROM
//!    subqueries;
//! 2. the catalog schema of the table a bare column comes from;
//! 3. the value in the first result row.
//!
//! Matching of result columns to projection items uses the outermost query
//! body (the left-most branch of a set operation).

use std::sync::OnceLock;

use bqlite_catalog::SchemaCatalog;
use bqlite_core::{FieldSchema, Mode, NativeValue, TableSchema, TypeTag};
use regex::Regex;
use sqlparser::ast::{
    BinaryOperator, DataType, Expr, Function, FunctionArg, FunctionArgExpr, FunctionArguments,
    Query, Select, SelectItem, SetExpr, Statement, TableFactor, UnaryOperator, Value,
};
use tracing::{debug, warn};

use crate::dialect::split_table_name;
use crate::transform::function_name;

const MAX_DEPTH: usize = 8;

fn zoned_timestamp() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2}(\.\d+)?(Z| UTC|[+-]\d{2}:?\d{2})$")
            .expect("valid timestamp regex")
    })
}

/// Infers the output schema of a result set.
///
/// `columns` are the engine column names, `first_row` the first result row
/// (if any), `statement` the transformed statement that produced the rows
/// and `table_ref` the `(dataset, table)` the query reads from, used for
/// catalog lookups of columns nothing else resolves.
pub fn infer_schema<C>(
    columns: &[String],
    first_row: Option<&[NativeValue]>,
    statement: Option<&Statement>,
    catalog: &C,
    table_ref: Option<(&str, &str)>,
) -> Vec<FieldSchema>
where
    C: SchemaCatalog + ?Sized,
{
    let inferrer = Inferrer { catalog };
    let query = match statement {
        Some(Statement::Query(query)) => Some(query.as_ref()),
        _ => None,
    };
    let top = query.and_then(|q| {
        let select = leftmost_select(&q.body)?;
        let scope = inferrer.scope(select, ctes_of(q, Vec::new()));
        Some((select, scope))
    });
    let table_schema = table_ref.and_then(|(dataset, table)| inferrer.lookup(dataset, table));

    columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let matched = top
                .as_ref()
                .and_then(|(select, _)| match_item(select, columns, index));
            let mut field = top.as_ref().and_then(|(select, scope)| match matched {
                Some(item) => inferrer.item_type(item, scope, 0),
                None if has_wildcard(select) => inferrer.column(None, column, scope, 0),
                None => None,
            });
            if field.is_none() {
                field = table_schema
                    .as_ref()
                    .and_then(|schema| schema.field(column))
                    .cloned();
                if field.is_some() {
                    debug!(column = %column, "type from catalog");
                }
            }
            let field = field.unwrap_or_else(|| {
                let value = first_row.and_then(|row| row.get(index));
                debug!(column = %column, "type from first row value");
                fallback_type(value)
            });
            field.with_name(output_name(column, matched, index))
        })
        .collect()
}

/// The SELECT of the left-most branch of a query body.
fn leftmost_select(body: &SetExpr) -> Option<&Select> {
    match body {
        SetExpr::Select(select) => Some(select.as_ref()),
        SetExpr::SetOperation { left, .. } => leftmost_select(left),
        SetExpr::Query(query) => leftmost_select(&query.body),
        _ => None,
    }
}

fn ctes_of<'a>(query: &'a Query, mut outer: Vec<(String, &'a Query)>) -> Vec<(String, &'a Query)> {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            outer.push((cte.alias.name.value.clone(), cte.query.as_ref()));
        }
    }
    outer
}

fn has_wildcard(select: &Select) -> bool {
    select.projection.iter().any(|item| {
        matches!(
            item,
            SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(..)
        )
    })
}

/// Visible output name of a projection item.
fn visible_name(item: &SelectItem) -> Option<&str> {
    match item {
        SelectItem::ExprWithAlias { alias, .. } => Some(&alias.value),
        SelectItem::UnnamedExpr(Expr::Identifier(ident)) => Some(&ident.value),
        SelectItem::UnnamedExpr(Expr::CompoundIdentifier(parts)) => {
            parts.last().map(|ident| ident.value.as_str())
        }
        _ => None,
    }
}

fn match_item<'s>(select: &'s Select, columns: &[String], index: usize) -> Option<&'s SelectItem> {
    if !has_wildcard(select) && select.projection.len() == columns.len() {
        return select.projection.get(index);
    }
    let column = columns.get(index)?;
    select
        .projection
        .iter()
        .find(|item| visible_name(item).is_some_and(|name| name.eq_ignore_ascii_case(column)))
}

fn is_column_ref(expr: &Expr) -> bool {
    matches!(expr, Expr::Identifier(_) | Expr::CompoundIdentifier(_))
}

fn output_name(column: &str, item: Option<&SelectItem>, index: usize) -> String {
    let numeric = !column.is_empty() && column.chars().all(|c| c.is_ascii_digit());
    let unaliased_expr = matches!(item, Some(SelectItem::UnnamedExpr(expr)) if !is_column_ref(expr));
    if numeric || unaliased_expr {
        format!("f{}_", index)
    } else {
        column.to_string()
    }
}

fn scalar(tag: TypeTag) -> Option<FieldSchema> {
    Some(FieldSchema::new(String::new(), tag))
}

/// Type of the first row's value when nothing else is known.
pub fn fallback_type(value: Option<&NativeValue>) -> FieldSchema {
    let tag = match value {
        Some(NativeValue::String(s)) if zoned_timestamp().is_match(s) => TypeTag::Timestamp,
        Some(NativeValue::Integer(_)) => TypeTag::Integer,
        Some(NativeValue::Float(f)) if f.fract() == 0.0 && f.is_finite() => TypeTag::Integer,
        Some(NativeValue::Float(_)) => TypeTag::Float,
        Some(NativeValue::Bool(_)) => TypeTag::Bool,
        Some(NativeValue::Bytes(_)) => TypeTag::Bytes,
        Some(NativeValue::Array(_)) => return FieldSchema::repeated(String::new(), TypeTag::String),
        Some(NativeValue::Object(pairs)) => {
            let fields = pairs
                .iter()
                .map(|(name, value)| fallback_type(Some(value)).with_name(name.clone()))
                .collect();
            return FieldSchema::record(String::new(), fields);
        }
        _ => TypeTag::String,
    };
    FieldSchema::new(String::new(), tag)
}

/// Declared type of a cast target (after engine type normalization).
pub fn data_type_tag(data_type: &DataType) -> Option<TypeTag> {
    let tag = match data_type {
        DataType::Text | DataType::String(_) | DataType::Varchar(_) => TypeTag::String,
        DataType::Integer(_) | DataType::Int64 | DataType::Int(_) | DataType::BigInt(_) => {
            TypeTag::Integer
        }
        DataType::Real | DataType::Float64 | DataType::Float(_) => TypeTag::Float,
        DataType::Numeric(_) | DataType::Decimal(_) => TypeTag::Numeric,
        DataType::BigNumeric(_) => TypeTag::BigNumeric,
        DataType::Bool | DataType::Boolean => TypeTag::Bool,
        DataType::Blob(_) | DataType::Bytes(_) => TypeTag::Bytes,
        DataType::Date => TypeTag::Date,
        DataType::Timestamp(..) => TypeTag::Timestamp,
        DataType::Datetime(_) => TypeTag::Datetime,
        DataType::JSON => TypeTag::Json,
        _ => return None,
    };
    Some(tag)
}

fn promote(a: Option<FieldSchema>, b: Option<FieldSchema>) -> Option<FieldSchema> {
    match (a?.field_type, b?.field_type) {
        (TypeTag::Integer, TypeTag::Integer) => scalar(TypeTag::Integer),
        (TypeTag::Float, t) | (t, TypeTag::Float) if t.is_numeric() => scalar(TypeTag::Float),
        _ => None,
    }
}

fn function_args(function: &Function) -> Vec<&Expr> {
    match &function.args {
        FunctionArguments::List(list) => list
            .args
            .iter()
            .filter_map(|arg| match arg {
                FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => Some(expr),
                FunctionArg::Named {
                    arg: FunctionArgExpr::Expr(expr),
                    ..
                } => Some(expr),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

enum SourceKind<'a> {
    Table { dataset: String, table: String },
    Query(&'a Query),
    Unnest(Option<&'a Expr>),
    Unknown,
}

struct Source<'a> {
    names: Vec<String>,
    kind: SourceKind<'a>,
}

struct Scope<'a> {
    ctes: Vec<(String, &'a Query)>,
    sources: Vec<Source<'a>>,
}

struct Inferrer<'c, C: ?Sized> {
    catalog: &'c C,
}

impl<'c, C> Inferrer<'c, C>
where
    C: SchemaCatalog + ?Sized,
{
    fn lookup(&self, dataset: &str, table: &str) -> Option<TableSchema> {
        // Engine table names carry no project, so neither does the lookup.
        match self.catalog.table_schema(None, dataset, table) {
            Ok(schema) => schema,
            Err(e) => {
                warn!(error = %e, dataset = %dataset, table = %table, "catalog lookup failed");
                None
            }
        }
    }

    fn source<'a>(&self, factor: &'a TableFactor, ctes: &[(String, &'a Query)]) -> Source<'a> {
        match factor {
            TableFactor::Table {
                name,
                alias,
                args: Some(args),
                ..
            } => {
                let is_json_each = function_name(name) == "JSON_EACH";
                let array = args.args.first().and_then(|arg| match arg {
                    FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => Some(expr),
                    _ => None,
                });
                Source {
                    names: alias.iter().map(|a| a.name.value.clone()).collect(),
                    kind: if is_json_each {
                        SourceKind::Unnest(array)
                    } else {
                        SourceKind::Unknown
                    },
                }
            }
            TableFactor::Table { name, alias, .. } => {
                let mut names: Vec<String> = alias.iter().map(|a| a.name.value.clone()).collect();
                let cte = (name.0.len() == 1)
                    .then(|| {
                        ctes.iter()
                            .rev()
                            .find(|(cte, _)| cte.eq_ignore_ascii_case(&name.0[0].value))
                    })
                    .flatten();
                if let Some((cte_name, query)) = cte {
                    names.push(cte_name.clone());
                    return Source {
                        names,
                        kind: SourceKind::Query(*query),
                    };
                }
                match split_table_name(name) {
                    Some((dataset, table)) => {
                        names.push(table.clone());
                        names.push(format!("{}.{}", dataset, table));
                        Source {
                            names,
                            kind: SourceKind::Table { dataset, table },
                        }
                    }
                    None => Source {
                        names,
                        kind: SourceKind::Unknown,
                    },
                }
            }
            TableFactor::Derived {
                subquery, alias, ..
            } => Source {
                names: alias.iter().map(|a| a.name.value.clone()).collect(),
                kind: SourceKind::Query(subquery.as_ref()),
            },
            _ => Source {
                names: Vec::new(),
                kind: SourceKind::Unknown,
            },
        }
    }

    fn scope<'a>(&self, select: &'a Select, ctes: Vec<(String, &'a Query)>) -> Scope<'a> {
        let mut sources = Vec::new();
        for table in &select.from {
            sources.push(self.source(&table.relation, &ctes));
            for join in &table.joins {
                sources.push(self.source(&join.relation, &ctes));
            }
        }
        Scope { ctes, sources }
    }

    fn item_type(&self, item: &SelectItem, scope: &Scope<'_>, depth: usize) -> Option<FieldSchema> {
        match item {
            SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
                self.expr_type(expr, scope, depth)
            }
            _ => None,
        }
    }

    /// Output column `column` of `query`, resolved in its own scope.
    fn output_type<'a>(
        &self,
        query: &'a Query,
        column: &str,
        outer: &[(String, &'a Query)],
        depth: usize,
    ) -> Option<FieldSchema> {
        if depth > MAX_DEPTH {
            return None;
        }
        let select = leftmost_select(&query.body)?;
        let scope = self.scope(select, ctes_of(query, outer.to_vec()));
        let item = select
            .projection
            .iter()
            .find(|item| visible_name(item).is_some_and(|name| name.eq_ignore_ascii_case(column)));
        match item {
            Some(item) => self.item_type(item, &scope, depth),
            None if has_wildcard(select) => self.column(None, column, &scope, depth),
            None => None,
        }
    }

    /// Resolves a column reference through the FROM sources of `scope`.
    fn column(
        &self,
        qualifier: Option<&str>,
        column: &str,
        scope: &Scope<'_>,
        depth: usize,
    ) -> Option<FieldSchema> {
        let candidates = scope.sources.iter().filter(|source| match qualifier {
            Some(q) => source.names.iter().any(|n| n.eq_ignore_ascii_case(q)),
            None => true,
        });
        for source in candidates {
            let found = match &source.kind {
                SourceKind::Table { dataset, table } => self
                    .lookup(dataset, table)
                    .and_then(|schema| schema.field(column).cloned()),
                SourceKind::Query(query) => self.output_type(query, column, &scope.ctes, depth + 1),
                SourceKind::Unnest(array) => match column.to_ascii_lowercase().as_str() {
                    "key" => scalar(TypeTag::Integer),
                    "value" => array
                        .and_then(|array| self.expr_type(array, scope, depth))
                        .filter(FieldSchema::is_repeated)
                        .map(|field| field.with_mode(Mode::Nullable)),
                    _ => None,
                },
                SourceKind::Unknown => None,
            };
            if found.is_some() {
                return found;
            }
        }
        None
    }

    fn expr_type(&self, expr: &Expr, scope: &Scope<'_>, depth: usize) -> Option<FieldSchema> {
        if depth > MAX_DEPTH {
            return None;
        }
        match expr {
            Expr::Value(value) => literal_type(value),
            Expr::TypedString { data_type, .. } => data_type_tag(data_type).and_then(scalar),
            Expr::Cast { data_type, .. } => data_type_tag(data_type).and_then(scalar),
            Expr::Identifier(ident) => self.column(None, &ident.value, scope, depth),
            Expr::CompoundIdentifier(parts) => {
                let (column, qualifier) = parts.split_last()?;
                let qualifier = qualifier
                    .iter()
                    .map(|ident| ident.value.as_str())
                    .collect::<Vec<_>>()
                    .join(".");
                self.column(Some(&qualifier), &column.value, scope, depth)
            }
            Expr::Nested(inner) => self.expr_type(inner, scope, depth),
            Expr::UnaryOp { op, expr } => match (op, expr.as_ref()) {
                (UnaryOperator::Not, _) => scalar(TypeTag::Bool),
                (UnaryOperator::Minus, Expr::Value(Value::Number(text, _))) => {
                    number_type(&format!("-{}", text))
                }
                _ => self.expr_type(expr, scope, depth),
            },
            Expr::BinaryOp { left, op, right } => match op {
                BinaryOperator::Plus
                | BinaryOperator::Minus
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
                | BinaryOperator::Modulo => promote(
                    self.expr_type(left, scope, depth),
                    self.expr_type(right, scope, depth),
                ),
                BinaryOperator::StringConcat => scalar(TypeTag::String),
                BinaryOperator::Eq
                | BinaryOperator::NotEq
                | BinaryOperator::Lt
                | BinaryOperator::LtEq
                | BinaryOperator::Gt
                | BinaryOperator::GtEq
                | BinaryOperator::And
                | BinaryOperator::Or => scalar(TypeTag::Bool),
                _ => None,
            },
            Expr::IsNull(_)
            | Expr::IsNotNull(_)
            | Expr::IsTrue(_)
            | Expr::IsFalse(_)
            | Expr::InList { .. }
            | Expr::InSubquery { .. }
            | Expr::Between { .. }
            | Expr::Like { .. }
            | Expr::ILike { .. }
            | Expr::Exists { .. } => scalar(TypeTag::Bool),
            Expr::Case {
                results,
                else_result,
                ..
            } => results
                .iter()
                .chain(else_result.as_deref())
                .find_map(|result| self.expr_type(result, scope, depth)),
            Expr::Subquery(query) => {
                let select = leftmost_select(&query.body)?;
                let inner = self.scope(select, ctes_of(query, scope.ctes.clone()));
                select
                    .projection
                    .first()
                    .and_then(|item| self.item_type(item, &inner, depth + 1))
            }
            Expr::Function(function) => self.function_type(function, scope, depth),
            _ => None,
        }
    }

    fn function_type(&self, function: &Function, scope: &Scope<'_>, depth: usize) -> Option<FieldSchema> {
        let name = function_name(&function.name);
        let args = function_args(function);
        let arg_type = |index: usize| {
            args.get(index)
                .and_then(|arg| self.expr_type(arg, scope, depth))
        };
        match name.as_str() {
            "TIMESTAMP" | "TIMESTAMP_TRUNC" | "CURRENT_TIMESTAMP" | "TIMESTAMP_ADD"
            | "TIMESTAMP_SUB" => scalar(TypeTag::Timestamp),
            "DATE" | "DATE_TRUNC" | "DATE_ADD" | "DATE_SUB" | "CURRENT_DATE" | "_CURRENT_DATE" => {
                scalar(TypeTag::Date)
            }
            "DATETIME" | "DATETIME_TRUNC" => scalar(TypeTag::Datetime),
            "FORMAT_TIMESTAMP" | "FORMAT_DATE" | "CONCAT" | "UPPER" | "LOWER" | "TRIM"
            | "LTRIM" | "RTRIM" | "SUBSTR" | "SUBSTRING" | "REPLACE" => scalar(TypeTag::String),
            "COUNT" | "COUNTIF" | "LENGTH" | "ARRAY_LENGTH" => scalar(TypeTag::Integer),
            "SUM" => match arg_type(0).map(|field| field.field_type) {
                Some(TypeTag::Float) => scalar(TypeTag::Float),
                _ => scalar(TypeTag::Integer),
            },
            "AVG" | "SAFE_DIVIDE" => scalar(TypeTag::Float),
            "SAFE_ADD" | "SAFE_SUBTRACT" | "SAFE_MULTIPLY" => promote(arg_type(0), arg_type(1)),
            "SAFE_NEGATE" | "ABS" | "MIN" | "MAX" => arg_type(0),
            "IFNULL" | "COALESCE" => (0..args.len()).find_map(arg_type),
            "IF" => arg_type(1).or_else(|| arg_type(2)),
            "JSON_EXTRACT" => {
                let path = match args.get(1) {
                    Some(Expr::Value(Value::SingleQuotedString(path))) => path.strip_prefix("$.")?,
                    _ => return None,
                };
                path.split('.').try_fold(arg_type(0)?, |record, name| {
                    record
                        .fields
                        .iter()
                        .find(|field| field.name.eq_ignore_ascii_case(name))
                        .cloned()
                })
            }
            "JSON_ARRAY" => {
                let element = arg_type(0)
                    .filter(|field| !field.is_repeated())
                    .unwrap_or_else(|| FieldSchema::new(String::new(), TypeTag::String));
                Some(element.with_mode(Mode::Repeated))
            }
            "JSON_OBJECT" => {
                let fields = args
                    .chunks(2)
                    .enumerate()
                    .map(|(index, pair)| {
                        let name = match pair.first() {
                            Some(Expr::Value(Value::SingleQuotedString(name))) => name.clone(),
                            _ => format!("_field_{}", index + 1),
                        };
                        pair.get(1)
                            .and_then(|value| self.expr_type(value, scope, depth))
                            .unwrap_or_else(|| FieldSchema::new(String::new(), TypeTag::String))
                            .with_name(name)
                    })
                    .collect();
                Some(FieldSchema::record(String::new(), fields))
            }
            _ => None,
        }
    }
}

/// `i64::MIN` only fits once its sign is attached.
fn number_type(text: &str) -> Option<FieldSchema> {
    if text.parse::<i64>().is_ok() {
        scalar(TypeTag::Integer)
    } else {
        scalar(TypeTag::Float)
    }
}

fn literal_type(value: &Value) -> Option<FieldSchema> {
    match value {
        Value::Number(text, _) => number_type(text),
        Value::SingleQuotedString(_) | Value::DoubleQuotedString(_) => scalar(TypeTag::String),
        Value::Boolean(_) => scalar(TypeTag::Bool),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate;
    use bqlite_catalog::MemoryCatalog;
    use bqlite_core::schema::parse_schema;

    fn infer(sql: &str, columns: &[&str], row: &[NativeValue], catalog: &MemoryCatalog) -> Vec<FieldSchema> {
        let translation = translate(sql).unwrap();
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        infer_schema(
            &columns,
            Some(row),
            translation.statements.last(),
            catalog,
            translation.table_ref(),
        )
    }

    fn types(fields: &[FieldSchema]) -> Vec<(String, TypeTag, Mode)> {
        fields
            .iter()
            .map(|f| (f.name.clone(), f.field_type, f.mode))
            .collect()
    }

    #[test]
    fn test_literal_columns() {
        let fields = infer(
            "SELECT 1, 'x', 1.5, TRUE",
            &["1", "'x'", "1.5", "TRUE"],
            &[
                NativeValue::Integer(1),
                NativeValue::String("x".into()),
                NativeValue::Float(1.5),
                NativeValue::Integer(1),
            ],
            &MemoryCatalog::new(),
        );
        assert_eq!(
            types(&fields),
            vec![
                ("f0_".to_string(), TypeTag::Integer, Mode::Nullable),
                ("f1_".to_string(), TypeTag::String, Mode::Nullable),
                ("f2_".to_string(), TypeTag::Float, Mode::Nullable),
                ("f3_".to_string(), TypeTag::Bool, Mode::Nullable),
            ]
        );
    }

    #[test]
    fn test_cast_over_cte_column() {
        let fields = infer(
            "WITH t AS (SELECT 1 AS num) SELECT CAST(num AS STRING) AS s, num FROM t",
            &["s", "num"],
            &[NativeValue::String("1".into()), NativeValue::Integer(1)],
            &MemoryCatalog::new(),
        );
        assert_eq!(fields[0].field_type, TypeTag::String);
        assert_eq!(fields[1].field_type, TypeTag::Integer);
    }

    #[test]
    fn test_catalog_is_authoritative_for_columns() {
        let catalog = MemoryCatalog::new().with_table(
            "p",
            "d",
            "t",
            TableSchema::new(parse_schema("id INT64, ts TIMESTAMP, tags ARRAY<STRING>").unwrap()),
        );
        let fields = infer(
            "SELECT * FROM d.t",
            &["id", "ts", "tags"],
            &[
                NativeValue::Integer(1),
                NativeValue::String("2024-01-01T00:00:00.000Z".into()),
                NativeValue::String("[\"a\"]".into()),
            ],
            &catalog,
        );
        assert_eq!(
            types(&fields),
            vec![
                ("id".to_string(), TypeTag::Integer, Mode::Nullable),
                ("ts".to_string(), TypeTag::Timestamp, Mode::Nullable),
                ("tags".to_string(), TypeTag::String, Mode::Repeated),
            ]
        );
    }

    #[test]
    fn test_function_types() {
        let fields = infer(
            "SELECT TIMESTAMP_TRUNC(TIMESTAMP '2023-12-25 10:30:45', DAY) AS d, SAFE_DIVIDE(1, 2) AS q, SAFE_ADD(1, 2) AS s, [1, 2] AS a",
            &["d", "q", "s", "a"],
            &[
                NativeValue::String("2023-12-25 00:00:00".into()),
                NativeValue::Float(0.5),
                NativeValue::Integer(3),
                NativeValue::String("[1,2]".into()),
            ],
            &MemoryCatalog::new(),
        );
        assert_eq!(
            types(&fields),
            vec![
                ("d".to_string(), TypeTag::Timestamp, Mode::Nullable),
                ("q".to_string(), TypeTag::Float, Mode::Nullable),
                ("s".to_string(), TypeTag::Integer, Mode::Nullable),
                ("a".to_string(), TypeTag::Integer, Mode::Repeated),
            ]
        );
    }

    #[test]
    fn test_struct_literal_type() {
        let fields = infer(
            "SELECT STRUCT(1 AS x, 'a' AS y) AS s",
            &["s"],
            &[NativeValue::String("{\"x\":1,\"y\":\"a\"}".into())],
            &MemoryCatalog::new(),
        );
        assert!(fields[0].is_record());
        assert_eq!(fields[0].fields[0].name, "x");
        assert_eq!(fields[0].fields[0].field_type, TypeTag::Integer);
        assert_eq!(fields[0].fields[1].field_type, TypeTag::String);
    }

    #[test]
    fn test_unnest_offset_and_value_fallback() {
        let fields = infer(
            "SELECT num, offset FROM UNNEST([10, 20]) AS num WITH OFFSET",
            &["num", "offset"],
            &[NativeValue::Integer(10), NativeValue::Integer(0)],
            &MemoryCatalog::new(),
        );
        assert_eq!(fields[0].field_type, TypeTag::Integer);
        assert_eq!(fields[1].field_type, TypeTag::Integer);
        assert_eq!(fields[1].name, "offset");
    }

    #[test]
    fn test_value_fallback() {
        assert_eq!(
            fallback_type(Some(&NativeValue::String("2024-01-01 10:00:00+00:00".into()))).field_type,
            TypeTag::Timestamp
        );
        assert_eq!(
            fallback_type(Some(&NativeValue::String("hello".into()))).field_type,
            TypeTag::String
        );
        assert_eq!(fallback_type(Some(&NativeValue::Float(2.0))).field_type, TypeTag::Integer);
        assert_eq!(fallback_type(Some(&NativeValue::Null)).field_type, TypeTag::String);
        assert!(fallback_type(Some(&NativeValue::Array(vec![]))).is_repeated());
    }

    #[test]
    fn test_struct_field_path_type() {
        let fields = infer(
            "SELECT s.a, s.b FROM (SELECT STRUCT(1 AS a, 'x' AS b) AS s)",
            &["a", "b"],
            &[NativeValue::Integer(1), NativeValue::String("x".into())],
            &MemoryCatalog::new(),
        );
        assert_eq!(
            types(&fields),
            vec![
                ("a".to_string(), TypeTag::Integer, Mode::Nullable),
                ("b".to_string(), TypeTag::String, Mode::Nullable),
            ]
        );
    }

    #[test]
    fn test_negative_literal_bounds() {
        let fields = infer(
            "SELECT -9223372036854775808 AS lo, SAFE_NEGATE(-9223372036854775808) AS neg, -1.5 AS f",
            &["lo", "neg", "f"],
            &[
                NativeValue::Integer(i64::MIN),
                NativeValue::Null,
                NativeValue::Float(-1.5),
            ],
            &MemoryCatalog::new(),
        );
        assert_eq!(fields[0].field_type, TypeTag::Integer);
        assert_eq!(fields[1].field_type, TypeTag::Integer);
        assert_eq!(fields[2].field_type, TypeTag::Float);
    }

    #[test]
    fn test_set_operation_uses_leftmost_branch() {
        let fields = infer(
            "SELECT 1 AS a UNION ALL SELECT 2",
            &["a"],
            &[NativeValue::Integer(1)],
            &MemoryCatalog::new(),
        );
        assert_eq!(fields[0].name, "a");
        assert_eq!(fields[0].field_type, TypeTag::Integer);
    }
}
