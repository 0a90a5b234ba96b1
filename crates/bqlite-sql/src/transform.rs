//! AST rewriting from the warehouse dialect to engine-executable SQL.
//!
//! One [`VisitorMut`] pass does the expression-level rewrites bottom-up
//! (array/struct constructors, casts, literals, function arguments), merges
//! dotted table names into a single `dataset.table` identifier, and binds
//! `json_each` aliases produced by the preprocessor inside each SELECT and
//! its ORDER BY. Field paths on derived-table columns (`s.a`) read the
//! column as a STRUCT value.

use std::ops::ControlFlow;

use sqlparser::ast::{
    visit_expressions_mut, CastKind, DataType, Expr, Function, FunctionArg, FunctionArgExpr,
    FunctionArgumentList, FunctionArguments, GroupByExpr, Ident, ObjectName, OrderBy, Query,
    Select, SelectItem, SetExpr, Statement, StructField, TableFactor, Value, VisitMut, VisitorMut,
    WildcardAdditionalOptions,
};
use tracing::debug;

/// Rewrites every statement in place and returns them.
pub fn transform(mut statements: Vec<Statement>) -> Vec<Statement> {
    let mut rewriter = Rewriter;
    for statement in &mut statements {
        let _ = statement.visit(&mut rewriter);
    }
    statements
}

struct Rewriter;

impl VisitorMut for Rewriter {
    type Break = ();

    fn post_visit_expr(&mut self, expr: &mut Expr) -> ControlFlow<Self::Break> {
        rewrite_expr(expr);
        ControlFlow::Continue(())
    }

    fn post_visit_relation(&mut self, relation: &mut ObjectName) -> ControlFlow<Self::Break> {
        merge_table_name(relation);
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, query: &mut Query) -> ControlFlow<Self::Break> {
        let scope = bind_set_expr(&mut query.body);
        if let (Some(order_by), SetExpr::Select(select)) = (&mut query.order_by, &*query.body) {
            bind_order_by(order_by, &scope, &select.projection);
        }
        ControlFlow::Continue(())
    }

    fn post_visit_statement(&mut self, statement: &mut Statement) -> ControlFlow<Self::Break> {
        match statement {
            Statement::Insert(insert) => merge_table_name(&mut insert.table_name),
            Statement::CreateTable(create) => merge_table_name(&mut create.name),
            Statement::Drop { names, .. } => names.iter_mut().for_each(merge_table_name),
            _ => {}
        }
        ControlFlow::Continue(())
    }
}

/// Builds `name(args...)`.
pub(crate) fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function(Function {
        name: ObjectName(vec![Ident::new(name)]),
        uses_odbc_syntax: false,
        parameters: FunctionArguments::None,
        args: FunctionArguments::List(FunctionArgumentList {
            duplicate_treatment: None,
            args: args
                .into_iter()
                .map(|arg| FunctionArg::Unnamed(FunctionArgExpr::Expr(arg)))
                .collect(),
            clauses: vec![],
        }),
        filter: None,
        null_treatment: None,
        over: None,
        within_group: vec![],
    })
}

fn string_literal<S: Into<String>>(text: S) -> Expr {
    Expr::Value(Value::SingleQuotedString(text.into()))
}

fn take_expr(expr: &mut Expr) -> Expr {
    std::mem::replace(expr, Expr::Value(Value::Null))
}

/// Upper-cased last part of a function name.
pub(crate) fn function_name(name: &ObjectName) -> String {
    name.0
        .last()
        .map(|ident| ident.value.to_ascii_uppercase())
        .unwrap_or_default()
}

/// `d.t` and `p.d.t` become the single quoted identifier `` `d.t` ``.
fn merge_table_name(name: &mut ObjectName) {
    let parts = &name.0;
    if parts.len() < 2 {
        return;
    }
    let merged = format!(
        "{}.{}",
        parts[parts.len() - 2].value,
        parts[parts.len() - 1].value
    );
    *name = ObjectName(vec![Ident::with_quote('`', merged)]);
}

enum CastTarget {
    Type(DataType),
    Function(&'static str),
    Keep,
}

fn cast_target(data_type: &DataType) -> CastTarget {
    match data_type {
        DataType::String(_) | DataType::Varchar(_) | DataType::Text => CastTarget::Type(DataType::Text),
        DataType::Int64 | DataType::Integer(_) | DataType::Int(_) | DataType::BigInt(_) => {
            CastTarget::Type(DataType::Integer(None))
        }
        DataType::Float64 | DataType::Float(_) | DataType::Real => CastTarget::Type(DataType::Real),
        DataType::Bytes(_) => CastTarget::Type(DataType::Blob(None)),
        DataType::Date => CastTarget::Function("DATE"),
        DataType::Timestamp(..) => CastTarget::Function("TIMESTAMP"),
        DataType::Datetime(_) => CastTarget::Function("DATETIME"),
        _ => CastTarget::Keep,
    }
}

fn rewrite_expr(expr: &mut Expr) {
    let replacement = match expr {
        Expr::Array(array) => Some(call("json_array", std::mem::take(&mut array.elem))),
        Expr::Struct { values, fields } => Some(struct_object(values, fields)),
        Expr::Cast {
            kind,
            expr: inner,
            data_type,
            ..
        } => match cast_target(data_type) {
            CastTarget::Function(name) => Some(call(name, vec![take_expr(inner)])),
            CastTarget::Type(target) => {
                *data_type = target;
                *kind = CastKind::Cast;
                None
            }
            CastTarget::Keep => {
                *kind = CastKind::Cast;
                None
            }
        },
        Expr::TypedString { value, .. } => Some(string_literal(std::mem::take(value))),
        Expr::Value(Value::DoubleQuotedString(text)) => Some(string_literal(std::mem::take(text))),
        Expr::Function(function) => {
            rewrite_function(function);
            None
        }
        _ => None,
    };
    if let Some(replacement) = replacement {
        *expr = replacement;
    }
}

/// `STRUCT(a AS x, b)` becomes `json_object('x', a, '_field_2', b)`.
fn struct_object(values: &mut [Expr], fields: &[StructField]) -> Expr {
    let mut args = Vec::with_capacity(values.len() * 2);
    for (index, value) in values.iter_mut().enumerate() {
        let (name, value) = match take_expr(value) {
            Expr::Named { expr, name } => (name.value, *expr),
            other => {
                let declared = fields
                    .get(index)
                    .and_then(|field| field.field_name.as_ref())
                    .map(|ident| ident.value.clone());
                let name = declared.unwrap_or_else(|| format!("_field_{}", index + 1));
                (name, other)
            }
        };
        args.push(string_literal(name));
        args.push(value);
    }
    call("json_object", args)
}

fn list_args(function: &mut Function) -> Option<&mut Vec<FunctionArg>> {
    match &mut function.args {
        FunctionArguments::List(list) => Some(&mut list.args),
        _ => None,
    }
}

fn unnamed_expr(arg: &mut FunctionArg) -> Option<&mut Expr> {
    match arg {
        FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => Some(expr),
        _ => None,
    }
}

fn rewrite_function(function: &mut Function) {
    let name = function_name(&function.name);
    match name.as_str() {
        "TIMESTAMP_TRUNC" | "DATE_TRUNC" | "DATETIME_TRUNC" => {
            if let Some(part) = list_args(function)
                .and_then(|args| args.get_mut(1))
                .and_then(unnamed_expr)
            {
                if let Expr::Identifier(ident) = part {
                    let literal = string_literal(ident.value.to_ascii_uppercase());
                    *part = literal;
                }
            }
        }
        "DATE_ADD" | "DATE_SUB" => {
            let Some(args) = list_args(function) else {
                return;
            };
            let interval = match args.get_mut(1).and_then(unnamed_expr) {
                Some(Expr::Interval(interval)) => {
                    let part = interval
                        .leading_field
                        .as_ref()
                        .map(|field| field.to_string().to_ascii_uppercase())
                        .unwrap_or_else(|| "DAY".to_string());
                    Some((take_expr(&mut interval.value), part))
                }
                _ => None,
            };
            if let Some((amount, part)) = interval {
                args[1] = FunctionArg::Unnamed(FunctionArgExpr::Expr(amount));
                args.push(FunctionArg::Unnamed(FunctionArgExpr::Expr(string_literal(part))));
            }
        }
        "CURRENT_TIMESTAMP" | "CURRENT_DATE" => {
            let arity = match &function.args {
                FunctionArguments::List(list) => Some(list.args.len()),
                _ => None,
            };
            match arity {
                Some(0) => function.args = FunctionArguments::None,
                Some(_) if name == "CURRENT_DATE" => {
                    function.name = ObjectName(vec![Ident::new("_CURRENT_DATE")]);
                }
                _ => {}
            }
        }
        _ => {}
    }
}

/// One `json_each(...) AS alias [(offset)]` source of a SELECT.
#[derive(Debug, Clone)]
struct UnnestBinding {
    alias: Ident,
    offset: Option<Ident>,
}

enum Source {
    Unnest(UnnestBinding),
    Named(Ident),
    Derived {
        alias: Option<Ident>,
        columns: Vec<Ident>,
    },
    Anonymous,
}

impl Source {
    /// Names that qualify columns of this source.
    fn qualifiers(&self) -> Vec<String> {
        match self {
            Source::Unnest(binding) => vec![binding.alias.value.clone()],
            Source::Named(name) => {
                let mut names = vec![name.value.clone()];
                if let Some((_, table)) = name.value.rsplit_once('.') {
                    names.push(table.to_string());
                }
                names
            }
            Source::Derived { alias, .. } => alias.iter().map(|a| a.value.clone()).collect(),
            Source::Anonymous => Vec::new(),
        }
    }
}

/// What a SELECT's column references bind to.
#[derive(Debug, Clone, Default)]
struct Scope {
    unnests: Vec<UnnestBinding>,
    /// Derived-table columns that `column.field` paths read as STRUCTs
    records: Vec<Ident>,
}

impl Scope {
    fn of(sources: &[Source]) -> Self {
        let qualifiers: Vec<String> = sources.iter().flat_map(Source::qualifiers).collect();
        let mut scope = Scope::default();
        for source in sources {
            match source {
                Source::Unnest(binding) => scope.unnests.push(binding.clone()),
                Source::Derived { columns, .. } => scope.records.extend(
                    columns
                        .iter()
                        .filter(|column| {
                            !qualifiers
                                .iter()
                                .any(|q| q.eq_ignore_ascii_case(&column.value))
                        })
                        .cloned(),
                ),
                _ => {}
            }
        }
        scope
    }

    fn is_empty(&self) -> bool {
        self.unnests.is_empty() && self.records.is_empty()
    }
}

/// Output column names of the left-most SELECT of a query body.
fn output_columns(body: &SetExpr) -> Vec<Ident> {
    match body {
        SetExpr::Select(select) => select
            .projection
            .iter()
            .filter_map(|item| match item {
                SelectItem::ExprWithAlias { alias, .. } => Some(alias.clone()),
                SelectItem::UnnamedExpr(Expr::Identifier(ident)) => Some(ident.clone()),
                _ => None,
            })
            .collect(),
        SetExpr::SetOperation { left, .. } => output_columns(left),
        SetExpr::Query(query) => output_columns(&query.body),
        _ => Vec::new(),
    }
}

fn is_json_each(name: &ObjectName) -> bool {
    name.0.len() == 1 && name.0[0].value.eq_ignore_ascii_case("json_each")
}

fn classify(factor: &mut TableFactor) -> Source {
    match factor {
        TableFactor::Table {
            name,
            alias: Some(alias),
            args: Some(_),
            ..
        } if is_json_each(name) => {
            let offset = alias.columns.first().map(|column| column.name.clone());
            alias.columns.clear();
            Source::Unnest(UnnestBinding {
                alias: alias.name.clone(),
                offset,
            })
        }
        TableFactor::Table { name, alias, .. } => match (alias, name.0.last()) {
            (Some(alias), _) => Source::Named(alias.name.clone()),
            (None, Some(last)) => Source::Named(last.clone()),
            (None, None) => Source::Anonymous,
        },
        TableFactor::Derived {
            subquery, alias, ..
        } => Source::Derived {
            alias: alias.as_ref().map(|a| a.name.clone()),
            columns: output_columns(&subquery.body),
        },
        _ => Source::Anonymous,
    }
}

/// Binds every SELECT of `body`. Returns the scope of a plain SELECT body;
/// the ORDER BY of a set operation only sees output columns.
fn bind_set_expr(body: &mut SetExpr) -> Scope {
    match body {
        SetExpr::Select(select) => bind_select(select),
        SetExpr::SetOperation { left, right, .. } => {
            bind_set_expr(left);
            bind_set_expr(right);
            Scope::default()
        }
        _ => Scope::default(),
    }
}

fn same(a: &Ident, b: &Ident) -> bool {
    a.value.eq_ignore_ascii_case(&b.value)
}

fn column_of(binding: &UnnestBinding, column: &str) -> Expr {
    Expr::CompoundIdentifier(vec![binding.alias.clone(), Ident::new(column)])
}

fn json_path(fields: &[Ident]) -> Expr {
    let path: Vec<&str> = fields.iter().map(|ident| ident.value.as_str()).collect();
    string_literal(format!("$.{}", path.join(".")))
}

fn bound_reference(expr: &Expr, scope: &Scope) -> Option<Expr> {
    match expr {
        Expr::Identifier(ident) => scope.unnests.iter().find_map(|binding| {
            if same(&binding.alias, ident) {
                Some(column_of(binding, "value"))
            } else if binding.offset.as_ref().is_some_and(|o| same(o, ident)) {
                Some(column_of(binding, "key"))
            } else {
                None
            }
        }),
        Expr::CompoundIdentifier(parts) if parts.len() >= 2 => {
            let (head, fields) = parts.split_first()?;
            if let Some(binding) = scope.unnests.iter().find(|b| same(&b.alias, head)) {
                if fields.len() == 1 && (fields[0].value == "value" || fields[0].value == "key") {
                    return None;
                }
                return Some(call(
                    "json_extract",
                    vec![column_of(binding, "value"), json_path(fields)],
                ));
            }
            let record = scope.records.iter().find(|column| same(column, head))?;
            Some(call(
                "json_extract",
                vec![Expr::Identifier(record.clone()), json_path(fields)],
            ))
        }
        _ => None,
    }
}

fn bind_expr(expr: &mut Expr, scope: &Scope) {
    let _ = visit_expressions_mut(expr, |e| {
        if let Some(replacement) = bound_reference(e, scope) {
            *e = replacement;
        }
        ControlFlow::<()>::Continue(())
    });
}

/// ORDER BY names resolve to output columns first, then to the SELECT's
/// sources.
fn bind_order_by(order_by: &mut OrderBy, scope: &Scope, projection: &[SelectItem]) {
    if scope.is_empty() {
        return;
    }
    let outputs: Vec<&Ident> = projection
        .iter()
        .filter_map(|item| match item {
            SelectItem::ExprWithAlias { alias, .. } => Some(alias),
            _ => None,
        })
        .collect();
    for item in &mut order_by.exprs {
        let _ = visit_expressions_mut(&mut item.expr, |e| {
            let shadowed = matches!(
                e,
                Expr::Identifier(ident) if outputs.iter().any(|output| same(output, ident))
            );
            if !shadowed {
                if let Some(replacement) = bound_reference(e, scope) {
                    *e = replacement;
                }
            }
            ControlFlow::<()>::Continue(())
        });
    }
}

fn expand_wildcard(sources: &[Source]) -> Option<Vec<SelectItem>> {
    let mut items = Vec::new();
    for source in sources {
        match source {
            Source::Unnest(binding) => {
                items.push(SelectItem::ExprWithAlias {
                    expr: column_of(binding, "value"),
                    alias: binding.alias.clone(),
                });
                if let Some(offset) = &binding.offset {
                    items.push(SelectItem::ExprWithAlias {
                        expr: column_of(binding, "key"),
                        alias: Ident::with_quote('`', offset.value.clone()),
                    });
                }
            }
            Source::Named(name)
            | Source::Derived {
                alias: Some(name), ..
            } => items.push(SelectItem::QualifiedWildcard(
                ObjectName(vec![name.clone()]),
                WildcardAdditionalOptions::default(),
            )),
            Source::Derived { alias: None, .. } | Source::Anonymous => return None,
        }
    }
    Some(items)
}

/// Name a bound column reference keeps in the output.
fn reference_name(expr: &Expr) -> Option<&Ident> {
    match expr {
        Expr::Identifier(ident) => Some(ident),
        Expr::CompoundIdentifier(parts) => parts.last(),
        _ => None,
    }
}

fn bind_select(select: &mut Select) -> Scope {
    let mut sources = Vec::new();
    for table in &mut select.from {
        sources.push(classify(&mut table.relation));
        for join in &mut table.joins {
            sources.push(classify(&mut join.relation));
        }
    }
    let scope = Scope::of(&sources);
    if scope.is_empty() {
        return scope;
    }
    debug!(
        unnests = scope.unnests.len(),
        records = scope.records.len(),
        "binding column references"
    );

    let mut projection = Vec::with_capacity(select.projection.len());
    for item in std::mem::take(&mut select.projection) {
        match item {
            SelectItem::UnnamedExpr(mut expr) => {
                let name = reference_name(&expr).map(|ident| ident.value.clone());
                match (bound_reference(&expr, &scope), name) {
                    (Some(bound), Some(name)) => projection.push(SelectItem::ExprWithAlias {
                        expr: bound,
                        alias: Ident::with_quote('`', name),
                    }),
                    _ => {
                        bind_expr(&mut expr, &scope);
                        projection.push(SelectItem::UnnamedExpr(expr));
                    }
                }
            }
            SelectItem::ExprWithAlias { mut expr, alias } => {
                bind_expr(&mut expr, &scope);
                projection.push(SelectItem::ExprWithAlias { expr, alias });
            }
            SelectItem::Wildcard(options) if !scope.unnests.is_empty() => {
                match expand_wildcard(&sources) {
                    Some(items) => projection.extend(items),
                    None => projection.push(SelectItem::Wildcard(options)),
                }
            }
            other => projection.push(other),
        }
    }
    select.projection = projection;

    if let Some(selection) = &mut select.selection {
        bind_expr(selection, &scope);
    }
    if let Some(having) = &mut select.having {
        bind_expr(having, &scope);
    }
    if let GroupByExpr::Expressions(exprs, _) = &mut select.group_by {
        for expr in exprs {
            bind_expr(expr, &scope);
        }
    }
    scope
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::parse;

    fn translate(sql: &str) -> String {
        transform(parse(sql).unwrap())
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }

    #[test]
    fn test_array_literal() {
        assert_eq!(translate("SELECT [1, 2, 3] AS a"), "SELECT json_array(1, 2, 3) AS a");
    }

    #[test]
    fn test_struct_literal() {
        assert_eq!(
            translate("SELECT STRUCT(1 AS x, 'a' AS y) AS s"),
            "SELECT json_object('x', 1, 'y', 'a') AS s"
        );
    }

    #[test]
    fn test_casts() {
        assert_eq!(translate("SELECT CAST(n AS STRING)"), "SELECT CAST(n AS TEXT)");
        assert_eq!(translate("SELECT CAST(s AS INT64)"), "SELECT CAST(s AS INTEGER)");
        assert_eq!(translate("SELECT CAST(s AS FLOAT64)"), "SELECT CAST(s AS REAL)");
        assert_eq!(translate("SELECT CAST(s AS DATE)"), "SELECT DATE(s)");
        assert_eq!(translate("SELECT SAFE_CAST(s AS INT64)"), "SELECT CAST(s AS INTEGER)");
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            translate("SELECT TIMESTAMP '2023-12-25 10:30:45'"),
            "SELECT '2023-12-25 10:30:45'"
        );
        assert_eq!(translate("SELECT \"x\""), "SELECT 'x'");
    }

    #[test]
    fn test_trunc_part_literal() {
        assert_eq!(
            translate("SELECT TIMESTAMP_TRUNC(ts, DAY) FROM t"),
            "SELECT TIMESTAMP_TRUNC(ts, 'DAY') FROM t"
        );
    }

    #[test]
    fn test_interval_flattening() {
        assert_eq!(
            translate("SELECT DATE_ADD('2024-01-15', INTERVAL 10 DAY)"),
            "SELECT DATE_ADD('2024-01-15', 10, 'DAY')"
        );
    }

    #[test]
    fn test_current_temporal_calls() {
        assert_eq!(translate("SELECT CURRENT_TIMESTAMP()"), "SELECT CURRENT_TIMESTAMP");
        assert_eq!(
            translate("SELECT CURRENT_DATE('Asia/Tokyo')"),
            "SELECT _CURRENT_DATE('Asia/Tokyo')"
        );
    }

    #[test]
    fn test_dotted_table_names_merge() {
        assert_eq!(translate("SELECT * FROM `d.t`"), "SELECT * FROM `d.t`");
        assert_eq!(translate("SELECT * FROM `p`.`d`.`t`"), "SELECT * FROM `d.t`");
    }

    #[test]
    fn test_unnest_binding() {
        assert_eq!(
            translate("SELECT * FROM json_each([1, 2]) AS num"),
            "SELECT num.value AS num FROM json_each(json_array(1, 2)) AS num"
        );
        assert_eq!(
            translate("SELECT num, offset FROM json_each([10, 20]) AS num (offset)"),
            "SELECT num.value AS `num`, num.key AS `offset` FROM json_each(json_array(10, 20)) AS num"
        );
        assert_eq!(
            translate("SELECT num FROM TestData, json_each(nums) AS num WHERE num > 1"),
            "SELECT num.value AS `num` FROM TestData, json_each(nums) AS num WHERE num.value > 1"
        );
    }

    #[test]
    fn test_order_by_binds_unnest_names() {
        assert_eq!(
            translate("SELECT x FROM json_each([3, 1, 2]) AS x (o) ORDER BY o DESC"),
            "SELECT x.value AS `x` FROM json_each(json_array(3, 1, 2)) AS x ORDER BY x.key DESC"
        );
        // projected names stay output aliases
        assert_eq!(
            translate("SELECT x, o FROM json_each([1]) AS x (o) ORDER BY o"),
            "SELECT x.value AS `x`, x.key AS `o` FROM json_each(json_array(1)) AS x ORDER BY o"
        );
        assert_eq!(
            translate("SELECT x * 2 AS o FROM json_each([1]) AS x (o) ORDER BY o, x"),
            "SELECT x.value * 2 AS o FROM json_each(json_array(1)) AS x ORDER BY o, x.value"
        );
    }

    #[test]
    fn test_struct_field_paths() {
        assert_eq!(
            translate("SELECT s.a FROM (SELECT STRUCT(1 AS a) AS s)"),
            "SELECT json_extract(s, '$.a') AS `a` FROM (SELECT json_object('a', 1) AS s)"
        );
        assert_eq!(
            translate("SELECT q.s FROM (SELECT STRUCT(1 AS a) AS s) AS q WHERE s.a > 0"),
            "SELECT q.s FROM (SELECT json_object('a', 1) AS s) AS q WHERE json_extract(s, '$.a') > 0"
        );
        assert_eq!(
            translate("SELECT p.name FROM json_each(people) AS p"),
            "SELECT json_extract(p.value, '$.name') AS `name` FROM json_each(people) AS p"
        );
    }
}
