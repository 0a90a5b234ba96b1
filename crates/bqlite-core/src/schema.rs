//! Field schemas, table schemas and the table DDL grammar.
//!
//! A [`FieldSchema`] mirrors the warehouse `TableFieldSchema` resource. Type
//! names are a closed enumeration; warehouse aliases (`INT64`, `FLOAT64`,
//! `BOOLEAN`, `RECORD`) are accepted on input and the canonical name is
//! written on output.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Declared column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    /// Variable-length text
    #[serde(rename = "STRING")]
    String,
    /// 64-bit signed integer
    #[serde(rename = "INTEGER", alias = "INT64")]
    Integer,
    /// 64-bit float
    #[serde(rename = "FLOAT", alias = "FLOAT64")]
    Float,
    /// Boolean
    #[serde(rename = "BOOL", alias = "BOOLEAN")]
    Bool,
    /// Raw bytes
    #[serde(rename = "BYTES")]
    Bytes,
    /// Calendar date
    #[serde(rename = "DATE")]
    Date,
    /// Civil date and time without zone
    #[serde(rename = "DATETIME")]
    Datetime,
    /// Time of day
    #[serde(rename = "TIME")]
    Time,
    /// Absolute point in time
    #[serde(rename = "TIMESTAMP")]
    Timestamp,
    /// Exact decimal
    #[serde(rename = "NUMERIC")]
    Numeric,
    /// Wide exact decimal
    #[serde(rename = "BIGNUMERIC")]
    BigNumeric,
    /// Record with nested fields
    #[serde(rename = "STRUCT", alias = "RECORD")]
    Struct,
    /// Geography value (stored as text)
    #[serde(rename = "GEOGRAPHY")]
    Geography,
    /// JSON document
    #[serde(rename = "JSON")]
    Json,
}

impl TypeTag {
    /// Resolves a warehouse type name (case-insensitive, aliases included).
    pub fn from_name(name: &str) -> Option<TypeTag> {
        let tag = match name.trim().to_ascii_uppercase().as_str() {
            "STRING" | "TEXT" | "VARCHAR" => TypeTag::String,
            "INTEGER" | "INT64" | "INT" | "SMALLINT" | "BIGINT" | "TINYINT" | "BYTEINT" => {
                TypeTag::Integer
            }
            "FLOAT" | "FLOAT64" | "REAL" | "DOUBLE" => TypeTag::Float,
            "BOOL" | "BOOLEAN" => TypeTag::Bool,
            "BYTES" | "BLOB" => TypeTag::Bytes,
            "DATE" => TypeTag::Date,
            "DATETIME" => TypeTag::Datetime,
            "TIME" => TypeTag::Time,
            "TIMESTAMP" => TypeTag::Timestamp,
            "NUMERIC" | "DECIMAL" => TypeTag::Numeric,
            "BIGNUMERIC" | "BIGDECIMAL" => TypeTag::BigNumeric,
            "STRUCT" | "RECORD" => TypeTag::Struct,
            "GEOGRAPHY" => TypeTag::Geography,
            "JSON" => TypeTag::Json,
            _ => return None,
        };
        Some(tag)
    }

    /// Canonical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::String => "STRING",
            TypeTag::Integer => "INTEGER",
            TypeTag::Float => "FLOAT",
            TypeTag::Bool => "BOOL",
            TypeTag::Bytes => "BYTES",
            TypeTag::Date => "DATE",
            TypeTag::Datetime => "DATETIME",
            TypeTag::Time => "TIME",
            TypeTag::Timestamp => "TIMESTAMP",
            TypeTag::Numeric => "NUMERIC",
            TypeTag::BigNumeric => "BIGNUMERIC",
            TypeTag::Struct => "STRUCT",
            TypeTag::Geography => "GEOGRAPHY",
            TypeTag::Json => "JSON",
        }
    }

    /// Name used when rendering a DDL definition.
    fn ddl_name(&self) -> &'static str {
        match self {
            TypeTag::Integer => "INT64",
            TypeTag::Float => "FLOAT64",
            other => other.as_str(),
        }
    }

    /// Column type used for the engine table backing this field.
    pub fn engine_column_type(&self) -> &'static str {
        match self {
            TypeTag::Integer | TypeTag::Bool => "INTEGER",
            TypeTag::Float | TypeTag::Numeric | TypeTag::BigNumeric => "REAL",
            TypeTag::Struct | TypeTag::Json => "JSON",
            _ => "TEXT",
        }
    }

    /// True for INTEGER and FLOAT.
    pub fn is_numeric(&self) -> bool {
        matches!(self, TypeTag::Integer | TypeTag::Float)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Nullability and cardinality of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    /// May hold NULL
    #[default]
    Nullable,
    /// Never NULL
    Required,
    /// Array of the field type
    Repeated,
}

/// A named, typed, moded column descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    /// Column name
    pub name: String,
    /// Declared type
    #[serde(rename = "type")]
    pub field_type: TypeTag,
    /// Mode, NULLABLE when absent
    #[serde(default)]
    pub mode: Mode,
    /// Nested fields, only for STRUCT
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldSchema>,
    /// Maximum length for STRING/BYTES
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<String>,
    /// Precision for NUMERIC/BIGNUMERIC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<String>,
    /// Scale for NUMERIC/BIGNUMERIC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<String>,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldSchema {
    /// Creates a NULLABLE field.
    pub fn new<S: Into<String>>(name: S, field_type: TypeTag) -> Self {
        Self {
            name: name.into(),
            field_type,
            mode: Mode::Nullable,
            fields: Vec::new(),
            max_length: None,
            precision: None,
            scale: None,
            description: None,
        }
    }

    /// Creates a REPEATED field of `field_type`.
    pub fn repeated<S: Into<String>>(name: S, field_type: TypeTag) -> Self {
        Self::new(name, field_type).with_mode(Mode::Repeated)
    }

    /// Creates a STRUCT field.
    pub fn record<S: Into<String>>(name: S, fields: Vec<FieldSchema>) -> Self {
        Self::new(name, TypeTag::Struct).with_fields(fields)
    }

    /// Set the mode
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set nested fields
    pub fn with_fields(mut self, fields: Vec<FieldSchema>) -> Self {
        self.fields = fields;
        self
    }

    /// Rename the field, keeping everything else
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// True when the field is an array.
    pub fn is_repeated(&self) -> bool {
        self.mode == Mode::Repeated
    }

    /// True when the field holds a record.
    pub fn is_record(&self) -> bool {
        self.field_type == TypeTag::Struct
    }

    /// Checks the STRUCT/nested-fields invariant recursively.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::InvalidInput("field name cannot be empty".to_string()));
        }
        match (self.is_record(), self.fields.is_empty()) {
            (true, true) => Err(Error::InvalidInput(format!(
                "Field {} is type RECORD but has no schema",
                self.name
            ))),
            (false, false) => Err(Error::InvalidInput(format!(
                "Field {} has nested fields but is type {}",
                self.name, self.field_type
            ))),
            _ => self.fields.iter().try_for_each(FieldSchema::validate),
        }
    }

    /// Column definition for the backing engine table.
    pub fn engine_column_definition(&self) -> String {
        let column_type = if self.is_repeated() {
            "JSON"
        } else {
            self.field_type.engine_column_type()
        };
        let not_null = if self.mode == Mode::Required { " NOT NULL" } else { "" };
        format!("`{}` {}{}", self.name, column_type, not_null)
    }

    fn type_definition(&self) -> String {
        if self.is_record() {
            let inner: Vec<String> = self.fields.iter().map(FieldSchema::to_ddl).collect();
            return format!("STRUCT<{}>", inner.join(", "));
        }
        let mut def = self.field_type.ddl_name().to_string();
        if let Some(len) = &self.max_length {
            def.push_str(&format!("({})", len));
        } else if let Some(precision) = &self.precision {
            match &self.scale {
                Some(scale) => def.push_str(&format!("({}, {})", precision, scale)),
                None => def.push_str(&format!("({})", precision)),
            }
        }
        def
    }

    /// Renders the field in the DDL grammar accepted by [`parse_schema`].
    pub fn to_ddl(&self) -> String {
        let mut def = format!("{} ", self.name);
        match self.mode {
            Mode::Repeated => def.push_str(&format!("ARRAY<{}>", self.type_definition())),
            _ => def.push_str(&self.type_definition()),
        }
        if self.mode == Mode::Required {
            def.push_str(" NOT NULL");
        }
        def
    }
}

/// Ordered field list of a table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Top-level fields in column order
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

impl TableSchema {
    /// Wraps a field list.
    pub fn new(fields: Vec<FieldSchema>) -> Self {
        Self { fields }
    }

    /// Looks up a top-level field by name (case-insensitive, like the
    /// warehouse's column resolution).
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Validates every field.
    pub fn validate(&self) -> Result<()> {
        self.fields.iter().try_for_each(FieldSchema::validate)
    }

    /// Renders the schema as a DDL definition list.
    pub fn to_ddl(&self) -> String {
        self.fields
            .iter()
            .map(FieldSchema::to_ddl)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Builds the `CREATE TABLE` statement for the engine table backing
/// `dataset.table`. Arrays and records are stored as JSON text.
pub fn create_table_sql(dataset_id: &str, table_id: &str, fields: &[FieldSchema]) -> String {
    let columns: Vec<String> = fields
        .iter()
        .map(|f| format!("  {}", f.engine_column_definition()))
        .collect();
    format!(
        "CREATE TABLE `{}.{}` (\n{}\n)",
        dataset_id,
        table_id,
        columns.join(",\n")
    )
}

/// Parses a DDL-style schema definition such as
/// `id INT64 NOT NULL, tags ARRAY<STRING>, addr STRUCT<city STRING>`.
///
/// The `name:TYPE` form used by client libraries is accepted as well.
pub fn parse_schema(definition: &str) -> Result<Vec<FieldSchema>> {
    let mut parser = SchemaParser::new(definition);
    let fields = parser.parse_fields(None)?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(fields)
}

struct SchemaParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> SchemaParser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.pos += ch.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, ch: char) -> Result<()> {
        self.skip_ws();
        if self.eat(ch) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", ch)))
        }
    }

    fn error(&self, msg: &str) -> Error {
        Error::InvalidInput(format!("schema definition: {} at offset {}", msg, self.pos))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let rest = self.rest();
        if rest.len() >= keyword.len()
            && rest[..keyword.len()].eq_ignore_ascii_case(keyword)
            && !rest[keyword.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn identifier(&mut self) -> Result<String> {
        self.skip_ws();
        if self.eat('`') {
            let end = self
                .rest()
                .find('`')
                .ok_or_else(|| self.error("unterminated quoted identifier"))?;
            let name = self.rest()[..end].to_string();
            self.pos += end + 1;
            return Ok(name);
        }
        let len = self
            .rest()
            .char_indices()
            .find(|(i, c)| {
                !(c.is_ascii_alphabetic() || *c == '_' || (*i > 0 && c.is_ascii_digit()))
            })
            .map(|(i, _)| i)
            .unwrap_or_else(|| self.rest().len());
        if len == 0 {
            return Err(self.error("expected identifier"));
        }
        let name = self.rest()[..len].to_string();
        self.pos += len;
        Ok(name)
    }

    fn number(&mut self) -> Result<String> {
        self.skip_ws();
        let len = self
            .rest()
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or_else(|| self.rest().len());
        if len == 0 {
            return Err(self.error("expected number"));
        }
        let digits = self.rest()[..len].to_string();
        self.pos += len;
        Ok(digits)
    }

    fn parse_fields(&mut self, terminator: Option<char>) -> Result<Vec<FieldSchema>> {
        let mut fields = Vec::new();
        loop {
            self.skip_ws();
            if self.at_end() || (terminator.is_some() && self.peek() == terminator) {
                break;
            }
            fields.push(self.parse_field()?);
            self.skip_ws();
            if !self.eat(',') {
                break;
            }
        }
        Ok(fields)
    }

    fn parse_field(&mut self) -> Result<FieldSchema> {
        let name = self.identifier()?;
        self.skip_ws();
        self.eat(':');
        let mut field = self.parse_type()?.with_name(name);
        self.skip_ws();
        if self.eat_keyword("NOT") {
            self.skip_ws();
            if !self.eat_keyword("NULL") {
                return Err(self.error("expected NULL after NOT"));
            }
            if field.mode != Mode::Repeated {
                field.mode = Mode::Required;
            }
        }
        Ok(field)
    }

    fn parse_type(&mut self) -> Result<FieldSchema> {
        self.skip_ws();
        let word = self.identifier()?;
        match word.to_ascii_uppercase().as_str() {
            "ARRAY" => {
                self.expect('<')?;
                let inner = self.parse_type()?;
                self.expect('>')?;
                Ok(inner.with_mode(Mode::Repeated))
            }
            "STRUCT" | "RECORD" => {
                self.expect('<')?;
                let fields = self.parse_fields(Some('>'))?;
                self.expect('>')?;
                Ok(FieldSchema::record(String::new(), fields))
            }
            other => {
                let tag = TypeTag::from_name(other)
                    .ok_or_else(|| self.error(&format!("unknown type {}", other)))?;
                let mut field = FieldSchema::new(String::new(), tag);
                self.skip_ws();
                if self.eat('(') {
                    let first = self.number()?;
                    self.skip_ws();
                    let second = if self.eat(',') { Some(self.number()?) } else { None };
                    self.expect(')')?;
                    match tag {
                        TypeTag::String | TypeTag::Bytes => field.max_length = Some(first),
                        TypeTag::Numeric | TypeTag::BigNumeric => {
                            field.precision = Some(first);
                            field.scale = second;
                        }
                        _ => {}
                    }
                }
                Ok(field)
            }
        }
    }
}
