//! Typed query parameters.
//!
//! Parameters are converted once per request into engine values and then
//! bound statement by statement: `@name` placeholders by name, `?` in order
//! across the whole request.

use bqlite_core::temporal::{normalize_date, normalize_datetime, normalize_timestamp};
use bqlite_core::wire::{QueryParameter, QueryParameterType, QueryParameterValue};
use bqlite_core::{Error, NativeValue, Result};
use rusqlite::Statement;
use tracing::{debug, warn};

/// Converts a parameter value according to its declared type.
///
/// INT64 → integer, FLOAT64/NUMERIC → float, BOOL → 0/1, temporal types →
/// normalized text, ARRAY → list, STRUCT → object, anything else → text.
/// A missing scalar value is NULL.
pub fn parameter_value(
    parameter_type: &QueryParameterType,
    value: &QueryParameterValue,
) -> Result<NativeValue> {
    let type_name = parameter_type.type_name.to_ascii_uppercase();
    match type_name.as_str() {
        "ARRAY" => {
            let element = parameter_type.array_type.as_deref().ok_or_else(|| {
                Error::InvalidInput("ARRAY parameter is missing its arrayType".to_string())
            })?;
            let items = value
                .array_values
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|item| parameter_value(element, item))
                .collect::<Result<Vec<_>>>()?;
            return Ok(NativeValue::Array(items));
        }
        "STRUCT" => {
            let Some(members) = value.struct_values.as_ref() else {
                return Ok(NativeValue::Null);
            };
            let mut pairs = Vec::with_capacity(parameter_type.struct_types.len());
            for (index, member) in parameter_type.struct_types.iter().enumerate() {
                let name = member
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("_field_{}", index + 1));
                let member_value = match members.get(&name) {
                    Some(raw) => serde_json::from_value::<QueryParameterValue>(raw.clone())
                        .unwrap_or_else(|_| match raw {
                            serde_json::Value::String(s) => QueryParameterValue::scalar(s.clone()),
                            other => QueryParameterValue::scalar(other.to_string()),
                        }),
                    None => QueryParameterValue::default(),
                };
                pairs.push((name, parameter_value(&member.member_type, &member_value)?));
            }
            return Ok(NativeValue::Object(pairs));
        }
        _ => {}
    }

    let Some(text) = value.value.as_deref() else {
        return Ok(NativeValue::Null);
    };
    let invalid = || Error::InvalidInput(format!("Invalid {} parameter value '{}'", type_name, text));
    let converted = match type_name.as_str() {
        "INT64" | "INTEGER" => NativeValue::Integer(text.trim().parse().map_err(|_| invalid())?),
        "FLOAT64" | "FLOAT" | "NUMERIC" | "BIGNUMERIC" => {
            NativeValue::Float(text.trim().parse().map_err(|_| invalid())?)
        }
        "BOOL" | "BOOLEAN" => match text.trim().to_ascii_lowercase().as_str() {
            "true" => NativeValue::Integer(1),
            "false" => NativeValue::Integer(0),
            _ => return Err(invalid()),
        },
        "TIMESTAMP" => NativeValue::String(normalized(text, normalize_timestamp(text), &type_name)),
        "DATE" => NativeValue::String(normalized(text, normalize_date(text), &type_name)),
        "DATETIME" => NativeValue::String(normalized(text, normalize_datetime(text), &type_name)),
        _ => NativeValue::String(text.to_string()),
    };
    Ok(converted)
}

fn normalized(text: &str, normalized: Option<String>, type_name: &str) -> String {
    normalized.unwrap_or_else(|| {
        warn!(value = %text, type_name = %type_name, "parameter does not parse, binding as text");
        text.to_string()
    })
}

/// Binds converted parameters to prepared statements.
#[derive(Debug, Default)]
pub struct ParameterBinder {
    named: Vec<(String, NativeValue)>,
    positional: Vec<NativeValue>,
    next: usize,
}

impl ParameterBinder {
    /// Converts the parameters of a request.
    ///
    /// Positional mode applies when `parameter_mode` says so, or when no
    /// parameter carries a name.
    pub fn new(parameters: &[QueryParameter], parameter_mode: Option<&str>) -> Result<Self> {
        let positional = match parameter_mode {
            Some(mode) => mode.eq_ignore_ascii_case("POSITIONAL"),
            None => parameters.iter().all(|p| p.name.is_none()),
        };
        let mut binder = Self::default();
        for parameter in parameters {
            let value = parameter_value(&parameter.parameter_type, &parameter.parameter_value)?;
            match (&parameter.name, positional) {
                (Some(name), false) => binder.named.push((name.clone(), value)),
                (None, false) => {
                    return Err(Error::InvalidInput(
                        "Named parameter mode requires a name on every parameter".to_string(),
                    ))
                }
                (_, true) => binder.positional.push(value),
            }
        }
        debug!(
            named = binder.named.len(),
            positional = binder.positional.len(),
            "query parameters converted"
        );
        Ok(binder)
    }

    fn named_value(&self, name: &str) -> Option<&NativeValue> {
        self.named
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// Binds every placeholder of `statement`.
    pub fn bind(&mut self, statement: &mut Statement<'_>) -> Result<()> {
        for index in 1..=statement.parameter_count() {
            let name = statement.parameter_name(index).map(str::to_string);
            let value = match name.as_deref() {
                Some(name) if name.starts_with('?') => {
                    let number: usize = name[1..].parse().map_err(|_| {
                        Error::InvalidInput(format!("Invalid parameter placeholder '{}'", name))
                    })?;
                    number
                        .checked_sub(1)
                        .and_then(|i| self.positional.get(i))
                        .ok_or_else(|| {
                            Error::InvalidInput(format!("Missing positional parameter {}", number))
                        })?
                }
                Some(name) => {
                    let bare = name.trim_start_matches(['@', ':', '$']);
                    self.named_value(bare).ok_or_else(|| {
                        Error::InvalidInput(format!("Query parameter '{}' not found", bare))
                    })?
                }
                None => {
                    let value = self.positional.get(self.next).ok_or_else(|| {
                        Error::InvalidInput(format!(
                            "Missing positional parameter {}",
                            self.next + 1
                        ))
                    })?;
                    self.next += 1;
                    value
                }
            };
            statement.raw_bind_parameter(index, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bqlite_core::wire::StructParameterType;
    use serde_json::json;

    fn scalar(type_name: &str, value: &str) -> NativeValue {
        parameter_value(
            &QueryParameterType::scalar(type_name),
            &QueryParameterValue::scalar(value),
        )
        .unwrap()
    }

    #[test]
    fn test_scalar_conversion() {
        assert_eq!(scalar("INT64", "42"), NativeValue::Integer(42));
        assert_eq!(scalar("FLOAT64", "1.5"), NativeValue::Float(1.5));
        assert_eq!(scalar("NUMERIC", "2"), NativeValue::Float(2.0));
        assert_eq!(scalar("BOOL", "true"), NativeValue::Integer(1));
        assert_eq!(scalar("BOOL", "FALSE"), NativeValue::Integer(0));
        assert_eq!(scalar("STRING", "x"), NativeValue::String("x".into()));
        assert_eq!(
            scalar("TIMESTAMP", "2024-01-01 09:00:00+09:00"),
            NativeValue::String("2024-01-01T00:00:00.000Z".into())
        );
        assert_eq!(scalar("DATE", "2024-01-05"), NativeValue::String("2024-01-05".into()));
    }

    #[test]
    fn test_invalid_scalar() {
        let err = parameter_value(
            &QueryParameterType::scalar("INT64"),
            &QueryParameterValue::scalar("abc"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_null_scalar() {
        let value = parameter_value(
            &QueryParameterType::scalar("STRING"),
            &QueryParameterValue::default(),
        )
        .unwrap();
        assert_eq!(value, NativeValue::Null);
    }

    #[test]
    fn test_array_conversion() {
        let value = parameter_value(
            &QueryParameterType::array(QueryParameterType::scalar("INT64")),
            &QueryParameterValue::array(vec![
                QueryParameterValue::scalar("1"),
                QueryParameterValue::scalar("2"),
            ]),
        )
        .unwrap();
        assert_eq!(
            value,
            NativeValue::Array(vec![NativeValue::Integer(1), NativeValue::Integer(2)])
        );
        assert_eq!(value.to_json(), json!([1, 2]));
    }

    #[test]
    fn test_struct_conversion() {
        let parameter_type = QueryParameterType {
            type_name: "STRUCT".to_string(),
            array_type: None,
            struct_types: vec![
                StructParameterType {
                    name: Some("id".to_string()),
                    member_type: QueryParameterType::scalar("INT64"),
                },
                StructParameterType {
                    name: Some("name".to_string()),
                    member_type: QueryParameterType::scalar("STRING"),
                },
            ],
        };
        let value = QueryParameterValue {
            struct_values: serde_json::from_value(json!({
                "id": { "value": "7" },
                "name": { "value": "x" }
            }))
            .unwrap(),
            ..Default::default()
        };
        let converted = parameter_value(&parameter_type, &value).unwrap();
        assert_eq!(converted.to_json(), json!({ "id": 7, "name": "x" }));
    }

    #[test]
    fn test_binder_modes() {
        let named = vec![QueryParameter {
            name: Some("n".to_string()),
            parameter_type: QueryParameterType::scalar("INT64"),
            parameter_value: QueryParameterValue::scalar("1"),
        }];
        let binder = ParameterBinder::new(&named, None).unwrap();
        assert_eq!(binder.named.len(), 1);

        let positional = vec![QueryParameter {
            name: None,
            parameter_type: QueryParameterType::scalar("INT64"),
            parameter_value: QueryParameterValue::scalar("1"),
        }];
        let binder = ParameterBinder::new(&positional, Some("POSITIONAL")).unwrap();
        assert_eq!(binder.positional.len(), 1);
        assert!(ParameterBinder::new(&positional, Some("NAMED")).is_err());
    }

    #[test]
    fn test_bind_statement() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let named = vec![QueryParameter {
            name: Some("limit".to_string()),
            parameter_type: QueryParameterType::scalar("INT64"),
            parameter_value: QueryParameterValue::scalar("3"),
        }];
        let mut binder = ParameterBinder::new(&named, None).unwrap();
        let mut stmt = conn.prepare("SELECT @limit + 1").unwrap();
        binder.bind(&mut stmt).unwrap();
        let mut rows = stmt.raw_query();
        let row = rows.next().unwrap().unwrap();
        assert_eq!(row.get::<_, i64>(0).unwrap(), 4);
    }

    #[test]
    fn test_missing_named_parameter() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let mut binder = ParameterBinder::new(&[], None).unwrap();
        let mut stmt = conn.prepare("SELECT @missing").unwrap();
        assert!(matches!(binder.bind(&mut stmt), Err(Error::InvalidInput(_))));
    }
}
