//! Source configuration schemas and type coercion.
//!
//! A schema lists every field a source accepts along with its type, a
//! user-facing prompt, and a default. Stored `dataJSON` is checked against
//! it field by field; mistyped values are coerced where the intent is
//! unambiguous and rejected otherwise.

use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};

/// Semantic type of a config field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Boolean,
}

/// Default used when a field is absent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Str(&'static str),
    Number(f64),
    Bool(bool),
}

impl DefaultValue {
    fn to_value(self) -> Value {
        match self {
            DefaultValue::Str(s) => Value::String(s.to_string()),
            DefaultValue::Number(n) => Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null),
            DefaultValue::Bool(b) => Value::Bool(b),
        }
    }
}

/// One declared config field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchemaField {
    pub name: &'static str,
    /// Prompt shown when asking a user for this value.
    pub description: &'static str,
    pub field_type: FieldType,
    pub default: DefaultValue,
}

fn invalid(field: &str, message: impl Into<String>) -> Error {
    Error::InvalidSourceConfig {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Coerce a raw value to the field's declared type.
pub fn coerce(field: &SchemaField, raw: Option<&Value>) -> Result<Value> {
    let value = match raw {
        None | Some(Value::Null) => return Ok(field.default.to_value()),
        Some(v) => v,
    };

    match (field.field_type, value) {
        (FieldType::Boolean, Value::Bool(_))
        | (FieldType::Number, Value::Number(_))
        | (FieldType::String, Value::String(_)) => Ok(value.clone()),

        (FieldType::Boolean, Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(invalid(field.name, format!("'{}' is not a boolean", s))),
        },

        (FieldType::Number, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| invalid(field.name, format!("'{}' is not a number", s))),

        (FieldType::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
        (FieldType::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),

        (expected, other) => Err(invalid(
            field.name,
            format!("expected {:?}, got {}", expected, other),
        )),
    }
}

/// Parse stored `dataJSON` into an object. Blank input is an empty object.
pub fn parse_json_object(data_json: &str) -> Result<Map<String, Value>> {
    if data_json.trim().is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str::<Value>(data_json) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(invalid("dataJSON", format!("expected an object, got {}", other))),
        Err(e) => Err(invalid("dataJSON", e.to_string())),
    }
}

/// Validate and coerce every declared field of `data`.
pub fn apply_schema(schema: &[SchemaField], data: &Map<String, Value>) -> Result<SourceConfig> {
    let mut values = Map::new();
    for field in schema {
        values.insert(field.name.to_string(), coerce(field, data.get(field.name))?);
    }

    for key in data.keys() {
        if !schema.iter().any(|f| f.name == key) {
            tracing::debug!("Ignoring undeclared source config key '{}'", key);
        }
    }

    Ok(SourceConfig { values })
}

/// Parse and validate stored `dataJSON` in one step.
pub fn parse_config(schema: &[SchemaField], data_json: &str) -> Result<SourceConfig> {
    apply_schema(schema, &parse_json_object(data_json)?)
}

/// Coerced config values, guaranteed to match their schema types.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    values: Map<String, Value>,
}

impl SourceConfig {
    pub fn get_bool(&self, name: &str) -> Result<bool> {
        self.values
            .get(name)
            .and_then(Value::as_bool)
            .ok_or_else(|| invalid(name, "missing boolean value"))
    }

    pub fn get_str(&self, name: &str) -> Result<&str> {
        self.values
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| invalid(name, "missing string value"))
    }

    pub fn get_number(&self, name: &str) -> Result<f64> {
        self.values
            .get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| invalid(name, "missing numeric value"))
    }

    /// A non-negative whole count, such as an item limit.
    pub fn get_count(&self, name: &str) -> Result<usize> {
        let n = self.get_number(name)?;
        if n < 0.0 || n.fract() != 0.0 {
            return Err(invalid(name, format!("{} is not a non-negative integer", n)));
        }
        Ok(n as usize)
    }
}
