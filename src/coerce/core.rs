use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::credentials::ROTATION_FIELD;

/// Caller-supplied coercion function for the `custom` tag.
pub type CoerceFn = dyn Fn(&Value) -> Value + Send + Sync;

/// Declared value type for a single schema field.
#[derive(Clone)]
pub enum FieldType {
    /// Identity cast: strings pass through, scalars are stringified.
    String,
    /// Numeric parse; non-numeric input coerces to `null`, never an error.
    Number,
    /// Structured parse of textual input; failure aborts the request.
    Object,
    /// Structured parse of textual input; failure aborts the request.
    Array,
    /// Built-in truth parse (bool passthrough, `"true"`/`"false"`, 0/1).
    Boolean,
    /// Caller-supplied coercion, only constructible through the builder.
    Custom(Arc<CoerceFn>),
}

impl std::fmt::Debug for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::String => f.write_str("String"),
            FieldType::Number => f.write_str("Number"),
            FieldType::Object => f.write_str("Object"),
            FieldType::Array => f.write_str("Array"),
            FieldType::Boolean => f.write_str("Boolean"),
            FieldType::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl FieldType {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "string" => Some(FieldType::String),
            "number" => Some(FieldType::Number),
            "object" => Some(FieldType::Object),
            "array" => Some(FieldType::Array),
            "boolean" => Some(FieldType::Boolean),
            _ => None,
        }
    }
}

/// Structural problem in a schema definition.
///
/// Raised while a schema is being built from a route source, so it reaches
/// the compiler's error channel rather than a client.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema must be an object mapping field names to type tags")]
    NotAnObject,
    #[error("field `{field}` declares unknown type tag `{tag}`")]
    UnknownTag { field: String, tag: String },
    #[error("field `{field}` must declare its type as a string tag")]
    NonStringTag { field: String },
}

/// Request-level coercion failure: a structured tag received text that does
/// not parse. The handler is never invoked for the affected request.
#[derive(Debug, Error)]
pub enum CoercionError {
    #[error("field `{field}` is not valid {expected}: {reason}")]
    StructuredParse {
        field: String,
        expected: &'static str,
        reason: String,
    },
}

/// Allow-list of expected body fields and their coercion rules.
///
/// Field order is stable (sorted by name) so schema-derived artifacts are
/// reproducible across compilations of the same source.
#[derive(Debug, Clone, Default)]
pub struct ParamSchema {
    fields: BTreeMap<String, FieldType>,
}

impl ParamSchema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field. Builder-style; the only way to attach a
    /// [`FieldType::Custom`] coercion.
    #[must_use]
    pub fn field(mut self, name: &str, ty: FieldType) -> Self {
        self.fields.insert(name.to_string(), ty);
        self
    }

    /// Build a schema from its on-disk JSON form, e.g. `{"a": "number"}`.
    ///
    /// Only the built-in string tags are expressible here; custom coercions
    /// require the builder.
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        let map = value.as_object().ok_or(SchemaError::NotAnObject)?;
        let mut fields = BTreeMap::new();
        for (name, tag) in map {
            let tag = tag.as_str().ok_or_else(|| SchemaError::NonStringTag {
                field: name.clone(),
            })?;
            let ty = FieldType::from_tag(tag).ok_or_else(|| SchemaError::UnknownTag {
                field: name.clone(),
                tag: tag.to_string(),
            })?;
            fields.insert(name.clone(), ty);
        }
        Ok(Self { fields })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldType)> {
        self.fields.iter()
    }
}

/// Coerce a raw request body against a schema.
///
/// The schema is an allow-list: raw fields it does not declare are dropped,
/// declared fields absent from the body do not materialize. The reserved
/// rotation-trigger field never survives, schema or not - it belongs to the
/// rotation flow upstream of the handler.
pub fn coerce_body(schema: &ParamSchema, raw: &Value) -> Result<Value, CoercionError> {
    let raw_map = match raw.as_object() {
        Some(map) => map,
        // A non-object body has no fields to intersect with the schema.
        None => return Ok(Value::Object(Map::new())),
    };

    let mut coerced = Map::new();
    for (name, ty) in &schema.fields {
        if name == ROTATION_FIELD {
            continue;
        }
        let value = match raw_map.get(name) {
            Some(v) => v,
            None => continue,
        };
        coerced.insert(name.clone(), coerce_field(name, ty, value)?);
    }
    Ok(Value::Object(coerced))
}

fn coerce_field(name: &str, ty: &FieldType, value: &Value) -> Result<Value, CoercionError> {
    match ty {
        FieldType::String => Ok(coerce_string(value)),
        FieldType::Number => Ok(coerce_number(value)),
        FieldType::Object => coerce_structured(name, value, "object", Value::is_object),
        FieldType::Array => coerce_structured(name, value, "array", Value::is_array),
        FieldType::Boolean => Ok(coerce_boolean(value)),
        FieldType::Custom(f) => Ok(f(value)),
    }
}

fn coerce_string(value: &Value) -> Value {
    match value {
        Value::String(_) => value.clone(),
        Value::Null => Value::Null,
        Value::Bool(b) => Value::String(b.to_string()),
        Value::Number(n) => Value::String(n.to_string()),
        other => Value::String(other.to_string()),
    }
}

fn coerce_number(value: &Value) -> Value {
    match value {
        Value::Number(_) => value.clone(),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Value::from(i);
            }
            match s.parse::<f64>() {
                Ok(f) => serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
                // The defined failure value: the request still reaches the
                // handler, unlike a structured-parse failure.
                Err(_) => Value::Null,
            }
        }
        _ => Value::Null,
    }
}

fn coerce_boolean(value: &Value) -> Value {
    match value {
        Value::Bool(_) => value.clone(),
        Value::String(s) => match s.trim() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::Null,
        },
        Value::Number(n) => match n.as_i64() {
            Some(0) => Value::Bool(false),
            Some(1) => Value::Bool(true),
            _ => Value::Null,
        },
        _ => Value::Null,
    }
}

fn coerce_structured(
    name: &str,
    value: &Value,
    expected: &'static str,
    is_wanted: impl Fn(&Value) -> bool,
) -> Result<Value, CoercionError> {
    if is_wanted(value) {
        return Ok(value.clone());
    }
    let text = match value {
        Value::String(s) => s,
        other => {
            return Err(CoercionError::StructuredParse {
                field: name.to_string(),
                expected,
                reason: format!("got {}", type_name(other)),
            })
        }
    };
    let parsed: Value = serde_json::from_str(text).map_err(|e| CoercionError::StructuredParse {
        field: name.to_string(),
        expected,
        reason: e.to_string(),
    })?;
    if is_wanted(&parsed) {
        Ok(parsed)
    } else {
        Err(CoercionError::StructuredParse {
            field: name.to_string(),
            expected,
            reason: format!("parsed to {}", type_name(&parsed)),
        })
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
