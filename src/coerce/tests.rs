use std::sync::Arc;

use serde_json::json;

use super::{coerce_body, FieldType, ParamSchema, SchemaError};

fn number_string_schema() -> ParamSchema {
    ParamSchema::new()
        .field("a", FieldType::Number)
        .field("b", FieldType::String)
}

#[test]
fn test_allow_list_intersection() {
    let schema = number_string_schema();
    let out = coerce_body(&schema, &json!({"a": "3", "b": "x", "c": "ignored"})).unwrap();
    assert_eq!(out, json!({"a": 3, "b": "x"}));
}

#[test]
fn test_declared_but_absent_fields_do_not_materialize() {
    let schema = number_string_schema();
    let out = coerce_body(&schema, &json!({"b": "only"})).unwrap();
    assert_eq!(out, json!({"b": "only"}));
}

#[test]
fn test_rotation_field_always_dropped() {
    // Even a schema that declares the reserved field cannot resurrect it.
    let schema = ParamSchema::new()
        .field("rusty", FieldType::Boolean)
        .field("keep", FieldType::String);
    let out = coerce_body(&schema, &json!({"rusty": true, "keep": "v"})).unwrap();
    assert_eq!(out, json!({"keep": "v"}));
}

#[test]
fn test_number_parse_ladder() {
    let schema = ParamSchema::new().field("n", FieldType::Number);
    assert_eq!(coerce_body(&schema, &json!({"n": "42"})).unwrap(), json!({"n": 42}));
    assert_eq!(coerce_body(&schema, &json!({"n": "4.5"})).unwrap(), json!({"n": 4.5}));
    assert_eq!(coerce_body(&schema, &json!({"n": 7})).unwrap(), json!({"n": 7}));
    // Non-numeric input yields the defined failure value, not an error.
    assert_eq!(
        coerce_body(&schema, &json!({"n": "not a number"})).unwrap(),
        json!({"n": null})
    );
    assert_eq!(coerce_body(&schema, &json!({"n": [1]})).unwrap(), json!({"n": null}));
}

#[test]
fn test_string_identity_and_stringification() {
    let schema = ParamSchema::new().field("s", FieldType::String);
    assert_eq!(
        coerce_body(&schema, &json!({"s": "plain"})).unwrap(),
        json!({"s": "plain"})
    );
    assert_eq!(coerce_body(&schema, &json!({"s": 12})).unwrap(), json!({"s": "12"}));
    assert_eq!(
        coerce_body(&schema, &json!({"s": true})).unwrap(),
        json!({"s": "true"})
    );
}

#[test]
fn test_structured_parse_of_textual_values() {
    let schema = ParamSchema::new()
        .field("o", FieldType::Object)
        .field("l", FieldType::Array);
    let out = coerce_body(&schema, &json!({"o": "{\"k\": 1}", "l": "[1, 2]"})).unwrap();
    assert_eq!(out, json!({"o": {"k": 1}, "l": [1, 2]}));

    // Already-structured values pass through.
    let out = coerce_body(&schema, &json!({"o": {"k": 2}, "l": [3]})).unwrap();
    assert_eq!(out, json!({"o": {"k": 2}, "l": [3]}));
}

#[test]
fn test_structured_parse_failure_is_an_error() {
    let schema = ParamSchema::new().field("o", FieldType::Object);
    assert!(coerce_body(&schema, &json!({"o": "{not json"})).is_err());
    // Parsing to the wrong shape fails too.
    assert!(coerce_body(&schema, &json!({"o": "[1, 2]"})).is_err());
    assert!(coerce_body(&schema, &json!({"o": 5})).is_err());
}

#[test]
fn test_boolean_truth_parse() {
    let schema = ParamSchema::new().field("b", FieldType::Boolean);
    assert_eq!(coerce_body(&schema, &json!({"b": true})).unwrap(), json!({"b": true}));
    assert_eq!(
        coerce_body(&schema, &json!({"b": "false"})).unwrap(),
        json!({"b": false})
    );
    assert_eq!(coerce_body(&schema, &json!({"b": 1})).unwrap(), json!({"b": true}));
    assert_eq!(coerce_body(&schema, &json!({"b": 0})).unwrap(), json!({"b": false}));
    assert_eq!(
        coerce_body(&schema, &json!({"b": "maybe"})).unwrap(),
        json!({"b": null})
    );
}

#[test]
fn test_custom_coercion_function() {
    let upper = Arc::new(|v: &serde_json::Value| {
        serde_json::Value::String(v.as_str().unwrap_or_default().to_uppercase())
    });
    let schema = ParamSchema::new().field("tag", FieldType::Custom(upper));
    let out = coerce_body(&schema, &json!({"tag": "loud"})).unwrap();
    assert_eq!(out, json!({"tag": "LOUD"}));
}

#[test]
fn test_non_object_body_coerces_to_empty_object() {
    let schema = number_string_schema();
    assert_eq!(coerce_body(&schema, &json!([1, 2])).unwrap(), json!({}));
    assert_eq!(coerce_body(&schema, &json!("text")).unwrap(), json!({}));
}

#[test]
fn test_schema_from_value() {
    let schema =
        ParamSchema::from_value(&json!({"a": "number", "b": "string", "c": "boolean"})).unwrap();
    assert_eq!(schema.len(), 3);
    let out = coerce_body(&schema, &json!({"a": "1", "b": 2, "c": "true"})).unwrap();
    assert_eq!(out, json!({"a": 1, "b": "2", "c": true}));
}

#[test]
fn test_schema_from_value_rejects_malformed_definitions() {
    assert!(matches!(
        ParamSchema::from_value(&json!(["number"])),
        Err(SchemaError::NotAnObject)
    ));
    assert!(matches!(
        ParamSchema::from_value(&json!({"a": "integer"})),
        Err(SchemaError::UnknownTag { .. })
    ));
    assert!(matches!(
        ParamSchema::from_value(&json!({"a": 3})),
        Err(SchemaError::NonStringTag { .. })
    ));
}
