//! Minimal JSON-Schema argument validation: `type`, `properties`,
//! `required`, and `items`, the subset tool authors actually declare.

use serde_json::Value;

/// Validate `instance` against `schema`, returning a human-readable
/// description of the first violation.
pub fn validate_against(instance: &Value, schema: &Value) -> Result<(), String> {
    validate_at(instance, schema, "$")
}

fn validate_at(instance: &Value, schema: &Value, path: &str) -> Result<(), String> {
    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        if !type_matches(instance, expected) {
            return Err(format!(
                "{}: expected type '{}', got {}",
                path,
                expected,
                type_name(instance)
            ));
        }
    }

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        let obj = instance.as_object();
        for field in required.iter().filter_map(Value::as_str) {
            if obj.map_or(true, |o| !o.contains_key(field)) {
                return Err(format!("{}: missing required field '{}'", path, field));
            }
        }
    }

    if let (Some(props), Some(obj)) = (
        schema.get("properties").and_then(Value::as_object),
        instance.as_object(),
    ) {
        for (key, sub_schema) in props {
            if let Some(sub_instance) = obj.get(key) {
                validate_at(sub_instance, sub_schema, &format!("{}.{}", path, key))?;
            }
        }
    }

    if let (Some(items), Some(arr)) = (schema.get("items"), instance.as_array()) {
        for (i, item) in arr.iter().enumerate() {
            validate_at(item, items, &format!("{}[{}]", path, i))?;
        }
    }

    Ok(())
}

fn type_matches(instance: &Value, expected: &str) -> bool {
    match expected {
        "object" => instance.is_object(),
        "array" => instance.is_array(),
        "string" => instance.is_string(),
        "number" => instance.is_number(),
        "integer" => instance.is_i64() || instance.is_u64(),
        "boolean" => instance.is_boolean(),
        "null" => instance.is_null(),
        _ => true,
    }
}

fn type_name(instance: &Value) -> &'static str {
    match instance {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
