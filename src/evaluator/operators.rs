//! Comparison operators with cross-type coercion: string/number and
//! string/bool comparisons behave the way workflow authors expect.

use serde_json::Value;

pub fn contains(value: &Value, target: &Value) -> bool {
    match (value, target) {
        (Value::String(s), Value::String(t)) => s.contains(t.as_str()),
        (Value::Array(arr), target) => arr.contains(target),
        (Value::String(s), Value::Number(n)) => s.contains(&n.to_string()),
        _ => false,
    }
}

pub fn starts_with(value: &Value, target: &Value) -> bool {
    match (value, target) {
        (Value::String(s), Value::String(t)) => s.starts_with(t.as_str()),
        _ => false,
    }
}

pub fn ends_with(value: &Value, target: &Value) -> bool {
    match (value, target) {
        (Value::String(s), Value::String(t)) => s.ends_with(t.as_str()),
        _ => false,
    }
}

pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(arr) => !arr.is_empty(),
        Value::Object(obj) => !obj.is_empty(),
    }
}

pub fn equal(value: &Value, target: &Value) -> bool {
    if value == target {
        return true;
    }

    match (value, target) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            s.parse::<f64>().ok().map(Some) == Some(n.as_f64())
        }
        (Value::Bool(b), Value::String(s)) | (Value::String(s), Value::Bool(b)) => {
            match s.to_lowercase().as_str() {
                "true" => *b,
                "false" => !*b,
                _ => false,
            }
        }
        _ => false,
    }
}

/// Numeric comparison; strings are coerced when they parse as numbers.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_contains() {
        assert!(contains(&json!("hello world"), &json!("world")));
        assert!(contains(&json!([1, 2, 3]), &json!(2)));
        assert!(!contains(&json!([1, 2, 3]), &json!(4)));
    }

    #[test]
    fn test_equal_cross_type() {
        assert!(equal(&json!("42"), &json!(42)));
        assert!(equal(&json!(42), &json!("42")));
        assert!(equal(&json!("true"), &json!(true)));
        assert!(!equal(&json!("42x"), &json!(42)));
    }

    #[test]
    fn test_truthy() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&json!(0)));
        assert!(truthy(&json!("x")));
        assert!(truthy(&json!([1])));
    }

    #[test]
    fn test_as_number_coercion() {
        assert_eq!(as_number(&json!("3.5")), Some(3.5));
        assert_eq!(as_number(&json!(2)), Some(2.0));
        assert_eq!(as_number(&json!("abc")), None);
    }
}
