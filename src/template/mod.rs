//! Placeholder rendering with a small explicit grammar: `{id}` or
//! `{id.field.sub}` resolved against the node context. No expression
//! evaluation: a placeholder either resolves to a context value or is
//! left untouched.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\}").expect("valid regex")
    })
}

fn leftover_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Matches the original placeholder grammar including stray whitespace,
    // so "{ n0.x }" is still flagged as unresolved.
    RE.get_or_init(|| Regex::new(r"\{\s*[A-Za-z0-9_.]+\s*\}").expect("valid regex"))
}

/// Look up a dotted path inside a JSON value. Array segments may be
/// numeric indices.
pub fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(arr) => arr.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Render a value for string interpolation: strings verbatim, everything
/// else compact JSON.
fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Substitute every resolvable `{path}` placeholder in `text` with the
/// matching context value. Unresolvable placeholders stay as written.
pub fn render_placeholders(text: &str, ctx: &Value) -> String {
    placeholder_re()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            match lookup_path(ctx, &caps[1]) {
                Some(value) => value_to_text(value),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Whether `text` still contains an unresolved `{path}` placeholder.
pub fn has_unresolved_placeholders(text: &str) -> bool {
    leftover_re().is_match(text)
}

/// Recursively substitute placeholders inside string leaves of `args`.
/// Non-strings pass through unchanged.
pub fn apply_context(args: &Value, ctx: &Value) -> Value {
    match args {
        Value::String(s) => Value::String(render_placeholders(s, ctx)),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), apply_context(v, ctx)))
                .collect(),
        ),
        Value::Array(arr) => Value::Array(arr.iter().map(|v| apply_context(v, ctx)).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_simple() {
        let ctx = json!({"n0": {"x": 42}});
        assert_eq!(render_placeholders("v={n0.x}", &ctx), "v=42");
    }

    #[test]
    fn test_render_string_verbatim() {
        let ctx = json!({"greet": "hello"});
        assert_eq!(render_placeholders("{greet} world", &ctx), "hello world");
    }

    #[test]
    fn test_render_object_as_json() {
        let ctx = json!({"n0": {"out": {"a": 1}}});
        assert_eq!(render_placeholders("{n0.out}", &ctx), r#"{"a":1}"#);
    }

    #[test]
    fn test_missing_placeholder_left_unchanged() {
        let ctx = json!({"n0": {"x": 1}});
        assert_eq!(render_placeholders("{ghost.y}", &ctx), "{ghost.y}");
    }

    #[test]
    fn test_array_index_path() {
        let ctx = json!({"items": ["a", "b"]});
        assert_eq!(render_placeholders("{items.1}", &ctx), "b");
    }

    #[test]
    fn test_leftover_detection() {
        assert!(has_unresolved_placeholders("left {n0.x} over"));
        assert!(has_unresolved_placeholders("{ n0.x }"));
        assert!(!has_unresolved_placeholders("no placeholders"));
        // JSON braces do not trip the detector.
        assert!(!has_unresolved_placeholders(r#"{"tool_name": "sum"}"#));
    }

    #[test]
    fn test_apply_context_recursive() {
        let ctx = json!({"n0": {"x": 42}});
        let args = json!({
            "v": "{n0.x}",
            "fixed": 7,
            "nested": {"inner": "{n0.x}"},
            "list": ["{n0.x}", true]
        });
        let out = apply_context(&args, &ctx);
        assert_eq!(out["v"], "42");
        assert_eq!(out["fixed"], 7);
        assert_eq!(out["nested"]["inner"], "42");
        assert_eq!(out["list"][0], "42");
        assert_eq!(out["list"][1], true);
    }

    #[test]
    fn test_lookup_path() {
        let ctx = json!({"a": {"b": {"c": 3}}});
        assert_eq!(lookup_path(&ctx, "a.b.c"), Some(&json!(3)));
        assert_eq!(lookup_path(&ctx, "a.z"), None);
    }
}
