//! Spec parser: converts a JSON payload into a [`ChainSpec`] with typed
//! node configs. Node parsing dispatches on the `type` tag explicitly so
//! an unknown tag surfaces as [`ChainError::UnknownNodeType`] rather than a
//! generic serde message.

use serde_json::Value;

use super::schema::{ChainSpec, NodeConfig};
use crate::error::ChainError;

const KNOWN_TYPES: &[&str] = &["tool", "skill", "ai", "llm", "condition", "nested_chain", "loop"];

/// Parse a JSON payload into a [`ChainSpec`].
pub fn parse_spec(payload: &Value) -> Result<ChainSpec, ChainError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ChainError::SpecParseError("workflow payload must be an object".into()))?;

    let nodes_raw = match obj.get("nodes").and_then(Value::as_array) {
        Some(arr) if !arr.is_empty() => arr,
        _ => return Err(ChainError::EmptyWorkflow),
    };

    let mut nodes = Vec::with_capacity(nodes_raw.len());
    for raw in nodes_raw {
        nodes.push(parse_node(raw)?);
    }

    Ok(ChainSpec {
        chain_id: obj.get("chain_id").and_then(Value::as_str).map(str::to_string),
        name: obj.get("name").and_then(Value::as_str).map(str::to_string),
        version: obj
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or("1.0.0")
            .to_string(),
        description: obj
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        tags: obj
            .get("tags")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        nodes,
    })
}

/// Parse raw JSON text into a [`ChainSpec`].
pub fn parse_spec_str(content: &str) -> Result<ChainSpec, ChainError> {
    let payload: Value =
        serde_json::from_str(content).map_err(|e| ChainError::SpecParseError(e.to_string()))?;
    parse_spec(&payload)
}

fn parse_node(raw: &Value) -> Result<NodeConfig, ChainError> {
    let tag = raw
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ChainError::SpecParseError("node is missing a 'type' tag".into()))?;

    if !KNOWN_TYPES.contains(&tag) {
        return Err(ChainError::UnknownNodeType(tag.to_string()));
    }

    serde_json::from_value(raw.clone()).map_err(|e| ChainError::SpecParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_minimal_spec() {
        let payload = json!({
            "name": "sum-chain",
            "nodes": [
                {"id": "sum1", "type": "tool", "tool_name": "sum",
                 "tool_args": {"numbers": [4, 5, 6]}}
            ]
        });
        let spec = parse_spec(&payload).unwrap();
        assert_eq!(spec.version, "1.0.0");
        assert_eq!(spec.nodes.len(), 1);
        assert_eq!(spec.nodes[0].id(), "sum1");
    }

    #[test]
    fn test_parse_empty_workflow() {
        assert!(matches!(
            parse_spec(&json!({"nodes": []})),
            Err(ChainError::EmptyWorkflow)
        ));
        assert!(matches!(
            parse_spec(&json!({"name": "x"})),
            Err(ChainError::EmptyWorkflow)
        ));
    }

    #[test]
    fn test_parse_unknown_node_type() {
        let payload = json!({
            "nodes": [{"id": "x", "type": "teleport"}]
        });
        match parse_spec(&payload) {
            Err(ChainError::UnknownNodeType(tag)) => assert_eq!(tag, "teleport"),
            other => panic!("expected UnknownNodeType, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_spec_str_invalid_json() {
        assert!(matches!(
            parse_spec_str("{{{nope"),
            Err(ChainError::SpecParseError(_))
        ));
    }

    #[test]
    fn test_roundtrip_same_logical_graph() {
        let payload = json!({
            "name": "round",
            "version": "1.0.0",
            "nodes": [
                {"id": "a", "type": "tool", "tool_name": "sum"},
                {"id": "b", "type": "llm", "model": "m", "prompt": "p",
                 "dependencies": ["a"]}
            ]
        });
        let spec = parse_spec(&payload).unwrap();
        let serialized = serde_json::to_value(&spec).unwrap();
        let reparsed = parse_spec(&serialized).unwrap();
        assert_eq!(spec.nodes.len(), reparsed.nodes.len());
        for (a, b) in spec.nodes.iter().zip(reparsed.nodes.iter()) {
            assert_eq!(a.id(), b.id());
            assert_eq!(a.node_type(), b.node_type());
            assert_eq!(a.dependencies(), b.dependencies());
        }
    }
}
