//! Unified execution results: every executor returns a
//! [`NodeExecutionResult`]; a run aggregates them into a
//! [`ChainExecutionResult`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::NodeError;
use crate::llm::LlmUsage;

fn is_false(b: &bool) -> bool {
    !*b
}

/// Identity and timing of one node execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub node_id: String,
    pub node_type: String,
    pub name: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Wall-clock seconds.
    #[serde(default)]
    pub duration: f64,
    /// Set when an agent loop ran out of rounds before terminating.
    #[serde(default, skip_serializing_if = "is_false")]
    pub rounds_exhausted: bool,
}

impl NodeMetadata {
    pub fn started(node_id: &str, node_type: &str, name: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            node_type: node_type.to_string(),
            name: name.to_string(),
            start_time: Utc::now(),
            end_time: None,
            duration: 0.0,
            rounds_exhausted: false,
        }
    }

    pub fn finish(mut self, duration: f64) -> Self {
        self.end_time = Some(Utc::now());
        self.duration = duration;
        self
    }
}

/// Token/cost accounting for one node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub cost: f64,
    pub api_calls: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl UsageMetadata {
    pub fn from_llm(usage: &LlmUsage, cost: f64, api_calls: i64, model: &str, provider: &str) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            cost,
            api_calls,
            model: Some(model.to_string()),
            provider: Some(provider.to_string()),
        }
    }
}

/// Result of one node execution, success or captured failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecutionResult {
    pub success: bool,
    #[serde(default)]
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Stable tag of the error kind, e.g. `ToolNotAllowed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    pub metadata: NodeMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageMetadata>,
    #[serde(default)]
    pub execution_time: f64,
}

impl NodeExecutionResult {
    pub fn ok(output: Value, metadata: NodeMetadata, execution_time: f64) -> Self {
        Self {
            success: true,
            output,
            error: None,
            error_kind: None,
            metadata,
            usage: None,
            execution_time,
        }
    }

    pub fn failed(error: &NodeError, metadata: NodeMetadata, execution_time: f64) -> Self {
        Self {
            success: false,
            output: Value::Null,
            error: Some(error.to_string()),
            error_kind: Some(error.kind().to_string()),
            metadata,
            usage: None,
            execution_time,
        }
    }

    pub fn with_usage(mut self, usage: UsageMetadata) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Aggregated token accounting for a whole run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub cost: f64,
    pub api_calls: i64,
}

impl RunUsage {
    pub fn absorb(&mut self, usage: &UsageMetadata) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.total_tokens += usage.total_tokens;
        self.cost += usage.cost;
        self.api_calls += usage.api_calls;
    }
}

/// Top-level result of one chain run. `output` maps node id to its result;
/// under the permissive failure policy a failed node appears here with
/// `success=false` while its siblings may still have succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainExecutionResult {
    pub success: bool,
    pub output: HashMap<String, NodeExecutionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub usage: RunUsage,
    #[serde(default)]
    pub execution_time: f64,
}

impl ChainExecutionResult {
    /// Aggregate usage over the per-node results.
    pub fn aggregate_usage(output: &HashMap<String, NodeExecutionResult>) -> RunUsage {
        let mut usage = RunUsage::default();
        for result in output.values() {
            if let Some(u) = &result.usage {
                usage.absorb(u);
            }
        }
        usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failed_result_carries_kind() {
        let meta = NodeMetadata::started("n1", "tool", "n1");
        let result = NodeExecutionResult::failed(&NodeError::ToolNotAllowed("x".into()), meta, 0.1);
        assert!(!result.success);
        assert_eq!(result.error_kind.as_deref(), Some("ToolNotAllowed"));
        assert!(result.error.unwrap().contains("x"));
    }

    #[test]
    fn test_result_serde_roundtrip() {
        let meta = NodeMetadata::started("n1", "tool", "Sum").finish(0.5);
        let result = NodeExecutionResult::ok(json!({"sum": 15}), meta, 0.5).with_usage(
            UsageMetadata {
                total_tokens: 10,
                api_calls: 1,
                ..Default::default()
            },
        );
        let encoded = serde_json::to_string(&result).unwrap();
        let decoded: NodeExecutionResult = serde_json::from_str(&encoded).unwrap();
        assert!(decoded.success);
        assert_eq!(decoded.output["sum"], 15);
        assert_eq!(decoded.usage.unwrap().total_tokens, 10);
    }

    #[test]
    fn test_aggregate_usage() {
        let mut output = HashMap::new();
        for (id, tokens) in [("a", 10), ("b", 20)] {
            let meta = NodeMetadata::started(id, "llm", id);
            output.insert(
                id.to_string(),
                NodeExecutionResult::ok(Value::Null, meta, 0.0).with_usage(UsageMetadata {
                    total_tokens: tokens,
                    api_calls: 1,
                    cost: 0.5,
                    ..Default::default()
                }),
            );
        }
        let usage = ChainExecutionResult::aggregate_usage(&output);
        assert_eq!(usage.total_tokens, 30);
        assert_eq!(usage.api_calls, 2);
        assert!((usage.cost - 1.0).abs() < 1e-9);
    }
}
