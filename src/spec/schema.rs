use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

fn default_temperature() -> f64 {
    0.7
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_memory_window() -> usize {
    5
}

fn default_max_rounds() -> usize {
    5
}

fn default_max_iterations() -> usize {
    100
}

/// Deterministic tool invocation node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolNodeConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub tool_name: String,
    /// Arguments passed to the tool; string values may carry `{id.path}`
    /// placeholders substituted from the node's context at execution time.
    #[serde(default = "empty_object")]
    pub tool_args: Value,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

/// LLM node: runs the agentic tool-calling loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmNodeConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub model: String,
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Prompt template with `{placeholder}` syntax. Unresolved placeholders
    /// after rendering fail the node.
    pub prompt: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
    /// Names of registered tools attached to this node (highest precedence
    /// in the global < chain < node merge).
    #[serde(default)]
    pub tools: Vec<String>,
    /// Hard whitelist; when set, the agent may invoke only these tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_tools: Option<Vec<String>>,
    #[serde(default)]
    pub memory_enabled: bool,
    #[serde(default = "default_memory_window")]
    pub memory_window: usize,
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

/// Condition node: evaluates a restricted boolean expression over the
/// node context and records which branch was taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionNodeConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub expression: String,
    #[serde(default)]
    pub true_branch: Vec<String>,
    #[serde(default)]
    pub false_branch: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Nested chain node: an embedded workflow spec executed on a fresh child
/// context, with optional output projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NestedChainNodeConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Embedded workflow spec payload.
    pub chain: Value,
    /// public key -> dotted path over the serialized child output.
    #[serde(default)]
    pub exposed_outputs: BTreeMap<String, String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Loop node: runs the embedded body chain once per element of the
/// iterator source, up to `max_iterations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopNodeConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Dotted path into the node context resolving to an array.
    pub iterator_source: String,
    /// Embedded workflow spec executed once per element.
    pub body_chain: Value,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Typed node configuration, tagged on `type`. The sealed set replaces
/// runtime type sniffing; unknown tags fail at parse time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeConfig {
    #[serde(alias = "skill")]
    Tool(ToolNodeConfig),
    #[serde(alias = "ai")]
    Llm(LlmNodeConfig),
    Condition(ConditionNodeConfig),
    NestedChain(NestedChainNodeConfig),
    Loop(LoopNodeConfig),
}

impl NodeConfig {
    pub fn id(&self) -> &str {
        match self {
            NodeConfig::Tool(c) => &c.id,
            NodeConfig::Llm(c) => &c.id,
            NodeConfig::Condition(c) => &c.id,
            NodeConfig::NestedChain(c) => &c.id,
            NodeConfig::Loop(c) => &c.id,
        }
    }

    /// Display name, falling back to the id.
    pub fn name(&self) -> &str {
        let name = match self {
            NodeConfig::Tool(c) => c.name.as_deref(),
            NodeConfig::Llm(c) => c.name.as_deref(),
            NodeConfig::Condition(c) => c.name.as_deref(),
            NodeConfig::NestedChain(c) => c.name.as_deref(),
            NodeConfig::Loop(c) => c.name.as_deref(),
        };
        name.unwrap_or_else(|| self.id())
    }

    pub fn node_type(&self) -> &'static str {
        match self {
            NodeConfig::Tool(_) => "tool",
            NodeConfig::Llm(_) => "llm",
            NodeConfig::Condition(_) => "condition",
            NodeConfig::NestedChain(_) => "nested_chain",
            NodeConfig::Loop(_) => "loop",
        }
    }

    pub fn dependencies(&self) -> &[String] {
        match self {
            NodeConfig::Tool(c) => &c.dependencies,
            NodeConfig::Llm(c) => &c.dependencies,
            NodeConfig::Condition(c) => &c.dependencies,
            NodeConfig::NestedChain(c) => &c.dependencies,
            NodeConfig::Loop(c) => &c.dependencies,
        }
    }

    pub fn input_schema(&self) -> Option<&Value> {
        match self {
            NodeConfig::Tool(c) => c.input_schema.as_ref(),
            NodeConfig::Llm(c) => c.input_schema.as_ref(),
            _ => None,
        }
    }

    pub fn output_schema(&self) -> Option<&Value> {
        match self {
            NodeConfig::Tool(c) => c.output_schema.as_ref(),
            NodeConfig::Llm(c) => c.output_schema.as_ref(),
            _ => None,
        }
    }
}

/// Parsed workflow spec: the canonical logical graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub nodes: Vec<NodeConfig>,
}

/// Chain-level metadata computed by the factory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainMetadata {
    pub chain_id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub node_count: usize,
    pub edge_count: usize,
    /// SHA-256 of the sorted adjacency map; identifies the graph shape.
    pub topology_hash: String,
    #[serde(default)]
    pub tags: Vec<String>,
}
