use thiserror::Error;

/// Node-level errors: captured into the failing node's result, never
/// aborting siblings unless the run is strict.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Prompt for node '{node_id}' contains unresolved placeholders after rendering: {rendered}")]
    UnresolvedPlaceholder { node_id: String, rendered: String },
    #[error("Tool '{tool_name}' failed: {cause}")]
    ToolInvocationFailed { tool_name: String, cause: String },
    #[error("Tool '{0}' is not allowed by agent configuration")]
    ToolNotAllowed(String),
    #[error("Invalid tool parameters: {0}")]
    InvalidParams(String),
    #[error("Agent cycle detected: {0}")]
    AgentCycle(String),
    #[error("Expression error: {0}")]
    ExpressionError(String),
    #[error("LLM error: {0}")]
    LlmError(String),
    #[error("Token ceiling exceeded: {used} tokens used, ceiling {ceiling}")]
    TokenCeilingExceeded { used: i64, ceiling: i64 },
    #[error("Timeout: node execution exceeded time limit")]
    Timeout,
    #[error("Cancelled")]
    Cancelled,
    #[error("Upstream node '{0}' failed")]
    UpstreamFailed(String),
    #[error("Upstream node '{0}' was cancelled")]
    CancelledUpstream(String),
    #[error("Execution error: {0}")]
    ExecutionError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl NodeError {
    /// Stable machine-readable tag stored next to the human message in
    /// node results, so callers can branch without string matching.
    pub fn kind(&self) -> &'static str {
        match self {
            NodeError::ConfigError(_) => "ConfigError",
            NodeError::UnresolvedPlaceholder { .. } => "UnresolvedPlaceholder",
            NodeError::ToolInvocationFailed { .. } => "ToolInvocationFailed",
            NodeError::ToolNotAllowed(_) => "ToolNotAllowed",
            NodeError::InvalidParams(_) => "InvalidParams",
            NodeError::AgentCycle(_) => "AgentCycle",
            NodeError::ExpressionError(_) => "ExpressionError",
            NodeError::LlmError(_) => "LlmError",
            NodeError::TokenCeilingExceeded { .. } => "TokenCeilingExceeded",
            NodeError::Timeout => "Timeout",
            NodeError::Cancelled => "Cancelled",
            NodeError::UpstreamFailed(_) => "UpstreamFailed",
            NodeError::CancelledUpstream(_) => "CancelledUpstream",
            NodeError::ExecutionError(_) => "ExecutionError",
            NodeError::SerializationError(_) => "SerializationError",
        }
    }

    /// Run-level errors escalate past the failing node and cancel the rest
    /// of the run even under the permissive failure policy.
    pub fn is_run_level(&self) -> bool {
        matches!(
            self,
            NodeError::TokenCeilingExceeded { .. } | NodeError::Cancelled
        )
    }
}

impl From<serde_json::Error> for NodeError {
    fn from(e: serde_json::Error) -> Self {
        NodeError::SerializationError(e.to_string())
    }
}
