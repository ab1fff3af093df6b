//! Chain-level error types.

use super::NodeError;
use thiserror::Error;

/// Configuration and run-level errors. Configuration variants are raised by
/// the factory/validator before anything executes; run-level variants abort
/// an in-flight run and return a partial result.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Spec parse error: {0}")]
    SpecParseError(String),
    #[error("Unsupported workflow version: {found} (no migrator registered up to {target})")]
    UnsupportedVersion { found: String, target: String },
    #[error("Unknown node type '{0}' in workflow spec")]
    UnknownNodeType(String),
    #[error("Workflow payload must contain a non-empty 'nodes' list")]
    EmptyWorkflow,
    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(String),
    #[error("Node '{node_id}' depends on undeclared node '{dep}'")]
    UnknownDependency { node_id: String, dep: String },
    #[error("Cycle detected in graph: {}", .0.join(", "))]
    CycleDetected(Vec<String>),
    #[error("Schema mismatch between '{producer}' and '{consumer}': {detail}")]
    SchemaMismatch {
        producer: String,
        consumer: String,
        detail: String,
    },
    #[error("Depth ceiling exceeded: level {level} not permitted with ceiling {ceiling}")]
    DepthCeilingExceeded { level: usize, ceiling: usize },
    #[error("Token ceiling exceeded: {used} tokens used, ceiling {ceiling}")]
    TokenCeilingExceeded { used: i64, ceiling: i64 },
    #[error("Chain execution timed out")]
    Timeout,
    #[error("Chain execution cancelled")]
    Cancelled,
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Node execution error: node={node_id}, error={error}")]
    NodeExecutionError { node_id: String, error: String },
    #[error("Node error: {0}")]
    NodeError(Box<NodeError>),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<NodeError> for ChainError {
    fn from(value: NodeError) -> Self {
        match value {
            NodeError::TokenCeilingExceeded { used, ceiling } => {
                ChainError::TokenCeilingExceeded { used, ceiling }
            }
            NodeError::Cancelled => ChainError::Cancelled,
            other => ChainError::NodeError(Box::new(other)),
        }
    }
}
