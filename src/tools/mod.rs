//! Tooling system: the [`Tool`] contract, argument validation against a
//! declared schema, and the function-calling export format handed to LLM
//! services.

pub mod schema;

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::meter::TokenMeter;
use crate::error::NodeError;

/// Tool definition in the structured format expected by LLM providers
/// that support function calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// Call-stack of agent names scoped to one node execution, threaded
/// through tool invocation so agent-as-tool adapters can detect cycles.
#[derive(Debug, Clone, Default)]
pub struct AgentCallStack {
    inner: Arc<Mutex<Vec<String>>>,
}

impl AgentCallStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `name`, failing with the full cycle path when it is already on
    /// the stack.
    pub fn enter(&self, name: &str) -> Result<(), NodeError> {
        let mut stack = self.inner.lock();
        if stack.iter().any(|n| n == name) {
            let mut path = stack.clone();
            path.push(name.to_string());
            return Err(NodeError::AgentCycle(path.join(" -> ")));
        }
        stack.push(name.to_string());
        Ok(())
    }

    pub fn leave(&self, name: &str) {
        let mut stack = self.inner.lock();
        if let Some(pos) = stack.iter().rposition(|n| n == name) {
            stack.remove(pos);
        }
    }

    pub fn depth(&self) -> usize {
        self.inner.lock().len()
    }
}

/// Context passed to tools during execution. Carries the per-run state a
/// nested agent needs: the call stack for cycle detection and the token
/// meter for ceiling enforcement.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub agent_id: String,
    pub session_id: String,
    pub call_stack: AgentCallStack,
    pub meter: TokenMeter,
}

impl ToolContext {
    pub fn for_agent(
        agent_id: impl Into<String>,
        call_stack: AgentCallStack,
        meter: TokenMeter,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            session_id: String::new(),
            call_stack,
            meter,
        }
    }
}

/// A named, schema-described, invocable unit of work.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// JSON Schema for the argument object, when declared.
    fn parameters_schema(&self) -> Option<Value> {
        None
    }

    /// JSON Schema for the return value, when declared.
    fn output_schema(&self) -> Option<Value> {
        None
    }

    async fn run(&self, args: Value, ctx: &ToolContext) -> Result<Value, NodeError>;

    /// Validate `args` against [`Tool::parameters_schema`]. Idempotent;
    /// a no-op when no schema is declared.
    fn validate_params(&self, args: &Value) -> Result<(), NodeError> {
        match self.parameters_schema() {
            Some(schema) => {
                schema::validate_against(args, &schema).map_err(NodeError::InvalidParams)
            }
            None => Ok(()),
        }
    }

    /// Function-calling export.
    fn as_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the input back"
        }

        fn parameters_schema(&self) -> Option<Value> {
            Some(json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            }))
        }

        async fn run(&self, args: Value, _ctx: &ToolContext) -> Result<Value, NodeError> {
            Ok(json!({"echo": args["text"]}))
        }
    }

    #[tokio::test]
    async fn test_validate_then_run() {
        let tool = EchoTool;
        let args = json!({"text": "hi"});
        tool.validate_params(&args).unwrap();
        // Idempotent: repeated validation is safe.
        tool.validate_params(&args).unwrap();
        let out = tool.run(args, &ToolContext::default()).await.unwrap();
        assert_eq!(out["echo"], "hi");
    }

    #[test]
    fn test_validate_rejects_missing_required() {
        let tool = EchoTool;
        let err = tool.validate_params(&json!({})).unwrap_err();
        assert!(matches!(err, NodeError::InvalidParams(_)));
    }

    #[test]
    fn test_as_definition() {
        let def = EchoTool.as_definition();
        assert_eq!(def.name, "echo");
        assert!(def.parameters.is_some());
    }

    #[test]
    fn test_call_stack_cycle() {
        let stack = AgentCallStack::new();
        stack.enter("A").unwrap();
        stack.enter("B").unwrap();
        match stack.enter("A") {
            Err(NodeError::AgentCycle(path)) => assert_eq!(path, "A -> B -> A"),
            other => panic!("expected AgentCycle, got {:?}", other),
        }
        stack.leave("B");
        stack.leave("A");
        assert_eq!(stack.depth(), 0);
    }
}
