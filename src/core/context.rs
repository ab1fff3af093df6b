//! Per-run context manager: node output storage, tool lookup and
//! invocation, the agent registry, and agent memory backed by the
//! pluggable [`MemoryAdapter`].

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::agent::AgentNode;
use crate::error::NodeError;
use crate::llm::ChatMessage;
use crate::memory::{InMemoryAdapter, MemoryAdapter};
use crate::tools::{Tool, ToolContext};

/// Shared read-mostly state for a chain's runs. Node context writes are
/// serialised per key through the interior locks; reads are concurrent.
pub struct GraphContextManager {
    node_contexts: RwLock<HashMap<String, Value>>,
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
    agents: RwLock<HashMap<String, Arc<AgentNode>>>,
    memory: Arc<dyn MemoryAdapter>,
}

impl Default for GraphContextManager {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphContextManager {
    pub fn new() -> Self {
        Self::with_memory(Arc::new(InMemoryAdapter::new()))
    }

    pub fn with_memory(memory: Arc<dyn MemoryAdapter>) -> Self {
        Self {
            node_contexts: RwLock::new(HashMap::new()),
            tools: RwLock::new(HashMap::new()),
            agents: RwLock::new(HashMap::new()),
            memory,
        }
    }

    pub fn memory(&self) -> &Arc<dyn MemoryAdapter> {
        &self.memory
    }

    // ---- node context -------------------------------------------------

    pub fn get_node_context(&self, node_id: &str) -> Option<Value> {
        self.node_contexts.read().get(node_id).cloned()
    }

    pub fn update_node_context(&self, node_id: &str, value: Value) {
        self.node_contexts
            .write()
            .insert(node_id.to_string(), value);
    }

    // ---- tools --------------------------------------------------------

    pub fn register_tool(&self, tool: Arc<dyn Tool>) {
        self.tools.write().insert(tool.name().to_string(), tool);
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().get(name).cloned()
    }

    pub fn get_all_tools(&self) -> HashMap<String, Arc<dyn Tool>> {
        self.tools.read().clone()
    }

    /// Look up a tool, validate the arguments against its declared schema,
    /// and run it. Validation failures classify as `InvalidParams`; run
    /// failures as `ToolInvocationFailed` unless the underlying error is
    /// itself a routed kind (agent cycles, ceilings, cancellation).
    pub async fn execute_tool(
        &self,
        name: &str,
        args: Value,
        ctx: &ToolContext,
    ) -> Result<Value, NodeError> {
        let tool = self
            .get_tool(name)
            .ok_or_else(|| NodeError::ToolInvocationFailed {
                tool_name: name.to_string(),
                cause: "tool not found".into(),
            })?;

        tool.validate_params(&args)?;

        tool.run(args, ctx).await.map_err(|e| match e {
            NodeError::AgentCycle(_)
            | NodeError::TokenCeilingExceeded { .. }
            | NodeError::Cancelled
            | NodeError::InvalidParams(_) => e,
            other => NodeError::ToolInvocationFailed {
                tool_name: name.to_string(),
                cause: other.to_string(),
            },
        })
    }

    // ---- agents -------------------------------------------------------

    /// Idempotent for the identical instance; a different instance under
    /// the same name is a configuration error.
    pub fn register_agent(&self, agent: Arc<AgentNode>) -> Result<(), NodeError> {
        let mut agents = self.agents.write();
        match agents.get(agent.name()) {
            Some(existing) if Arc::ptr_eq(existing, &agent) => Ok(()),
            Some(_) => Err(NodeError::ConfigError(format!(
                "agent '{}' is already registered",
                agent.name()
            ))),
            None => {
                agents.insert(agent.name().to_string(), agent);
                Ok(())
            }
        }
    }

    pub fn get_agent(&self, name: &str) -> Option<Arc<AgentNode>> {
        self.agents.read().get(name).cloned()
    }

    // ---- agent memory (best-effort) -----------------------------------

    pub async fn load_agent_memory(&self, key: &str) -> Option<Value> {
        match self.memory.load(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("memory load for '{}' failed: {}", key, e);
                None
            }
        }
    }

    /// Persistence failures are swallowed; memory must never fail a node.
    pub async fn store_agent_memory(&self, key: &str, value: Value) {
        if let Err(e) = self.memory.store(key, value).await {
            tracing::warn!("memory store for '{}' failed: {}", key, e);
        }
    }

    /// Summariser hook used by the agent loop. `summarize` is the only
    /// supported strategy.
    pub async fn smart_context_compression(
        &self,
        messages: &[ChatMessage],
        strategy: &str,
        max_tokens: usize,
    ) -> Result<String, NodeError> {
        match strategy {
            "summarize" => self
                .memory
                .summarise(messages, max_tokens)
                .await
                .map_err(|e| NodeError::ExecutionError(e.to_string())),
            other => Err(NodeError::ConfigError(format!(
                "unknown compression strategy '{}'",
                other
            ))),
        }
    }
}
