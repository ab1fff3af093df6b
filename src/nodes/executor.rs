use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::chain::result::NodeExecutionResult;
use crate::chain::ScriptChain;
use crate::core::event_bus::EventEmitter;
use crate::core::meter::TokenMeter;
use crate::error::NodeError;
use crate::spec::NodeConfig;

/// Per-node execution context assembled by the scheduler: the merged
/// input dictionary plus the run-scoped control state.
#[derive(Clone)]
pub struct NodeContext {
    /// Initial input merged with every successful predecessor's output
    /// keyed by predecessor id.
    pub input: Value,
    pub meter: TokenMeter,
    pub cancel: CancellationToken,
    pub emitter: EventEmitter,
}

/// Trait for node execution; one implementation per node type.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    async fn execute(
        &self,
        chain: &ScriptChain,
        cfg: &NodeConfig,
        ctx: &NodeContext,
    ) -> Result<NodeExecutionResult, NodeError>;
}

/// Registry of node executors by type tag. Registration is additive and
/// last-writer-wins: re-registering a tag silently replaces the previous
/// executor. A single executor may serve several aliases.
pub struct NodeExecutorRegistry {
    executors: HashMap<String, Arc<dyn NodeExecutor>>,
}

impl NodeExecutorRegistry {
    pub fn empty() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// Registry with every built-in executor under its tag and aliases.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();

        let tool = Arc::new(super::tool::ToolNodeExecutor);
        registry.register("tool", tool.clone());
        registry.register("skill", tool);

        let llm = Arc::new(super::llm::LlmNodeExecutor);
        registry.register("llm", llm.clone());
        registry.register("ai", llm);

        registry.register("condition", Arc::new(super::condition::ConditionNodeExecutor));
        registry.register("nested_chain", Arc::new(super::nested::NestedChainExecutor));
        registry.register("loop", Arc::new(super::loop_node::LoopNodeExecutor));
        registry
    }

    pub fn register(&mut self, type_tag: &str, executor: Arc<dyn NodeExecutor>) {
        self.executors.insert(type_tag.to_string(), executor);
    }

    pub fn get(&self, type_tag: &str) -> Option<Arc<dyn NodeExecutor>> {
        self.executors.get(type_tag).cloned()
    }
}

impl Default for NodeExecutorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
