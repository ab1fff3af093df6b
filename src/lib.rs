//! chainflow: a DAG chain execution engine with agentic LLM-tool loops.
//!
//! A workflow spec (JSON) is parsed into typed node configs, validated
//! into topological levels, and executed level by level with bounded
//! concurrency. LLM nodes run an iterative tool-calling agent loop with
//! whitelisting, cycle detection, and windowed memory. External
//! collaborators (LLM providers, concrete tools, memory stores) are
//! injected behind narrow contracts.
//!
//! ```no_run
//! use chainflow::ChainFactory;
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), chainflow::ChainError> {
//! let chain = ChainFactory::new()
//!     .from_value(json!({
//!         "name": "sum-chain",
//!         "nodes": [{
//!             "id": "sum1", "type": "tool", "tool_name": "sum",
//!             "tool_args": {"numbers": [4, 5, 6]}
//!         }]
//!     }))?
//!     .build()?;
//!
//! let result = chain.execute(json!({})).await;
//! assert!(result.success);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod chain;
pub mod core;
pub mod error;
pub mod evaluator;
pub mod graph;
pub mod llm;
pub mod memory;
pub mod nodes;
pub mod spec;
pub mod template;
pub mod tools;

pub use crate::agent::{AgentConfig, AgentNode, AgentRuntime};
pub use crate::chain::{
    ChainExecutionResult, ChainFactory, NodeExecutionResult, NodeMetadata, RunConfig, RunUsage,
    ScriptChain, ScriptChainBuilder, UsageMetadata,
};
pub use crate::core::{
    create_event_channel, ChainEvent, EventEmitter, GraphContextManager, ServiceLocator, TokenMeter,
};
pub use crate::error::{ChainError, NodeError};
pub use crate::graph::{build_graph, topology_hash, Graph};
pub use crate::llm::{ChatMessage, ChatRole, GenerateResponse, LlmConfig, LlmService, LlmUsage};
pub use crate::memory::{InMemoryAdapter, MemoryAdapter};
pub use crate::nodes::{NodeContext, NodeExecutor, NodeExecutorRegistry};
pub use crate::spec::{ChainMetadata, ChainMigrator, ChainSpec, NodeConfig};
pub use crate::tools::{AgentCallStack, Tool, ToolContext, ToolDefinition};
