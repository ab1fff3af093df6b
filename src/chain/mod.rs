//! Executable chains: a validated node list plus the collaborators needed
//! to run it, with builder-based construction.

pub mod factory;
pub mod result;
pub mod scheduler;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::agent::{AgentConfig, AgentNode};
use crate::core::context::GraphContextManager;
use crate::core::event_bus::EventEmitter;
use crate::core::services::{self, ServiceLocator};
use crate::error::{ChainError, NodeError};
use crate::graph::{build_graph, topology_hash, validate::validate_schemas, Graph};
use crate::llm::{LlmConfig, LlmService};
use crate::nodes::NodeExecutorRegistry;
use crate::spec::{ChainMetadata, ChainSpec, LlmNodeConfig, NodeConfig};
use crate::tools::Tool;

pub use factory::ChainFactory;
pub use result::{ChainExecutionResult, NodeExecutionResult, NodeMetadata, RunUsage, UsageMetadata};

/// Per-run limits and policies.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// In-flight task bound within one level; unbounded up to the level
    /// size when unset.
    pub max_parallel: Option<usize>,
    /// Maximum topological depth; see the scheduler for the arithmetic.
    pub depth_ceiling: Option<usize>,
    /// Running LLM token budget for the whole run.
    pub token_ceiling: Option<i64>,
    pub node_timeout: Option<Duration>,
    pub run_timeout: Option<Duration>,
    /// Strict sibling-failure policy: first failure cancels the run.
    pub strict: bool,
    /// Treat producer/consumer schema mismatches as errors at build time.
    pub strict_schemas: bool,
}

/// An executable workflow: immutable node configs, their validated graph,
/// and the injected collaborators.
pub struct ScriptChain {
    nodes: Vec<NodeConfig>,
    node_index: HashMap<String, usize>,
    graph: Graph,
    metadata: ChainMetadata,
    chain_tools: Vec<Arc<dyn Tool>>,
    context_manager: Arc<GraphContextManager>,
    services: Arc<ServiceLocator>,
    registry: Arc<NodeExecutorRegistry>,
    config: RunConfig,
    emitter: EventEmitter,
    agent_cache: Mutex<HashMap<String, Arc<AgentNode>>>,
    cancel: CancellationToken,
}

impl ScriptChain {
    pub fn builder(nodes: Vec<NodeConfig>) -> ScriptChainBuilder {
        ScriptChainBuilder::new(nodes)
    }

    pub fn metadata(&self) -> &ChainMetadata {
        &self.metadata
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn nodes(&self) -> &[NodeConfig] {
        &self.nodes
    }

    pub fn node(&self, node_id: &str) -> Option<&NodeConfig> {
        self.node_index.get(node_id).map(|&i| &self.nodes[i])
    }

    pub fn context_manager(&self) -> &Arc<GraphContextManager> {
        &self.context_manager
    }

    pub fn services(&self) -> &Arc<ServiceLocator> {
        &self.services
    }

    pub(crate) fn registry(&self) -> &Arc<NodeExecutorRegistry> {
        &self.registry
    }

    pub(crate) fn run_config(&self) -> &RunConfig {
        &self.config
    }

    pub(crate) fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }

    /// Signal cancellation to every in-flight and future run of this chain.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Resolve the LLM service at first use.
    pub fn llm_service(&self) -> Result<Arc<dyn LlmService>, NodeError> {
        self.services
            .get::<Arc<dyn LlmService>>(services::LLM_SERVICE)
            .map_err(|e| NodeError::ConfigError(e.to_string()))
    }

    /// Execute the chain against `input`. Run-level failures return a
    /// partial result with `success=false`; configuration failures were
    /// already rejected at build time.
    pub async fn execute(&self, input: Value) -> ChainExecutionResult {
        self.execute_cancellable(input, self.cancel.child_token())
            .await
    }

    pub(crate) async fn execute_cancellable(
        &self,
        input: Value,
        cancel: CancellationToken,
    ) -> ChainExecutionResult {
        scheduler::run(self, input, cancel).await
    }

    /// Build or fetch the cached agent for an LLM node. The cached agent
    /// keeps the first prompt rendering as its instructions; tool
    /// precedence is global < chain < node, then the whitelist filter.
    pub(crate) fn agent_for(
        &self,
        cfg: &LlmNodeConfig,
        rendered_prompt: &str,
    ) -> Result<Arc<AgentNode>, NodeError> {
        if let Some(agent) = self.agent_cache.lock().get(&cfg.id) {
            return Ok(agent.clone());
        }

        // BTreeMap keeps the tool list order deterministic across runs.
        let mut tool_map: std::collections::BTreeMap<String, Arc<dyn Tool>> =
            self.context_manager.get_all_tools().into_iter().collect();

        for tool in &self.chain_tools {
            tool_map.insert(tool.name().to_string(), tool.clone());
        }

        for tool_ref in &cfg.tools {
            match self.context_manager.get_tool(tool_ref) {
                Some(tool) => {
                    tool_map.insert(tool.name().to_string(), tool);
                }
                None => {
                    return Err(NodeError::ConfigError(format!(
                        "node '{}' references unknown tool '{}'",
                        cfg.id, tool_ref
                    )))
                }
            }
        }

        if let Some(allowed) = &cfg.allowed_tools {
            tool_map.retain(|name, _| allowed.iter().any(|a| a == name));
        }

        let agent_config = AgentConfig {
            name: cfg.name.clone().unwrap_or_else(|| cfg.id.clone()),
            instructions: rendered_prompt.to_string(),
            llm: LlmConfig {
                model: cfg.model.clone(),
                provider: cfg.provider.clone(),
                temperature: cfg.temperature,
                max_tokens: cfg.max_tokens,
            },
            allowed_tools: cfg.allowed_tools.clone(),
            memory_enabled: cfg.memory_enabled,
            memory_window: cfg.memory_window,
            max_rounds: cfg.max_rounds,
        };

        let agent = Arc::new(AgentNode::new(
            agent_config,
            tool_map.into_values().collect(),
        ));

        if let Err(e) = self.context_manager.register_agent(agent.clone()) {
            tracing::debug!("agent registration skipped: {}", e);
        }

        self.agent_cache.lock().insert(cfg.id.clone(), agent.clone());
        Ok(agent)
    }

    /// Instantiate an embedded spec as a child chain: fresh context seeded
    /// with the parent's tools, shared services and executor registry.
    pub(crate) fn spawn_child(&self, payload: &Value) -> Result<ScriptChain, ChainError> {
        let spec = crate::spec::parse_spec(payload)?;

        let child_context = Arc::new(GraphContextManager::new());
        for (_, tool) in self.context_manager.get_all_tools() {
            child_context.register_tool(tool);
        }

        ScriptChainBuilder::from_spec(spec)
            .context_manager(child_context)
            .services(self.services.clone())
            .registry(self.registry.clone())
            .config(self.config.clone())
            .build()
    }
}

/// Builder for [`ScriptChain`]; validates the graph and computes the
/// chain metadata at `build()`.
pub struct ScriptChainBuilder {
    nodes: Vec<NodeConfig>,
    chain_id: Option<String>,
    name: Option<String>,
    version: Option<String>,
    description: Option<String>,
    tags: Vec<String>,
    tools: Vec<Arc<dyn Tool>>,
    context_manager: Option<Arc<GraphContextManager>>,
    services: Option<Arc<ServiceLocator>>,
    registry: Option<Arc<NodeExecutorRegistry>>,
    config: RunConfig,
    emitter: EventEmitter,
}

impl ScriptChainBuilder {
    pub fn new(nodes: Vec<NodeConfig>) -> Self {
        Self {
            nodes,
            chain_id: None,
            name: None,
            version: None,
            description: None,
            tags: Vec::new(),
            tools: Vec::new(),
            context_manager: None,
            services: None,
            registry: None,
            config: RunConfig::default(),
            emitter: EventEmitter::disabled(),
        }
    }

    pub fn from_spec(spec: ChainSpec) -> Self {
        let mut builder = Self::new(spec.nodes);
        builder.chain_id = spec.chain_id;
        builder.name = spec.name;
        builder.version = Some(spec.version);
        builder.description = spec.description;
        builder.tags = spec.tags;
        builder
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn chain_id(mut self, chain_id: impl Into<String>) -> Self {
        self.chain_id = Some(chain_id.into());
        self
    }

    /// Chain-level tools: registered with the context manager at build
    /// time and merged above global tools when agents are assembled.
    pub fn tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools = tools;
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn context_manager(mut self, context_manager: Arc<GraphContextManager>) -> Self {
        self.context_manager = Some(context_manager);
        self
    }

    pub fn services(mut self, services: Arc<ServiceLocator>) -> Self {
        self.services = Some(services);
        self
    }

    pub fn registry(mut self, registry: Arc<NodeExecutorRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn events(mut self, tx: tokio::sync::mpsc::Sender<crate::core::event_bus::ChainEvent>) -> Self {
        self.emitter = EventEmitter::new(tx);
        self
    }

    pub fn build(self) -> Result<ScriptChain, ChainError> {
        if self.nodes.is_empty() {
            return Err(ChainError::EmptyWorkflow);
        }

        let graph = build_graph(&self.nodes)?;

        let report = validate_schemas(&self.nodes, self.config.strict_schemas);
        if let Some(diag) = report.errors().next() {
            return Err(ChainError::SchemaMismatch {
                producer: diag.source_id.clone().unwrap_or_default(),
                consumer: diag.node_id.clone().unwrap_or_default(),
                detail: diag.message.clone(),
            });
        }
        for diag in &report.diagnostics {
            tracing::warn!(
                "schema check '{}' -> '{}': {}",
                diag.source_id.as_deref().unwrap_or("?"),
                diag.node_id.as_deref().unwrap_or("?"),
                diag.message
            );
        }

        let hash = topology_hash(&self.nodes);
        let edge_count = self.nodes.iter().map(|n| n.dependencies().len()).sum();
        let metadata = ChainMetadata {
            chain_id: self
                .chain_id
                .unwrap_or_else(|| format!("chain_{}", &hash[..8])),
            name: self.name.unwrap_or_else(|| "unnamed-chain".into()),
            version: self.version.unwrap_or_else(|| "1.0.0".into()),
            description: self.description.unwrap_or_default(),
            node_count: self.nodes.len(),
            edge_count,
            topology_hash: hash,
            tags: self.tags,
        };

        let context_manager = self
            .context_manager
            .unwrap_or_else(|| Arc::new(GraphContextManager::new()));
        for tool in &self.tools {
            context_manager.register_tool(tool.clone());
        }

        let node_index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id().to_string(), i))
            .collect();

        Ok(ScriptChain {
            nodes: self.nodes,
            node_index,
            graph,
            metadata,
            chain_tools: self.tools,
            context_manager,
            services: self.services.unwrap_or_else(|| Arc::new(ServiceLocator::new())),
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(NodeExecutorRegistry::with_builtins())),
            config: self.config,
            emitter: self.emitter,
            agent_cache: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
        })
    }
}
