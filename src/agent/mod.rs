//! Agentic LLM-tool loop.
//!
//! An [`AgentNode`] drives a bounded reason-act loop: generate, parse the
//! response as a potential tool call, enforce the whitelist, invoke the
//! tool, feed the result back, repeat. Repeated identical invocations
//! short-circuit to the cached value instead of looping forever; agents
//! exposed as tools detect re-entry through the per-run call stack.

mod tool_adapter;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::core::context::GraphContextManager;
use crate::core::meter::TokenMeter;
use crate::error::NodeError;
use crate::llm::{estimate_cost, ChatMessage, ChatRole, LlmConfig, LlmService, LlmUsage};
use crate::chain::result::{NodeExecutionResult, NodeMetadata, UsageMetadata};
use crate::tools::{AgentCallStack, Tool, ToolContext, ToolDefinition};

pub use tool_adapter::AgentTool;

/// Agent configuration resolved from an LLM node.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub name: String,
    pub instructions: String,
    pub llm: LlmConfig,
    /// Hard whitelist of invocable tool names. `Some(vec![])` allows none.
    pub allowed_tools: Option<Vec<String>>,
    pub memory_enabled: bool,
    pub memory_window: usize,
    pub max_rounds: usize,
}

impl AgentConfig {
    /// Minimal config, mostly for registry bookkeeping in tests.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: String::new(),
            llm: LlmConfig {
                model: "unknown".into(),
                provider: "openai".into(),
                temperature: 0.7,
                max_tokens: None,
            },
            allowed_tools: None,
            memory_enabled: false,
            memory_window: 5,
            max_rounds: 5,
        }
    }
}

/// Per-run collaborators threaded through the agent invocation path.
#[derive(Clone)]
pub struct AgentRuntime {
    pub context: Arc<GraphContextManager>,
    pub llm: Arc<dyn LlmService>,
    pub meter: TokenMeter,
    pub call_stack: AgentCallStack,
}

pub(crate) struct AgentOutcome {
    pub output: Value,
    pub usage: LlmUsage,
    pub api_calls: i64,
    pub rounds_exhausted: bool,
}

pub(crate) struct AgentFailure {
    pub error: NodeError,
    pub usage: LlmUsage,
    pub api_calls: i64,
}

/// An LLM-backed agent with an effective tool set.
pub struct AgentNode {
    config: AgentConfig,
    tools: Vec<Arc<dyn Tool>>,
}

impl AgentNode {
    pub fn new(config: AgentConfig, tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { config, tools }
    }

    /// Agent without tools.
    pub fn bare(config: AgentConfig) -> Self {
        Self::new(config, Vec::new())
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Expose this agent as an invocable tool. The adapter captures the
    /// chain-scoped collaborators; run-scoped state (call stack, meter)
    /// arrives through [`ToolContext`] at invocation time.
    pub fn as_tool(
        self: &Arc<Self>,
        name: impl Into<String>,
        description: impl Into<String>,
        context: Arc<GraphContextManager>,
        llm: Arc<dyn LlmService>,
    ) -> Arc<dyn Tool> {
        Arc::new(AgentTool::new(
            self.clone(),
            name.into(),
            description.into(),
            context,
            llm,
        ))
    }

    /// Run the loop and wrap the outcome into a [`NodeExecutionResult`].
    pub async fn execute(&self, input: &Value, rt: &AgentRuntime) -> NodeExecutionResult {
        let started = Instant::now();
        let metadata = NodeMetadata::started(&self.config.name, "agent", &self.config.name);

        match self.run(input, rt).await {
            Ok(outcome) => {
                let duration = started.elapsed().as_secs_f64();
                let mut metadata = metadata.finish(duration);
                metadata.rounds_exhausted = outcome.rounds_exhausted;
                NodeExecutionResult::ok(outcome.output, metadata, duration)
                    .with_usage(self.usage_for(&outcome.usage, outcome.api_calls))
            }
            Err(failure) => {
                let duration = started.elapsed().as_secs_f64();
                NodeExecutionResult::failed(&failure.error, metadata.finish(duration), duration)
                    .with_usage(self.usage_for(&failure.usage, failure.api_calls))
            }
        }
    }

    pub(crate) fn usage_for(&self, usage: &LlmUsage, api_calls: i64) -> UsageMetadata {
        let cost = estimate_cost(
            &self.config.llm.provider,
            &self.config.llm.model,
            usage.prompt_tokens,
            usage.completion_tokens,
        );
        UsageMetadata::from_llm(
            usage,
            cost,
            api_calls,
            &self.config.llm.model,
            &self.config.llm.provider,
        )
    }

    /// The loop proper. Typed errors propagate so `as_tool` adapters keep
    /// their classification across nesting.
    pub(crate) async fn run(
        &self,
        input: &Value,
        rt: &AgentRuntime,
    ) -> Result<AgentOutcome, AgentFailure> {
        let user_content = match input {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        let mut conversation = self.build_transcript(rt, &user_content).await;
        let tool_defs: Vec<ToolDefinition> =
            self.tools.iter().map(|t| t.as_definition()).collect();

        let mut usage = LlmUsage::default();
        let mut api_calls: i64 = 0;
        let mut cache: HashMap<String, Value> = HashMap::new();
        let mut final_output: Option<Value> = None;
        let mut last_text = String::new();

        for _round in 0..self.config.max_rounds {
            let prompt = conversation
                .iter()
                .map(|m| format!("{}: {}", m.role.as_str().to_uppercase(), m.content))
                .collect::<Vec<_>>()
                .join("\n");

            let response = match rt.llm.generate(&self.config.llm, &prompt, &tool_defs).await {
                Ok(r) => r,
                Err(e) => {
                    return Err(AgentFailure {
                        error: NodeError::LlmError(e.to_string()),
                        usage,
                        api_calls: api_calls + 1,
                    })
                }
            };
            api_calls += 1;
            usage.accumulate(&response.usage);
            rt.meter.charge(response.usage.total_tokens);
            if let Err(e) = rt.meter.check() {
                return Err(AgentFailure {
                    error: e,
                    usage,
                    api_calls,
                });
            }

            let text = response.text;
            last_text = text.clone();

            let Ok(payload) = extract_json(&text) else {
                // Unparseable text is the final answer.
                final_output = Some(Value::String(text));
                break;
            };

            let tool_call = payload
                .as_object()
                .and_then(|obj| obj.get("tool_name"))
                .and_then(Value::as_str)
                .map(str::to_string);

            let Some(tool_name) = tool_call else {
                // JSON, but not a tool call: that value is the answer.
                final_output = Some(payload);
                break;
            };
            let args = payload.get("arguments").cloned().unwrap_or_else(
                || Value::Object(serde_json::Map::new()),
            );

            if !self.tool_allowed(&tool_name) {
                return Err(AgentFailure {
                    error: NodeError::ToolNotAllowed(tool_name),
                    usage,
                    api_calls,
                });
            }

            let cache_key = format!("{}:{}", tool_name, canonical_json(&args));
            if let Some(cached) = cache.get(&cache_key) {
                tracing::warn!(
                    "agent '{}' repeated tool invocation '{}', breaking loop",
                    self.config.name,
                    tool_name
                );
                final_output = Some(cached.clone());
                break;
            }

            let tool_ctx = ToolContext::for_agent(
                self.config.name.clone(),
                rt.call_stack.clone(),
                rt.meter.clone(),
            );
            let tool_result = match rt.context.execute_tool(&tool_name, args, &tool_ctx).await {
                Ok(result) => result,
                Err(error) => {
                    return Err(AgentFailure {
                        error,
                        usage,
                        api_calls,
                    })
                }
            };

            cache.insert(cache_key, tool_result.clone());

            conversation.push(ChatMessage::new(ChatRole::Assistant, text));
            conversation.push(ChatMessage::new(
                ChatRole::Tool,
                match &tool_result {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                },
            ));
        }

        let rounds_exhausted = final_output.is_none();
        let output = final_output.unwrap_or_else(|| Value::String(last_text));

        if self.config.memory_enabled {
            self.persist_memory(rt, &conversation).await;
        }

        Ok(AgentOutcome {
            output,
            usage,
            api_calls,
            rounds_exhausted,
        })
    }

    fn tool_allowed(&self, tool_name: &str) -> bool {
        if let Some(allowed) = &self.config.allowed_tools {
            return allowed.iter().any(|n| n == tool_name);
        }
        if self.tools.is_empty() {
            return true;
        }
        self.tools.iter().any(|t| t.name() == tool_name)
    }

    async fn build_transcript(&self, rt: &AgentRuntime, user_content: &str) -> Vec<ChatMessage> {
        let mut conversation = vec![ChatMessage::new(
            ChatRole::System,
            self.config.instructions.clone(),
        )];

        if self.config.memory_enabled {
            let summary_key = format!("{}__summary", self.config.name);
            if let Some(summary) = rt
                .context
                .load_agent_memory(&summary_key)
                .await
                .and_then(|v| v.as_str().map(str::to_string))
            {
                conversation.push(ChatMessage::new(
                    ChatRole::System,
                    format!("Conversation summary: {}", summary),
                ));
            }

            if let Some(history) = rt.context.load_agent_memory(&self.config.name).await {
                if let Ok(mut messages) = serde_json::from_value::<Vec<ChatMessage>>(history) {
                    let window = self.config.memory_window * 2;
                    if messages.len() > window {
                        messages.drain(..messages.len() - window);
                    }
                    conversation.extend(messages);
                }
            }
        }

        conversation.push(ChatMessage::new(ChatRole::User, user_content.to_string()));
        conversation
    }

    /// Best-effort: summarise overflow, store the trailing window.
    async fn persist_memory(&self, rt: &AgentRuntime, conversation: &[ChatMessage]) {
        let window = self.config.memory_window * 2;

        if conversation.len() > self.config.memory_window * 4 {
            let overflow = &conversation[..conversation.len() - window];
            match rt
                .context
                .smart_context_compression(overflow, "summarize", 200)
                .await
            {
                Ok(summary) => {
                    rt.context
                        .store_agent_memory(
                            &format!("{}__summary", self.config.name),
                            Value::String(summary),
                        )
                        .await;
                }
                Err(e) => {
                    tracing::warn!("summarisation for agent '{}' failed: {}", self.config.name, e);
                }
            }
        }

        let tail: Vec<&ChatMessage> = conversation
            .iter()
            .skip(conversation.len().saturating_sub(window))
            .collect();
        match serde_json::to_value(&tail) {
            Ok(value) => rt.context.store_agent_memory(&self.config.name, value).await,
            Err(e) => {
                tracing::warn!("memory encode for agent '{}' failed: {}", self.config.name, e)
            }
        }
    }
}

/// Best-effort JSON extraction: direct parse first, then the first fenced
/// code block.
fn extract_json(text: &str) -> Result<Value, ()> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            if let Ok(value) = serde_json::from_str::<Value>(after[..end].trim()) {
                return Ok(value);
            }
        }
    }

    Err(())
}

/// JSON serialization with recursively sorted object keys, so argument
/// order never defeats the repeat-invocation cache.
fn canonical_json(value: &Value) -> String {
    fn sort(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: std::collections::BTreeMap<String, Value> =
                    map.iter().map(|(k, v)| (k.clone(), sort(v))).collect();
                serde_json::to_value(sorted).unwrap_or(Value::Null)
            }
            Value::Array(arr) => Value::Array(arr.iter().map(sort).collect()),
            other => other.clone(),
        }
    }
    sort(value).to_string()
}
