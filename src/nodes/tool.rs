//! Deterministic tool executor: substitute context placeholders into
//! `tool_args`, invoke the tool through the context manager, wrap the
//! return value.

use std::time::Instant;

use async_trait::async_trait;

use crate::chain::result::{NodeExecutionResult, NodeMetadata};
use crate::chain::ScriptChain;
use crate::error::NodeError;
use crate::spec::NodeConfig;
use crate::template::apply_context;
use crate::tools::{AgentCallStack, ToolContext};

use super::executor::{NodeContext, NodeExecutor};

pub struct ToolNodeExecutor;

#[async_trait]
impl NodeExecutor for ToolNodeExecutor {
    async fn execute(
        &self,
        chain: &ScriptChain,
        cfg: &NodeConfig,
        ctx: &NodeContext,
    ) -> Result<NodeExecutionResult, NodeError> {
        let NodeConfig::Tool(cfg) = cfg else {
            return Err(NodeError::ConfigError(
                "tool executor received incompatible config".into(),
            ));
        };

        let started = Instant::now();
        let metadata = NodeMetadata::started(&cfg.id, "tool", cfg.name.as_deref().unwrap_or(&cfg.id));

        // Placeholder substitution is best-effort for tools: missing keys
        // leave the string unchanged rather than failing the node.
        let args = apply_context(&cfg.tool_args, &ctx.input);

        let tool_ctx = ToolContext::for_agent("", AgentCallStack::new(), ctx.meter.clone());
        let output = chain
            .context_manager()
            .execute_tool(&cfg.tool_name, args, &tool_ctx)
            .await?;

        let duration = started.elapsed().as_secs_f64();
        Ok(NodeExecutionResult::ok(output, metadata.finish(duration), duration))
    }
}
