//! LLM node executor: renders the prompt template, gates on leftover
//! placeholders, and hands the merged tool set to the agent loop.

use std::time::Instant;

use async_trait::async_trait;

use crate::agent::AgentRuntime;
use crate::chain::result::{NodeExecutionResult, NodeMetadata};
use crate::chain::ScriptChain;
use crate::error::NodeError;
use crate::spec::NodeConfig;
use crate::template::{has_unresolved_placeholders, render_placeholders};
use crate::tools::AgentCallStack;

use super::executor::{NodeContext, NodeExecutor};

pub struct LlmNodeExecutor;

#[async_trait]
impl NodeExecutor for LlmNodeExecutor {
    async fn execute(
        &self,
        chain: &ScriptChain,
        cfg: &NodeConfig,
        ctx: &NodeContext,
    ) -> Result<NodeExecutionResult, NodeError> {
        let NodeConfig::Llm(cfg) = cfg else {
            return Err(NodeError::ConfigError(
                "llm executor received incompatible config".into(),
            ));
        };

        let started = Instant::now();
        let name = cfg.name.as_deref().unwrap_or(&cfg.id);
        let metadata = NodeMetadata::started(&cfg.id, "llm", name);

        // Rendering runs on every execution; the leftover check is a hard
        // gate for LLM nodes.
        let rendered = render_placeholders(&cfg.prompt, &ctx.input);
        if has_unresolved_placeholders(&rendered) {
            return Err(NodeError::UnresolvedPlaceholder {
                node_id: cfg.id.clone(),
                rendered,
            });
        }

        let agent = chain.agent_for(cfg, &rendered)?;
        let rt = AgentRuntime {
            context: chain.context_manager().clone(),
            llm: chain.llm_service()?,
            meter: ctx.meter.clone(),
            call_stack: AgentCallStack::new(),
        };

        match agent.run(&ctx.input, &rt).await {
            Ok(outcome) => {
                let duration = started.elapsed().as_secs_f64();
                let mut metadata = metadata.finish(duration);
                metadata.rounds_exhausted = outcome.rounds_exhausted;
                let usage = agent.usage_for(&outcome.usage, outcome.api_calls);
                Ok(NodeExecutionResult::ok(outcome.output, metadata, duration).with_usage(usage))
            }
            Err(failure) => {
                // Ceiling and cancellation failures escalate to run level.
                if failure.error.is_run_level() {
                    return Err(failure.error);
                }
                let duration = started.elapsed().as_secs_f64();
                let usage = agent.usage_for(&failure.usage, failure.api_calls);
                Ok(
                    NodeExecutionResult::failed(&failure.error, metadata.finish(duration), duration)
                        .with_usage(usage),
                )
            }
        }
    }
}
