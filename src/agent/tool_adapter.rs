//! Agent-as-tool adapter: lets one agent appear in another agent's tool
//! set. Re-entry of an agent already on the per-run call stack aborts
//! with the full cycle path instead of recursing forever.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::context::GraphContextManager;
use crate::error::NodeError;
use crate::llm::LlmService;
use crate::tools::{Tool, ToolContext};

use super::{AgentNode, AgentRuntime};

pub struct AgentTool {
    agent: Arc<AgentNode>,
    name: String,
    description: String,
    context: Arc<GraphContextManager>,
    llm: Arc<dyn LlmService>,
}

impl AgentTool {
    pub(crate) fn new(
        agent: Arc<AgentNode>,
        name: String,
        description: String,
        context: Arc<GraphContextManager>,
        llm: Arc<dyn LlmService>,
    ) -> Self {
        Self {
            agent,
            name,
            description,
            context,
            llm,
        }
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "input": {"type": "object", "description": "Input to agent"}
            }
        }))
    }

    async fn run(&self, args: Value, ctx: &ToolContext) -> Result<Value, NodeError> {
        let agent_name = self.agent.name().to_string();
        ctx.call_stack.enter(&agent_name)?;

        let rt = AgentRuntime {
            context: self.context.clone(),
            llm: self.llm.clone(),
            meter: ctx.meter.clone(),
            call_stack: ctx.call_stack.clone(),
        };
        let input = args.get("input").cloned().unwrap_or(args);

        let result = self.agent.run(&input, &rt).await;
        ctx.call_stack.leave(&agent_name);

        match result {
            Ok(outcome) => Ok(outcome.output),
            Err(failure) => Err(failure.error),
        }
    }
}
