//! Condition executor: evaluates the restricted boolean expression over
//! the node context and records which branch ran.

use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::chain::result::{NodeExecutionResult, NodeMetadata};
use crate::chain::ScriptChain;
use crate::core::event_bus::ChainEvent;
use crate::error::NodeError;
use crate::evaluator;
use crate::spec::NodeConfig;

use super::executor::{NodeContext, NodeExecutor};

pub struct ConditionNodeExecutor;

#[async_trait]
impl NodeExecutor for ConditionNodeExecutor {
    async fn execute(
        &self,
        _chain: &ScriptChain,
        cfg: &NodeConfig,
        ctx: &NodeContext,
    ) -> Result<NodeExecutionResult, NodeError> {
        let NodeConfig::Condition(cfg) = cfg else {
            return Err(NodeError::ConfigError(
                "condition executor received incompatible config".into(),
            ));
        };

        let started = Instant::now();
        let metadata =
            NodeMetadata::started(&cfg.id, "condition", cfg.name.as_deref().unwrap_or(&cfg.id));

        let result = evaluator::evaluate(&cfg.expression, &ctx.input)?;
        let branch = if result { "true" } else { "false" };

        ctx.emitter
            .emit(ChainEvent::BranchSelected {
                node_id: cfg.id.clone(),
                branch: branch.to_string(),
                timestamp: Utc::now(),
            })
            .await;

        let output = json!({
            "result": result,
            "branch": branch,
            "true_branch": cfg.true_branch,
            "false_branch": cfg.false_branch,
        });

        let duration = started.elapsed().as_secs_f64();
        Ok(NodeExecutionResult::ok(output, metadata.finish(duration), duration))
    }
}
