//! Loop executor: runs the embedded body chain once per element of the
//! iterator source, collecting per-iteration results in order.

use std::time::Instant;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::chain::result::{NodeExecutionResult, NodeMetadata};
use crate::chain::ScriptChain;
use crate::error::NodeError;
use crate::spec::NodeConfig;
use crate::template::lookup_path;

use super::executor::{NodeContext, NodeExecutor};

/// Context key the current element is exposed under inside the body chain.
pub const ITEM_KEY: &str = "item";

pub struct LoopNodeExecutor;

#[async_trait]
impl NodeExecutor for LoopNodeExecutor {
    async fn execute(
        &self,
        chain: &ScriptChain,
        cfg: &NodeConfig,
        ctx: &NodeContext,
    ) -> Result<NodeExecutionResult, NodeError> {
        let NodeConfig::Loop(cfg) = cfg else {
            return Err(NodeError::ConfigError(
                "loop executor received incompatible config".into(),
            ));
        };

        let started = Instant::now();
        let metadata = NodeMetadata::started(&cfg.id, "loop", cfg.name.as_deref().unwrap_or(&cfg.id));

        let items = lookup_path(&ctx.input, &cfg.iterator_source)
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| {
                NodeError::ConfigError(format!(
                    "iterator_source '{}' did not resolve to an array",
                    cfg.iterator_source
                ))
            })?;

        let mut iterations = Vec::new();
        for (index, element) in items.into_iter().take(cfg.max_iterations).enumerate() {
            if ctx.cancel.is_cancelled() {
                return Err(NodeError::Cancelled);
            }

            // Each iteration gets a fresh body chain so per-run state never
            // bleeds between elements.
            let body = chain.spawn_child(&cfg.body_chain).map_err(|e| {
                NodeError::ConfigError(format!(
                    "failed to instantiate loop body for node '{}': {}",
                    cfg.id, e
                ))
            })?;

            let mut input = match &ctx.input {
                Value::Object(map) => map.clone(),
                _ => serde_json::Map::new(),
            };
            input.insert(ITEM_KEY.to_string(), element);
            input.insert("index".to_string(), json!(index));

            let result = Box::pin(
                body.execute_cancellable(Value::Object(input), ctx.cancel.child_token()),
            )
            .await;
            ctx.meter.charge(result.usage.total_tokens);

            iterations.push(json!({
                "index": index,
                "success": result.success,
                "output": serde_json::to_value(&result.output).unwrap_or(Value::Null),
                "error": result.error,
            }));
        }

        let count = iterations.len();
        let duration = started.elapsed().as_secs_f64();
        Ok(NodeExecutionResult::ok(
            json!({"iterations": iterations, "count": count}),
            metadata.finish(duration),
            duration,
        ))
    }
}
