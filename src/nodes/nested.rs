//! Nested chain executor: runs an embedded workflow spec on a fresh child
//! context and projects the child output through `exposed_outputs`.

use async_trait::async_trait;
use serde_json::Value;

use crate::chain::result::{NodeExecutionResult, NodeMetadata};
use crate::chain::ScriptChain;
use crate::error::NodeError;
use crate::spec::NodeConfig;
use crate::template::lookup_path;

use super::executor::{NodeContext, NodeExecutor};

pub struct NestedChainExecutor;

#[async_trait]
impl NodeExecutor for NestedChainExecutor {
    async fn execute(
        &self,
        chain: &ScriptChain,
        cfg: &NodeConfig,
        ctx: &NodeContext,
    ) -> Result<NodeExecutionResult, NodeError> {
        let NodeConfig::NestedChain(cfg) = cfg else {
            return Err(NodeError::ConfigError(
                "nested_chain executor received incompatible config".into(),
            ));
        };

        let metadata = NodeMetadata::started(
            &cfg.id,
            "nested_chain",
            cfg.name.as_deref().unwrap_or(&cfg.id),
        );

        let child = chain.spawn_child(&cfg.chain).map_err(|e| {
            NodeError::ConfigError(format!(
                "failed to instantiate nested chain for node '{}': {}",
                cfg.id, e
            ))
        })?;

        // Child token: parent cancellation propagates down, while a child
        // run-level abort stays scoped to the child.
        let child_cancel = ctx.cancel.child_token();
        let child_result =
            Box::pin(child.execute_cancellable(ctx.input.clone(), child_cancel)).await;

        // Child LLM usage counts against the parent's ceiling.
        ctx.meter.charge(child_result.usage.total_tokens);

        let raw_output =
            serde_json::to_value(&child_result.output).unwrap_or(Value::Null);

        let output = if cfg.exposed_outputs.is_empty() {
            raw_output
        } else {
            match project_outputs(&raw_output, &cfg.exposed_outputs) {
                Some(mapped) => mapped,
                None => {
                    tracing::warn!(
                        "exposed_outputs mapping failed for node '{}', propagating raw output",
                        cfg.id
                    );
                    raw_output
                }
            }
        };

        let duration = child_result.execution_time;
        Ok(NodeExecutionResult {
            success: child_result.success,
            output,
            error: child_result.error.clone(),
            error_kind: None,
            metadata: metadata.finish(duration),
            usage: None,
            execution_time: duration,
        })
    }
}

/// Apply every `public_key -> path` projection; `None` when any path does
/// not resolve, so the caller can fall back to the raw output.
fn project_outputs(
    raw: &Value,
    exposed: &std::collections::BTreeMap<String, String>,
) -> Option<Value> {
    let mut mapped = serde_json::Map::new();
    for (public_key, path) in exposed {
        let value = lookup_path(raw, path)?;
        mapped.insert(public_key.clone(), value.clone());
    }
    Some(Value::Object(mapped))
}
