//! Level scheduler: executes the DAG level by level, nodes within a level
//! concurrently under a counting semaphore, with ceilings, timeouts,
//! cancellation, and the sibling-failure policy.
//!
//! The level barrier is the only synchronisation point between levels:
//! every predecessor result is settled before a successor's context is
//! assembled, so per-node outputs are deterministic regardless of sibling
//! completion order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::core::event_bus::ChainEvent;
use crate::core::meter::TokenMeter;
use crate::error::{ChainError, NodeError};

use super::result::{ChainExecutionResult, NodeExecutionResult, NodeMetadata};
use super::ScriptChain;

pub(crate) async fn run(
    chain: &ScriptChain,
    input: Value,
    cancel: CancellationToken,
) -> ChainExecutionResult {
    let started = Instant::now();
    let execution_id = uuid::Uuid::new_v4().to_string();
    let emitter = chain.emitter().clone();
    let config = chain.run_config();
    let meter = TokenMeter::new(config.token_ceiling);

    emitter
        .emit(ChainEvent::ChainStarted {
            chain_id: chain.metadata().chain_id.clone(),
            execution_id: execution_id.clone(),
            timestamp: Utc::now(),
        })
        .await;

    // Per-run timeout trips the shared cancellation token; the flag keeps
    // Timeout distinguishable from an external cancel.
    let timed_out = Arc::new(AtomicBool::new(false));
    let watchdog = config.run_timeout.map(|timeout| {
        let cancel = cancel.clone();
        let timed_out = timed_out.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            timed_out.store(true, Ordering::SeqCst);
            cancel.cancel();
        })
    });

    let base_input = match &input {
        Value::Object(_) => input.clone(),
        Value::Null => Value::Object(serde_json::Map::new()),
        other => serde_json::json!({ "input": other }),
    };

    let mut outputs: HashMap<String, NodeExecutionResult> = HashMap::new();
    let mut run_error: Option<ChainError> = None;

    'levels: for (depth, level) in chain.graph().levels().iter().enumerate() {
        if let Some(ceiling) = config.depth_ceiling {
            if depth + 1 >= ceiling {
                run_error = Some(ChainError::DepthCeilingExceeded {
                    level: depth,
                    ceiling,
                });
                break 'levels;
            }
        }

        if cancel.is_cancelled() {
            run_error = Some(cancel_error(&timed_out));
            break 'levels;
        }

        if let Err(e) = meter.check() {
            run_error = Some(e.into());
            break 'levels;
        }

        // Partition the level: nodes with a failed or cancelled
        // predecessor are suppressed without running.
        let mut runnable: Vec<(String, Value)> = Vec::new();
        for node_id in level {
            let cfg = chain.node(node_id).expect("levels only contain known ids");
            match suppression_for(cfg.dependencies(), &outputs) {
                Some(error) => {
                    let metadata = NodeMetadata::started(node_id, cfg.node_type(), cfg.name());
                    outputs.insert(
                        node_id.clone(),
                        NodeExecutionResult::failed(&error, metadata.finish(0.0), 0.0),
                    );
                }
                None => {
                    runnable.push((node_id.clone(), node_context_input(&base_input, cfg.dependencies(), &outputs)));
                }
            }
        }

        let permits = config.max_parallel.unwrap_or_else(|| runnable.len().max(1));
        let semaphore = Arc::new(Semaphore::new(permits.max(1)));

        let tasks = runnable.into_iter().map(|(node_id, ctx_input)| {
            let semaphore = semaphore.clone();
            let meter = meter.clone();
            let cancel = cancel.clone();
            let emitter = emitter.clone();
            async move {
                let _permit = semaphore.acquire().await.expect("semaphore never closed");
                let result = execute_node(chain, &node_id, ctx_input, meter, cancel, emitter).await;
                (node_id, result)
            }
        });

        let settled = futures::future::join_all(tasks).await;

        let mut level_failed: Option<String> = None;
        for (node_id, result) in settled {
            match result {
                Ok(node_result) => {
                    emitter
                        .emit(ChainEvent::NodeFinished {
                            node_id: node_id.clone(),
                            success: node_result.success,
                            timestamp: Utc::now(),
                        })
                        .await;
                    if node_result.success {
                        chain
                            .context_manager()
                            .update_node_context(&node_id, node_result.output.clone());
                    } else if level_failed.is_none() {
                        level_failed = Some(node_id.clone());
                    }
                    outputs.insert(node_id, node_result);
                }
                Err(error) => {
                    // Run-level error: cancel outstanding work, keep the
                    // partial result set.
                    cancel.cancel();
                    if run_error.is_none() {
                        run_error = Some(match error {
                            NodeError::Cancelled => cancel_error(&timed_out),
                            other => other.into(),
                        });
                    }
                    let cfg = chain.node(&node_id).expect("known id");
                    let metadata = NodeMetadata::started(&node_id, cfg.node_type(), cfg.name());
                    outputs.insert(
                        node_id,
                        NodeExecutionResult::failed(
                            &NodeError::Cancelled,
                            metadata.finish(0.0),
                            0.0,
                        ),
                    );
                }
            }
        }

        if run_error.is_some() {
            break 'levels;
        }

        if config.strict {
            if let Some(node_id) = level_failed {
                let error = outputs
                    .get(&node_id)
                    .and_then(|r| r.error.clone())
                    .unwrap_or_default();
                run_error = Some(ChainError::NodeExecutionError { node_id, error });
                cancel.cancel();
                break 'levels;
            }
        }
    }

    if let Some(watchdog) = watchdog {
        watchdog.abort();
    }

    let success = run_error.is_none() && outputs.values().all(|r| r.success);
    let error = run_error
        .as_ref()
        .map(|e| e.to_string())
        .or_else(|| first_failure(chain, &outputs));

    let usage = ChainExecutionResult::aggregate_usage(&outputs);
    let execution_time = started.elapsed().as_secs_f64();

    emitter
        .emit(ChainEvent::ChainCompleted {
            chain_id: chain.metadata().chain_id.clone(),
            execution_id,
            success,
            timestamp: Utc::now(),
        })
        .await;

    ChainExecutionResult {
        success,
        output: outputs,
        error,
        usage,
        execution_time,
    }
}

fn cancel_error(timed_out: &AtomicBool) -> ChainError {
    if timed_out.load(Ordering::SeqCst) {
        ChainError::Timeout
    } else {
        ChainError::Cancelled
    }
}

/// First failed node in topological/declaration order, for the run-level
/// error summary.
fn first_failure(chain: &ScriptChain, outputs: &HashMap<String, NodeExecutionResult>) -> Option<String> {
    for level in chain.graph().levels() {
        for node_id in level {
            if let Some(result) = outputs.get(node_id) {
                if !result.success {
                    return result.error.clone();
                }
            }
        }
    }
    None
}

/// The suppression error for a node whose predecessor did not succeed,
/// or `None` when all predecessors succeeded.
fn suppression_for(
    dependencies: &[String],
    outputs: &HashMap<String, NodeExecutionResult>,
) -> Option<NodeError> {
    for dep in dependencies {
        match outputs.get(dep) {
            Some(result) if result.success => continue,
            Some(result) => {
                let cancelled = matches!(
                    result.error_kind.as_deref(),
                    Some("Cancelled") | Some("CancelledUpstream")
                );
                return Some(if cancelled {
                    NodeError::CancelledUpstream(dep.clone())
                } else {
                    NodeError::UpstreamFailed(dep.clone())
                });
            }
            None => return Some(NodeError::UpstreamFailed(dep.clone())),
        }
    }
    None
}

/// Context fed to a node: the initial input merged with every successful
/// predecessor's output keyed by predecessor id.
fn node_context_input(
    base: &Value,
    dependencies: &[String],
    outputs: &HashMap<String, NodeExecutionResult>,
) -> Value {
    let mut merged = match base {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    for dep in dependencies {
        if let Some(result) = outputs.get(dep) {
            if result.success {
                merged.insert(dep.clone(), result.output.clone());
            }
        }
    }
    Value::Object(merged)
}

async fn execute_node(
    chain: &ScriptChain,
    node_id: &str,
    ctx_input: Value,
    meter: TokenMeter,
    cancel: CancellationToken,
    emitter: crate::core::event_bus::EventEmitter,
) -> Result<NodeExecutionResult, NodeError> {
    let cfg = chain.node(node_id).expect("scheduler resolves known ids");
    let started = Instant::now();

    emitter
        .emit(ChainEvent::NodeStarted {
            node_id: node_id.to_string(),
            node_type: cfg.node_type().to_string(),
            timestamp: Utc::now(),
        })
        .await;

    let metadata = NodeMetadata::started(node_id, cfg.node_type(), cfg.name());

    let Some(executor) = chain.registry().get(cfg.node_type()) else {
        let error = NodeError::ConfigError(format!("no executor for node type '{}'", cfg.node_type()));
        return Ok(NodeExecutionResult::failed(&error, metadata.finish(0.0), 0.0));
    };

    let node_ctx = crate::nodes::NodeContext {
        input: ctx_input,
        meter,
        cancel: cancel.clone(),
        emitter,
    };

    let exec = executor.execute(chain, cfg, &node_ctx);
    let outcome = match chain.run_config().node_timeout {
        Some(timeout) => {
            tokio::select! {
                _ = cancel.cancelled() => Err(NodeError::Cancelled),
                result = tokio::time::timeout(timeout, exec) => {
                    result.unwrap_or(Err(NodeError::Timeout))
                }
            }
        }
        None => {
            tokio::select! {
                _ = cancel.cancelled() => Err(NodeError::Cancelled),
                result = exec => result,
            }
        }
    };

    let duration = started.elapsed().as_secs_f64();
    match outcome {
        Ok(result) => Ok(result),
        Err(error) if error.is_run_level() => Err(error),
        Err(error) => Ok(NodeExecutionResult::failed(
            &error,
            metadata.finish(duration),
            duration,
        )),
    }
}
