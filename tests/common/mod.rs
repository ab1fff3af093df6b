//! Shared fixtures: deterministic tools and a scripted LLM service.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use chainflow::core::services::LLM_SERVICE;
use chainflow::llm::{GenerateResponse, LlmConfig, LlmError, LlmService, LlmUsage};
use chainflow::tools::{Tool, ToolContext, ToolDefinition};
use chainflow::{NodeError, ServiceLocator};

/// Sums `numbers`; integral results stay integers.
pub struct SumTool;

#[async_trait]
impl Tool for SumTool {
    fn name(&self) -> &str {
        "sum"
    }

    fn description(&self) -> &str {
        "Sum a list of numbers"
    }

    fn parameters_schema(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "numbers": {"type": "array", "items": {"type": "number"}}
            },
            "required": ["numbers"]
        }))
    }

    fn output_schema(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {"sum": {"type": "number"}}
        }))
    }

    async fn run(&self, args: Value, _ctx: &ToolContext) -> Result<Value, NodeError> {
        let sum: f64 = args["numbers"]
            .as_array()
            .map(|arr| arr.iter().filter_map(Value::as_f64).sum())
            .unwrap_or(0.0);
        if sum.fract() == 0.0 {
            Ok(json!({"sum": sum as i64}))
        } else {
            Ok(json!({"sum": sum}))
        }
    }
}

/// Returns its arguments verbatim.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    async fn run(&self, args: Value, _ctx: &ToolContext) -> Result<Value, NodeError> {
        Ok(args)
    }
}

/// Always fails.
pub struct FailTool;

#[async_trait]
impl Tool for FailTool {
    fn name(&self) -> &str {
        "fail"
    }

    async fn run(&self, _args: Value, _ctx: &ToolContext) -> Result<Value, NodeError> {
        Err(NodeError::ExecutionError("intentional failure".into()))
    }
}

/// Sleeps for the configured duration, then echoes.
pub struct SleepTool(pub Duration);

#[async_trait]
impl Tool for SleepTool {
    fn name(&self) -> &str {
        "sleep"
    }

    async fn run(&self, args: Value, _ctx: &ToolContext) -> Result<Value, NodeError> {
        tokio::time::sleep(self.0).await;
        Ok(args)
    }
}

/// Counts invocations; returns a fixed payload.
pub struct CountingTool {
    name: String,
    pub calls: Arc<AtomicUsize>,
}

impl CountingTool {
    pub fn named(name: &str) -> (Arc<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Arc::new(Self {
                name: name.to_string(),
                calls: calls.clone(),
            }),
            calls,
        )
    }
}

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, args: Value, _ctx: &ToolContext) -> Result<Value, NodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({"called": self.name, "args": args}))
    }
}

/// Tracks peak concurrent executions across clones.
pub struct ConcurrencyProbe {
    current: Arc<AtomicUsize>,
    pub peak: Arc<AtomicUsize>,
    hold: Duration,
}

impl ConcurrencyProbe {
    pub fn new(hold: Duration) -> (Arc<Self>, Arc<AtomicUsize>) {
        let peak = Arc::new(AtomicUsize::new(0));
        (
            Arc::new(Self {
                current: Arc::new(AtomicUsize::new(0)),
                peak: peak.clone(),
                hold,
            }),
            peak,
        )
    }
}

#[async_trait]
impl Tool for ConcurrencyProbe {
    fn name(&self) -> &str {
        "probe"
    }

    async fn run(&self, args: Value, _ctx: &ToolContext) -> Result<Value, NodeError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.hold).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(args)
    }
}

/// LLM service that replays a scripted list of responses; the last
/// response repeats once the script is exhausted.
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<String>>,
    pub usage_per_call: LlmUsage,
    pub prompts: Mutex<Vec<String>>,
    pub tool_lists: Mutex<Vec<Vec<String>>>,
}

impl ScriptedLlm {
    pub fn new(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
            usage_per_call: LlmUsage {
                prompt_tokens: 10,
                completion_tokens: 20,
                total_tokens: 30,
            },
            prompts: Mutex::new(Vec::new()),
            tool_lists: Mutex::new(Vec::new()),
        })
    }

    pub fn with_usage(responses: &[&str], usage_per_call: LlmUsage) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
            usage_per_call,
            prompts: Mutex::new(Vec::new()),
            tool_lists: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl LlmService for ScriptedLlm {
    async fn generate(
        &self,
        _config: &LlmConfig,
        prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<GenerateResponse, LlmError> {
        self.prompts.lock().push(prompt.to_string());
        self.tool_lists
            .lock()
            .push(tools.iter().map(|t| t.name.clone()).collect());

        let mut responses = self.responses.lock();
        let text = if responses.len() > 1 {
            responses.pop_front().unwrap()
        } else {
            responses.front().cloned().unwrap_or_else(|| "done".into())
        };

        Ok(GenerateResponse {
            text,
            usage: self.usage_per_call.clone(),
        })
    }
}

/// Service locator with the scripted LLM registered under `llm_service`.
pub fn services_with_llm(llm: Arc<ScriptedLlm>) -> Arc<ServiceLocator> {
    let services = Arc::new(ServiceLocator::new());
    let svc: Arc<dyn LlmService> = llm;
    services.register(LLM_SERVICE, svc);
    services
}
