//! LLM service contract consumed by the agent loop. Implementations are
//! injected through the service locator; the engine treats the returned
//! text as the sole control signal.

pub mod error;
pub mod types;

use async_trait::async_trait;

use crate::tools::ToolDefinition;

pub use error::LlmError;
pub use types::{ChatMessage, ChatRole, GenerateResponse, LlmConfig, LlmUsage};

/// Text generation service. `tools` is advisory: providers are free to
/// map it through native function calling, but the agent loop only parses
/// the returned text.
#[async_trait]
pub trait LlmService: Send + Sync {
    async fn generate(
        &self,
        config: &LlmConfig,
        prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<GenerateResponse, LlmError>;
}

/// Rough USD cost per call, for usage reporting only. Unknown models cost
/// zero rather than guessing.
pub fn estimate_cost(
    provider: &str,
    model: &str,
    prompt_tokens: i64,
    completion_tokens: i64,
) -> f64 {
    // (prompt $/1k tokens, completion $/1k tokens)
    let rates = match (provider, model) {
        ("openai", "gpt-4o") => (0.0025, 0.01),
        ("openai", "gpt-4o-mini") => (0.00015, 0.0006),
        ("anthropic", m) if m.starts_with("claude-3-5-sonnet") => (0.003, 0.015),
        ("anthropic", m) if m.starts_with("claude-3-haiku") => (0.00025, 0.00125),
        _ => return 0.0,
    };
    (prompt_tokens as f64 / 1000.0) * rates.0 + (completion_tokens as f64 / 1000.0) * rates.1
}
