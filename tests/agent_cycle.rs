mod common;

use std::sync::Arc;

use serde_json::json;

use chainflow::agent::{AgentConfig, AgentNode, AgentRuntime};
use chainflow::llm::{LlmConfig, LlmService};
use chainflow::tools::AgentCallStack;
use chainflow::{ChainFactory, GraphContextManager, TokenMeter};
use common::{services_with_llm, ScriptedLlm};

fn agent_config(name: &str) -> AgentConfig {
    AgentConfig {
        name: name.to_string(),
        instructions: "You may delegate.".into(),
        llm: LlmConfig {
            model: "m".into(),
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

#[tokio::test]
async fn test_agent_self_invocation_detects_cycle() {
    // Agent A exposed as a tool and wired into its own tool set; the
    // stubbed LLM always delegates to it.
    let llm = ScriptedLlm::new(&[r#"{"tool_name": "call_A", "arguments": {"input": {}}}"#]);
    let llm_svc: Arc<dyn LlmService> = llm.clone();
    let cm = Arc::new(GraphContextManager::new());

    let agent = Arc::new(AgentNode::bare(agent_config("A")));
    let self_tool = agent.as_tool("call_A", "Delegate to A", cm.clone(), llm_svc.clone());
    cm.register_tool(self_tool);

    let rt = AgentRuntime {
        context: cm.clone(),
        llm: llm_svc,
        meter: TokenMeter::new(None),
        call_stack: AgentCallStack::new(),
    };

    let result = agent.execute(&json!({}), &rt).await;

    assert!(!result.success);
    assert_eq!(result.error_kind.as_deref(), Some("AgentCycle"));
    assert!(result.error.unwrap().contains("A -> A"));
}

#[tokio::test]
async fn test_mutual_agent_cycle_lists_path() {
    // A delegates to B, B back to A.
    let llm = ScriptedLlm::new(&[
        r#"{"tool_name": "call_B", "arguments": {"input": {}}}"#,
        r#"{"tool_name": "call_A", "arguments": {"input": {}}}"#,
        r#"{"tool_name": "call_B", "arguments": {"input": {}}}"#,
    ]);
    let llm_svc: Arc<dyn LlmService> = llm.clone();
    let cm = Arc::new(GraphContextManager::new());

    let agent_a = Arc::new(AgentNode::bare(agent_config("A")));
    let agent_b = Arc::new(AgentNode::bare(agent_config("B")));
    cm.register_tool(agent_a.as_tool("call_A", "Delegate to A", cm.clone(), llm_svc.clone()));
    cm.register_tool(agent_b.as_tool("call_B", "Delegate to B", cm.clone(), llm_svc.clone()));

    let rt = AgentRuntime {
        context: cm.clone(),
        llm: llm_svc,
        meter: TokenMeter::new(None),
        call_stack: AgentCallStack::new(),
    };

    let result = agent_a.execute(&json!({}), &rt).await;

    assert!(!result.success);
    let error = result.error.unwrap();
    assert!(error.contains("B -> A -> B") || error.contains("A -> B -> A"), "{}", error);
}

#[tokio::test]
async fn test_agent_cycle_surfaces_through_chain() {
    // Same wiring, but driven through an LLM node in a chain.
    let llm = ScriptedLlm::new(&[r#"{"tool_name": "call_A", "arguments": {"input": {}}}"#]);
    let cm = Arc::new(GraphContextManager::new());
    let services = services_with_llm(llm.clone());

    let llm_svc: Arc<dyn LlmService> = llm;
    let agent = Arc::new(AgentNode::bare(agent_config("A")));
    cm.register_tool(agent.as_tool("call_A", "Delegate to A", cm.clone(), llm_svc));

    let chain = ChainFactory::new()
        .from_value(json!({
            "nodes": [{"id": "ai1", "type": "llm", "name": "A", "model": "m",
                       "prompt": "Delegate"}]
        }))
        .unwrap()
        .context_manager(cm)
        .services(services)
        .build()
        .unwrap();

    let result = chain.execute(json!({})).await;

    assert!(!result.success);
    assert_eq!(
        result.output["ai1"].error_kind.as_deref(),
        Some("AgentCycle")
    );
}
