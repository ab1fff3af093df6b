//! Pluggable agent memory: a small store/load/summarise capability.
//! The default is an in-process map; external adapters (Redis and
//! friends) live outside the engine.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

use crate::llm::ChatMessage;

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("Memory provider error: {0}")]
    ProviderError(String),
}

/// Store/load keyed values and summarise transcript overflow. All three
/// operations are best-effort from the engine's point of view: failures
/// are logged and swallowed, never failing a node.
#[async_trait]
pub trait MemoryAdapter: Send + Sync {
    async fn store(&self, key: &str, value: Value) -> Result<(), MemoryError>;

    async fn load(&self, key: &str) -> Result<Option<Value>, MemoryError>;

    /// Compress `messages` into a short summary of at most roughly
    /// `max_tokens` tokens.
    async fn summarise(
        &self,
        messages: &[ChatMessage],
        max_tokens: usize,
    ) -> Result<String, MemoryError>;
}

/// Default in-process adapter backed by a plain map. Summarisation is a
/// head-truncating digest; adapters with a real summariser can do better.
#[derive(Default)]
pub struct InMemoryAdapter {
    entries: RwLock<HashMap<String, Value>>,
}

impl InMemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl MemoryAdapter for InMemoryAdapter {
    async fn store(&self, key: &str, value: Value) -> Result<(), MemoryError> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Value>, MemoryError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn summarise(
        &self,
        messages: &[ChatMessage],
        max_tokens: usize,
    ) -> Result<String, MemoryError> {
        // ~4 chars per token keeps the budget roughly honest.
        let budget = max_tokens.saturating_mul(4).max(16);
        let mut summary = String::new();
        for msg in messages {
            if !summary.is_empty() {
                summary.push_str(" | ");
            }
            summary.push_str(msg.role.as_str());
            summary.push_str(": ");
            summary.push_str(&msg.content);
            if summary.len() >= budget {
                break;
            }
        }
        if summary.len() > budget {
            let cut = summary
                .char_indices()
                .take_while(|(i, _)| *i < budget)
                .last()
                .map(|(i, c)| i + c.len_utf8())
                .unwrap_or(budget);
            summary.truncate(cut);
            summary.push('…');
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatRole;
    use serde_json::json;

    #[tokio::test]
    async fn test_store_load() {
        let mem = InMemoryAdapter::new();
        mem.store("k", json!([1, 2])).await.unwrap();
        assert_eq!(mem.load("k").await.unwrap(), Some(json!([1, 2])));
        assert_eq!(mem.load("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_summarise_truncates() {
        let mem = InMemoryAdapter::new();
        let messages: Vec<ChatMessage> = (0..50)
            .map(|i| ChatMessage::new(ChatRole::User, format!("message number {}", i)))
            .collect();
        let summary = mem.summarise(&messages, 20).await.unwrap();
        assert!(summary.len() <= 20 * 4 + 4);
        assert!(summary.starts_with("user: message number 0"));
    }

    #[tokio::test]
    async fn test_summarise_short_transcript_untouched() {
        let mem = InMemoryAdapter::new();
        let messages = vec![ChatMessage::new(ChatRole::Assistant, "ok")];
        let summary = mem.summarise(&messages, 100).await.unwrap();
        assert_eq!(summary, "assistant: ok");
    }
}
