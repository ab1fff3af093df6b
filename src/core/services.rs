//! Process-wide service lookup. An explicit injected struct, not a global:
//! tests construct a fresh locator and the engine resolves collaborators
//! (`llm_service`, `context_manager`, `tool_service`) at first use.

use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ChainError;

/// Well-known keys consumed by the engine.
pub const LLM_SERVICE: &str = "llm_service";
pub const CONTEXT_MANAGER: &str = "context_manager";
pub const TOOL_SERVICE: &str = "tool_service";

/// Thread-safe string-keyed map of service singletons. Services are plain
/// values; re-registration replaces silently.
#[derive(Default)]
pub struct ServiceLocator {
    services: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl ServiceLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Send + Sync + 'static>(&self, key: &str, service: T) {
        self.services
            .write()
            .insert(key.to_string(), Arc::new(service));
    }

    /// Fetch a service by key, failing with `ServiceUnavailable` when the
    /// key is absent or holds a different type.
    pub fn get<T: Clone + 'static>(&self, key: &str) -> Result<T, ChainError> {
        self.services
            .read()
            .get(key)
            .and_then(|svc| svc.downcast_ref::<T>().cloned())
            .ok_or_else(|| ChainError::ServiceUnavailable(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.services.read().contains_key(key)
    }

    pub fn clear(&self) {
        self.services.write().clear();
    }
}
