//! Version migration for workflow payloads.
//!
//! Older specs are upgraded stepwise through registered per-version
//! transforms before parsing. A payload whose version has no registered
//! transform chain up to the target fails with
//! [`ChainError::UnsupportedVersion`].

use std::collections::HashMap;

use serde_json::Value;

use crate::error::ChainError;

pub const CURRENT_VERSION: &str = "1.0.0";

type Transform = Box<dyn Fn(Value) -> Result<Value, ChainError> + Send + Sync>;

/// Registry of `from_version -> transform` upgrade steps. Each transform
/// must rewrite the payload's `version` field to the version it produces.
#[derive(Default)]
pub struct ChainMigrator {
    transforms: HashMap<String, Transform>,
}

impl ChainMigrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, from_version: &str, transform: F)
    where
        F: Fn(Value) -> Result<Value, ChainError> + Send + Sync + 'static,
    {
        self.transforms
            .insert(from_version.to_string(), Box::new(transform));
    }

    /// Upgrade `payload` to `target_version`, applying registered steps in
    /// sequence. A no-op when the payload is already at the target.
    pub fn migrate(&self, mut payload: Value, target_version: &str) -> Result<Value, ChainError> {
        // Bounded so a transform that forgets to bump the version cannot
        // spin forever.
        for _ in 0..16 {
            let found = payload
                .get("version")
                .and_then(Value::as_str)
                .unwrap_or(CURRENT_VERSION)
                .to_string();

            if found == target_version {
                return Ok(payload);
            }

            match self.transforms.get(&found) {
                Some(transform) => {
                    let upgraded = transform(payload)?;
                    let new_version = upgraded.get("version").and_then(Value::as_str);
                    if new_version == Some(found.as_str()) {
                        return Err(ChainError::InternalError(format!(
                            "migration from version {} did not advance the payload",
                            found
                        )));
                    }
                    payload = upgraded;
                }
                None => {
                    return Err(ChainError::UnsupportedVersion {
                        found,
                        target: target_version.to_string(),
                    })
                }
            }
        }

        Err(ChainError::InternalError(
            "migration chain exceeded 16 steps".into(),
        ))
    }
}
