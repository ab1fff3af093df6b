//! Factory for building executable chains from JSON payloads: runs the
//! version migrator, parses the typed node configs, and hands back a
//! populated builder for the caller to attach tools and services.

use serde_json::Value;

use crate::error::ChainError;
use crate::spec::migrator::CURRENT_VERSION;
use crate::spec::{parse_spec, ChainMigrator};

use super::ScriptChainBuilder;

#[derive(Default)]
pub struct ChainFactory {
    migrator: ChainMigrator,
}

impl ChainFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_migrator(migrator: ChainMigrator) -> Self {
        Self { migrator }
    }

    /// Migrate `payload` to the current version and parse it into a chain
    /// builder carrying the spec's metadata.
    pub fn from_value(&self, payload: Value) -> Result<ScriptChainBuilder, ChainError> {
        self.from_value_versioned(payload, CURRENT_VERSION)
    }

    pub fn from_value_versioned(
        &self,
        payload: Value,
        target_version: &str,
    ) -> Result<ScriptChainBuilder, ChainError> {
        let migrated = self.migrator.migrate(payload, target_version)?;
        let spec = parse_spec(&migrated)?;
        Ok(ScriptChainBuilder::from_spec(spec))
    }

    pub fn from_json(&self, content: &str) -> Result<ScriptChainBuilder, ChainError> {
        let payload: Value =
            serde_json::from_str(content).map_err(|e| ChainError::SpecParseError(e.to_string()))?;
        self.from_value(payload)
    }
}
