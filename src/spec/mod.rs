//! Workflow spec: the JSON wire shape, its typed node configs, and the
//! version migrator that upgrades older payloads before parsing.

pub mod migrator;
pub mod parser;
pub mod schema;

pub use migrator::ChainMigrator;
pub use parser::{parse_spec, parse_spec_str};
pub use schema::{
    ChainMetadata, ChainSpec, ConditionNodeConfig, LlmNodeConfig, LoopNodeConfig,
    NestedChainNodeConfig, NodeConfig, ToolNodeConfig,
};
