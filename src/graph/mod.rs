//! DAG construction and validation: unique ids, known dependencies, Kahn
//! topological levelling, and the topology fingerprint.

pub mod builder;
pub mod topology;
pub mod types;
pub mod validate;

pub use builder::build_graph;
pub use topology::{adjacency_map, topology_hash};
pub use types::{Graph, GraphNode};
pub use validate::{Diagnostic, DiagnosticLevel, ValidationReport};
