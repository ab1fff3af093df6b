//! Topology fingerprint: SHA-256 over the sorted adjacency map.
//!
//! The hash is a pure function of the graph shape: node ids and their
//! sorted dependency lists. Two specs that differ only in node
//! declaration order fingerprint identically.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::spec::NodeConfig;

/// Adjacency map `node id -> sorted dependency ids`, ordered by key.
pub fn adjacency_map(nodes: &[NodeConfig]) -> BTreeMap<String, Vec<String>> {
    nodes
        .iter()
        .map(|n| {
            let mut deps = n.dependencies().to_vec();
            deps.sort();
            (n.id().to_string(), deps)
        })
        .collect()
}

/// Hex SHA-256 of the JSON-serialized adjacency map.
pub fn topology_hash(nodes: &[NodeConfig]) -> String {
    let adjacency = adjacency_map(nodes);
    let encoded = serde_json::to_string(&adjacency).expect("adjacency map serializes");
    let digest = Sha256::digest(encoded.as_bytes());
    format!("{:x}", digest)
}
