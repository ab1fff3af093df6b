use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use std::collections::HashMap;

/// Node payload stored in the petgraph carrier.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: String,
    pub node_type: String,
    pub dependencies: Vec<String>,
}

/// Validated DAG with precomputed topological levels.
///
/// `levels[d]` holds the ids of all nodes at level `d` in declaration
/// order; a node's level is `1 + max(level of deps)`, 0 for roots.
#[derive(Debug, Clone)]
pub struct Graph {
    pub(crate) graph: StableDiGraph<GraphNode, ()>,
    pub(crate) index: HashMap<String, NodeIndex>,
    pub(crate) levels: Vec<Vec<String>>,
    pub(crate) level_of: HashMap<String, usize>,
}

impl Graph {
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    pub fn level_of(&self, node_id: &str) -> Option<usize> {
        self.level_of.get(node_id).copied()
    }

    pub fn get_node(&self, node_id: &str) -> Option<&GraphNode> {
        self.index
            .get(node_id)
            .and_then(|idx| self.graph.node_weight(*idx))
    }

    pub fn dependencies_of(&self, node_id: &str) -> &[String] {
        self.get_node(node_id)
            .map(|n| n.dependencies.as_slice())
            .unwrap_or(&[])
    }

    /// Ids of nodes that (transitively) depend on `node_id`.
    pub fn descendants_of(&self, node_id: &str) -> Vec<String> {
        let Some(&start) = self.index.get(node_id) else {
            return Vec::new();
        };
        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![start];
        let mut out = Vec::new();
        while let Some(idx) = stack.pop() {
            for next in self
                .graph
                .neighbors_directed(idx, petgraph::Direction::Outgoing)
            {
                if seen.insert(next) {
                    if let Some(node) = self.graph.node_weight(next) {
                        out.push(node.id.clone());
                    }
                    stack.push(next);
                }
            }
        }
        out
    }
}
