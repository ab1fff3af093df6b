use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::stable_graph::StableDiGraph;

use crate::error::ChainError;
use crate::spec::NodeConfig;

use super::types::{Graph, GraphNode};

/// Build a validated [`Graph`] from node configs: unique ids, declared
/// dependencies only, acyclic, with topological levels computed.
pub fn build_graph(nodes: &[NodeConfig]) -> Result<Graph, ChainError> {
    let mut graph = StableDiGraph::new();
    let mut index = HashMap::new();

    for cfg in nodes {
        if index.contains_key(cfg.id()) {
            return Err(ChainError::DuplicateNodeId(cfg.id().to_string()));
        }
        let idx = graph.add_node(GraphNode {
            id: cfg.id().to_string(),
            node_type: cfg.node_type().to_string(),
            dependencies: cfg.dependencies().to_vec(),
        });
        index.insert(cfg.id().to_string(), idx);
    }

    for cfg in nodes {
        for dep in cfg.dependencies() {
            let Some(&dep_idx) = index.get(dep) else {
                return Err(ChainError::UnknownDependency {
                    node_id: cfg.id().to_string(),
                    dep: dep.clone(),
                });
            };
            graph.add_edge(dep_idx, index[cfg.id()], ());
        }
    }

    let (levels, level_of) = compute_levels(nodes, &index, &graph)?;

    Ok(Graph {
        graph,
        index,
        levels,
        level_of,
    })
}

/// Kahn-style levelling. Residual nodes after draining the queue are the
/// members of at least one cycle and are reported by id.
fn compute_levels(
    nodes: &[NodeConfig],
    index: &HashMap<String, petgraph::stable_graph::NodeIndex>,
    graph: &StableDiGraph<GraphNode, ()>,
) -> Result<(Vec<Vec<String>>, HashMap<String, usize>), ChainError> {
    let mut in_degree: HashMap<&str, usize> = nodes
        .iter()
        .map(|n| (n.id(), n.dependencies().len()))
        .collect();

    let mut queue: VecDeque<&str> = nodes
        .iter()
        .filter(|n| n.dependencies().is_empty())
        .map(|n| n.id())
        .collect();

    let mut level_of: HashMap<String, usize> = queue.iter().map(|id| (id.to_string(), 0)).collect();
    let mut drained: HashSet<&str> = HashSet::new();

    while let Some(id) = queue.pop_front() {
        drained.insert(id);
        let level = level_of[id];
        let idx = index[id];
        for next in graph.neighbors_directed(idx, petgraph::Direction::Outgoing) {
            let next_id = graph[next].id.as_str();
            let entry = level_of.entry(next_id.to_string()).or_insert(0);
            *entry = (*entry).max(level + 1);
            let deg = in_degree.get_mut(next_id).expect("edge targets known node");
            *deg -= 1;
            if *deg == 0 {
                queue.push_back(next_id);
            }
        }
    }

    if drained.len() != nodes.len() {
        let mut offending: Vec<String> = nodes
            .iter()
            .map(|n| n.id().to_string())
            .filter(|id| !drained.contains(id.as_str()))
            .collect();
        offending.sort();
        return Err(ChainError::CycleDetected(offending));
    }

    let max_level = level_of.values().copied().max().unwrap_or(0);
    let mut levels: Vec<Vec<String>> = vec![Vec::new(); max_level + 1];
    // Declaration order within a level keeps sibling reporting stable.
    for cfg in nodes {
        levels[level_of[cfg.id()]].push(cfg.id().to_string());
    }

    Ok((levels, level_of))
}
