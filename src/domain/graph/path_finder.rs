use pathfinding::prelude::dijkstra;

use crate::domain::graph::rail_graph::RailGraph;
use crate::domain::utils::id::{EdgeId, NodeId};

/// Represents a route through the network as the visited nodes and the traversed edges.
///
/// `edges[i]` connects `nodes[i]` and `nodes[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,
    pub total_length_blocks: i64,
}

impl Path {
    pub fn trivial(node: NodeId) -> Self {
        Self { nodes: vec![node], edges: Vec::new(), total_length_blocks: 0 }
    }

    pub fn contains_edge(&self, edge_id: &EdgeId) -> bool {
        self.edges.contains(edge_id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathOptions {
    /// Diagnostic mode: traverse edges even if they are currently blocked.
    pub allow_blocked: bool,
}

impl PathOptions {
    pub fn ignore_blocks() -> Self {
        Self { allow_blocked: true }
    }
}

/// Shortest path between `from` and `to` weighted by edge length in blocks.
///
/// Blocked edges are skipped unless `options.allow_blocked` is set, one-way edges are only
/// followed from `endpoint_a`. Successors are expanded in ascending `EdgeId` order, so the
/// result is deterministic for a given graph when several paths share the minimal length.
///
/// # Returns
/// Returns the trivial path when `from == to` (without searching), otherwise `None` if
/// either endpoint is unknown or `to` is unreachable.
pub fn shortest_path(graph: &RailGraph, from: &NodeId, to: &NodeId, options: PathOptions) -> Option<Path> {
    if from == to {
        return Some(Path::trivial(from.clone()));
    }

    if !graph.contains_node(from) || !graph.contains_node(to) {
        log::debug!("NoPathFound: Unknown endpoint {} -> {}", from, to);
        return None;
    }

    let successors = |node: &NodeId| -> Vec<(NodeId, i64)> {
        graph
            .neighbors(node)
            .filter(|edge_id| options.allow_blocked || !graph.is_blocked(edge_id))
            .filter_map(|edge_id| graph.edge(edge_id))
            .filter(|edge| edge.can_depart_from(node))
            .filter_map(|edge| edge.opposite(node).map(|next| (next.clone(), edge.length_blocks)))
            .collect()
    };

    let Some((nodes, total_length_blocks)) = dijkstra(from, successors, |node| node == to) else {
        log::debug!("NoPathFound: {} -> {}", from, to);
        return None;
    };

    let edges: Vec<EdgeId> = nodes.windows(2).map(|pair| EdgeId::new(pair[0].clone(), pair[1].clone())).collect();

    log::debug!("PathFound: {} -> {} over {} edges, {} blocks", from, to, edges.len(), total_length_blocks);

    Some(Path { nodes, edges, total_length_blocks })
}
