use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use union_find::{QuickUnionUf, UnionBySize, UnionFind};

use crate::domain::graph::edge::RailEdge;
use crate::domain::graph::edge_override::{EdgeOverride, EffectiveEdgeState};
use crate::domain::graph::node::RailNode;
use crate::domain::utils::id::{EdgeId, NodeId};

/// Immutable snapshot of one world's track network.
///
/// A `RailGraph` is built once from a full node/edge set and never edited afterwards. Any
/// change (rebuild, override, TTL expiry) produces a new instance that is published
/// wholesale, so readers holding an `Arc<RailGraph>` never observe a half-updated network.
///
/// Besides the raw records, a snapshot carries the views derived at build time:
/// * **Adjacency**: node -> incident edges, ordered for deterministic traversal.
/// * **Effective state**: per-edge speed limit and blocked flag after the override overlay.
/// * **Components**: connectivity over non-blocked edges, keyed by the smallest member id.
#[derive(Debug, Clone)]
pub struct RailGraph {
    nodes: HashMap<NodeId, RailNode>,

    edges: HashMap<EdgeId, RailEdge>,

    /// Maps a node to every edge touching it, regardless of direction.
    adjacency: HashMap<NodeId, BTreeSet<EdgeId>>,

    /// Edges whose effective state was blocked when the snapshot was built.
    blocked_edges: HashSet<EdgeId>,

    effective: HashMap<EdgeId, EffectiveEdgeState>,

    /// Node -> key (smallest node id) of its component.
    component_keys: HashMap<NodeId, NodeId>,
}

impl RailGraph {
    /// Bulk-builds a graph snapshot.
    ///
    /// Edges referencing a node that is not part of `nodes` are dropped and logged, so the
    /// resulting snapshot always satisfies the endpoint invariant.
    pub fn build(nodes: Vec<RailNode>, edges: Vec<RailEdge>, now: DateTime<Utc>) -> Self {
        let nodes: HashMap<NodeId, RailNode> = nodes.into_iter().map(|node| (node.id.clone(), node)).collect();

        let mut edge_map: HashMap<EdgeId, RailEdge> = HashMap::with_capacity(edges.len());
        for edge in edges {
            if !nodes.contains_key(&edge.endpoint_a) || !nodes.contains_key(&edge.endpoint_b) {
                log::error!("InvalidRailGraphConfiguration: Edge {} references an unknown node and was dropped.", edge.id);
                continue;
            }

            if edge_map.insert(edge.id.clone(), edge).is_some() {
                log::warn!("DuplicateEdge: A later record replaced an earlier edge with the same endpoints.");
            }
        }

        let adjacency = Self::setup_adjacency(&edge_map);
        let effective: HashMap<EdgeId, EffectiveEdgeState> = edge_map.iter().map(|(id, edge)| (id.clone(), edge.effective_state(now))).collect();
        let blocked_edges: HashSet<EdgeId> = effective.iter().filter(|(_, state)| state.blocked).map(|(id, _)| id.clone()).collect();
        let component_keys = Self::setup_components(&nodes, &edge_map, &blocked_edges);

        RailGraph { nodes, edges: edge_map, adjacency, blocked_edges, effective, component_keys }
    }

    fn setup_adjacency(edges: &HashMap<EdgeId, RailEdge>) -> HashMap<NodeId, BTreeSet<EdgeId>> {
        let mut adjacency: HashMap<NodeId, BTreeSet<EdgeId>> = HashMap::new();

        for (edge_id, edge) in edges {
            adjacency.entry(edge.endpoint_a.clone()).or_default().insert(edge_id.clone());
            adjacency.entry(edge.endpoint_b.clone()).or_default().insert(edge_id.clone());
        }

        adjacency
    }

    /// Groups nodes connected through non-blocked edges using a disjoint set union.
    fn setup_components(
        nodes: &HashMap<NodeId, RailNode>,
        edges: &HashMap<EdgeId, RailEdge>,
        blocked_edges: &HashSet<EdgeId>,
    ) -> HashMap<NodeId, NodeId> {
        let mut node_ids: Vec<&NodeId> = nodes.keys().collect();
        node_ids.sort();

        let node_id_to_index: HashMap<&NodeId, usize> = node_ids.iter().enumerate().map(|(index, id)| (*id, index)).collect();

        let mut dsu = QuickUnionUf::<UnionBySize>::new(node_ids.len());

        for (edge_id, edge) in edges {
            if blocked_edges.contains(edge_id) {
                continue;
            }

            if let (Some(&a), Some(&b)) = (node_id_to_index.get(&edge.endpoint_a), node_id_to_index.get(&edge.endpoint_b)) {
                dsu.union(a, b);
            }
        }

        // node_ids is sorted, so the first member seen per representative is the smallest.
        let mut smallest_by_rep: HashMap<usize, NodeId> = HashMap::new();
        for (index, id) in node_ids.iter().enumerate() {
            smallest_by_rep.entry(dsu.find(index)).or_insert_with(|| (*id).clone());
        }

        let mut component_keys = HashMap::with_capacity(node_ids.len());
        for (index, id) in node_ids.iter().enumerate() {
            if let Some(key) = smallest_by_rep.get(&dsu.find(index)) {
                component_keys.insert((*id).clone(), key.clone());
            }
        }

        component_keys
    }

    //---------------------
    // --- Lookups ---
    //---------------------

    pub fn node(&self, id: &NodeId) -> Option<&RailNode> {
        self.nodes.get(id)
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&RailEdge> {
        self.edges.get(id)
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Edges incident to `id` in ascending `EdgeId` order. Empty for unknown nodes.
    pub fn neighbors(&self, id: &NodeId) -> impl Iterator<Item = &EdgeId> + '_ {
        self.adjacency.get(id).into_iter().flatten()
    }

    pub fn is_blocked(&self, edge_id: &EdgeId) -> bool {
        self.blocked_edges.contains(edge_id)
    }

    pub fn blocked_edges(&self) -> &HashSet<EdgeId> {
        &self.blocked_edges
    }

    /// Effective speed limit / blocked flag of an edge, `None` for unknown edges.
    pub fn effective_state(&self, edge_id: &EdgeId) -> Option<EffectiveEdgeState> {
        self.effective.get(edge_id).copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    //---------------------
    // --- Components ---
    //---------------------

    /// Key of the component containing `id`: the lexicographically smallest node id in it.
    pub fn component_key(&self, id: &NodeId) -> Option<&NodeId> {
        self.component_keys.get(id)
    }

    /// All components, keyed by component key, members sorted.
    pub fn components(&self) -> HashMap<NodeId, Vec<NodeId>> {
        let mut components: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for (node, key) in &self.component_keys {
            components.entry(key.clone()).or_default().push(node.clone());
        }
        for members in components.values_mut() {
            members.sort();
        }
        components
    }

    //---------------------
    // --- Derivation ---
    //---------------------

    /// New snapshot with `edge_override` attached to `edge_id`, resolved at `now`.
    ///
    /// # Returns
    /// Returns `None` if the edge is not part of this graph.
    pub fn with_edge_override(&self, edge_id: &EdgeId, edge_override: Option<EdgeOverride>, now: DateTime<Utc>) -> Option<RailGraph> {
        if !self.edges.contains_key(edge_id) {
            return None;
        }

        let edges = self
            .edges
            .values()
            .map(|edge| if &edge.id == edge_id { edge.clone().with_override(edge_override.clone()) } else { edge.clone() })
            .collect();

        Some(RailGraph::build(self.nodes.values().cloned().collect(), edges, now))
    }

    /// Re-resolves every override against `now`.
    ///
    /// # Returns
    /// Returns `Some(graph)` only if the effective state of at least one edge changed.
    pub fn reresolved(&self, now: DateTime<Utc>) -> Option<RailGraph> {
        let changed = self.edges.iter().any(|(id, edge)| self.effective.get(id) != Some(&edge.effective_state(now)));

        if !changed {
            return None;
        }

        Some(RailGraph::build(self.nodes.values().cloned().collect(), self.edges.values().cloned().collect(), now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::node::{NodeType, Vector3};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn node(id: &str) -> RailNode {
        RailNode::new(NodeId::new(id), NodeType::Waypoint, Vector3::default())
    }

    #[test]
    fn drops_edges_with_unknown_endpoints() {
        let graph = RailGraph::build(
            vec![node("op:a"), node("op:b")],
            vec![RailEdge::between("op:a", "op:b", 5).unwrap(), RailEdge::between("op:a", "op:x", 5).unwrap()],
            now(),
        );

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.neighbors(&NodeId::new("op:a")).count(), 1);
        assert_eq!(graph.neighbors(&NodeId::new("op:x")).count(), 0);
    }

    #[test]
    fn components_split_on_blocked_edges() {
        let blocked = RailEdge::between("op:b", "op:c", 5).unwrap().with_override(Some(EdgeOverride::manual_block()));
        let graph = RailGraph::build(
            vec![node("op:c"), node("op:b"), node("op:a"), node("op:d")],
            vec![RailEdge::between("op:a", "op:b", 5).unwrap(), blocked, RailEdge::between("op:c", "op:d", 5).unwrap()],
            now(),
        );

        assert_eq!(graph.component_key(&NodeId::new("op:b")), Some(&NodeId::new("op:a")));
        assert_eq!(graph.component_key(&NodeId::new("op:d")), Some(&NodeId::new("op:c")));
        assert_eq!(graph.components().len(), 2);
        assert!(graph.is_blocked(&EdgeId::new(NodeId::new("op:c"), NodeId::new("op:b"))));
    }

    #[test]
    fn with_edge_override_leaves_original_untouched() {
        let graph = RailGraph::build(vec![node("op:a"), node("op:b")], vec![RailEdge::between("op:a", "op:b", 5).unwrap()], now());
        let edge_id = EdgeId::new(NodeId::new("op:a"), NodeId::new("op:b"));

        let blocked = graph.with_edge_override(&edge_id, Some(EdgeOverride::manual_block()), now()).unwrap();

        assert!(blocked.is_blocked(&edge_id));
        assert!(!graph.is_blocked(&edge_id));
        assert!(graph.with_edge_override(&EdgeId::new(NodeId::new("op:a"), NodeId::new("op:z")), None, now()).is_none());
    }
}
