use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use xxhash_rust::xxh3::xxh3_128;

use crate::domain::graph::node::RailNode;
use crate::domain::graph::repository::RailGraphSnapshotMeta;
use crate::domain::utils::id::WorldId;

/// Order-independent digest over a node set.
///
/// Every node is rendered to its canonical line, the lines are sorted and hashed as one
/// document, so two listings of the same nodes in a different order yield the same value.
pub fn node_signature<'a>(nodes: impl IntoIterator<Item = &'a RailNode>) -> String {
    let mut lines: Vec<String> = nodes.into_iter().map(RailNode::signature_line).collect();
    lines.sort_unstable();

    let document = lines.join("\n");
    format!("{:032x}", xxh3_128(document.as_bytes()))
}

/// Recorded while the in-memory graph of a world no longer matches the persisted node set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RailGraphStaleState {
    pub world_id: WorldId,
    pub built_at: DateTime<Utc>,
    pub old_signature: String,
    pub new_signature: String,
    pub old_node_count: usize,
    pub old_edge_count: usize,
    pub new_node_count: usize,
}

/// Result of comparing the current node set against the last build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StalenessCheck {
    /// No snapshot has been recorded for this world yet.
    Untracked,
    Fresh,
    BecameStale(RailGraphStaleState),
    StillStale(RailGraphStaleState),
    /// The node set matches the recorded signature again after having diverged, the graph
    /// must be reloaded from the persisted snapshot. Reported until that reload succeeds.
    Reconverged,
}

#[derive(Debug, Default)]
pub struct StalenessTracker {
    stale: RwLock<HashMap<WorldId, RailGraphStaleState>>,
}

impl StalenessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, recorded: Option<&RailGraphSnapshotMeta>, current_nodes: &[RailNode]) -> StalenessCheck {
        let Some(recorded) = recorded else {
            return StalenessCheck::Untracked;
        };

        let current_signature = node_signature(current_nodes);
        let mut guard = self.stale.write().unwrap_or_else(PoisonError::into_inner);

        // The stale record stays until a rebuild succeeds and calls `clear`.
        if current_signature == recorded.node_signature {
            return if guard.contains_key(&recorded.world_id) {
                log::info!("RailGraphReconverged: World {} matches its recorded signature again.", recorded.world_id);
                StalenessCheck::Reconverged
            } else {
                StalenessCheck::Fresh
            };
        }

        match guard.get_mut(&recorded.world_id) {
            Some(state) => {
                state.new_signature = current_signature;
                state.new_node_count = current_nodes.len();
                StalenessCheck::StillStale(state.clone())
            }
            None => {
                let state = RailGraphStaleState {
                    world_id: recorded.world_id,
                    built_at: recorded.built_at,
                    old_signature: recorded.node_signature.clone(),
                    new_signature: current_signature,
                    old_node_count: recorded.node_count,
                    old_edge_count: recorded.edge_count,
                    new_node_count: current_nodes.len(),
                };
                log::warn!(
                    "RailGraphStale: World {} changed since build at {} ({} -> {} nodes).",
                    recorded.world_id,
                    recorded.built_at,
                    state.old_node_count,
                    state.new_node_count
                );
                guard.insert(recorded.world_id, state.clone());
                StalenessCheck::BecameStale(state)
            }
        }
    }

    pub fn stale_state(&self, world: WorldId) -> Option<RailGraphStaleState> {
        self.stale.read().unwrap_or_else(PoisonError::into_inner).get(&world).cloned()
    }

    pub fn is_stale(&self, world: WorldId) -> bool {
        self.stale.read().unwrap_or_else(PoisonError::into_inner).contains_key(&world)
    }

    pub fn clear(&self, world: WorldId) {
        self.stale.write().unwrap_or_else(PoisonError::into_inner).remove(&world);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::node::{NodeType, Vector3};
    use crate::domain::utils::id::NodeId;

    fn node(id: &str, x: f64) -> RailNode {
        RailNode::new(NodeId::new(id), NodeType::Station, Vector3::new(x, 64.0, 0.0))
    }

    #[test]
    fn signature_is_order_independent() {
        let a = node("op:a", 1.0);
        let b = node("op:b", 2.0);

        assert_eq!(node_signature([&a, &b]), node_signature([&b, &a]));
        assert_ne!(node_signature([&a]), node_signature([&a, &b]));
    }

    #[test]
    fn signature_reflects_node_position() {
        assert_ne!(node_signature([&node("op:a", 1.0)]), node_signature([&node("op:a", 2.0)]));
    }
}
