use chrono::{DateTime, Utc};

use crate::domain::graph::edge_override::{EdgeOverride, EffectiveEdgeState, resolve_effective};
use crate::domain::utils::id::{EdgeId, NodeId};
use crate::error::{Error, Result};

/// A track segment between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct RailEdge {
    pub id: EdgeId,
    pub endpoint_a: NodeId,
    pub endpoint_b: NodeId,
    pub length_blocks: i64,
    /// `0.0` means unlimited.
    pub base_speed_limit_bps: f64,
    /// When false the edge may only be traversed from `endpoint_a` to `endpoint_b`.
    pub bidirectional: bool,
    pub manual_override: Option<EdgeOverride>,
}

impl RailEdge {
    pub fn new(endpoint_a: NodeId, endpoint_b: NodeId, length_blocks: i64, base_speed_limit_bps: f64, bidirectional: bool) -> Result<Self> {
        if endpoint_a == endpoint_b {
            return Err(Error::malformed(format!("edge endpoints must differ, got {} twice", endpoint_a)));
        }

        if length_blocks < 0 {
            return Err(Error::malformed(format!("edge {} -> {} has negative length {}", endpoint_a, endpoint_b, length_blocks)));
        }

        if !base_speed_limit_bps.is_finite() || base_speed_limit_bps < 0.0 {
            return Err(Error::malformed(format!(
                "edge {} -> {} has invalid base speed limit {}",
                endpoint_a, endpoint_b, base_speed_limit_bps
            )));
        }

        Ok(Self {
            id: EdgeId::new(endpoint_a.clone(), endpoint_b.clone()),
            endpoint_a,
            endpoint_b,
            length_blocks,
            base_speed_limit_bps,
            bidirectional,
            manual_override: None,
        })
    }

    /// Convenience constructor for a bidirectional edge without speed limit.
    pub fn between(a: impl Into<NodeId>, b: impl Into<NodeId>, length_blocks: i64) -> Result<Self> {
        Self::new(a.into(), b.into(), length_blocks, 0.0, true)
    }

    pub fn with_speed_limit(mut self, speed_limit_bps: f64) -> Result<Self> {
        if !speed_limit_bps.is_finite() || speed_limit_bps < 0.0 {
            return Err(Error::malformed(format!("edge {} has invalid base speed limit {}", self.id, speed_limit_bps)));
        }
        self.base_speed_limit_bps = speed_limit_bps;
        Ok(self)
    }

    pub fn with_override(mut self, edge_override: Option<EdgeOverride>) -> Self {
        self.manual_override = edge_override;
        self
    }

    pub fn effective_state(&self, now: DateTime<Utc>) -> EffectiveEdgeState {
        resolve_effective(self.base_speed_limit_bps, self.manual_override.as_ref(), now)
    }

    /// Whether a train standing at `from` may run along this edge.
    pub fn can_depart_from(&self, from: &NodeId) -> bool {
        if &self.endpoint_a == from {
            true
        } else {
            self.bidirectional && &self.endpoint_b == from
        }
    }

    pub fn opposite(&self, node: &NodeId) -> Option<&NodeId> {
        if &self.endpoint_a == node {
            Some(&self.endpoint_b)
        } else if &self.endpoint_b == node {
            Some(&self.endpoint_a)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative_length_and_loops() {
        assert!(RailEdge::between("op:a", "op:b", -1).is_err());
        assert!(RailEdge::between("op:a", "op:a", 5).is_err());
        assert!(RailEdge::between("op:a", "op:b", 0).is_ok());
    }

    #[test]
    fn one_way_edges_only_depart_from_endpoint_a() {
        let edge = RailEdge::new(NodeId::new("op:a"), NodeId::new("op:b"), 10, 0.0, false).unwrap();

        assert!(edge.can_depart_from(&NodeId::new("op:a")));
        assert!(!edge.can_depart_from(&NodeId::new("op:b")));
        assert_eq!(edge.id, EdgeId::new(NodeId::new("op:b"), NodeId::new("op:a")));
    }
}
