use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::graph::edge::RailEdge;
use crate::domain::graph::edge_override::EdgeOverride;
use crate::domain::graph::node::RailNode;
use crate::domain::utils::id::{EdgeId, NodeId, WorldId};
use crate::error::Error;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDto {
    pub from: String,
    pub to: String,
    pub length_blocks: i64,
    #[serde(default)]
    pub speed_limit_bps: f64,
    #[serde(default = "default_bidirectional")]
    pub bidirectional: bool,
}

fn default_bidirectional() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeOverrideDto {
    pub from: String,
    pub to: String,
    pub speed_limit_bps: Option<f64>,
    pub temp_speed_limit_bps: Option<f64>,
    pub temp_speed_limit_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub blocked_manual: bool,
    pub blocked_until: Option<DateTime<Utc>>,
}

/// Topology file read by the diagnostic binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyDto {
    pub world_id: Option<WorldId>,
    pub nodes: Vec<RailNode>,
    #[serde(default)]
    pub edges: Vec<EdgeDto>,
    #[serde(default)]
    pub overrides: Vec<EdgeOverrideDto>,
}

impl TryFrom<EdgeDto> for RailEdge {
    type Error = Error;

    fn try_from(dto: EdgeDto) -> Result<Self, Self::Error> {
        RailEdge::new(NodeId::new(dto.from), NodeId::new(dto.to), dto.length_blocks, dto.speed_limit_bps, dto.bidirectional)
    }
}

impl EdgeOverrideDto {
    pub fn edge_id(&self) -> EdgeId {
        EdgeId::new(NodeId::new(self.from.as_str()), NodeId::new(self.to.as_str()))
    }
}

impl TryFrom<EdgeOverrideDto> for EdgeOverride {
    type Error = Error;

    fn try_from(dto: EdgeOverrideDto) -> Result<Self, Self::Error> {
        EdgeOverride::new(dto.speed_limit_bps, dto.temp_speed_limit_bps, dto.temp_speed_limit_until, dto.blocked_manual, dto.blocked_until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::node::NodeType;
    use crate::loader::parser::parse_json_str;

    const TOPOLOGY: &str = r#"{
        "nodes": [
            { "id": "op:a", "type": "STATION", "worldPosition": { "x": 0.0, "y": 64.0, "z": 0.0 } },
            { "id": "op:b", "type": "WAYPOINT", "worldPosition": { "x": 100.0, "y": 64.0, "z": 0.0 } }
        ],
        "edges": [ { "from": "op:a", "to": "op:b", "lengthBlocks": 100, "speedLimitBps": 8.0 } ],
        "overrides": [ { "from": "op:b", "to": "op:a", "blockedManual": true } ]
    }"#;

    #[test]
    fn parses_topology_file() {
        let dto: TopologyDto = parse_json_str(TOPOLOGY).unwrap();

        assert!(dto.world_id.is_none());
        assert_eq!(dto.nodes[0].node_type, NodeType::Station);
        assert_eq!(dto.nodes[1].train_carts_destination, None);

        let edge = RailEdge::try_from(dto.edges[0].clone()).unwrap();
        assert!(edge.bidirectional);
        assert_eq!(edge.base_speed_limit_bps, 8.0);

        assert_eq!(dto.overrides[0].edge_id(), edge.id);
        let edge_override = EdgeOverride::try_from(dto.overrides[0].clone()).unwrap();
        assert!(edge_override.blocked_manual());
    }

    #[test]
    fn rejects_self_loop_edge() {
        let dto = EdgeDto { from: "a".into(), to: "a".into(), length_blocks: 5, speed_limit_bps: 0.0, bidirectional: true };
        assert!(RailEdge::try_from(dto).is_err());
    }
}
