use serde::{Deserialize, Serialize};

use crate::domain::utils::id::NodeId;

/// Kind of physical marker a node was registered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Station,
    Depot,
    Waypoint,
    Switcher,
    Destination,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Station => "STATION",
            NodeType::Depot => "DEPOT",
            NodeType::Waypoint => "WAYPOINT",
            NodeType::Switcher => "SWITCHER",
            NodeType::Destination => "DESTINATION",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Extra data carried by waypoint-like markers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaypointMetadata {
    pub line_id: Option<String>,
    pub platform: Option<String>,
    pub dwell_seconds: Option<u32>,
}

/// A named point of the track network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RailNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub world_position: Vector3,
    pub train_carts_destination: Option<String>,
    pub waypoint_metadata: Option<WaypointMetadata>,
}

impl RailNode {
    pub fn new(id: NodeId, node_type: NodeType, world_position: Vector3) -> Self {
        Self { id, node_type, world_position, train_carts_destination: None, waypoint_metadata: None }
    }

    /// Canonical single-line form used for the node-set signature.
    pub fn signature_line(&self) -> String {
        let p = &self.world_position;
        format!(
            "{}|{}|{:.3}|{:.3}|{:.3}|{}",
            self.id,
            self.node_type.as_str(),
            p.x,
            p.y,
            p.z,
            self.train_carts_destination.as_deref().unwrap_or("")
        )
    }
}
