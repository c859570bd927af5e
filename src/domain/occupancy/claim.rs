use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::occupancy::signal::SignalAspect;
use crate::domain::utils::id::{EdgeId, NodeId, TrainId, WorldId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    Node,
    Edge,
    Conflict,
}

/// Something a train can hold exclusively: a node, an edge or a named conflict group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OccupancyResource {
    pub resource_type: ResourceType,
    pub resource_id: String,
}

impl OccupancyResource {
    pub fn node(id: &NodeId) -> Self {
        Self { resource_type: ResourceType::Node, resource_id: id.to_string() }
    }

    pub fn edge(id: &EdgeId) -> Self {
        Self { resource_type: ResourceType::Edge, resource_id: id.to_string() }
    }

    pub fn conflict(group: impl Into<String>) -> Self {
        Self { resource_type: ResourceType::Conflict, resource_id: group.into() }
    }
}

impl fmt::Display for OccupancyResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{}", self.resource_type, self.resource_id)
    }
}

/// Exclusive hold of one resource by one train.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyClaim {
    pub train_id: TrainId,
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub world_id: WorldId,
    pub claimed_at: DateTime<Utc>,
    pub signal: SignalAspect,
}

impl OccupancyClaim {
    pub fn resource(&self) -> OccupancyResource {
        OccupancyResource { resource_type: self.resource_type, resource_id: self.resource_id.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub train_id: TrainId,
    pub requested_at: DateTime<Utc>,
    /// 1-based rank, `1` receives the resource next.
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueueSnapshot {
    pub world_id: WorldId,
    pub resource: OccupancyResource,
    pub holder: Option<TrainId>,
    pub entries: Vec<QueueEntry>,
}

impl QueueSnapshot {
    pub fn position_of(&self, train: &TrainId) -> Option<usize> {
        self.entries.iter().find(|entry| &entry.train_id == train).map(|entry| entry.position)
    }
}

/// Result of a claim request. Losing a race is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Granted(OccupancyClaim),
    /// The requester already holds the resource.
    AlreadyHeld(OccupancyClaim),
    Queued { position: usize, holder: TrainId },
}

impl ClaimOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, ClaimOutcome::Granted(_) | ClaimOutcome::AlreadyHeld(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReleaseOutcome {
    /// The claim was dropped, `handed_to` is the queue head that received the resource.
    Released { claim: OccupancyClaim, handed_to: Option<OccupancyClaim> },
    /// The train was only waiting, its queue entry was cancelled.
    Dequeued,
    NotHeld,
}
