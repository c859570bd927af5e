use chrono::Duration;

use crate::domain::graph::staleness::RailGraphStaleState;
use crate::domain::occupancy::claim::{OccupancyClaim, OccupancyResource};
use crate::domain::occupancy::signal::SignalAspect;
use crate::domain::utils::id::{EdgeId, TrainId, WorldId};

#[derive(Debug, Clone, PartialEq)]
pub struct DeadlockDetectedEvent {
    pub world_id: WorldId,
    /// Trains along the wait-for cycle, starting with the train it was found through.
    pub involved_trains: Vec<TrainId>,
    /// Resource whose request or hand-off closed the cycle.
    pub conflict_resource: OccupancyResource,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeadlockResolvedEvent {
    pub world_id: WorldId,
    pub released_train: TrainId,
    pub resource: OccupancyResource,
    pub lock_duration: Duration,
}

/// Everything published on the dispatch event bus.
#[derive(Debug, Clone, PartialEq)]
pub enum RailEvent {
    ClaimGranted(OccupancyClaim),
    ClaimQueued { world_id: WorldId, train_id: TrainId, resource: OccupancyResource, position: usize },
    ClaimReleased { world_id: WorldId, train_id: TrainId, resource: OccupancyResource, held_for: Duration },
    /// Supervisor release, followed by the ordinary `ClaimReleased`.
    ForcedRelease { world_id: WorldId, train_id: TrainId, resource: OccupancyResource, reason: String },
    SignalChanged { world_id: WorldId, train_id: TrainId, resource: OccupancyResource, previous: SignalAspect, current: SignalAspect },
    DeadlockDetected(DeadlockDetectedEvent),
    DeadlockResolved(DeadlockResolvedEvent),
    GraphRebuilt { world_id: WorldId, node_count: usize, edge_count: usize },
    GraphStale(RailGraphStaleState),
    GraphReloaded { world_id: WorldId },
    EdgeOverrideChanged { world_id: WorldId, edge_id: EdgeId },
}

/// Discriminant of [`RailEvent`], used for typed subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ClaimGranted,
    ClaimQueued,
    ClaimReleased,
    ForcedRelease,
    SignalChanged,
    DeadlockDetected,
    DeadlockResolved,
    GraphRebuilt,
    GraphStale,
    GraphReloaded,
    EdgeOverrideChanged,
}

impl RailEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            RailEvent::ClaimGranted(_) => EventKind::ClaimGranted,
            RailEvent::ClaimQueued { .. } => EventKind::ClaimQueued,
            RailEvent::ClaimReleased { .. } => EventKind::ClaimReleased,
            RailEvent::ForcedRelease { .. } => EventKind::ForcedRelease,
            RailEvent::SignalChanged { .. } => EventKind::SignalChanged,
            RailEvent::DeadlockDetected(_) => EventKind::DeadlockDetected,
            RailEvent::DeadlockResolved(_) => EventKind::DeadlockResolved,
            RailEvent::GraphRebuilt { .. } => EventKind::GraphRebuilt,
            RailEvent::GraphStale(_) => EventKind::GraphStale,
            RailEvent::GraphReloaded { .. } => EventKind::GraphReloaded,
            RailEvent::EdgeOverrideChanged { .. } => EventKind::EdgeOverrideChanged,
        }
    }

    pub fn world_id(&self) -> WorldId {
        match self {
            RailEvent::ClaimGranted(claim) => claim.world_id,
            RailEvent::ClaimQueued { world_id, .. }
            | RailEvent::ClaimReleased { world_id, .. }
            | RailEvent::ForcedRelease { world_id, .. }
            | RailEvent::SignalChanged { world_id, .. }
            | RailEvent::GraphRebuilt { world_id, .. }
            | RailEvent::GraphReloaded { world_id }
            | RailEvent::EdgeOverrideChanged { world_id, .. } => *world_id,
            RailEvent::DeadlockDetected(event) => event.world_id,
            RailEvent::DeadlockResolved(event) => event.world_id,
            RailEvent::GraphStale(state) => state.world_id,
        }
    }
}
