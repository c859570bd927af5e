use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::domain::occupancy::signal::SignalAspect;
use crate::domain::utils::id::{NodeId, RouteId, TicketId, TrainId, WorldId};

/// Per-train state sampled by the control loop every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainRuntimeSnapshot {
    pub train_id: TrainId,
    pub tick: u64,
    pub updated_at: DateTime<Utc>,
    pub world_id: WorldId,
    pub route_id: Option<RouteId>,
    /// Index into the route's stop list the train is heading for.
    pub route_index: usize,
    pub current_node_id: Option<NodeId>,
    pub last_passed_node_id: Option<NodeId>,
    pub dwell_remaining_sec: Option<u32>,
    pub signal_aspect: Option<SignalAspect>,
    pub ticket_id: Option<TicketId>,
    /// Train type tag used to look up motion parameters.
    pub train_type: Option<String>,
    pub speed_bps: f64,
}

impl TrainRuntimeSnapshot {
    pub fn new(train_id: TrainId, world_id: WorldId, tick: u64, updated_at: DateTime<Utc>) -> Self {
        Self {
            train_id,
            tick,
            updated_at,
            world_id,
            route_id: None,
            route_index: 0,
            current_node_id: None,
            last_passed_node_id: None,
            dwell_remaining_sec: None,
            signal_aspect: None,
            ticket_id: None,
            train_type: None,
            speed_bps: 0.0,
        }
    }

    /// Node the train is at, or the last one it passed.
    pub fn position_node(&self) -> Option<&NodeId> {
        self.current_node_id.as_ref().or(self.last_passed_node_id.as_ref())
    }
}

/// Live runtime snapshots, one per dispatched train.
#[derive(Debug, Default)]
pub struct TrainRuntimeStore {
    snapshots: RwLock<HashMap<TrainId, TrainRuntimeSnapshot>>,
}

impl TrainRuntimeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the train's previous sample. Samples older than the stored tick are ignored.
    ///
    /// # Returns
    /// Returns `false` if the sample was ignored.
    pub fn record(&self, snapshot: TrainRuntimeSnapshot) -> bool {
        let mut guard = self.snapshots.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = guard.get(&snapshot.train_id) {
            if existing.tick > snapshot.tick {
                log::debug!("OutdatedSample: Ignoring tick {} for {}, already at {}.", snapshot.tick, snapshot.train_id, existing.tick);
                return false;
            }
        }

        guard.insert(snapshot.train_id.clone(), snapshot);
        true
    }

    pub fn get(&self, train: &TrainId) -> Option<TrainRuntimeSnapshot> {
        self.snapshots.read().unwrap_or_else(PoisonError::into_inner).get(train).cloned()
    }

    pub fn remove(&self, train: &TrainId) -> Option<TrainRuntimeSnapshot> {
        self.snapshots.write().unwrap_or_else(PoisonError::into_inner).remove(train)
    }

    /// Snapshots of all trains in `world`, ordered by train id.
    pub fn list(&self, world: WorldId) -> Vec<TrainRuntimeSnapshot> {
        let guard = self.snapshots.read().unwrap_or_else(PoisonError::into_inner);
        let mut snapshots: Vec<TrainRuntimeSnapshot> = guard.values().filter(|s| s.world_id == world).cloned().collect();
        snapshots.sort_by(|a, b| a.train_id.cmp(&b.train_id));
        snapshots
    }

    pub fn len(&self) -> usize {
        self.snapshots.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
