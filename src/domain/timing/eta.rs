use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::{self, Display};
use std::sync::Arc;

use crate::domain::clock::clock::SharedClock;
use crate::domain::config::DispatchConfig;
use crate::domain::graph::graph_service::RailGraphService;
use crate::domain::graph::path_finder::{Path, PathOptions, shortest_path};
use crate::domain::graph::rail_graph::RailGraph;
use crate::domain::occupancy::claim::{OccupancyResource, ResourceType};
use crate::domain::occupancy::registry::OccupancyRegistry;
use crate::domain::runtime::train_snapshot::{TrainRuntimeSnapshot, TrainRuntimeStore};
use crate::domain::timing::eta_cache::EtaCache;
use crate::domain::timing::travel_time::{RouteSegment, route_time_secs};
use crate::domain::utils::id::{NodeId, TrainId, WorldId};
use crate::logger::ANALYTICS_TARGET;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EtaReason {
    NoVehicle,
    NoRoute,
    NoTarget,
    NoPath,
    Throat,
    #[serde(rename = "SINGLELINE")]
    SingleLine,
    Platform,
    DepotGate,
    Wait,
}

impl EtaReason {
    /// Delay reason for waiting on `resource`.
    ///
    /// Conflict groups are classified by their id prefix, everything else is a plain wait.
    pub fn for_resource(resource: &OccupancyResource) -> Self {
        if resource.resource_type != ResourceType::Conflict {
            return EtaReason::Wait;
        }

        let id = resource.resource_id.as_str();
        if id.starts_with("throat:") {
            EtaReason::Throat
        } else if id.starts_with("single:") {
            EtaReason::SingleLine
        } else if id.starts_with("platform:") {
            EtaReason::Platform
        } else if id.starts_with("depot:") {
            EtaReason::DepotGate
        } else {
            EtaReason::Wait
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EtaConfidence {
    Low,
    Med,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EtaResult {
    pub eta_seconds: Option<i64>,
    pub reasons: Vec<EtaReason>,
    pub confidence: EtaConfidence,
    pub computed_at: DateTime<Utc>,
}

impl EtaResult {
    fn unavailable(reason: EtaReason, computed_at: DateTime<Utc>) -> Self {
        Self { eta_seconds: None, reasons: vec![reason], confidence: EtaConfidence::Low, computed_at }
    }
}

/// Cache key of one estimate, rendered as `"<world>|<train>|<target>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EtaKey {
    pub world: WorldId,
    pub train: TrainId,
    pub target: NodeId,
}

impl EtaKey {
    /// Prefix shared by every key of `world`.
    pub fn world_prefix(world: WorldId) -> String {
        format!("{}|", world)
    }
}

impl Display for EtaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.world, self.train, self.target)
    }
}

pub type SharedEtaCache = Arc<EtaCache<EtaKey, EtaResult>>;

/// Combines the published graph, train runtime state and occupancy queues into arrival estimates.
#[derive(Debug)]
pub struct EtaService {
    config: Arc<DispatchConfig>,
    graphs: Arc<RailGraphService>,
    occupancy: Arc<OccupancyRegistry>,
    runtime: Arc<TrainRuntimeStore>,
    cache: SharedEtaCache,
    clock: SharedClock,
}

impl EtaService {
    pub fn new(
        config: Arc<DispatchConfig>,
        graphs: Arc<RailGraphService>,
        occupancy: Arc<OccupancyRegistry>,
        runtime: Arc<TrainRuntimeStore>,
        cache: SharedEtaCache,
        clock: SharedClock,
    ) -> Self {
        Self { config, graphs, occupancy, runtime, cache, clock }
    }

    pub fn cache(&self) -> &SharedEtaCache {
        &self.cache
    }

    /// Cached estimate for `train` reaching `target`, recomputed once the entry expired.
    pub fn estimate(&self, world: WorldId, train: &TrainId, target: &NodeId) -> EtaResult {
        let now = self.clock.now();
        let key = EtaKey { world, train: train.clone(), target: target.clone() };

        if let Some(cached) = self.cache.get_if_fresh(&key, now) {
            return cached;
        }

        let result = self.compute(world, train, target, now);
        self.cache.put(key, result.clone(), now);
        result
    }

    /// Uncached estimate as of `now`.
    pub fn compute(&self, world: WorldId, train: &TrainId, target: &NodeId, now: DateTime<Utc>) -> EtaResult {
        let Some(snapshot) = self.runtime.get(train).filter(|s| s.world_id == world) else {
            return EtaResult::unavailable(EtaReason::NoVehicle, now);
        };
        if snapshot.route_id.is_none() {
            return EtaResult::unavailable(EtaReason::NoRoute, now);
        }

        let Some(graph) = self.graphs.graph(world).filter(|g| g.contains_node(target)) else {
            return EtaResult::unavailable(EtaReason::NoTarget, now);
        };

        let Some(path) = snapshot.position_node().and_then(|position| shortest_path(&graph, position, target, PathOptions::default())) else {
            return EtaResult::unavailable(EtaReason::NoPath, now);
        };

        let (segments, used_fallback) = self.route_segments(&graph, &path);
        let motion = self.config.motion_for(snapshot.train_type.as_deref());
        let start_speed = if snapshot.speed_bps.is_finite() { snapshot.speed_bps.max(0.0) } else { 0.0 };

        let running_secs = match route_time_secs(&segments, start_speed, 0.0, &motion) {
            Ok(secs) => secs,
            Err(e) => {
                log::warn!("EtaFailed: Running time of {} to {} could not be computed: {}", train, target, e);
                return EtaResult::unavailable(EtaReason::NoPath, now);
            }
        };

        let (mut reasons, wait_secs) = self.wait_delay(world, train, &path);
        let dwell_secs = snapshot.dwell_remaining_sec.unwrap_or(0) as f64;

        let total = (running_secs + dwell_secs + wait_secs as f64).ceil() as i64;

        reasons.sort();
        reasons.dedup();

        let confidence = self.confidence(world, &snapshot, &reasons, used_fallback);

        tracing::info!(target: ANALYTICS_TARGET, World = %world, Train = %train, Target = %target, Eta = total, Confidence = ?confidence, "ETA computed");

        EtaResult { eta_seconds: Some(total), reasons, confidence, computed_at: now }
    }

    /// Cruise targets per traversed edge.
    ///
    /// # Returns
    /// Returns the segments and whether any edge had to fall back to the default speed.
    fn route_segments(&self, graph: &RailGraph, path: &Path) -> (Vec<RouteSegment>, bool) {
        let mut used_fallback = false;

        let segments = path
            .edges
            .iter()
            .filter_map(|edge_id| {
                let edge = graph.edge(edge_id)?;
                let limit = graph.effective_state(edge_id).map(|state| state.speed_limit_bps).unwrap_or(0.0);

                let mut target = if limit.is_finite() && limit > 0.0 {
                    limit
                } else {
                    used_fallback = true;
                    self.config.fallback_speed_bps
                };

                if let Some(cap) = graph.component_key(&edge.endpoint_a).and_then(|key| self.config.caution_speed(key)) {
                    target = target.min(cap);
                }

                Some(RouteSegment { length_blocks: edge.length_blocks as f64, target_speed_bps: target })
            })
            .collect();

        (segments, used_fallback)
    }

    /// Queue positions of `train` plus path resources currently held by other trains.
    fn wait_delay(&self, world: WorldId, train: &TrainId, path: &Path) -> (Vec<EtaReason>, i64) {
        let penalty = self.config.wait_penalty_sec_per_position;
        let mut reasons = Vec::new();
        let mut secs = 0;

        for (resource, position) in self.occupancy.waiting_for(world, train) {
            reasons.push(EtaReason::for_resource(&resource));
            secs += position as i64 * penalty;
        }

        let path_resources = path
            .edges
            .iter()
            .map(OccupancyResource::edge)
            .chain(path.nodes.iter().skip(1).map(OccupancyResource::node));

        for resource in path_resources {
            let held_by_other = self.occupancy.claim(world, &resource.resource_id).is_some_and(|claim| &claim.train_id != train);
            if held_by_other {
                reasons.push(EtaReason::Wait);
                secs += penalty;
            }
        }

        (reasons, secs)
    }

    fn confidence(&self, world: WorldId, snapshot: &TrainRuntimeSnapshot, reasons: &[EtaReason], used_fallback: bool) -> EtaConfidence {
        let stopped = snapshot.signal_aspect.is_some_and(|aspect| !aspect.allows_movement());

        if !reasons.is_empty() || stopped {
            EtaConfidence::Low
        } else if used_fallback || self.graphs.is_stale(world) {
            EtaConfidence::Med
        } else {
            EtaConfidence::High
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_groups_map_to_their_reason() {
        assert_eq!(EtaReason::for_resource(&OccupancyResource::conflict("throat:north")), EtaReason::Throat);
        assert_eq!(EtaReason::for_resource(&OccupancyResource::conflict("single:ridge")), EtaReason::SingleLine);
        assert_eq!(EtaReason::for_resource(&OccupancyResource::conflict("platform:central-2")), EtaReason::Platform);
        assert_eq!(EtaReason::for_resource(&OccupancyResource::conflict("depot:yard")), EtaReason::DepotGate);
        assert_eq!(EtaReason::for_resource(&OccupancyResource::conflict("crossing:7")), EtaReason::Wait);
        assert_eq!(EtaReason::for_resource(&OccupancyResource::node(&NodeId::from("throat:a"))), EtaReason::Wait);
    }

    #[test]
    fn reasons_serialize_with_wire_names() {
        let json = serde_json::to_string(&[EtaReason::NoVehicle, EtaReason::SingleLine, EtaReason::DepotGate]).unwrap();
        assert_eq!(json, r#"["NO_VEHICLE","SINGLELINE","DEPOT_GATE"]"#);
        assert_eq!(serde_json::to_string(&EtaConfidence::Med).unwrap(), r#""MED""#);
    }

    #[test]
    fn key_renders_with_world_prefix() {
        let world = WorldId::nil();
        let key = EtaKey { world, train: TrainId::from("t1"), target: NodeId::from("a") };

        assert!(key.to_string().starts_with(&EtaKey::world_prefix(world)));
        assert_eq!(key.to_string(), format!("{}|t1|a", world));
    }
}
