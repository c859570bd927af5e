use std::path::Path as FsPath;
use std::sync::Arc;

use crate::api::topology_dto::TopologyDto;
use crate::domain::clock::clock::SharedClock;
use crate::domain::config::DispatchConfig;
use crate::domain::graph::edge::RailEdge;
use crate::domain::graph::edge_override::EdgeOverride;
use crate::domain::graph::graph_service::RailGraphService;
use crate::domain::graph::path_finder::{Path, PathOptions};
use crate::domain::graph::rail_graph::RailGraph;
use crate::domain::graph::repository::{InMemoryRailGraphRepository, RailGraphRepository};
use crate::domain::occupancy::event_bus::{EventBus, Subscription};
use crate::domain::occupancy::claim::OccupancyResource;
use crate::domain::occupancy::events::{EventKind, RailEvent};
use crate::domain::occupancy::registry::OccupancyRegistry;
use crate::domain::occupancy::signal::{SignalAspect, SignalInputs};
use crate::domain::runtime::train_snapshot::{TrainRuntimeSnapshot, TrainRuntimeStore};
use crate::domain::timing::eta::{EtaKey, EtaResult, EtaService, SharedEtaCache};
use crate::domain::timing::eta_cache::EtaCache;
use crate::domain::utils::id::{EdgeId, NodeId, TrainId, WorldId};
use crate::error::Result;
use crate::loader::parser::parse_json_file;

/// Wires the dispatch core together for one host process.
///
/// All collaborators share one clock and one event bus. Cached ETAs of a world are dropped
/// whenever its graph is republished because of a rebuild, a reload or an override change,
/// and when it turns stale, since staleness lowers the confidence of an estimate.
/// Dropping the dispatcher removes its cache subscriptions from the bus.
#[derive(Debug)]
pub struct RailDispatcher {
    config: Arc<DispatchConfig>,
    clock: SharedClock,
    repository: Arc<dyn RailGraphRepository>,
    events: Arc<EventBus>,
    graphs: Arc<RailGraphService>,
    occupancy: Arc<OccupancyRegistry>,
    runtime: Arc<TrainRuntimeStore>,
    eta: EtaService,
    cache_invalidation: Vec<Subscription>,
}

impl RailDispatcher {
    pub fn new(config: DispatchConfig, repository: Arc<dyn RailGraphRepository>, clock: SharedClock) -> Self {
        let config = Arc::new(config);
        let events = Arc::new(EventBus::new());
        let graphs = Arc::new(RailGraphService::new(repository.clone(), clock.clone(), events.clone()));
        let occupancy = Arc::new(OccupancyRegistry::new(events.clone(), clock.clone()));
        let runtime = Arc::new(TrainRuntimeStore::new());
        let cache: SharedEtaCache = Arc::new(EtaCache::new(config.eta_cache_ttl));

        let cache_invalidation = [EventKind::EdgeOverrideChanged, EventKind::GraphRebuilt, EventKind::GraphReloaded, EventKind::GraphStale]
            .into_iter()
            .map(|kind| {
                let cache = cache.clone();
                events.subscribe(kind, move |event: &RailEvent| {
                    let removed = cache.invalidate_by_prefix(&EtaKey::world_prefix(event.world_id()));
                    if removed > 0 {
                        log::debug!("EtaCacheInvalidated: {} entries dropped after {:?}.", removed, event.kind());
                    }
                    Ok(())
                })
            })
            .collect();

        let eta = EtaService::new(config.clone(), graphs.clone(), occupancy.clone(), runtime.clone(), cache, clock.clone());

        Self { config, clock, repository, events, graphs, occupancy, runtime, eta, cache_invalidation }
    }

    /// Dispatcher backed by a process-local repository.
    pub fn in_memory(config: DispatchConfig, clock: SharedClock) -> Self {
        Self::new(config, Arc::new(InMemoryRailGraphRepository::new()), clock)
    }

    //---------------------
    // --- Accessors ---
    //---------------------

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn graphs(&self) -> &Arc<RailGraphService> {
        &self.graphs
    }

    pub fn occupancy(&self) -> &Arc<OccupancyRegistry> {
        &self.occupancy
    }

    pub fn runtime(&self) -> &Arc<TrainRuntimeStore> {
        &self.runtime
    }

    pub fn eta(&self) -> &EtaService {
        &self.eta
    }

    //---------------------
    // --- Topology ---
    //---------------------

    /// Stores the topology of a file in the repository and builds the graph of `world`.
    pub fn load_topology_file(&self, world: WorldId, file_path: impl AsRef<FsPath>) -> Result<Arc<RailGraph>> {
        let dto: TopologyDto = parse_json_file(file_path)?;
        self.load_topology(world, dto)
    }

    pub fn load_topology(&self, world: WorldId, dto: TopologyDto) -> Result<Arc<RailGraph>> {
        if let Some(declared) = dto.world_id.filter(|declared| *declared != world) {
            log::warn!("WorldMismatch: Topology declares world {}, loading it into {}.", declared, world);
        }

        let edges = dto.edges.into_iter().map(RailEdge::try_from).collect::<Result<Vec<_>>>()?;

        let mut overrides = Vec::with_capacity(dto.overrides.len());
        for override_dto in dto.overrides {
            let edge_id = override_dto.edge_id();
            overrides.push((edge_id, EdgeOverride::try_from(override_dto)?));
        }

        for node in dto.nodes {
            self.repository.upsert_node(world, node)?;
        }
        for (edge_id, edge_override) in overrides {
            self.repository.upsert_override(world, edge_id, edge_override)?;
        }

        self.graphs.replace_edges(world, edges)
    }

    pub fn graph(&self, world: WorldId) -> Option<Arc<RailGraph>> {
        self.graphs.graph(world)
    }

    pub fn route(&self, world: WorldId, from: &NodeId, to: &NodeId, options: PathOptions) -> Option<Path> {
        self.graphs.shortest_path(world, from, to, options)
    }

    pub fn set_edge_override(&self, world: WorldId, edge_id: &EdgeId, edge_override: EdgeOverride) -> Result<()> {
        self.graphs.set_edge_override(world, edge_id, edge_override)
    }

    //---------------------
    // --- Control Loop ---
    //---------------------

    /// Per-tick housekeeping: expired TTL overrides are re-resolved.
    ///
    /// # Returns
    /// Returns `true` if a new graph snapshot was published.
    pub fn tick(&self, world: WorldId) -> bool {
        let republished = self.graphs.refresh_overrides(world);
        if republished {
            self.eta.cache().invalidate_by_prefix(&EtaKey::world_prefix(world));
        }
        republished
    }

    pub fn record_sample(&self, snapshot: TrainRuntimeSnapshot) -> bool {
        self.runtime.record(snapshot)
    }

    /// Drops the train's runtime state and every claim or queue position it held.
    pub fn retire_train(&self, world: WorldId, train: &TrainId) -> usize {
        self.runtime.remove(train);
        self.occupancy.release_all(world, train)
    }

    /// Resolves the aspect of `train`'s claim on `resource` and stores it on the claim.
    ///
    /// `blocks_to_occupied` is the distance to the next resource held by another train.
    /// Braking distance follows from the train's last sampled speed and its motion parameters,
    /// the caution zone from the caution cap of the component the train is in.
    ///
    /// # Returns
    /// Returns the resolved aspect, or `None` if the train is unknown or does not hold `resource`.
    pub fn update_signal(&self, world: WorldId, train: &TrainId, resource: &OccupancyResource, blocks_to_occupied: Option<f64>) -> Option<SignalAspect> {
        let snapshot = self.runtime.get(train)?;
        let motion = self.config.motion_for(snapshot.train_type.as_deref());

        let in_caution_zone = match (self.graph(world), snapshot.position_node()) {
            (Some(graph), Some(position)) => graph.component_key(position).and_then(|key| self.config.caution_speed(key)).is_some(),
            _ => false,
        };

        let inputs = SignalInputs { blocks_to_occupied, braking_distance_blocks: motion.braking_distance(snapshot.speed_bps), in_caution_zone };
        let aspect = self.config.signal_policy.resolve(&inputs);

        self.occupancy.set_signal(world, train, resource, aspect)?;
        Some(aspect)
    }

    pub fn estimate_eta(&self, world: WorldId, train: &TrainId, target: &NodeId) -> EtaResult {
        self.eta.estimate(world, train, target)
    }
}

impl Drop for RailDispatcher {
    fn drop(&mut self) {
        for subscription in self.cache_invalidation.drain(..) {
            self.events.unsubscribe(subscription);
        }
    }
}
