use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::clock::clock::SharedClock;
use crate::domain::graph::edge::RailEdge;
use crate::domain::graph::edge_override::EdgeOverride;
use crate::domain::graph::node::RailNode;
use crate::domain::graph::path_finder::{Path, PathOptions, shortest_path};
use crate::domain::graph::rail_graph::RailGraph;
use crate::domain::graph::repository::{RailGraphRepository, RailGraphSnapshotMeta};
use crate::domain::graph::staleness::{RailGraphStaleState, StalenessCheck, StalenessTracker, node_signature};
use crate::domain::occupancy::event_bus::EventBus;
use crate::domain::occupancy::events::RailEvent;
use crate::domain::utils::id::{EdgeId, NodeId, WorldId};
use crate::error::Result;
use crate::logger::ANALYTICS_TARGET;

/// Owns the published graph snapshot of every world.
///
/// Readers get an `Arc<RailGraph>` and keep using it for as long as they like, writers
/// build a complete new snapshot and swap it in under a short write lock. When the
/// persistence collaborator fails, the previously published snapshot stays in place.
#[derive(Debug)]
pub struct RailGraphService {
    repository: Arc<dyn RailGraphRepository>,
    clock: SharedClock,
    events: Arc<EventBus>,
    graphs: RwLock<HashMap<WorldId, Arc<RailGraph>>>,
    staleness: StalenessTracker,
}

impl RailGraphService {
    pub fn new(repository: Arc<dyn RailGraphRepository>, clock: SharedClock, events: Arc<EventBus>) -> Self {
        Self { repository, clock, events, graphs: RwLock::new(HashMap::new()), staleness: StalenessTracker::new() }
    }

    //---------------------
    // --- Reads ---
    //---------------------

    pub fn graph(&self, world: WorldId) -> Option<Arc<RailGraph>> {
        self.graphs.read().unwrap_or_else(PoisonError::into_inner).get(&world).cloned()
    }

    pub fn stale_state(&self, world: WorldId) -> Option<RailGraphStaleState> {
        self.staleness.stale_state(world)
    }

    pub fn is_stale(&self, world: WorldId) -> bool {
        self.staleness.is_stale(world)
    }

    pub fn shortest_path(&self, world: WorldId, from: &NodeId, to: &NodeId, options: PathOptions) -> Option<Path> {
        let graph = self.graph(world)?;
        shortest_path(&graph, from, to, options)
    }

    fn publish_graph(&self, world: WorldId, graph: Arc<RailGraph>) {
        self.graphs.write().unwrap_or_else(PoisonError::into_inner).insert(world, graph);
    }

    //---------------------
    // --- Rebuild ---
    //---------------------

    /// Loads the full topology of `world`, publishes a new snapshot and records its metadata.
    pub fn rebuild(&self, world: WorldId) -> Result<Arc<RailGraph>> {
        let now = self.clock.now();

        let loaded = self.load_topology(world);
        let (nodes, edges) = match loaded {
            Ok(topology) => topology,
            Err(e) => {
                log::error!("RailGraphRebuildFailed: World {} keeps its last known graph: {}", world, e);
                return Err(e);
            }
        };

        let signature = node_signature(&nodes);
        let graph = Arc::new(RailGraph::build(nodes, edges, now));

        let meta = RailGraphSnapshotMeta {
            world_id: world,
            built_at: now,
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            node_signature: signature,
        };
        if let Err(e) = self.repository.save_snapshot_meta(meta) {
            log::error!("RailGraphRebuildFailed: Could not record snapshot of world {}: {}", world, e);
            return Err(e);
        }

        self.publish_graph(world, graph.clone());
        self.staleness.clear(world);

        log::info!("RailGraphRebuilt: World {} with {} nodes and {} edges.", world, graph.node_count(), graph.edge_count());
        tracing::info!(target: ANALYTICS_TARGET, World = %world, Nodes = graph.node_count(), Edges = graph.edge_count(), Blocked = graph.blocked_edges().len(), "Graph rebuilt");

        self.events.publish(RailEvent::GraphRebuilt { world_id: world, node_count: graph.node_count(), edge_count: graph.edge_count() });

        Ok(graph)
    }

    fn load_topology(&self, world: WorldId) -> Result<(Vec<RailNode>, Vec<RailEdge>)> {
        let nodes = self.repository.list_nodes(world)?;
        let edges = self.repository.list_edges(world)?;
        let overrides: HashMap<EdgeId, EdgeOverride> = self.repository.list_overrides(world)?.into_iter().collect();

        // Overrides live in their own store so a wholesale edge replacement never drops them.
        let edges = edges
            .into_iter()
            .map(|edge| {
                let stored = overrides.get(&edge.id).cloned();
                let fallback = edge.manual_override.clone();
                edge.with_override(stored.or(fallback))
            })
            .collect();

        Ok((nodes, edges))
    }

    /// Replaces the edge set of `world` wholesale and rebuilds.
    pub fn replace_edges(&self, world: WorldId, edges: Vec<RailEdge>) -> Result<Arc<RailGraph>> {
        self.repository.replace_edges(world, edges)?;
        self.rebuild(world)
    }

    //---------------------
    // --- Node Mutations ---
    //---------------------

    pub fn upsert_node(&self, world: WorldId, node: RailNode) -> Result<StalenessCheck> {
        log::debug!("NodeUpsert: {} in world {}.", node.id, world);
        self.repository.upsert_node(world, node)?;
        self.check_staleness(world)
    }

    pub fn delete_node(&self, world: WorldId, node_id: &NodeId) -> Result<StalenessCheck> {
        if !self.repository.delete_node(world, node_id)? {
            log::debug!("NodeDelete: {} was not stored in world {}.", node_id, world);
        }
        self.check_staleness(world)
    }

    /// Compares the persisted node set with the last build and reloads on re-convergence.
    pub fn check_staleness(&self, world: WorldId) -> Result<StalenessCheck> {
        let recorded = self.repository.snapshot_meta(world)?;
        let nodes = self.repository.list_nodes(world)?;

        let check = self.staleness.check(recorded.as_ref(), &nodes);

        match &check {
            StalenessCheck::BecameStale(state) | StalenessCheck::StillStale(state) => {
                self.events.publish(RailEvent::GraphStale(state.clone()));
            }
            StalenessCheck::Reconverged => {
                self.rebuild(world)?;
                self.events.publish(RailEvent::GraphReloaded { world_id: world });
            }
            StalenessCheck::Untracked | StalenessCheck::Fresh => {}
        }

        Ok(check)
    }

    //---------------------
    // --- Overrides ---
    //---------------------

    /// Persists `edge_override` (deleting it when empty) and republishes the effective view.
    pub fn set_edge_override(&self, world: WorldId, edge_id: &EdgeId, edge_override: EdgeOverride) -> Result<()> {
        let active = if edge_override.is_empty() {
            self.repository.delete_override(world, edge_id)?;
            None
        } else {
            self.repository.upsert_override(world, edge_id.clone(), edge_override.clone())?;
            Some(edge_override)
        };

        if let Some(graph) = self.graph(world) {
            match graph.with_edge_override(edge_id, active, self.clock.now()) {
                Some(next) => self.publish_graph(world, Arc::new(next)),
                None => log::warn!("UnknownEdge: Override for {} stored, but the edge is not part of the graph of world {}.", edge_id, world),
            }
        }

        log::info!("EdgeOverrideChanged: {} in world {}.", edge_id, world);
        self.events.publish(RailEvent::EdgeOverrideChanged { world_id: world, edge_id: edge_id.clone() });

        Ok(())
    }

    /// Re-resolves TTL overrides against the clock.
    ///
    /// # Returns
    /// Returns `true` if a new snapshot was published.
    pub fn refresh_overrides(&self, world: WorldId) -> bool {
        let Some(graph) = self.graph(world) else {
            return false;
        };

        match graph.reresolved(self.clock.now()) {
            Some(next) => {
                log::debug!("OverridesExpired: Republishing graph of world {}.", world);
                self.publish_graph(world, Arc::new(next));
                true
            }
            None => false,
        }
    }
}
