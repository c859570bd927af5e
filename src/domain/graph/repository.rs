use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::domain::graph::edge::RailEdge;
use crate::domain::graph::edge_override::EdgeOverride;
use crate::domain::graph::node::RailNode;
use crate::domain::utils::id::{EdgeId, NodeId, WorldId};
use crate::error::{Error, Result};

/// Metadata recorded for the last successful graph build of a world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RailGraphSnapshotMeta {
    pub world_id: WorldId,
    pub built_at: DateTime<Utc>,
    pub node_count: usize,
    pub edge_count: usize,
    pub node_signature: String,
}

/// Boundary to the persistence collaborator.
///
/// Implementations wrap their driver errors into `Error::StorageFailure`, callers never see
/// anything else from this trait. Calls may block, the control loop is expected to issue
/// them from wherever the owning collaborator allows.
pub trait RailGraphRepository: std::fmt::Debug + Send + Sync {
    fn list_nodes(&self, world: WorldId) -> Result<Vec<RailNode>>;

    fn list_edges(&self, world: WorldId) -> Result<Vec<RailEdge>>;

    fn list_overrides(&self, world: WorldId) -> Result<Vec<(EdgeId, EdgeOverride)>>;

    fn snapshot_meta(&self, world: WorldId) -> Result<Option<RailGraphSnapshotMeta>>;

    fn save_snapshot_meta(&self, meta: RailGraphSnapshotMeta) -> Result<()>;

    fn upsert_node(&self, world: WorldId, node: RailNode) -> Result<()>;

    /// # Returns
    /// Returns `true` if a node was removed.
    fn delete_node(&self, world: WorldId, node_id: &NodeId) -> Result<bool>;

    fn replace_edges(&self, world: WorldId, edges: Vec<RailEdge>) -> Result<()>;

    fn upsert_override(&self, world: WorldId, edge_id: EdgeId, edge_override: EdgeOverride) -> Result<()>;

    fn delete_override(&self, world: WorldId, edge_id: &EdgeId) -> Result<bool>;
}

#[derive(Debug, Default, Clone)]
struct WorldRecords {
    nodes: HashMap<NodeId, RailNode>,
    edges: Vec<RailEdge>,
    overrides: HashMap<EdgeId, EdgeOverride>,
    meta: Option<RailGraphSnapshotMeta>,
}

/// Process-local repository used by the diagnostic binary and the tests.
///
/// `set_available(false)` simulates a storage outage: every call then fails with
/// `Error::StorageFailure` without touching the stored records.
#[derive(Debug)]
pub struct InMemoryRailGraphRepository {
    worlds: RwLock<HashMap<WorldId, WorldRecords>>,
    available: AtomicBool,
}

impl Default for InMemoryRailGraphRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRailGraphRepository {
    pub fn new() -> Self {
        Self { worlds: RwLock::new(HashMap::new()), available: AtomicBool::new(true) }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) { Ok(()) } else { Err(Error::storage("repository unavailable")) }
    }

    fn read<R>(&self, world: WorldId, f: impl FnOnce(Option<&WorldRecords>) -> R) -> Result<R> {
        self.check_available()?;
        let guard = self.worlds.read().unwrap_or_else(PoisonError::into_inner);
        Ok(f(guard.get(&world)))
    }

    fn write<R>(&self, world: WorldId, f: impl FnOnce(&mut WorldRecords) -> R) -> Result<R> {
        self.check_available()?;
        let mut guard = self.worlds.write().unwrap_or_else(PoisonError::into_inner);
        Ok(f(guard.entry(world).or_default()))
    }
}

impl RailGraphRepository for InMemoryRailGraphRepository {
    fn list_nodes(&self, world: WorldId) -> Result<Vec<RailNode>> {
        self.read(world, |records| records.map(|r| r.nodes.values().cloned().collect()).unwrap_or_default())
    }

    fn list_edges(&self, world: WorldId) -> Result<Vec<RailEdge>> {
        self.read(world, |records| records.map(|r| r.edges.clone()).unwrap_or_default())
    }

    fn list_overrides(&self, world: WorldId) -> Result<Vec<(EdgeId, EdgeOverride)>> {
        self.read(world, |records| {
            records.map(|r| r.overrides.iter().map(|(id, ovr)| (id.clone(), ovr.clone())).collect()).unwrap_or_default()
        })
    }

    fn snapshot_meta(&self, world: WorldId) -> Result<Option<RailGraphSnapshotMeta>> {
        self.read(world, |records| records.and_then(|r| r.meta.clone()))
    }

    fn save_snapshot_meta(&self, meta: RailGraphSnapshotMeta) -> Result<()> {
        self.write(meta.world_id, |records| records.meta = Some(meta))
    }

    fn upsert_node(&self, world: WorldId, node: RailNode) -> Result<()> {
        self.write(world, |records| {
            records.nodes.insert(node.id.clone(), node);
        })
    }

    fn delete_node(&self, world: WorldId, node_id: &NodeId) -> Result<bool> {
        self.write(world, |records| records.nodes.remove(node_id).is_some())
    }

    fn replace_edges(&self, world: WorldId, edges: Vec<RailEdge>) -> Result<()> {
        self.write(world, |records| records.edges = edges)
    }

    fn upsert_override(&self, world: WorldId, edge_id: EdgeId, edge_override: EdgeOverride) -> Result<()> {
        self.write(world, |records| {
            records.overrides.insert(edge_id, edge_override);
        })
    }

    fn delete_override(&self, world: WorldId, edge_id: &EdgeId) -> Result<bool> {
        self.write(world, |records| records.overrides.remove(edge_id).is_some())
    }
}
