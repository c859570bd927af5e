use crate::domain::clock::clock::SharedClock;
use crate::domain::config::DispatchConfig;
use crate::domain::dispatcher::RailDispatcher;
use crate::domain::utils::id::WorldId;
use crate::error::Result;

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

/// Builds an in-memory dispatcher and loads `topology_path` into `world`.
///
/// Without `config_path` the default tuning is used.
pub fn load_dispatcher(config_path: Option<&str>, topology_path: &str, world: WorldId, clock: SharedClock) -> Result<RailDispatcher> {
    let config = match config_path {
        Some(path) => DispatchConfig::load(path)?,
        None => DispatchConfig::default(),
    };
    log::info!("Configuration resolved. Loading topology from '{}'.", topology_path);

    let dispatcher = RailDispatcher::in_memory(config, clock);
    let graph = dispatcher.load_topology_file(world, topology_path)?;
    log::info!("Dispatcher ready: {} nodes, {} edges, {} components.", graph.node_count(), graph.edge_count(), graph.components().len());

    Ok(dispatcher)
}
