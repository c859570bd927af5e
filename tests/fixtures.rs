#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use rail_dispatch::domain::clock::clock::SharedClock;
use rail_dispatch::domain::clock::clock_mock::ManualClock;
use rail_dispatch::domain::config::DispatchConfig;
use rail_dispatch::domain::dispatcher::RailDispatcher;
use rail_dispatch::domain::graph::edge::RailEdge;
use rail_dispatch::domain::graph::node::{NodeType, RailNode, Vector3};
use rail_dispatch::domain::occupancy::event_bus::{EventBus, Subscription};
use rail_dispatch::domain::occupancy::events::RailEvent;
use rail_dispatch::domain::utils::id::{NodeId, WorldId};

pub fn world() -> WorldId {
    WorldId::nil()
}

pub fn station(id: &str, x: f64) -> RailNode {
    RailNode::new(NodeId::new(id), NodeType::Station, Vector3::new(x, 64.0, 0.0))
}

pub fn waypoint(id: &str, x: f64) -> RailNode {
    RailNode::new(NodeId::new(id), NodeType::Waypoint, Vector3::new(x, 64.0, 0.0))
}

pub fn edge(a: &str, b: &str, length_blocks: i64) -> RailEdge {
    RailEdge::between(a, b, length_blocks).unwrap()
}

pub fn manual_clock() -> (ManualClock, SharedClock) {
    let clock = ManualClock::at_epoch();
    let shared: SharedClock = Arc::new(clock.clone());
    (clock, shared)
}

/// Dispatcher on a manual clock with `nodes` and `edges` loaded into `world()`.
pub fn dispatcher_with(config: DispatchConfig, nodes: Vec<RailNode>, edges: Vec<RailEdge>) -> (RailDispatcher, ManualClock) {
    let (clock, shared) = manual_clock();
    let dispatcher = RailDispatcher::in_memory(config, shared);

    for node in nodes {
        dispatcher.graphs().upsert_node(world(), node).unwrap();
    }
    dispatcher.graphs().replace_edges(world(), edges).unwrap();

    (dispatcher, clock)
}

/// Line a - b - c - d with 100-block edges.
pub fn line_network() -> (Vec<RailNode>, Vec<RailEdge>) {
    let nodes = vec![station("op:a", 0.0), waypoint("op:b", 100.0), waypoint("op:c", 200.0), station("op:d", 300.0)];
    let edges = vec![edge("op:a", "op:b", 100), edge("op:b", "op:c", 100), edge("op:c", "op:d", 100)];
    (nodes, edges)
}

/// Collects every event published on `bus`.
pub struct Recorder {
    pub events: Arc<Mutex<Vec<RailEvent>>>,
    pub subscription: Subscription,
}

impl Recorder {
    pub fn attach(bus: &EventBus) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let subscription = bus.subscribe_all(move |event| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        });
        Self { events, subscription }
    }

    pub fn take(&self) -> Vec<RailEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}
