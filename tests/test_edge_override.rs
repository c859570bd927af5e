mod fixtures;

use chrono::Duration;

use fixtures::{Recorder, dispatcher_with, edge, line_network, world};
use rail_dispatch::domain::clock::clock::SystemClock;
use rail_dispatch::domain::config::DispatchConfig;
use rail_dispatch::domain::graph::edge_override::EdgeOverride;
use rail_dispatch::domain::graph::path_finder::PathOptions;
use rail_dispatch::domain::occupancy::events::RailEvent;
use rail_dispatch::domain::utils::id::{EdgeId, NodeId};

fn edge_id(a: &str, b: &str) -> EdgeId {
    EdgeId::new(NodeId::new(a), NodeId::new(b))
}

#[test]
fn test_override_survives_edge_replacement() {
    let (nodes, edges) = line_network();
    let (dispatcher, _clock) = dispatcher_with(DispatchConfig::default(), nodes, edges.clone());
    let bc = edge_id("op:c", "op:b");

    dispatcher.set_edge_override(world(), &bc, EdgeOverride::manual_speed_limit(4.0).unwrap()).unwrap();
    assert_eq!(dispatcher.graph(world()).unwrap().effective_state(&bc).unwrap().speed_limit_bps, 4.0);

    let graph = dispatcher.graphs().replace_edges(world(), edges).unwrap();
    assert_eq!(graph.effective_state(&bc).unwrap().speed_limit_bps, 4.0);
}

#[test]
fn test_block_reroutes_and_clearing_deletes_override() {
    let (mut nodes, mut edges) = line_network();
    nodes.push(fixtures::waypoint("op:x", 150.0));
    edges.push(edge("op:b", "op:x", 80));
    edges.push(edge("op:x", "op:c", 80));
    let (dispatcher, _clock) = dispatcher_with(DispatchConfig::default(), nodes, edges);
    let recorder = Recorder::attach(dispatcher.events());
    let bc = edge_id("op:b", "op:c");
    let (a, d) = (NodeId::new("op:a"), NodeId::new("op:d"));

    assert_eq!(dispatcher.route(world(), &a, &d, PathOptions::default()).unwrap().total_length_blocks, 300);

    dispatcher.set_edge_override(world(), &bc, EdgeOverride::manual_block()).unwrap();
    let detour = dispatcher.route(world(), &a, &d, PathOptions::default()).unwrap();
    assert_eq!(detour.total_length_blocks, 360);
    assert!(!detour.contains_edge(&bc));

    dispatcher.set_edge_override(world(), &bc, EdgeOverride::empty()).unwrap();
    assert_eq!(dispatcher.route(world(), &a, &d, PathOptions::default()).unwrap().total_length_blocks, 300);

    // The cleared override is gone from storage, a rebuild keeps the edge open.
    let rebuilt = dispatcher.graphs().rebuild(world()).unwrap();
    assert!(!rebuilt.is_blocked(&bc));

    let changes = recorder.take().into_iter().filter(|e| matches!(e, RailEvent::EdgeOverrideChanged { .. })).count();
    assert_eq!(changes, 2);
}

#[test]
fn test_temporary_limit_expires_on_tick() {
    let (nodes, edges) = line_network();
    let (dispatcher, clock) = dispatcher_with(DispatchConfig::default(), nodes, edges);
    let ab = edge_id("op:a", "op:b");

    let until = clock.now() + Duration::minutes(2);
    dispatcher.set_edge_override(world(), &ab, EdgeOverride::temporary_speed_limit(3.0, until).unwrap()).unwrap();
    assert_eq!(dispatcher.graph(world()).unwrap().effective_state(&ab).unwrap().speed_limit_bps, 3.0);

    clock.advance(Duration::minutes(1));
    assert!(!dispatcher.tick(world()));

    clock.advance(Duration::minutes(1));
    assert!(dispatcher.tick(world()));
    assert_eq!(dispatcher.graph(world()).unwrap().effective_state(&ab).unwrap().speed_limit_bps, 0.0);
}

#[test]
fn test_override_for_unknown_edge_applies_once_edge_exists() {
    let (nodes, edges) = line_network();
    let (dispatcher, _clock) = dispatcher_with(DispatchConfig::default(), nodes, edges.clone());
    let ad = edge_id("op:a", "op:d");

    dispatcher.set_edge_override(world(), &ad, EdgeOverride::manual_block()).unwrap();
    assert!(dispatcher.graph(world()).unwrap().edge(&ad).is_none());

    let mut extended = edges;
    extended.push(edge("op:a", "op:d", 50));
    let graph = dispatcher.graphs().replace_edges(world(), extended).unwrap();
    assert!(graph.is_blocked(&ad));
}
