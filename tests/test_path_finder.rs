mod fixtures;

use chrono::{DateTime, TimeZone, Utc};

use fixtures::{edge, station, waypoint};
use rail_dispatch::domain::graph::edge::RailEdge;
use rail_dispatch::domain::graph::edge_override::EdgeOverride;
use rail_dispatch::domain::graph::path_finder::{PathOptions, shortest_path};
use rail_dispatch::domain::graph::rail_graph::RailGraph;
use rail_dispatch::domain::utils::id::{EdgeId, NodeId};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn id(s: &str) -> NodeId {
    NodeId::new(s)
}

/// a --5-- b --5-- d, plus a direct a --15-- d and a detour a --10-- c --10-- d.
fn junction_graph(extra: Vec<RailEdge>) -> RailGraph {
    let nodes = vec![station("op:a", 0.0), waypoint("op:b", 5.0), waypoint("op:c", 10.0), station("op:d", 10.0), station("op:z", 99.0)];
    let mut edges = vec![edge("op:a", "op:b", 5), edge("op:b", "op:d", 5), edge("op:a", "op:d", 15), edge("op:a", "op:c", 10), edge("op:c", "op:d", 10)];
    edges.extend(extra);
    RailGraph::build(nodes, edges, now())
}

#[test]
fn test_shortest_path_by_length() {
    let graph = junction_graph(vec![]);

    let path = shortest_path(&graph, &id("op:a"), &id("op:d"), PathOptions::default()).unwrap();

    assert_eq!(path.nodes, vec![id("op:a"), id("op:b"), id("op:d")]);
    assert_eq!(path.total_length_blocks, 10);
    assert_eq!(path.edges, vec![EdgeId::new(id("op:a"), id("op:b")), EdgeId::new(id("op:b"), id("op:d"))]);
}

#[test]
fn test_path_edges_connect_consecutive_nodes() {
    let graph = junction_graph(vec![]);
    let path = shortest_path(&graph, &id("op:d"), &id("op:c"), PathOptions::default()).unwrap();

    assert_eq!(path.edges.len() + 1, path.nodes.len());
    for (i, edge_id) in path.edges.iter().enumerate() {
        assert!(edge_id.touches(&path.nodes[i]));
        assert!(edge_id.touches(&path.nodes[i + 1]));
    }
    let sum: i64 = path.edges.iter().map(|e| graph.edge(e).unwrap().length_blocks).sum();
    assert_eq!(sum, path.total_length_blocks);
}

#[test]
fn test_same_endpoints_yield_trivial_path() {
    let graph = junction_graph(vec![]);

    let path = shortest_path(&graph, &id("op:b"), &id("op:b"), PathOptions::default()).unwrap();
    assert_eq!(path.nodes, vec![id("op:b")]);
    assert!(path.edges.is_empty());
    assert_eq!(path.total_length_blocks, 0);

    let unknown = shortest_path(&graph, &id("op:nowhere"), &id("op:nowhere"), PathOptions::default()).unwrap();
    assert_eq!(unknown.total_length_blocks, 0);
}

#[test]
fn test_unknown_or_unreachable_target() {
    let graph = junction_graph(vec![]);

    assert!(shortest_path(&graph, &id("op:a"), &id("op:nowhere"), PathOptions::default()).is_none());
    assert!(shortest_path(&graph, &id("op:nowhere"), &id("op:a"), PathOptions::default()).is_none());
    assert!(shortest_path(&graph, &id("op:a"), &id("op:z"), PathOptions::default()).is_none());
}

#[test]
fn test_blocked_edge_is_avoided_unless_ignored() {
    let graph = junction_graph(vec![]);
    let blocked = graph.with_edge_override(&EdgeId::new(id("op:b"), id("op:d")), Some(EdgeOverride::manual_block()), now()).unwrap();

    let path = shortest_path(&blocked, &id("op:a"), &id("op:d"), PathOptions::default()).unwrap();
    assert_eq!(path.nodes, vec![id("op:a"), id("op:d")]);
    assert_eq!(path.total_length_blocks, 15);

    let diagnostic = shortest_path(&blocked, &id("op:a"), &id("op:d"), PathOptions::ignore_blocks()).unwrap();
    assert_eq!(diagnostic.total_length_blocks, 10);
}

#[test]
fn test_one_way_edge_only_departs_from_first_endpoint() {
    let nodes = vec![station("op:a", 0.0), station("op:b", 10.0)];
    let one_way = RailEdge::new(id("op:a"), id("op:b"), 10, 0.0, false).unwrap();
    let graph = RailGraph::build(nodes, vec![one_way], now());

    assert!(shortest_path(&graph, &id("op:a"), &id("op:b"), PathOptions::default()).is_some());
    assert!(shortest_path(&graph, &id("op:b"), &id("op:a"), PathOptions::default()).is_none());
}

#[test]
fn test_ties_resolve_the_same_way_every_time() {
    // Two equal 20-block routes a-b-d and a-c-d.
    let nodes = vec![station("op:a", 0.0), waypoint("op:b", 10.0), waypoint("op:c", 10.0), station("op:d", 20.0)];
    let edges = vec![edge("op:a", "op:b", 10), edge("op:b", "op:d", 10), edge("op:a", "op:c", 10), edge("op:c", "op:d", 10)];

    let first = shortest_path(&RailGraph::build(nodes.clone(), edges.clone(), now()), &id("op:a"), &id("op:d"), PathOptions::default()).unwrap();
    assert_eq!(first.total_length_blocks, 20);

    for _ in 0..20 {
        let graph = RailGraph::build(nodes.clone(), edges.clone(), now());
        let again = shortest_path(&graph, &id("op:a"), &id("op:d"), PathOptions::default()).unwrap();
        assert_eq!(again, first);
    }
}

#[test]
fn test_components_keyed_by_smallest_member() {
    let graph = junction_graph(vec![]);
    let components = graph.components();

    assert_eq!(components.len(), 2);
    assert_eq!(components[&id("op:a")], vec![id("op:a"), id("op:b"), id("op:c"), id("op:d")]);
    assert_eq!(components[&id("op:z")], vec![id("op:z")]);
    assert_eq!(graph.component_key(&id("op:d")), Some(&id("op:a")));
}
