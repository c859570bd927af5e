pub mod edge;
pub mod edge_override;
pub mod graph_service;
pub mod node;
pub mod path_finder;
pub mod rail_graph;
pub mod repository;
pub mod staleness;
