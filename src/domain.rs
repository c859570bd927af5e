pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod graph;
pub mod occupancy;
pub mod runtime;
pub mod timing;
pub mod utils;
