pub mod eta;
pub mod eta_cache;
pub mod motion;
pub mod travel_time;
