use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Source of "now" for every timestamp taken by the dispatch core.
///
/// Claims, override expiries, cache ages and graph build times all go through
/// this trait so the host tick loop (or a test) decides what the current instant is.
pub trait SystemClock: std::fmt::Debug + Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type SharedClock = Arc<dyn SystemClock>;

/// Wall clock backed by the operating system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl WallClock {
    pub fn shared() -> SharedClock {
        Arc::new(WallClock)
    }
}

impl SystemClock for WallClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
