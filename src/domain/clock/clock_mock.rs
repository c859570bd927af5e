use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::clock::clock::SystemClock;

/// Manually advanced clock, shared between clones.
#[derive(Debug, Clone)]
pub struct ManualClock {
    time: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { time: Arc::new(RwLock::new(start)) }
    }

    /// Clock starting at a fixed, arbitrary epoch (2024-01-01T00:00:00Z).
    pub fn at_epoch() -> Self {
        Self::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default())
    }

    pub fn advance(&self, delta: Duration) {
        let mut guard = self.time.write().unwrap_or_else(PoisonError::into_inner);
        *guard += delta;
    }
}

impl SystemClock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.time.read().unwrap_or_else(PoisonError::into_inner)
    }
}
