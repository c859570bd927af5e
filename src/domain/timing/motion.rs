use crate::error::{Error, Result};

/// Acceleration limits of a train, in blocks per second squared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionParams {
    accel_bps2: f64,
    decel_bps2: f64,
}

impl MotionParams {
    pub fn new(accel_bps2: f64, decel_bps2: f64) -> Result<Self> {
        if !accel_bps2.is_finite() || accel_bps2 <= 0.0 {
            return Err(Error::malformed(format!("accelBps2 must be finite and > 0, got {}", accel_bps2)));
        }
        if !decel_bps2.is_finite() || decel_bps2 <= 0.0 {
            return Err(Error::malformed(format!("decelBps2 must be finite and > 0, got {}", decel_bps2)));
        }
        Ok(Self { accel_bps2, decel_bps2 })
    }

    pub fn accel_bps2(&self) -> f64 {
        self.accel_bps2
    }

    pub fn decel_bps2(&self) -> f64 {
        self.decel_bps2
    }

    /// Distance needed to brake from `speed_bps` to a standstill.
    pub fn braking_distance(&self, speed_bps: f64) -> f64 {
        speed_bps * speed_bps / (2.0 * self.decel_bps2)
    }
}

impl Default for MotionParams {
    fn default() -> Self {
        Self { accel_bps2: 1.0, decel_bps2: 1.2 }
    }
}
