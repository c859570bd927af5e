use crate::domain::timing::motion::MotionParams;
use crate::error::{Error, Result};

/// Constant-speed traversal time of one edge, rounded up to whole seconds.
///
/// The edge's limit is used when positive, `fallback_speed_bps` otherwise.
///
/// # Returns
/// Returns `None` for `length_blocks <= 0` or when no usable speed is available.
pub fn edge_duration_secs(length_blocks: i64, speed_limit_bps: f64, fallback_speed_bps: f64) -> Option<i64> {
    if length_blocks <= 0 {
        return None;
    }

    let speed = if speed_limit_bps.is_finite() && speed_limit_bps > 0.0 { speed_limit_bps } else { fallback_speed_bps };
    if !speed.is_finite() || speed <= 0.0 {
        log::debug!("NoEdgeEstimate: No usable speed for an edge of {} blocks.", length_blocks);
        return None;
    }

    Some((length_blocks as f64 / speed).ceil() as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileShape {
    /// Accelerate, cruise at target speed, decelerate.
    Trapezoidal,
    /// Too short to reach target speed, accelerate to a lower peak then decelerate.
    Triangular,
    /// Too short even to blend entry into exit speed, uniform speed change between them.
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionProfile {
    pub shape: ProfileShape,
    pub peak_speed_bps: f64,
    pub accel_secs: f64,
    pub cruise_secs: f64,
    pub decel_secs: f64,
}

impl MotionProfile {
    pub fn total_secs(&self) -> f64 {
        self.accel_secs + self.cruise_secs + self.decel_secs
    }
}

fn require(condition: bool, message: impl FnOnce() -> String) -> Result<()> {
    if condition { Ok(()) } else { Err(Error::MalformedInput(message())) }
}

/// Time profile for running `distance` blocks entering at `entry_bps` and leaving at
/// `exit_bps`, cruising at `target_bps` where possible.
///
/// Entry and exit speeds above the target are capped to it.
pub fn segment_profile(distance: f64, entry_bps: f64, target_bps: f64, exit_bps: f64, params: &MotionParams) -> Result<MotionProfile> {
    require(distance.is_finite() && distance > 0.0, || format!("distance must be finite and > 0, got {}", distance))?;
    require(target_bps.is_finite() && target_bps > 0.0, || format!("target speed must be finite and > 0, got {}", target_bps))?;
    require(entry_bps.is_finite() && entry_bps >= 0.0, || format!("entry speed must be finite and >= 0, got {}", entry_bps))?;
    require(exit_bps.is_finite() && exit_bps >= 0.0, || format!("exit speed must be finite and >= 0, got {}", exit_bps))?;

    let a = params.accel_bps2();
    let d = params.decel_bps2();
    let entry = entry_bps.min(target_bps);
    let exit = exit_bps.min(target_bps);

    let accel_distance = (target_bps * target_bps - entry * entry) / (2.0 * a);
    let decel_distance = (target_bps * target_bps - exit * exit) / (2.0 * d);

    if accel_distance + decel_distance <= distance {
        return Ok(MotionProfile {
            shape: ProfileShape::Trapezoidal,
            peak_speed_bps: target_bps,
            accel_secs: (target_bps - entry) / a,
            cruise_secs: (distance - accel_distance - decel_distance) / target_bps,
            decel_secs: (target_bps - exit) / d,
        });
    }

    // (v^2 - e^2) / 2a + (v^2 - x^2) / 2d = distance
    let peak = ((2.0 * a * d * distance + d * entry * entry + a * exit * exit) / (a + d)).sqrt();

    if peak >= entry.max(exit) {
        return Ok(MotionProfile {
            shape: ProfileShape::Triangular,
            peak_speed_bps: peak,
            accel_secs: (peak - entry) / a,
            cruise_secs: 0.0,
            decel_secs: (peak - exit) / d,
        });
    }

    // entry + exit > 0 here, otherwise peak >= 0 = max(entry, exit) above.
    let ramp_secs = 2.0 * distance / (entry + exit);
    let (accel_secs, decel_secs) = if exit > entry { (ramp_secs, 0.0) } else { (0.0, ramp_secs) };

    Ok(MotionProfile { shape: ProfileShape::Linear, peak_speed_bps: entry.max(exit), accel_secs, cruise_secs: 0.0, decel_secs })
}

/// One leg of a route: its length and the speed a train would cruise at on it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteSegment {
    pub length_blocks: f64,
    pub target_speed_bps: f64,
}

/// Total running time over consecutive segments.
///
/// Adjacent segments hand over at the lower of their two target speeds, the first segment
/// is entered at `start_speed_bps` and the last one left at `end_speed_bps`. Segments
/// without length contribute nothing.
pub fn route_time_secs(segments: &[RouteSegment], start_speed_bps: f64, end_speed_bps: f64, params: &MotionParams) -> Result<f64> {
    let legs: Vec<&RouteSegment> = segments.iter().filter(|segment| segment.length_blocks > 0.0).collect();

    let mut total = 0.0;
    for (index, leg) in legs.iter().enumerate() {
        let entry = match index.checked_sub(1).and_then(|prev| legs.get(prev)) {
            Some(prev) => prev.target_speed_bps.min(leg.target_speed_bps),
            None => start_speed_bps,
        };
        let exit = match legs.get(index + 1) {
            Some(next) => next.target_speed_bps.min(leg.target_speed_bps),
            None => end_speed_bps,
        };

        total += segment_profile(leg.length_blocks, entry, leg.target_speed_bps, exit, params)?.total_secs();
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> MotionParams {
        MotionParams::new(1.0, 1.2).unwrap()
    }

    #[test]
    fn constant_speed_edge_durations() {
        assert_eq!(edge_duration_secs(120, 10.0, 6.0), Some(12));
        assert_eq!(edge_duration_secs(60, 0.0, 6.0), Some(10));
        assert_eq!(edge_duration_secs(61, 0.0, 6.0), Some(11));
        assert_eq!(edge_duration_secs(0, 10.0, 6.0), None);
        assert_eq!(edge_duration_secs(-5, 10.0, 6.0), None);
        assert_eq!(edge_duration_secs(10, 0.0, 0.0), None);
    }

    #[test]
    fn trapezoid_from_rest_to_cruise() {
        let profile = segment_profile(150.0, 0.0, 10.0, 10.0, &params()).unwrap();

        assert_eq!(profile.shape, ProfileShape::Trapezoidal);
        assert!((profile.accel_secs - 10.0).abs() < 1e-9);
        assert!((profile.cruise_secs - 10.0).abs() < 1e-9);
        assert!((profile.total_secs() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn short_segment_uses_triangular_profile() {
        let profile = segment_profile(10.0, 0.0, 20.0, 0.0, &params()).unwrap();

        assert_eq!(profile.shape, ProfileShape::Triangular);
        assert!(profile.peak_speed_bps < 20.0);
        assert!(profile.total_secs() > 0.0 && profile.total_secs() < 20.0);
        assert!(profile.total_secs() >= 10.0 / 20.0);
        assert_eq!(profile.cruise_secs, 0.0);
    }

    #[test]
    fn rejects_invalid_inputs() {
        assert!(segment_profile(0.0, 0.0, 10.0, 0.0, &params()).is_err());
        assert!(segment_profile(10.0, 0.0, 0.0, 0.0, &params()).is_err());
        assert!(segment_profile(10.0, -1.0, 10.0, 0.0, &params()).is_err());
        assert!(segment_profile(f64::NAN, 0.0, 10.0, 0.0, &params()).is_err());
        assert!(MotionParams::new(0.0, 1.0).is_err());
        assert!(MotionParams::new(1.0, f64::INFINITY).is_err());
    }

    #[test]
    fn linear_profile_when_speeds_cannot_blend() {
        // 10 bps in, 0 bps out over a single block cannot be done at 1.2 bps^2.
        let profile = segment_profile(1.0, 10.0, 10.0, 0.0, &params()).unwrap();

        assert_eq!(profile.shape, ProfileShape::Linear);
        assert!((profile.total_secs() - 0.2).abs() < 1e-9);
        assert!(profile.total_secs() >= 1.0 / 10.0);
    }

    #[test]
    fn route_time_hands_over_at_lower_speed() {
        let segments = [
            RouteSegment { length_blocks: 150.0, target_speed_bps: 10.0 },
            RouteSegment { length_blocks: 0.0, target_speed_bps: 10.0 },
            RouteSegment { length_blocks: 100.0, target_speed_bps: 10.0 },
        ];

        // 10s accel + 10s cruise, then 100 blocks at 10 bps, then 10 / 1.2 s braking
        // with (100 - 41.67) / 10 s of cruising before it.
        let total = route_time_secs(&segments, 0.0, 0.0, &params()).unwrap();
        let expected = 20.0 + (100.0 - 100.0 / 2.4) / 10.0 + 10.0 / 1.2;
        assert!((total - expected).abs() < 1e-9, "got {}", total);
    }
}
