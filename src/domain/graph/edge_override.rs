use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Operational controls layered over a persisted edge.
///
/// Manual fields stay active until cleared, `temp_*`/`blocked_until` fields only while
/// their expiry lies in the future. Construction validates the speed fields and refuses a
/// temporary limit without an expiry, so an `EdgeOverride` value is always well-formed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EdgeOverride {
    speed_limit_bps: Option<f64>,
    temp_speed_limit_bps: Option<f64>,
    temp_speed_limit_until: Option<DateTime<Utc>>,
    blocked_manual: bool,
    blocked_until: Option<DateTime<Utc>>,
}

/// Effective edge attributes after the override overlay has been applied at a given instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveEdgeState {
    /// `0.0` means unlimited.
    pub speed_limit_bps: f64,
    pub blocked: bool,
}

fn validate_speed(field: &str, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) if !v.is_finite() || v <= 0.0 => Err(Error::malformed(format!("{} must be finite and > 0, got {}", field, v))),
        _ => Ok(()),
    }
}

impl EdgeOverride {
    pub fn new(
        speed_limit_bps: Option<f64>,
        temp_speed_limit_bps: Option<f64>,
        temp_speed_limit_until: Option<DateTime<Utc>>,
        blocked_manual: bool,
        blocked_until: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        validate_speed("speedLimitBps", speed_limit_bps)?;
        validate_speed("tempSpeedLimitBps", temp_speed_limit_bps)?;

        if temp_speed_limit_bps.is_some() && temp_speed_limit_until.is_none() {
            return Err(Error::malformed("tempSpeedLimitBps requires tempSpeedLimitUntil"));
        }

        Ok(Self { speed_limit_bps, temp_speed_limit_bps, temp_speed_limit_until, blocked_manual, blocked_until })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn manual_speed_limit(speed_limit_bps: f64) -> Result<Self> {
        Self::new(Some(speed_limit_bps), None, None, false, None)
    }

    pub fn temporary_speed_limit(speed_limit_bps: f64, until: DateTime<Utc>) -> Result<Self> {
        Self::new(None, Some(speed_limit_bps), Some(until), false, None)
    }

    pub fn manual_block() -> Self {
        Self { blocked_manual: true, ..Self::default() }
    }

    pub fn block_until(until: DateTime<Utc>) -> Self {
        Self { blocked_until: Some(until), ..Self::default() }
    }

    pub fn speed_limit_bps(&self) -> Option<f64> {
        self.speed_limit_bps
    }

    pub fn temp_speed_limit_bps(&self) -> Option<f64> {
        self.temp_speed_limit_bps
    }

    pub fn temp_speed_limit_until(&self) -> Option<DateTime<Utc>> {
        self.temp_speed_limit_until
    }

    pub fn blocked_manual(&self) -> bool {
        self.blocked_manual
    }

    pub fn blocked_until(&self) -> Option<DateTime<Utc>> {
        self.blocked_until
    }

    /// True when no field is set. Empty overrides may be deleted by persistence.
    ///
    /// An expired `blocked_until` still counts as set; only the owner clears it.
    pub fn is_empty(&self) -> bool {
        self.speed_limit_bps.is_none() && self.temp_speed_limit_bps.is_none() && !self.blocked_manual && self.blocked_until.is_none()
    }

    pub fn is_blocked_at(&self, now: DateTime<Utc>) -> bool {
        self.blocked_manual || self.blocked_until.is_some_and(|until| until > now)
    }

    /// Speed cap imposed by this override at `now`, if any.
    pub fn speed_limit_at(&self, now: DateTime<Utc>) -> Option<f64> {
        if let Some(limit) = self.speed_limit_bps {
            return Some(limit);
        }

        match (self.temp_speed_limit_bps, self.temp_speed_limit_until) {
            (Some(limit), Some(until)) if until > now => Some(limit),
            _ => None,
        }
    }
}

/// Merges base attributes with an optional override at `now`.
pub fn resolve_effective(base_speed_limit_bps: f64, edge_override: Option<&EdgeOverride>, now: DateTime<Utc>) -> EffectiveEdgeState {
    match edge_override {
        None => EffectiveEdgeState { speed_limit_bps: base_speed_limit_bps, blocked: false },
        Some(ovr) => EffectiveEdgeState {
            speed_limit_bps: ovr.speed_limit_at(now).unwrap_or(base_speed_limit_bps),
            blocked: ovr.is_blocked_at(now),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn rejects_temp_limit_without_expiry() {
        let result = EdgeOverride::new(None, Some(4.0), None, false, None);
        assert!(matches!(result, Err(Error::MalformedInput(_))));
    }

    #[test]
    fn rejects_non_positive_and_non_finite_speeds() {
        assert!(EdgeOverride::manual_speed_limit(0.0).is_err());
        assert!(EdgeOverride::manual_speed_limit(-3.0).is_err());
        assert!(EdgeOverride::manual_speed_limit(f64::NAN).is_err());
        assert!(EdgeOverride::temporary_speed_limit(f64::INFINITY, t0()).is_err());
    }

    #[test]
    fn emptiness_tracks_active_fields() {
        assert!(EdgeOverride::empty().is_empty());
        assert!(!EdgeOverride::manual_block().is_empty());
        assert!(!EdgeOverride::block_until(t0()).is_empty());
        assert!(!EdgeOverride::manual_speed_limit(5.0).unwrap().is_empty());
        assert!(!EdgeOverride::temporary_speed_limit(5.0, t0()).unwrap().is_empty());
    }

    #[test]
    fn manual_limit_wins_over_temporary() {
        let ovr = EdgeOverride::new(Some(3.0), Some(7.0), Some(t0() + Duration::minutes(5)), false, None).unwrap();
        let state = resolve_effective(10.0, Some(&ovr), t0());

        assert_eq!(state.speed_limit_bps, 3.0);
        assert!(!state.blocked);
    }

    #[test]
    fn temporary_limit_and_block_expire() {
        let until = t0() + Duration::seconds(30);
        let limit = EdgeOverride::temporary_speed_limit(4.0, until).unwrap();
        let block = EdgeOverride::block_until(until);

        assert_eq!(resolve_effective(10.0, Some(&limit), t0()).speed_limit_bps, 4.0);
        assert_eq!(resolve_effective(10.0, Some(&limit), until).speed_limit_bps, 10.0);
        assert!(resolve_effective(10.0, Some(&block), t0()).blocked);
        assert!(!resolve_effective(10.0, Some(&block), until).blocked);
    }
}
