use chrono::Duration;
use std::collections::HashMap;
use std::path::Path;

use crate::api::config_dto::{DispatchConfigDto, MotionDto};
use crate::domain::occupancy::signal::SignalPolicy;
use crate::domain::timing::motion::MotionParams;
use crate::domain::utils::id::NodeId;
use crate::error::{Error, Result};
use crate::loader::parser::parse_json_file;

/// Validated dispatch tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    /// Cruise speed for edges without an effective limit.
    pub fallback_speed_bps: f64,
    pub default_motion: MotionParams,
    pub train_types: HashMap<String, MotionParams>,
    pub eta_cache_ttl: Duration,
    /// ETA seconds added per rank a train waits in a resource queue.
    pub wait_penalty_sec_per_position: i64,
    pub signal_policy: SignalPolicy,
    /// Caution speed cap per component key.
    pub caution_speed_by_component: HashMap<NodeId, f64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            fallback_speed_bps: 6.0,
            default_motion: MotionParams::default(),
            train_types: HashMap::new(),
            eta_cache_ttl: Duration::seconds(1),
            wait_penalty_sec_per_position: 15,
            signal_policy: SignalPolicy::default(),
            caution_speed_by_component: HashMap::new(),
        }
    }
}

impl DispatchConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let dto: DispatchConfigDto = parse_json_file(path)?;
        let config = DispatchConfig::try_from(dto)?;
        log::info!("Dispatch configuration loaded ({} train types).", config.train_types.len());
        Ok(config)
    }

    /// Motion parameters for a train type, the defaults for unknown or missing types.
    pub fn motion_for(&self, train_type: Option<&str>) -> MotionParams {
        train_type.and_then(|t| self.train_types.get(t)).copied().unwrap_or(self.default_motion)
    }

    pub fn caution_speed(&self, component_key: &NodeId) -> Option<f64> {
        self.caution_speed_by_component.get(component_key).copied()
    }
}

fn motion_from_dto(dto: &MotionDto) -> Result<MotionParams> {
    MotionParams::new(dto.accel_bps2, dto.decel_bps2)
}

fn positive(field: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 { Ok(value) } else { Err(Error::malformed(format!("{} must be finite and > 0, got {}", field, value))) }
}

fn non_negative(field: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 { Ok(value) } else { Err(Error::malformed(format!("{} must be finite and >= 0, got {}", field, value))) }
}

impl TryFrom<DispatchConfigDto> for DispatchConfig {
    type Error = Error;

    fn try_from(dto: DispatchConfigDto) -> Result<Self> {
        let defaults = DispatchConfig::default();

        let fallback_speed_bps = match dto.fallback_speed_bps {
            Some(speed) => positive("fallbackSpeedBps", speed)?,
            None => defaults.fallback_speed_bps,
        };

        let default_motion = match &dto.default_motion {
            Some(motion) => motion_from_dto(motion)?,
            None => defaults.default_motion,
        };

        let mut train_types = HashMap::with_capacity(dto.train_types.len());
        for (name, motion) in &dto.train_types {
            let params = motion_from_dto(motion).map_err(|e| Error::malformed(format!("train type '{}': {}", name, e)))?;
            train_types.insert(name.clone(), params);
        }

        let eta_cache_ttl = match dto.eta_cache_ttl_ms {
            Some(ms) if ms < 0 => return Err(Error::malformed(format!("etaCacheTtlMs must be >= 0, got {}", ms))),
            Some(ms) => Duration::milliseconds(ms),
            None => defaults.eta_cache_ttl,
        };

        let wait_penalty_sec_per_position = match dto.wait_penalty_sec_per_position {
            Some(secs) if secs < 0 => return Err(Error::malformed(format!("waitPenaltySecPerPosition must be >= 0, got {}", secs))),
            Some(secs) => secs,
            None => defaults.wait_penalty_sec_per_position,
        };

        let signal_policy = match &dto.signal {
            Some(signal) => SignalPolicy {
                caution_distance_blocks: non_negative("signal.cautionDistanceBlocks", signal.caution_distance_blocks)?,
                braking_margin_blocks: non_negative("signal.brakingMarginBlocks", signal.braking_margin_blocks)?,
            },
            None => defaults.signal_policy,
        };

        let mut caution_speed_by_component = HashMap::with_capacity(dto.caution_speed_by_component.len());
        for (key, speed) in dto.caution_speed_by_component {
            let speed = positive(&format!("cautionSpeedByComponent[{}]", key), speed)?;
            caution_speed_by_component.insert(NodeId::new(key), speed);
        }

        Ok(DispatchConfig {
            fallback_speed_bps,
            default_motion,
            train_types,
            eta_cache_ttl,
            wait_penalty_sec_per_position,
            signal_policy,
            caution_speed_by_component,
        })
    }
}
