use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionDto {
    pub accel_bps2: f64,
    pub decel_bps2: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalPolicyDto {
    pub caution_distance_blocks: f64,
    pub braking_margin_blocks: f64,
}

/// Dispatch tuning as read from the host's configuration file. Every field is optional,
/// missing values fall back to `DispatchConfig::default()`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchConfigDto {
    pub fallback_speed_bps: Option<f64>,
    pub default_motion: Option<MotionDto>,
    #[serde(default)]
    pub train_types: HashMap<String, MotionDto>,
    pub eta_cache_ttl_ms: Option<i64>,
    pub wait_penalty_sec_per_position: Option<i64>,
    pub signal: Option<SignalPolicyDto>,
    #[serde(default)]
    pub caution_speed_by_component: HashMap<String, f64>,
}
