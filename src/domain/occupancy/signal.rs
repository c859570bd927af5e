use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Advisory aspect shown to a train for a claimed resource.
///
/// Ordered by restrictiveness: `Proceed < Caution < ProceedWithCaution < Unknown < Stop`.
/// An unknown aspect is treated as more restrictive than any proceed aspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalAspect {
    Proceed,
    Caution,
    ProceedWithCaution,
    Stop,
    Unknown,
}

impl SignalAspect {
    fn restrictiveness(&self) -> u8 {
        match self {
            SignalAspect::Proceed => 0,
            SignalAspect::Caution => 1,
            SignalAspect::ProceedWithCaution => 2,
            SignalAspect::Unknown => 3,
            SignalAspect::Stop => 4,
        }
    }

    /// The more restrictive of two aspects.
    pub fn worst(self, other: SignalAspect) -> SignalAspect {
        if other > self { other } else { self }
    }

    pub fn allows_movement(&self) -> bool {
        !matches!(self, SignalAspect::Stop | SignalAspect::Unknown)
    }
}

impl PartialOrd for SignalAspect {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SignalAspect {
    fn cmp(&self, other: &Self) -> Ordering {
        self.restrictiveness().cmp(&other.restrictiveness())
    }
}

/// Tunable thresholds turning occupancy geometry into an aspect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalPolicy {
    /// Beyond braking distance, an occupied block closer than this yields `ProceedWithCaution`.
    pub caution_distance_blocks: f64,
    /// Added to the braking distance before an occupied block ahead forces `Stop`.
    pub braking_margin_blocks: f64,
}

impl Default for SignalPolicy {
    fn default() -> Self {
        Self { caution_distance_blocks: 64.0, braking_margin_blocks: 8.0 }
    }
}

/// What the scheduling collaborator knows about the track ahead of a train.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SignalInputs {
    /// Distance to the next resource held by another train, if any.
    pub blocks_to_occupied: Option<f64>,
    pub braking_distance_blocks: f64,
    /// The train is approaching a component with a caution speed cap.
    pub in_caution_zone: bool,
}

impl SignalPolicy {
    /// Worst aspect among all applicable conditions.
    pub fn resolve(&self, inputs: &SignalInputs) -> SignalAspect {
        let mut aspect = SignalAspect::Proceed;

        if inputs.in_caution_zone {
            aspect = aspect.worst(SignalAspect::Caution);
        }

        if let Some(distance) = inputs.blocks_to_occupied {
            if !distance.is_finite() || !inputs.braking_distance_blocks.is_finite() {
                return aspect.worst(SignalAspect::Unknown);
            }

            let stop_threshold = inputs.braking_distance_blocks + self.braking_margin_blocks;
            if distance <= stop_threshold {
                aspect = aspect.worst(SignalAspect::Stop);
            } else if distance <= stop_threshold + self.caution_distance_blocks {
                aspect = aspect.worst(SignalAspect::ProceedWithCaution);
            }
        }

        aspect
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_runs_from_proceed_to_stop() {
        assert!(SignalAspect::Proceed < SignalAspect::Caution);
        assert!(SignalAspect::Caution < SignalAspect::ProceedWithCaution);
        assert!(SignalAspect::ProceedWithCaution < SignalAspect::Stop);
        assert_eq!(SignalAspect::Caution.worst(SignalAspect::Stop), SignalAspect::Stop);
        assert_eq!([SignalAspect::Proceed, SignalAspect::Caution].into_iter().max(), Some(SignalAspect::Caution));
    }

    #[test]
    fn policy_picks_most_restrictive_condition() {
        let policy = SignalPolicy { caution_distance_blocks: 50.0, braking_margin_blocks: 5.0 };

        let clear = SignalInputs { blocks_to_occupied: None, braking_distance_blocks: 20.0, in_caution_zone: false };
        assert_eq!(policy.resolve(&clear), SignalAspect::Proceed);

        let zone = SignalInputs { in_caution_zone: true, ..clear };
        assert_eq!(policy.resolve(&zone), SignalAspect::Caution);

        let close = SignalInputs { blocks_to_occupied: Some(24.0), in_caution_zone: true, ..clear };
        assert_eq!(policy.resolve(&close), SignalAspect::Stop);

        let ahead = SignalInputs { blocks_to_occupied: Some(60.0), ..clear };
        assert_eq!(policy.resolve(&ahead), SignalAspect::ProceedWithCaution);

        let far = SignalInputs { blocks_to_occupied: Some(500.0), ..clear };
        assert_eq!(policy.resolve(&far), SignalAspect::Proceed);
    }
}
