use serde::{Deserialize, Serialize};

/// One drift measurement taken by a follower
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftSample {
    /// Position implied by shared state and session time (seconds)
    pub expected_position_sec: f64,
    /// Position reported by the local device (seconds)
    pub actual_position_sec: f64,
    /// `(actual - expected) * 1000`, positive when local playback is ahead
    pub diff_ms: f64,
    /// Smoothed drift after this sample, `None` right after a jump
    pub smoothed_diff_ms: Option<f64>,
    /// Sample was treated as a loop-boundary artifact and not smoothed
    pub discarded: bool,
}

/// Percent adjustment of the local playback rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RateBoost(i8);

impl RateBoost {
    pub const NONE: RateBoost = RateBoost(0);

    /// The only percentages the corrector may apply
    pub const ALLOWED: [i8; 7] = [-5, -3, -1, 0, 1, 3, 5];

    /// Build a boost from a percentage, rejecting values outside the allowed set
    pub fn from_percent(percent: i8) -> Option<Self> {
        Self::ALLOWED.contains(&percent).then_some(Self(percent))
    }

    /// Boost that counters `smoothed_ms` of drift, ignoring hysteresis
    pub fn for_drift(smoothed_ms: f64) -> Self {
        let magnitude = smoothed_ms.abs();
        let percent = if magnitude > 300.0 {
            5
        } else if magnitude > 150.0 {
            3
        } else if magnitude > 50.0 {
            1
        } else {
            0
        };
        // ahead (positive drift) slows down, behind speeds up
        if smoothed_ms > 0.0 {
            Self(-percent)
        } else {
            Self(percent)
        }
    }

    pub fn percent(&self) -> i8 {
        self.0
    }

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }

    /// Playback rate multiplier
    pub fn rate(&self) -> f64 {
        1.0 + self.0 as f64 / 100.0
    }

    pub fn signum(&self) -> i8 {
        self.0.signum()
    }
}

/// Time of the last hard seek correction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpRecord {
    pub timestamp_ms: i64,
}
