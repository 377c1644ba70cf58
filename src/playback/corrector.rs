//! Drift-correction control loop of a follower.
//!
//! Each pass compares the device position with the position implied by the
//! shared state and session time, smooths the difference, and decides on at
//! most one correction: a hard seek for large drift (rate limited by a
//! cooldown) or a small playback-rate boost otherwise (rate limited by an
//! adjustment interval and stabilized by hysteresis).
//!
//! The corrector never touches a device itself; it returns a [`Correction`]
//! for the caller to apply, so it can be driven with synthetic values.

use crate::config::CorrectionConfig;
use crate::core::{DriftSample, JumpRecord, RateBoost};

/// What a correction pass asks the device to do
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    /// Nothing to change
    Hold,
    /// Hard seek to `target_sec`
    Jump { target_sec: f64 },
    /// Switch playback rate to this boost
    Rate(RateBoost),
}

/// Result of one correction pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassOutcome {
    pub sample: DriftSample,
    pub correction: Correction,
    /// This was the first pass since playback started: restore nominal gain
    pub restore_gain: bool,
}

/// Position (seconds) implied by `start_offset_ms` at `now_ms`, wrapped into the media
pub fn expected_position(now_ms: i64, start_offset_ms: i64, duration_sec: f64) -> f64 {
    let elapsed = (now_ms - start_offset_ms) as f64 / 1000.0;
    if duration_sec > 0.0 {
        elapsed.rem_euclid(duration_sec)
    } else {
        elapsed
    }
}

#[derive(Debug, Clone)]
pub struct DriftCorrector {
    config: CorrectionConfig,
    smoothed_ms: Option<f64>,
    last_jump: Option<JumpRecord>,
    last_rate_adjust_ms: Option<i64>,
    boost: RateBoost,
    passes: u64,
}

impl DriftCorrector {
    pub fn new(config: CorrectionConfig) -> Self {
        Self {
            config,
            smoothed_ms: None,
            last_jump: None,
            last_rate_adjust_ms: None,
            boost: RateBoost::NONE,
            passes: 0,
        }
    }

    /// Clear all drift bookkeeping (playback started, stopped, or new media)
    pub fn reset(&mut self) {
        self.smoothed_ms = None;
        self.last_jump = None;
        self.last_rate_adjust_ms = None;
        self.boost = RateBoost::NONE;
        self.passes = 0;
    }

    pub fn config(&self) -> &CorrectionConfig {
        &self.config
    }

    pub fn smoothed_ms(&self) -> Option<f64> {
        self.smoothed_ms
    }

    pub fn boost(&self) -> RateBoost {
        self.boost
    }

    pub fn last_jump(&self) -> Option<JumpRecord> {
        self.last_jump
    }

    /// Position to start playback at when entering the playing state
    pub fn start_position(&self, now_ms: i64, start_offset_ms: i64) -> f64 {
        (now_ms - start_offset_ms) as f64 / 1000.0 + self.config.fixed_lead_sec
    }

    /// Run one correction pass
    pub fn pass(&mut self, now_ms: i64, start_offset_ms: i64, actual_sec: f64, duration_sec: f64) -> PassOutcome {
        let restore_gain = self.passes == 0;
        self.passes += 1;

        let expected = expected_position(now_ms, start_offset_ms, duration_sec);
        let diff_sec = actual_sec - expected;
        let diff_ms = diff_sec * 1000.0;

        // a difference of half the media or more is the loop boundary, not drift
        let discarded = duration_sec <= 0.0 || diff_sec.abs() >= duration_sec / 2.0;
        if !discarded {
            let alpha = self.config.smoothing;
            self.smoothed_ms = Some(match self.smoothed_ms {
                Some(prev) => alpha * diff_ms + (1.0 - alpha) * prev,
                None => diff_ms,
            });
        }

        let correction = if discarded {
            Correction::Hold
        } else {
            if actual_sec >= duration_sec - self.config.loop_end_window_sec {
                self.last_jump = None;
            }
            match self.smoothed_ms {
                Some(smoothed) => self.decide(now_ms, actual_sec, smoothed),
                None => Correction::Hold,
            }
        };

        PassOutcome {
            sample: DriftSample {
                expected_position_sec: expected,
                actual_position_sec: actual_sec,
                diff_ms,
                smoothed_diff_ms: self.smoothed_ms,
                discarded,
            },
            correction,
            restore_gain,
        }
    }

    fn decide(&mut self, now_ms: i64, actual_sec: f64, smoothed: f64) -> Correction {
        let jump_ready = self
            .last_jump
            .map_or(true, |j| now_ms - j.timestamp_ms >= self.config.jump_cooldown_ms);
        if smoothed.abs() > self.config.jump_threshold_ms && jump_ready {
            let target_sec = actual_sec - smoothed / 1000.0 + self.config.lost_time_compensation_sec;
            self.smoothed_ms = None;
            self.last_jump = Some(JumpRecord { timestamp_ms: now_ms });
            return Correction::Jump { target_sec };
        }

        let rate_ready = self
            .last_rate_adjust_ms
            .map_or(true, |t| now_ms - t >= self.config.rate_adjust_interval_ms);
        if !rate_ready {
            return Correction::Hold;
        }

        let mut boost = RateBoost::for_drift(smoothed);
        let drift_sign = if smoothed > 0.0 { 1 } else if smoothed < 0.0 { -1 } else { 0 };
        // keep correcting until the drift falls below the hysteresis threshold
        if boost.is_none()
            && !self.boost.is_none()
            && self.boost.signum() == -drift_sign
            && smoothed.abs() >= self.config.hysteresis_ms
        {
            boost = self.boost;
        }
        self.boost = boost;
        self.last_rate_adjust_ms = Some(now_ms);
        Correction::Rate(boost)
    }
}

impl Default for DriftCorrector {
    fn default() -> Self {
        Self::new(CorrectionConfig::default())
    }
}
