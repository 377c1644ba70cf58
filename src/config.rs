//! Tunable constants for the correction loop and the session plumbing.
//!
//! Every field has a default, so a config file only needs to name the values
//! it overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variable pointing at an explicit config file
pub const CONFIG_ENV: &str = "LOCKSTEP_CONFIG";

/// Constants of the drift-correction control loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Lead added to the expected position when playback starts (seconds)
    pub fixed_lead_sec: f64,
    /// Weight of the newest sample in the exponential smoothing
    pub smoothing: f64,
    /// Smoothed drift above which a hard seek is considered (ms)
    pub jump_threshold_ms: f64,
    /// Minimum time between two hard seeks (ms)
    pub jump_cooldown_ms: i64,
    /// Added to the jump target to compensate the seek's own latency (seconds)
    pub lost_time_compensation_sec: f64,
    /// Minimum time between two rate changes (ms)
    pub rate_adjust_interval_ms: i64,
    /// Drift below which an existing boost may be removed (ms)
    pub hysteresis_ms: f64,
    /// Distance from the end of the media at which the jump cooldown is cleared (seconds)
    pub loop_end_window_sec: f64,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            fixed_lead_sec: 0.1,
            smoothing: 0.3,
            jump_threshold_ms: 500.0,
            jump_cooldown_ms: 10_000,
            lost_time_compensation_sec: 0.2,
            rate_adjust_interval_ms: 3_000,
            hysteresis_ms: 25.0,
            loop_end_window_sec: 1.5,
        }
    }
}

/// Session-wide configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub correction: CorrectionConfig,
    /// Interval between correction passes on a follower (ms)
    pub tick_interval_ms: u64,
    /// Interval between status ticks broadcast by the session (ms)
    pub status_tick_ms: u64,
    /// Gain a device starts playback at before the first correction pass
    pub startup_gain: f64,
    /// Seeks are clamped to at most `duration - end_guard_sec`
    pub end_guard_sec: f64,
    /// Number of recent log entries kept for catching up lagging followers
    pub log_capacity: usize,
    /// Capacity of the drift report queue towards the collector
    pub diagnostics_queue: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            correction: CorrectionConfig::default(),
            tick_interval_ms: 900,
            status_tick_ms: 1_000,
            startup_gain: 0.0,
            end_guard_sec: 0.3,
            log_capacity: 256,
            diagnostics_queue: 256,
        }
    }
}

impl SyncConfig {
    /// Default location of the config file
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|p| p.join("lockstep").join("config.json"))
    }

    /// Load the config from its default location, falling back to defaults
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if path.exists() {
                match Self::load_from(&path) {
                    Ok(config) => {
                        debug!("Loaded config from {}", path.display());
                        return config;
                    }
                    Err(e) => warn!("Ignoring config {}: {:#}", path.display(), e),
                }
            }
        }
        Self::default()
    }

    /// Load the config from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn status_tick(&self) -> Duration {
        Duration::from_millis(self.status_tick_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"tick_interval_ms": 500, "correction": {"jump_threshold_ms": 800.0}}"#).unwrap();
        assert_eq!(config.tick_interval_ms, 500);
        assert_eq!(config.correction.jump_threshold_ms, 800.0);
        assert_eq!(config.correction.smoothing, 0.3);
        assert_eq!(config.status_tick_ms, 1_000);
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let result = SyncConfig::load_from(Path::new("/nonexistent/lockstep.json"));
        assert!(result.is_err());
    }
}
