use async_trait::async_trait;
use crate::core::AssetRef;
use std::error::Error;

/// Result type for media device operations
pub type MediaResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Lifecycle of a media device
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceStatus {
    /// Created, `load` not yet resolved
    Loading,
    /// Duration and seek capability are known
    Ready,
    /// `load` failed
    Failed,
    /// Resources released
    Disposed,
}

/// Trait for playable media elements
///
/// One device wraps the media of one asset. Implementations:
/// - Platform playback engines (outside this crate)
/// - [`SimulatedMediaDevice`](super::SimulatedMediaDevice) for tests and demos
#[async_trait]
pub trait MediaDevice: Send {
    /// Current lifecycle status
    fn status(&self) -> DeviceStatus;

    /// Load the media; resolves once duration and seeking are available
    async fn load(&mut self, url: &str) -> MediaResult<()>;

    /// Seek to `position_sec` (wrapped, end-guarded) and start playback
    ///
    /// Returns `Ok(false)` when the platform refused to start without a user
    /// gesture; the device is then blocked until the next `pause` or a
    /// successful `play`.
    async fn play(&mut self, position_sec: f64) -> MediaResult<bool>;

    /// Stop playback, optionally seeking; clears the blocked state
    fn pause(&mut self, position_sec: Option<f64>);

    /// Seek without changing play/pause (wrapped, end-guarded)
    fn seek(&mut self, position_sec: f64);

    /// Continuous playback speed multiplier
    fn set_rate(&mut self, multiplier: f64);

    /// Output gain, 1.0 is nominal
    fn set_volume(&mut self, gain: f64);

    /// Current media position (seconds)
    fn current_position(&self) -> f64;

    /// Media duration (seconds), 0.0 until loaded
    fn duration(&self) -> f64;

    fn is_playing(&self) -> bool;

    fn is_blocked(&self) -> bool;

    /// Release playback resources; calling it again is a no-op
    fn dispose(&mut self);
}

/// Creates a fresh device for each asset a follower has to play
pub trait DeviceFactory: Send + Sync {
    fn create(&self, asset: &AssetRef) -> Box<dyn MediaDevice>;
}

/// Map a requested position into a seekable one
///
/// Positions are wrapped into `[0, duration)` for looping media, then kept
/// at least `end_guard_sec` before the end, where some engines misbehave.
pub fn guard_seek(position_sec: f64, duration_sec: f64, end_guard_sec: f64) -> f64 {
    if duration_sec.is_nan() || duration_sec <= 0.0 || !position_sec.is_finite() {
        return 0.0;
    }
    let wrapped = position_sec.rem_euclid(duration_sec);
    let limit = (duration_sec - end_guard_sec).max(0.0);
    wrapped.min(limit)
}
