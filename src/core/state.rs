use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a session participant (conductor or follower)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to the media played in a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    /// Asset identifier
    pub id: String,
    /// Location the device loads the media from
    pub url: String,
}

impl AssetRef {
    pub fn new(id: &str, url: &str) -> Self {
        Self {
            id: id.to_string(),
            url: url.to_string(),
        }
    }
}

/// The play/pause triple carried by play-state commands and events
///
/// Only one of `start_offset` / `paused_time` is meaningful, selected by
/// `is_playing`. The other field is carried as-is and ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayState {
    pub is_playing: bool,
    /// Session time (ms) at which media position 0 occurred
    pub start_offset: Option<i64>,
    /// Media position (seconds) playback is frozen at
    pub paused_time: Option<f64>,
}

impl PlayState {
    /// Playing, with media position 0 anchored at `start_offset`
    pub fn playing(start_offset: i64) -> Self {
        Self {
            is_playing: true,
            start_offset: Some(start_offset),
            paused_time: None,
        }
    }

    /// Paused at `position_sec`
    pub fn paused(position_sec: f64) -> Self {
        Self {
            is_playing: false,
            start_offset: None,
            paused_time: Some(position_sec),
        }
    }
}

impl Default for PlayState {
    fn default() -> Self {
        Self::paused(0.0)
    }
}

/// The single replicated playback state of a session
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub is_playing: bool,
    pub start_offset: Option<i64>,
    pub paused_time: Option<f64>,
    /// Active media, `None` until the conductor assigns one
    pub asset: Option<AssetRef>,
}

impl PlaybackState {
    /// Fresh state for a newly assigned asset: paused at 0
    pub fn for_asset(asset: AssetRef) -> Self {
        Self {
            is_playing: false,
            start_offset: None,
            paused_time: Some(0.0),
            asset: Some(asset),
        }
    }

    /// The play/pause triple of this state
    pub fn play_state(&self) -> PlayState {
        PlayState {
            is_playing: self.is_playing,
            start_offset: self.start_offset,
            paused_time: self.paused_time,
        }
    }

    /// Replace the play/pause triple, keeping the asset
    pub fn with_play_state(&self, play_state: &PlayState) -> Self {
        Self {
            is_playing: play_state.is_playing,
            start_offset: play_state.start_offset,
            paused_time: play_state.paused_time,
            asset: self.asset.clone(),
        }
    }

    /// Media position (seconds, unwrapped) implied by this state at `now_ms`
    pub fn position_at(&self, now_ms: i64) -> f64 {
        if self.is_playing {
            match self.start_offset {
                Some(start) => (now_ms - start) as f64 / 1000.0,
                None => 0.0,
            }
        } else {
            self.paused_time.unwrap_or(0.0)
        }
    }
}
