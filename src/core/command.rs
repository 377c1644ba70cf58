use serde::{Deserialize, Serialize};

use crate::core::state::{AssetRef, PlayState, PlaybackState};

/// A write to the replicated playback state (conductor → store)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", rename_all = "kebab-case")]
pub enum Command {
    /// Assign new media; resets the state to paused at 0
    SetAssets { asset: AssetRef },
    /// Replace the play/pause triple wholesale
    SetPlayState(PlayState),
    /// Re-anchor a running playback without a full state replace
    #[serde(rename_all = "camelCase")]
    SetStartOffset { start_offset: i64 },
}

/// A change notification produced by applying a command (store → followers)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", rename_all = "kebab-case")]
pub enum StoreEvent {
    AssetsChanged { asset: AssetRef },
    PlayStateChanged(PlayState),
    #[serde(rename_all = "camelCase")]
    StartOffsetChanged { start_offset: i64 },
}

/// A command with its position in the session's total order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub seq: u64,
    pub command: Command,
}

/// Pure transition function run identically by every replica
pub fn apply(state: &PlaybackState, command: &Command) -> (PlaybackState, Option<StoreEvent>) {
    match command {
        Command::SetAssets { asset } => (
            PlaybackState::for_asset(asset.clone()),
            Some(StoreEvent::AssetsChanged { asset: asset.clone() }),
        ),
        Command::SetPlayState(play_state) => (
            state.with_play_state(play_state),
            Some(StoreEvent::PlayStateChanged(play_state.clone())),
        ),
        Command::SetStartOffset { start_offset } => {
            if !state.is_playing {
                return (state.clone(), None);
            }
            let mut next = state.clone();
            next.start_offset = Some(*start_offset);
            (next, Some(StoreEvent::StartOffsetChanged { start_offset: *start_offset }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset() -> AssetRef {
        AssetRef::new("X", "file://x.mp4")
    }

    #[test]
    fn test_set_assets_resets_state() {
        let playing = PlaybackState::for_asset(asset()).with_play_state(&PlayState::playing(500));
        let other = AssetRef::new("Y", "file://y.mp4");
        let (next, event) = apply(&playing, &Command::SetAssets { asset: other.clone() });

        assert!(!next.is_playing);
        assert_eq!(next.start_offset, None);
        assert_eq!(next.paused_time, Some(0.0));
        assert_eq!(next.asset, Some(other.clone()));
        assert_eq!(event, Some(StoreEvent::AssetsChanged { asset: other }));
    }

    #[test]
    fn test_set_play_state_replaces_triple() {
        let state = PlaybackState::for_asset(asset());
        let (next, event) = apply(&state, &Command::SetPlayState(PlayState::playing(7_000)));

        assert!(next.is_playing);
        assert_eq!(next.start_offset, Some(7_000));
        assert_eq!(next.paused_time, None);
        assert_eq!(next.asset, Some(asset()));
        assert_eq!(event, Some(StoreEvent::PlayStateChanged(PlayState::playing(7_000))));
    }

    #[test]
    fn test_set_start_offset_ignored_while_paused() {
        let state = PlaybackState::for_asset(asset());
        let (next, event) = apply(&state, &Command::SetStartOffset { start_offset: 1 });
        assert_eq!(next, state);
        assert!(event.is_none());
    }

    #[test]
    fn test_set_start_offset_while_playing() {
        let state = PlaybackState::for_asset(asset()).with_play_state(&PlayState::playing(1_000));
        let (next, event) = apply(&state, &Command::SetStartOffset { start_offset: 1_040 });
        assert_eq!(next.start_offset, Some(1_040));
        assert!(next.is_playing);
        assert_eq!(event, Some(StoreEvent::StartOffsetChanged { start_offset: 1_040 }));
    }

    #[test]
    fn test_command_wire_format() {
        let json = serde_json::to_value(Command::SetStartOffset { start_offset: 5 }).unwrap();
        assert_eq!(json["topic"], "set-start-offset");
        assert_eq!(json["startOffset"], 5);

        let json = serde_json::to_value(StoreEvent::PlayStateChanged(PlayState::paused(1.5))).unwrap();
        assert_eq!(json["topic"], "play-state-changed");
        assert_eq!(json["pausedTime"], 1.5);
    }
}
