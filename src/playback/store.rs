use crate::core::{apply, Command, LogEntry, PlaybackState, StoreEvent};
use crate::error::{Result, SyncError};
use tracing::debug;

/// One participant's replica of the session playback state
///
/// Entries must be applied in log order. Re-delivered entries are ignored;
/// an entry past the next expected sequence number is reported as a gap so
/// the caller can catch up before applying anything else.
#[derive(Debug, Clone, Default)]
pub struct PlaybackStateStore {
    state: PlaybackState,
    last_seq: u64,
}

impl PlaybackStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replica seeded from a snapshot taken at `seq`
    pub fn from_snapshot(seq: u64, state: PlaybackState) -> Self {
        Self { state, last_seq: seq }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Sequence number of the last applied entry (0 before any)
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Apply the next entry of the log
    pub fn apply_entry(&mut self, entry: &LogEntry) -> Result<Option<StoreEvent>> {
        if entry.seq <= self.last_seq {
            debug!("Ignoring duplicate log entry {}", entry.seq);
            return Ok(None);
        }
        let expected = self.last_seq + 1;
        if entry.seq != expected {
            return Err(SyncError::SequenceGap {
                expected,
                got: entry.seq,
            });
        }
        let event = self.apply_command(&entry.command);
        self.last_seq = entry.seq;
        Ok(event)
    }

    /// Apply a command outside of sequence tracking
    pub fn apply_command(&mut self, command: &Command) -> Option<StoreEvent> {
        let (next, event) = apply(&self.state, command);
        self.state = next;
        event
    }

    /// Replace the replica with a snapshot, returning the events that move
    /// a consumer from the old state to the new one
    pub fn restore(&mut self, seq: u64, state: PlaybackState) -> Vec<StoreEvent> {
        let asset_changed = self.state.asset != state.asset;
        self.state = state;
        self.last_seq = seq;
        if asset_changed {
            self.snapshot_events()
        } else {
            vec![StoreEvent::PlayStateChanged(self.state.play_state())]
        }
    }

    /// Events that bring a fresh consumer to the current state
    pub fn snapshot_events(&self) -> Vec<StoreEvent> {
        let mut events = Vec::with_capacity(2);
        if let Some(asset) = &self.state.asset {
            events.push(StoreEvent::AssetsChanged { asset: asset.clone() });
            events.push(StoreEvent::PlayStateChanged(self.state.play_state()));
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AssetRef, PlayState};

    fn entry(seq: u64, command: Command) -> LogEntry {
        LogEntry { seq, command }
    }

    fn assets() -> Command {
        Command::SetAssets {
            asset: AssetRef::new("X", "sim://x"),
        }
    }

    #[test]
    fn test_apply_in_order() {
        let mut store = PlaybackStateStore::new();
        let event = store.apply_entry(&entry(1, assets())).unwrap();
        assert!(matches!(event, Some(StoreEvent::AssetsChanged { .. })));

        let event = store
            .apply_entry(&entry(2, Command::SetPlayState(PlayState::playing(100))))
            .unwrap();
        assert_eq!(event, Some(StoreEvent::PlayStateChanged(PlayState::playing(100))));
        assert_eq!(store.last_seq(), 2);
        assert!(store.state().is_playing);
    }

    #[test]
    fn test_duplicate_entry_ignored() {
        let mut store = PlaybackStateStore::new();
        store.apply_entry(&entry(1, assets())).unwrap();
        store
            .apply_entry(&entry(2, Command::SetPlayState(PlayState::playing(100))))
            .unwrap();

        let event = store.apply_entry(&entry(1, assets())).unwrap();
        assert!(event.is_none());
        assert!(store.state().is_playing);
    }

    #[test]
    fn test_gap_reported() {
        let mut store = PlaybackStateStore::new();
        let result = store.apply_entry(&entry(3, assets()));
        assert!(matches!(result, Err(SyncError::SequenceGap { expected: 1, got: 3 })));
        assert_eq!(store.last_seq(), 0);
    }

    #[test]
    fn test_replicas_converge() {
        let log = vec![
            entry(1, assets()),
            entry(2, Command::SetPlayState(PlayState::playing(1_000))),
            entry(3, Command::SetStartOffset { start_offset: 1_020 }),
            entry(4, Command::SetPlayState(PlayState::paused(12.5))),
            entry(5, Command::SetStartOffset { start_offset: 9 }),
        ];
        let mut a = PlaybackStateStore::new();
        let mut b = PlaybackStateStore::new();
        for e in &log {
            a.apply_entry(e).unwrap();
            b.apply_entry(e).unwrap();
        }
        assert_eq!(a.state(), b.state());
        assert_eq!(a.state().paused_time, Some(12.5));
    }

    #[test]
    fn test_restore_same_asset_only_replays_play_state() {
        let mut store = PlaybackStateStore::new();
        store.apply_entry(&entry(1, assets())).unwrap();

        let snapshot = store.state().with_play_state(&PlayState::playing(50));
        let events = store.restore(9, snapshot);
        assert_eq!(events, vec![StoreEvent::PlayStateChanged(PlayState::playing(50))]);
        assert_eq!(store.last_seq(), 9);
    }

    #[test]
    fn test_snapshot_events_for_new_asset() {
        let mut store = PlaybackStateStore::new();
        let snapshot = PlaybackState::for_asset(AssetRef::new("Y", "sim://y"));
        let events = store.restore(4, snapshot);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], StoreEvent::AssetsChanged { .. }));
        assert_eq!(events[1], StoreEvent::PlayStateChanged(PlayState::paused(0.0)));
    }
}
