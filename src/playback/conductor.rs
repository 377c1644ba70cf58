use crate::clock::SessionClock;
use crate::core::{AssetRef, Command, ParticipantId, PlayState, PlaybackState};
use crate::error::Result;
use crate::replication::CommandLog;
use std::sync::Arc;
use tracing::info;

/// The session's single writer
///
/// Turns transport controls into commands on the log. Positions are derived
/// from the authoritative state at the moment of the call.
pub struct Conductor {
    id: ParticipantId,
    log: Arc<CommandLog>,
    clock: Arc<dyn SessionClock>,
}

impl Conductor {
    pub fn new(id: ParticipantId, log: Arc<CommandLog>, clock: Arc<dyn SessionClock>) -> Self {
        Self { id, log, clock }
    }

    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    /// Authoritative state of the session
    pub async fn state(&self) -> PlaybackState {
        self.log.snapshot().await.1
    }

    /// Switch every participant to a new asset, paused at 0
    pub async fn set_assets(&self, asset: AssetRef) -> Result<u64> {
        info!("Conductor switching to {}", asset.id);
        self.log.submit(&self.id, Command::SetAssets { asset }).await
    }

    pub async fn set_play_state(&self, state: PlayState) -> Result<u64> {
        self.log.submit(&self.id, Command::SetPlayState(state)).await
    }

    pub async fn set_start_offset(&self, start_offset: i64) -> Result<u64> {
        self.log
            .submit(&self.id, Command::SetStartOffset { start_offset })
            .await
    }

    /// Resume from the paused position
    ///
    /// Returns `None` when already playing.
    pub async fn play(&self) -> Result<Option<u64>> {
        let state = self.state().await;
        if state.is_playing {
            return Ok(None);
        }
        let position = state.paused_time.unwrap_or(0.0);
        let start_offset = self.clock.now_ms() - (position * 1000.0).round() as i64;
        info!("Conductor playing from {:.3}s", position);
        self.set_play_state(PlayState::playing(start_offset)).await.map(Some)
    }

    /// Pause at the current session position
    ///
    /// Returns `None` when already paused.
    pub async fn pause(&self) -> Result<Option<u64>> {
        let state = self.state().await;
        if !state.is_playing {
            return Ok(None);
        }
        let position = state.position_at(self.clock.now_ms()).max(0.0);
        info!("Conductor pausing at {:.3}s", position);
        self.set_play_state(PlayState::paused(position)).await.map(Some)
    }

    /// Move the session to `position_sec`, keeping the transport state
    pub async fn seek(&self, position_sec: f64) -> Result<u64> {
        let position = position_sec.max(0.0);
        let state = self.state().await;
        info!("Conductor seeking to {:.3}s", position);
        if state.is_playing {
            let start_offset = self.clock.now_ms() - (position * 1000.0).round() as i64;
            self.set_play_state(PlayState::playing(start_offset)).await
        } else {
            self.set_play_state(PlayState::paused(position)).await
        }
    }

    /// Shift the playing anchor by `delta_ms` without restarting followers
    ///
    /// Returns `None` while paused.
    pub async fn reanchor(&self, delta_ms: i64) -> Result<Option<u64>> {
        let state = self.state().await;
        match (state.is_playing, state.start_offset) {
            (true, Some(start_offset)) => self.set_start_offset(start_offset + delta_ms).await.map(Some),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::SyncError;

    fn setup() -> (ManualClock, Arc<CommandLog>, Conductor) {
        let clock = ManualClock::new(50_000);
        let id = ParticipantId::new("conductor");
        let log = Arc::new(CommandLog::new(id.clone(), 16));
        let conductor = Conductor::new(id, log.clone(), Arc::new(clock.clone()));
        (clock, log, conductor)
    }

    #[tokio::test]
    async fn test_play_pause_round_trip() {
        let (clock, _log, conductor) = setup();
        conductor.set_assets(AssetRef::new("X", "sim://x")).await.unwrap();

        conductor.play().await.unwrap();
        let state = conductor.state().await;
        assert!(state.is_playing);
        assert_eq!(state.start_offset, Some(50_000));

        clock.advance(4_250);
        conductor.pause().await.unwrap();
        let state = conductor.state().await;
        assert!(!state.is_playing);
        assert_eq!(state.paused_time, Some(4.25));

        clock.advance(10_000);
        conductor.play().await.unwrap();
        let state = conductor.state().await;
        assert_eq!(state.start_offset, Some(64_250 - 4_250));
    }

    #[tokio::test]
    async fn test_redundant_transport_is_skipped() {
        let (_clock, log, conductor) = setup();
        conductor.set_assets(AssetRef::new("X", "sim://x")).await.unwrap();
        assert_eq!(conductor.pause().await.unwrap(), None);
        assert!(conductor.play().await.unwrap().is_some());
        assert_eq!(conductor.play().await.unwrap(), None);
        assert_eq!(log.snapshot().await.0, 2);
    }

    #[tokio::test]
    async fn test_seek_keeps_transport_state() {
        let (_clock, _log, conductor) = setup();
        conductor.set_assets(AssetRef::new("X", "sim://x")).await.unwrap();

        conductor.seek(12.0).await.unwrap();
        assert_eq!(conductor.state().await.paused_time, Some(12.0));

        conductor.play().await.unwrap();
        conductor.seek(30.0).await.unwrap();
        let state = conductor.state().await;
        assert!(state.is_playing);
        assert_eq!(state.start_offset, Some(50_000 - 30_000));
    }

    #[tokio::test]
    async fn test_reanchor_only_while_playing() {
        let (_clock, _log, conductor) = setup();
        conductor.set_assets(AssetRef::new("X", "sim://x")).await.unwrap();
        assert_eq!(conductor.reanchor(-40).await.unwrap(), None);

        conductor.play().await.unwrap();
        conductor.reanchor(-40).await.unwrap();
        assert_eq!(conductor.state().await.start_offset, Some(49_960));
    }

    #[tokio::test]
    async fn test_foreign_conductor_rejected() {
        let (clock, log, _conductor) = setup();
        let impostor = Conductor::new(ParticipantId::new("audience-1"), log, Arc::new(clock));
        let result = impostor.set_assets(AssetRef::new("X", "sim://x")).await;
        assert!(matches!(result, Err(SyncError::NotConductor { .. })));
    }
}
