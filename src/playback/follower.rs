//! Audience participant: follows the replicated playback state with a local
//! media device.
//!
//! A follower runs as a single task. Replicated commands, load results,
//! report acks, the correction interval and control messages are handled one
//! at a time, so none of the follower state needs locking. Loading media is
//! the only work running beside the task; its result comes back through a
//! channel and is discarded when a newer asset was assigned meanwhile.

use crate::clock::SessionClock;
use crate::config::SyncConfig;
use crate::core::{AssetRef, LogEntry, ParticipantId, PlayState, PlaybackState, StoreEvent};
use crate::diagnostics::{DiagnosticsReporter, ReportAck, ReportEnvelope};
use crate::error::SyncError;
use crate::hardware::{guard_seek, DeviceFactory, MediaDevice};
use crate::playback::corrector::{Correction, DriftCorrector, PassOutcome};
use crate::playback::store::PlaybackStateStore;
use crate::replication::{CatchUp, CommandLog, Delivery};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Capacity of the internal load and ack channels
const CHANNEL_SIZE: usize = 16;

/// Requests from the hosting application to a running follower
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FollowerControl {
    /// A user gesture happened: retry starting a blocked device
    RetryPlay,
    /// Leave the session and release the device
    Leave,
}

/// Result of a background media load
struct LoadOutcome {
    generation: u64,
    asset: AssetRef,
    result: Result<Box<dyn MediaDevice>, String>,
}

/// Device owned by a load task; disposed unless handed to the follower
struct LoadingDevice(Option<Box<dyn MediaDevice>>);

impl Drop for LoadingDevice {
    fn drop(&mut self) {
        if let Some(mut device) = self.0.take() {
            device.dispose();
        }
    }
}

/// A load running beside the follower task
struct PendingLoad {
    generation: u64,
    abandon: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

pub struct Follower {
    id: ParticipantId,
    config: SyncConfig,
    clock: Arc<dyn SessionClock>,
    factory: Arc<dyn DeviceFactory>,
    /// Local replica of the session state
    store: PlaybackStateStore,
    device: Option<Box<dyn MediaDevice>>,
    asset: Option<AssetRef>,
    /// Play state the device currently follows
    applied: Option<PlayState>,
    corrector: DriftCorrector,
    reporter: DiagnosticsReporter,
    /// Bumped on every asset change; older load results are stale
    generation: u64,
    pending_load: Option<PendingLoad>,
    load_tx: mpsc::Sender<LoadOutcome>,
    load_rx: mpsc::Receiver<LoadOutcome>,
    ack_rx: mpsc::Receiver<ReportAck>,
    last_pass_ms: Option<i64>,
}

impl Follower {
    pub fn new(
        id: ParticipantId,
        config: SyncConfig,
        clock: Arc<dyn SessionClock>,
        factory: Arc<dyn DeviceFactory>,
        diagnostics: Option<mpsc::Sender<ReportEnvelope>>,
    ) -> Self {
        let (load_tx, load_rx) = mpsc::channel(CHANNEL_SIZE);
        let (ack_tx, ack_rx) = mpsc::channel(CHANNEL_SIZE);
        Self {
            reporter: DiagnosticsReporter::new(id.clone(), diagnostics, ack_tx),
            corrector: DriftCorrector::new(config.correction.clone()),
            id,
            config,
            clock,
            factory,
            store: PlaybackStateStore::new(),
            device: None,
            asset: None,
            applied: None,
            generation: 0,
            pending_load: None,
            load_tx,
            load_rx,
            ack_rx,
            last_pass_ms: None,
        }
    }

    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    /// Replicated state as seen by this follower
    pub fn replica(&self) -> &PlaybackState {
        self.store.state()
    }

    pub fn applied_state(&self) -> Option<&PlayState> {
        self.applied.as_ref()
    }

    pub fn current_asset(&self) -> Option<&AssetRef> {
        self.asset.as_ref()
    }

    pub fn has_device(&self) -> bool {
        self.device.is_some()
    }

    pub fn is_blocked(&self) -> bool {
        self.device.as_ref().is_some_and(|d| d.is_blocked())
    }

    pub fn corrector(&self) -> &DriftCorrector {
        &self.corrector
    }

    /// Run the follower until it leaves or the session closes
    pub async fn run(mut self, log: Arc<CommandLog>, mut control: mpsc::Receiver<FollowerControl>) {
        let (seq, state, mut feed) = log.join().await;
        info!("Follower {} joined at log seq {}", self.id, seq);
        self.seed(seq, state).await;

        let mut ticker = tokio::time::interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                delivery = feed.recv() => match delivery {
                    Ok(Delivery::Entry(entry)) => self.on_entry(entry, &log).await,
                    Ok(Delivery::StatusTick) => self.on_status_tick(),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Follower {} lagged by {} deliveries, catching up", self.id, missed);
                        self.resync(&log).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Session feed closed for {}", self.id);
                        break;
                    }
                },
                Some(outcome) = self.load_rx.recv() => self.on_load_outcome(outcome).await,
                Some(ack) = self.ack_rx.recv() => {
                    let now = self.clock.now_ms();
                    self.reporter.on_ack(ack, now);
                }
                _ = ticker.tick() => {
                    self.correct();
                }
                command = control.recv() => match command {
                    Some(FollowerControl::RetryPlay) => self.retry_play().await,
                    Some(FollowerControl::Leave) | None => break,
                },
            }
        }

        self.teardown();
    }

    /// Start from a snapshot of the session state
    pub async fn seed(&mut self, seq: u64, state: PlaybackState) {
        self.store = PlaybackStateStore::from_snapshot(seq, state);
        for event in self.store.snapshot_events() {
            self.handle_event(event).await;
        }
    }

    async fn on_entry(&mut self, entry: LogEntry, log: &CommandLog) {
        match self.store.apply_entry(&entry) {
            Ok(Some(event)) => self.handle_event(event).await,
            Ok(None) => {}
            Err(e) => {
                warn!("Follower {}: {}", self.id, e);
                self.resync(log).await;
            }
        }
    }

    async fn resync(&mut self, log: &CommandLog) {
        match log.catch_up(self.store.last_seq()).await {
            CatchUp::Entries(entries) => {
                for entry in entries {
                    match self.store.apply_entry(&entry) {
                        Ok(Some(event)) => self.handle_event(event).await,
                        Ok(None) => {}
                        Err(e) => warn!("Follower {} could not catch up: {}", self.id, e),
                    }
                }
            }
            CatchUp::Snapshot { seq, state } => {
                debug!("Follower {} restoring snapshot at seq {}", self.id, seq);
                for event in self.store.restore(seq, state) {
                    self.handle_event(event).await;
                }
            }
        }
    }

    /// React to a change of the replicated state
    pub async fn handle_event(&mut self, event: StoreEvent) {
        match event {
            StoreEvent::AssetsChanged { asset } => self.on_assets_changed(asset),
            StoreEvent::PlayStateChanged(state) => self.on_play_state(state).await,
            StoreEvent::StartOffsetChanged { start_offset } => self.on_start_offset(start_offset),
        }
    }

    fn on_assets_changed(&mut self, asset: AssetRef) {
        self.abandon_load(false);
        self.release_device();
        self.corrector.reset();
        self.last_pass_ms = None;
        // mirrors the store: new media starts paused at 0
        self.applied = Some(PlayState::default());

        self.generation += 1;
        let generation = self.generation;
        let abandon = Arc::new(AtomicBool::new(false));
        let mut pending = LoadingDevice(Some(self.factory.create(&asset)));
        let tx = self.load_tx.clone();
        let flag = abandon.clone();
        let loading = asset.clone();

        info!("Follower {} loading asset {} ({})", self.id, asset.id, asset.url);
        let task = tokio::spawn(async move {
            let result = match pending.0.as_mut() {
                Some(device) => device.load(&loading.url).await,
                None => return,
            };
            if flag.load(Ordering::SeqCst) {
                return;
            }
            let result = match result {
                Ok(()) => pending.0.take().ok_or_else(|| "device released".to_string()),
                Err(e) => Err(e.to_string()),
            };
            drop(pending);

            let outcome = LoadOutcome {
                generation,
                asset: loading,
                result,
            };
            if let Err(mpsc::error::SendError(outcome)) = tx.send(outcome).await {
                if let Ok(mut device) = outcome.result {
                    device.dispose();
                }
            }
        });

        self.pending_load = Some(PendingLoad {
            generation,
            abandon,
            task,
        });
        self.asset = Some(asset);
    }

    async fn on_load_outcome(&mut self, outcome: LoadOutcome) {
        if outcome.generation != self.generation {
            debug!("Discarding stale load of {}", outcome.asset.id);
            if let Ok(mut device) = outcome.result {
                device.dispose();
            }
            return;
        }
        self.pending_load = None;

        match outcome.result {
            Ok(device) => {
                info!(
                    "Follower {} ready: {} ({:.1}s)",
                    self.id,
                    outcome.asset.id,
                    device.duration()
                );
                self.device = Some(device);
                self.corrector.reset();
                if let Some(state) = self.applied.clone() {
                    self.apply_play_state(state).await;
                }
            }
            Err(reason) => {
                let err = SyncError::LoadFailed {
                    asset: outcome.asset.id,
                    reason,
                };
                error!("Follower {}: {}", self.id, err);
            }
        }
    }

    async fn on_play_state(&mut self, state: PlayState) {
        if self.applied.as_ref() == Some(&state) {
            debug!("Follower {} ignoring unchanged play state", self.id);
            return;
        }
        self.applied = Some(state.clone());
        self.apply_play_state(state).await;
    }

    fn on_start_offset(&mut self, start_offset: i64) {
        match self.applied.as_mut() {
            Some(state) if state.is_playing => {
                debug!("Follower {} re-anchored to {}", self.id, start_offset);
                state.start_offset = Some(start_offset);
            }
            _ => debug!("Follower {} ignoring start offset while paused", self.id),
        }
    }

    /// Drive the device to `state` from scratch
    async fn apply_play_state(&mut self, state: PlayState) {
        self.corrector.reset();
        self.last_pass_ms = None;

        let now = self.clock.now_ms();
        let Some(device) = self.device.as_mut() else {
            debug!("Follower {} has no device yet, state applies once loaded", self.id);
            return;
        };

        device.set_rate(1.0);
        if state.is_playing {
            let start_offset = state.start_offset.unwrap_or(now);
            let position = guard_seek(
                self.corrector.start_position(now, start_offset),
                device.duration(),
                self.config.end_guard_sec,
            );
            device.set_volume(self.config.startup_gain);
            match device.play(position).await {
                Ok(true) => info!("Follower {} playing from {:.3}s", self.id, position),
                Ok(false) => warn!("Follower {} blocked by autoplay policy, waiting for a user gesture", self.id),
                Err(e) => error!("Follower {} failed to start playback: {}", self.id, e),
            }
        } else {
            let position = guard_seek(
                state.paused_time.unwrap_or(0.0),
                device.duration(),
                self.config.end_guard_sec,
            );
            device.pause(Some(position));
            device.set_volume(1.0);
            info!("Follower {} paused at {:.3}s", self.id, position);
        }
    }

    /// Run one correction pass if the device is playing along
    pub fn correct(&mut self) -> Option<PassOutcome> {
        let start_offset = match &self.applied {
            Some(state) if state.is_playing => state.start_offset?,
            _ => return None,
        };
        let device = self.device.as_mut()?;
        if device.is_blocked() || !device.is_playing() {
            return None;
        }

        let now = self.clock.now_ms();
        let outcome = self
            .corrector
            .pass(now, start_offset, device.current_position(), device.duration());

        let jumped = match outcome.correction {
            Correction::Jump { target_sec } => {
                let target_sec = guard_seek(target_sec, device.duration(), self.config.end_guard_sec);
                info!(
                    "Follower {} jumping {:.3}s -> {:.3}s",
                    self.id, outcome.sample.actual_position_sec, target_sec
                );
                device.seek(target_sec);
                true
            }
            Correction::Rate(boost) => {
                device.set_rate(boost.rate());
                false
            }
            Correction::Hold => false,
        };
        if outcome.restore_gain {
            device.set_volume(1.0);
        }

        let boost = self.corrector.boost();
        let report = self.reporter.build(now, &outcome.sample, boost.rate(), boost, jumped);
        self.reporter.send(report, now);
        self.last_pass_ms = Some(now);
        Some(outcome)
    }

    /// Status ticks trigger a pass when the interval has not produced one lately
    fn on_status_tick(&mut self) {
        let now = self.clock.now_ms();
        let interval = self.config.tick_interval_ms as i64;
        if self.last_pass_ms.map_or(true, |last| now - last >= interval) {
            self.correct();
        }
    }

    /// Retry a blocked device after a user gesture
    pub async fn retry_play(&mut self) {
        if !self.is_blocked() {
            debug!("Follower {} not blocked, nothing to retry", self.id);
            return;
        }
        if let Some(state) = self.applied.clone() {
            self.apply_play_state(state).await;
        }
    }

    fn abandon_load(&mut self, abort: bool) {
        if let Some(load) = self.pending_load.take() {
            debug!("Abandoning load generation {}", load.generation);
            load.abandon.store(true, Ordering::SeqCst);
            if abort {
                load.task.abort();
            }
        }
    }

    fn release_device(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.dispose();
        }
    }

    /// Cancel pending work and release the device
    pub fn teardown(&mut self) {
        self.abandon_load(true);
        self.release_device();
        self.applied = None;
        info!("Follower {} left the session", self.id);
    }

    /// Wait for the pending load and handle its result
    #[cfg(test)]
    async fn settle_load(&mut self) {
        if let Some(outcome) = self.load_rx.recv().await {
            self.on_load_outcome(outcome).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::hardware::{DeviceCall, DeviceProbe, SimulatedDeviceFactory, SimulatedDeviceSettings};

    struct Harness {
        clock: ManualClock,
        factory: SimulatedDeviceFactory,
        probe: DeviceProbe,
        follower: Follower,
    }

    fn harness(settings: SimulatedDeviceSettings) -> Harness {
        harness_with(settings, SyncConfig::default())
    }

    fn harness_with(settings: SimulatedDeviceSettings, config: SyncConfig) -> Harness {
        let clock = ManualClock::new(100_000);
        let factory = SimulatedDeviceFactory::new(Arc::new(clock.clone()), settings);
        let probe = factory.probe();
        let follower = Follower::new(
            ParticipantId::new("audience-1"),
            config,
            Arc::new(clock.clone()),
            Arc::new(factory.clone()),
            None,
        );
        Harness {
            clock,
            factory,
            probe,
            follower,
        }
    }

    fn asset(id: &str) -> AssetRef {
        AssetRef::new(id, &format!("sim://{}", id))
    }

    async fn loaded(settings: SimulatedDeviceSettings) -> Harness {
        let mut h = harness(settings);
        h.follower
            .handle_event(StoreEvent::AssetsChanged { asset: asset("X") })
            .await;
        h.follower.settle_load().await;
        assert!(h.follower.has_device());
        h
    }

    #[tokio::test]
    async fn test_play_starts_at_expected_position_plus_lead() {
        let mut h = loaded(SimulatedDeviceSettings::default()).await;
        let t0 = h.clock.now_ms() - 5_000;

        h.follower
            .handle_event(StoreEvent::PlayStateChanged(PlayState::playing(t0)))
            .await;

        let plays = h.probe.plays();
        assert_eq!(plays.len(), 1);
        assert!((plays[0] - 5.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_end_guard_from_config() {
        let config = SyncConfig {
            end_guard_sec: 2.0,
            ..Default::default()
        };
        let mut h = harness_with(SimulatedDeviceSettings::default(), config);
        h.follower
            .handle_event(StoreEvent::AssetsChanged { asset: asset("X") })
            .await;
        h.follower.settle_load().await;

        // 59.6 s into 60 s media
        let t0 = h.clock.now_ms() - 59_500;
        h.follower
            .handle_event(StoreEvent::PlayStateChanged(PlayState::playing(t0)))
            .await;
        h.follower
            .handle_event(StoreEvent::PlayStateChanged(PlayState::paused(59.9)))
            .await;

        let plays = h.probe.plays();
        assert_eq!(plays.len(), 1);
        assert!((plays[0] - 58.0).abs() < 1e-9);
        assert!(h.probe.calls().contains(&DeviceCall::Pause(Some(58.0))));
    }

    #[tokio::test]
    async fn test_identical_play_state_is_ignored() {
        let mut h = loaded(SimulatedDeviceSettings::default()).await;
        let state = PlayState::playing(h.clock.now_ms() - 1_000);

        h.follower.handle_event(StoreEvent::PlayStateChanged(state.clone())).await;
        h.follower.handle_event(StoreEvent::PlayStateChanged(state)).await;
        assert_eq!(h.probe.plays().len(), 1);

        h.follower
            .handle_event(StoreEvent::PlayStateChanged(PlayState::paused(3.0)))
            .await;
        h.follower
            .handle_event(StoreEvent::PlayStateChanged(PlayState::paused(3.0)))
            .await;
        let pauses = h
            .probe
            .calls()
            .into_iter()
            .filter(|c| *c == DeviceCall::Pause(Some(3.0)))
            .count();
        assert_eq!(pauses, 1);
    }

    #[tokio::test]
    async fn test_state_before_load_applies_when_ready() {
        let mut h = harness(SimulatedDeviceSettings::default());
        h.follower
            .handle_event(StoreEvent::AssetsChanged { asset: asset("X") })
            .await;
        let t0 = h.clock.now_ms() - 2_000;
        h.follower
            .handle_event(StoreEvent::PlayStateChanged(PlayState::playing(t0)))
            .await;
        assert!(h.probe.plays().is_empty());

        h.follower.settle_load().await;
        let plays = h.probe.plays();
        assert_eq!(plays.len(), 1);
        assert!((plays[0] - 2.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_start_offset_change_does_not_restart() {
        let mut h = loaded(SimulatedDeviceSettings::default()).await;
        let t0 = h.clock.now_ms() - 1_000;
        h.follower
            .handle_event(StoreEvent::PlayStateChanged(PlayState::playing(t0)))
            .await;

        h.follower
            .handle_event(StoreEvent::StartOffsetChanged { start_offset: t0 - 40 })
            .await;
        assert_eq!(h.probe.plays().len(), 1);
        assert_eq!(h.follower.applied_state().unwrap().start_offset, Some(t0 - 40));

        h.clock.advance(900);
        let outcome = h.follower.correct().unwrap();
        // device started 100 ms ahead, the anchor moved 40 ms earlier
        assert!((outcome.sample.diff_ms - 60.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_large_drift_jumps() {
        let settings = SimulatedDeviceSettings {
            drift: 0.5,
            ..Default::default()
        };
        let mut h = loaded(settings).await;
        let t0 = h.clock.now_ms() - 5_000;
        h.follower
            .handle_event(StoreEvent::PlayStateChanged(PlayState::playing(t0)))
            .await;

        // 5.1 + 1.5 = 6.6 against an expected 6.0
        h.clock.advance(1_000);
        let outcome = h.follower.correct().unwrap();
        assert!((outcome.sample.diff_ms - 600.0).abs() < 1e-6);

        let seeks = h.probe.seeks();
        assert_eq!(seeks.len(), 1);
        assert!((seeks[0] - 6.2).abs() < 1e-6);
        assert!(h.follower.corrector().last_jump().is_some());
        assert_eq!(h.follower.corrector().smoothed_ms(), None);
    }

    #[tokio::test]
    async fn test_small_drift_boosts_rate() {
        let mut h = loaded(SimulatedDeviceSettings::default()).await;
        // starts 100 ms ahead because of the lead
        let t0 = h.clock.now_ms() - 5_000;
        h.follower
            .handle_event(StoreEvent::PlayStateChanged(PlayState::playing(t0)))
            .await;
        h.clock.advance(900);
        h.follower.correct().unwrap();

        assert_eq!(h.follower.corrector().boost().percent(), -1);
        assert!(h
            .probe
            .calls()
            .iter()
            .any(|c| matches!(c, DeviceCall::SetRate(r) if (r - 0.99).abs() < 1e-9)));
    }

    #[tokio::test]
    async fn test_gain_restored_after_first_pass() {
        let mut h = loaded(SimulatedDeviceSettings::default()).await;
        h.follower
            .handle_event(StoreEvent::PlayStateChanged(PlayState::playing(h.clock.now_ms())))
            .await;
        let calls = h.probe.take_calls();
        assert!(calls.contains(&DeviceCall::SetVolume(0.0)));

        h.clock.advance(900);
        h.follower.correct();
        assert!(h.probe.calls().contains(&DeviceCall::SetVolume(1.0)));

        h.probe.take_calls();
        h.clock.advance(900);
        h.follower.correct();
        assert!(!h.probe.calls().contains(&DeviceCall::SetVolume(1.0)));
    }

    #[tokio::test]
    async fn test_blocked_device_is_not_corrected_until_retry() {
        let mut h = loaded(SimulatedDeviceSettings::default()).await;
        h.factory.set_autoplay_allowed(false);
        h.follower
            .handle_event(StoreEvent::PlayStateChanged(PlayState::playing(h.clock.now_ms())))
            .await;
        assert!(h.follower.is_blocked());

        h.clock.advance(900);
        assert!(h.follower.correct().is_none());

        h.factory.set_autoplay_allowed(true);
        h.follower.retry_play().await;
        assert!(!h.follower.is_blocked());
        assert_eq!(h.probe.plays().len(), 2);

        h.clock.advance(900);
        assert!(h.follower.correct().is_some());
    }

    #[tokio::test]
    async fn test_paused_holds_position() {
        let mut h = loaded(SimulatedDeviceSettings::default()).await;
        h.follower
            .handle_event(StoreEvent::PlayStateChanged(PlayState::playing(h.clock.now_ms())))
            .await;
        h.follower
            .handle_event(StoreEvent::PlayStateChanged(PlayState::paused(12.5)))
            .await;

        assert!(h.probe.calls().contains(&DeviceCall::Pause(Some(12.5))));
        h.clock.advance(2_000);
        assert!(h.follower.correct().is_none());
        assert_eq!(h.follower.corrector().smoothed_ms(), None);
    }

    #[tokio::test]
    async fn test_stale_load_is_discarded() {
        let settings = SimulatedDeviceSettings {
            load_delay_ms: 30,
            ..Default::default()
        };
        let mut h = harness(settings);
        h.follower
            .handle_event(StoreEvent::AssetsChanged { asset: asset("X") })
            .await;
        h.follower
            .handle_event(StoreEvent::AssetsChanged { asset: asset("Y") })
            .await;
        h.follower.settle_load().await;

        assert!(h.follower.has_device());
        assert_eq!(h.follower.current_asset().unwrap().id, "Y");

        // give the abandoned load time to notice and release its device
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let disposals = h.probe.calls().iter().filter(|c| **c == DeviceCall::Dispose).count();
        assert_eq!(disposals, 1);
        assert!(h.follower.load_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_load_failure_leaves_follower_without_device() {
        let settings = SimulatedDeviceSettings {
            fail_load: true,
            ..Default::default()
        };
        let mut h = harness(settings);
        h.follower
            .handle_event(StoreEvent::AssetsChanged { asset: asset("X") })
            .await;
        h.follower.settle_load().await;
        assert!(!h.follower.has_device());

        h.follower
            .handle_event(StoreEvent::PlayStateChanged(PlayState::playing(h.clock.now_ms())))
            .await;
        assert!(h.probe.plays().is_empty());
        assert!(h.follower.correct().is_none());
    }

    #[tokio::test]
    async fn test_seed_from_snapshot() {
        let mut h = harness(SimulatedDeviceSettings::default());
        let t0 = h.clock.now_ms() - 3_000;
        let state = PlaybackState::for_asset(asset("X")).with_play_state(&PlayState::playing(t0));

        h.follower.seed(7, state).await;
        h.follower.settle_load().await;

        assert_eq!(h.follower.replica().start_offset, Some(t0));
        let plays = h.probe.plays();
        assert_eq!(plays.len(), 1);
        assert!((plays[0] - 3.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_teardown_during_load_releases_device() {
        let settings = SimulatedDeviceSettings {
            load_delay_ms: 50,
            ..Default::default()
        };
        let mut h = harness(settings);
        h.follower
            .handle_event(StoreEvent::AssetsChanged { asset: asset("X") })
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        h.follower.teardown();

        tokio::time::sleep(std::time::Duration::from_millis(120)).await;
        let disposals = h.probe.calls().iter().filter(|c| **c == DeviceCall::Dispose).count();
        assert_eq!(disposals, 1);
        assert!(!h.follower.has_device());
    }

    #[tokio::test]
    async fn test_teardown_releases_device() {
        let mut h = loaded(SimulatedDeviceSettings::default()).await;
        h.follower.teardown();
        assert!(!h.follower.has_device());
        assert!(h.probe.calls().contains(&DeviceCall::Dispose));
    }
}
