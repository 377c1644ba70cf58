use async_trait::async_trait;
use crate::clock::SessionClock;
use crate::core::AssetRef;
use crate::hardware::media_device::{guard_seek, DeviceFactory, DeviceStatus, MediaDevice, MediaResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A call made on a simulated device, recorded for verification
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    Load(String),
    Play(f64),
    Pause(Option<f64>),
    Seek(f64),
    SetRate(f64),
    SetVolume(f64),
    Dispose,
}

/// Shared record of the calls made on every device of a factory
#[derive(Debug, Clone, Default)]
pub struct DeviceProbe {
    calls: Arc<Mutex<Vec<DeviceCall>>>,
}

impl DeviceProbe {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: DeviceCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    /// Snapshot of all recorded calls
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Take all recorded calls, clearing the record
    pub fn take_calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().map(|mut c| c.drain(..).collect()).unwrap_or_default()
    }

    /// Arguments of every recorded `play` call
    pub fn plays(&self) -> Vec<f64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DeviceCall::Play(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    /// Targets of every recorded `seek` call
    pub fn seeks(&self) -> Vec<f64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DeviceCall::Seek(p) => Some(p),
                _ => None,
            })
            .collect()
    }
}

/// Behavior of a simulated device
#[derive(Debug, Clone)]
pub struct SimulatedDeviceSettings {
    /// Media length (seconds)
    pub duration_sec: f64,
    /// Fractional clock error of the device, 0.02 runs 2% fast
    pub drift: f64,
    /// Delay between `play` and the position starting to advance (ms)
    pub startup_latency_ms: i64,
    /// Time `load` takes to resolve (ms)
    pub load_delay_ms: u64,
    /// Make `load` fail as on a decode error
    pub fail_load: bool,
    /// Seek guard before end-of-media (seconds)
    pub end_guard_sec: f64,
}

impl Default for SimulatedDeviceSettings {
    fn default() -> Self {
        Self {
            duration_sec: 60.0,
            drift: 0.0,
            startup_latency_ms: 0,
            load_delay_ms: 0,
            fail_load: false,
            end_guard_sec: 0.3,
        }
    }
}

/// Clock-driven media device without real media
///
/// Position advances with the injected clock, scaled by the playback rate
/// and the configured drift. Autoplay permission comes from a shared flag so
/// a simulated user gesture can unblock every device of a participant.
pub struct SimulatedMediaDevice {
    clock: Arc<dyn SessionClock>,
    settings: SimulatedDeviceSettings,
    autoplay: Arc<AtomicBool>,
    probe: DeviceProbe,
    status: DeviceStatus,
    playing: bool,
    blocked: bool,
    rate: f64,
    volume: f64,
    /// Position at `anchor_ms`
    anchor_pos: f64,
    /// Session time from which the position advances
    anchor_ms: i64,
}

impl SimulatedMediaDevice {
    pub fn new(
        clock: Arc<dyn SessionClock>,
        settings: SimulatedDeviceSettings,
        autoplay: Arc<AtomicBool>,
        probe: DeviceProbe,
    ) -> Self {
        let now = clock.now_ms();
        Self {
            clock,
            settings,
            autoplay,
            probe,
            status: DeviceStatus::Loading,
            playing: false,
            blocked: false,
            rate: 1.0,
            volume: 1.0,
            anchor_pos: 0.0,
            anchor_ms: now,
        }
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    fn guard(&self, position_sec: f64) -> f64 {
        guard_seek(position_sec, self.settings.duration_sec, self.settings.end_guard_sec)
    }

    /// Fold elapsed playback into the anchor before changing rate or state
    fn rebase(&mut self) {
        let now = self.clock.now_ms();
        if now >= self.anchor_ms {
            self.anchor_pos = self.current_position();
            self.anchor_ms = now;
        }
    }
}

#[async_trait]
impl MediaDevice for SimulatedMediaDevice {
    fn status(&self) -> DeviceStatus {
        self.status
    }

    async fn load(&mut self, url: &str) -> MediaResult<()> {
        self.probe.record(DeviceCall::Load(url.to_string()));
        if self.settings.load_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.settings.load_delay_ms)).await;
        }
        if self.settings.fail_load || url.is_empty() {
            self.status = DeviceStatus::Failed;
            return Err(format!("cannot decode '{}'", url).into());
        }
        if self.status == DeviceStatus::Loading {
            self.status = DeviceStatus::Ready;
        }
        Ok(())
    }

    async fn play(&mut self, position_sec: f64) -> MediaResult<bool> {
        self.probe.record(DeviceCall::Play(position_sec));
        if self.status != DeviceStatus::Ready {
            return Err(format!("device not ready ({:?})", self.status).into());
        }

        self.anchor_pos = self.guard(position_sec);
        self.anchor_ms = self.clock.now_ms();

        if !self.autoplay.load(Ordering::SeqCst) {
            self.playing = false;
            self.blocked = true;
            return Ok(false);
        }

        self.anchor_ms += self.settings.startup_latency_ms;
        self.playing = true;
        self.blocked = false;
        Ok(true)
    }

    fn pause(&mut self, position_sec: Option<f64>) {
        self.probe.record(DeviceCall::Pause(position_sec));
        self.rebase();
        self.playing = false;
        self.blocked = false;
        if let Some(position) = position_sec {
            self.anchor_pos = self.guard(position);
            self.anchor_ms = self.clock.now_ms();
        }
    }

    fn seek(&mut self, position_sec: f64) {
        self.probe.record(DeviceCall::Seek(position_sec));
        self.anchor_pos = self.guard(position_sec);
        self.anchor_ms = self.anchor_ms.max(self.clock.now_ms());
    }

    fn set_rate(&mut self, multiplier: f64) {
        self.probe.record(DeviceCall::SetRate(multiplier));
        self.rebase();
        self.rate = multiplier.clamp(0.25, 4.0);
    }

    fn set_volume(&mut self, gain: f64) {
        self.probe.record(DeviceCall::SetVolume(gain));
        self.volume = gain.clamp(0.0, 1.0);
    }

    fn current_position(&self) -> f64 {
        let duration = self.settings.duration_sec;
        if !self.playing || duration <= 0.0 {
            return self.anchor_pos;
        }
        let elapsed_ms = (self.clock.now_ms() - self.anchor_ms).max(0);
        let advanced = elapsed_ms as f64 / 1000.0 * self.rate * (1.0 + self.settings.drift);
        (self.anchor_pos + advanced).rem_euclid(duration)
    }

    fn duration(&self) -> f64 {
        match self.status {
            DeviceStatus::Ready => self.settings.duration_sec,
            _ => 0.0,
        }
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn is_blocked(&self) -> bool {
        self.blocked
    }

    fn dispose(&mut self) {
        if self.status == DeviceStatus::Disposed {
            return;
        }
        self.probe.record(DeviceCall::Dispose);
        self.playing = false;
        self.blocked = false;
        self.status = DeviceStatus::Disposed;
    }
}

/// Factory handing out simulated devices that share one probe and one autoplay flag
#[derive(Clone)]
pub struct SimulatedDeviceFactory {
    clock: Arc<dyn SessionClock>,
    settings: SimulatedDeviceSettings,
    autoplay: Arc<AtomicBool>,
    probe: DeviceProbe,
}

impl SimulatedDeviceFactory {
    pub fn new(clock: Arc<dyn SessionClock>, settings: SimulatedDeviceSettings) -> Self {
        Self {
            clock,
            settings,
            autoplay: Arc::new(AtomicBool::new(true)),
            probe: DeviceProbe::new(),
        }
    }

    /// Whether devices may start playback without a user gesture
    pub fn set_autoplay_allowed(&self, allowed: bool) {
        self.autoplay.store(allowed, Ordering::SeqCst);
    }

    pub fn probe(&self) -> DeviceProbe {
        self.probe.clone()
    }
}

impl DeviceFactory for SimulatedDeviceFactory {
    fn create(&self, _asset: &AssetRef) -> Box<dyn MediaDevice> {
        Box::new(SimulatedMediaDevice::new(
            Arc::clone(&self.clock),
            self.settings.clone(),
            Arc::clone(&self.autoplay),
            self.probe.clone(),
        ))
    }
}
