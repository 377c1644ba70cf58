use crate::clock::SessionClock;
use crate::config::SyncConfig;
use crate::core::ParticipantId;
use crate::diagnostics::{DiagnosticsCollector, FollowerStats};
use crate::error::{Result, SyncError};
use crate::hardware::DeviceFactory;
use crate::playback::{Conductor, Follower, FollowerControl};
use crate::replication::CommandLog;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

const CONTROL_QUEUE: usize = 8;

/// Handle to a running follower task
pub struct FollowerHandle {
    id: ParticipantId,
    control: mpsc::Sender<FollowerControl>,
    task: JoinHandle<()>,
}

impl FollowerHandle {
    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    /// Forward a user gesture so a blocked device can start
    pub async fn retry_play(&self) -> Result<()> {
        self.control
            .send(FollowerControl::RetryPlay)
            .await
            .map_err(|_| SyncError::SessionClosed)
    }

    /// Leave the session and wait until the device is released
    pub async fn leave(self) -> Result<()> {
        // the task may already be gone if the session shut down
        let _ = self.control.send(FollowerControl::Leave).await;
        self.task.await.map_err(|_| SyncError::SessionClosed)
    }
}

/// One playback session: the command log, its status ticker and the
/// diagnostics collector
pub struct Session {
    config: SyncConfig,
    clock: Arc<dyn SessionClock>,
    log: Arc<CommandLog>,
    collector: DiagnosticsCollector,
    ticker: JoinHandle<()>,
    followers: Mutex<Vec<mpsc::Sender<FollowerControl>>>,
}

impl Session {
    /// Open a session owned by `conductor`
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(conductor: ParticipantId, config: SyncConfig, clock: Arc<dyn SessionClock>) -> Self {
        info!("Starting session conducted by {}", conductor);
        let log = Arc::new(CommandLog::new(conductor, config.log_capacity));
        let collector = DiagnosticsCollector::spawn(config.diagnostics_queue);

        let ticker_log = log.clone();
        let period = config.status_tick();
        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                ticker_log.status_tick();
            }
        });

        Self {
            config,
            clock,
            log,
            collector,
            ticker,
            followers: Mutex::new(Vec::new()),
        }
    }

    pub fn log(&self) -> Arc<CommandLog> {
        self.log.clone()
    }

    /// Transport controls for the conductor
    pub fn conductor(&self) -> Conductor {
        Conductor::new(self.log.conductor().clone(), self.log.clone(), self.clock.clone())
    }

    /// Add a follower driving devices from `factory` on its own `clock`
    pub fn join(
        &self,
        id: ParticipantId,
        clock: Arc<dyn SessionClock>,
        factory: Arc<dyn DeviceFactory>,
    ) -> FollowerHandle {
        let (control, control_rx) = mpsc::channel(CONTROL_QUEUE);
        let follower = Follower::new(
            id.clone(),
            self.config.clone(),
            clock,
            factory,
            Some(self.collector.sender()),
        );
        let task = tokio::spawn(follower.run(self.log.clone(), control_rx));

        if let Ok(mut followers) = self.followers.lock() {
            followers.retain(|c| !c.is_closed());
            followers.push(control.clone());
        }
        debug!("Follower {} spawned", id);

        FollowerHandle { id, control, task }
    }

    /// Drift statistics per follower
    pub async fn stats(&self) -> Vec<FollowerStats> {
        self.collector.stats().await
    }

    pub async fn follower_stats(&self, id: &ParticipantId) -> Option<FollowerStats> {
        self.collector.follower_stats(id).await
    }

    /// Ask every follower to leave and stop the background tasks
    pub async fn shutdown(self) {
        let followers = match self.followers.lock() {
            Ok(mut followers) => std::mem::take(&mut *followers),
            Err(_) => Vec::new(),
        };
        for control in followers {
            let _ = control.send(FollowerControl::Leave).await;
        }
        self.ticker.abort();
        self.collector.shutdown();
        info!("Session closed");
    }
}
