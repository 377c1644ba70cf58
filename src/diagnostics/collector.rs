use crate::core::ParticipantId;
use crate::diagnostics::report::{DriftReport, ReportAck, ReportEnvelope};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Aggregated drift figures of one follower
#[derive(Debug, Clone)]
pub struct FollowerStats {
    pub follower_id: ParticipantId,
    /// Number of reports received
    pub reports: u64,
    /// Number of hard seeks reported
    pub jumps: u64,
    pub last_drift_ms: f64,
    pub last_smoothed_ms: Option<f64>,
    /// Largest absolute smoothed drift seen
    pub max_abs_smoothed_ms: f64,
    pub last_boost: i8,
    pub last_latency_ms: Option<i64>,
    /// Receive time of the latest report
    pub last_received: DateTime<Utc>,
}

impl FollowerStats {
    fn new(follower_id: ParticipantId) -> Self {
        Self {
            follower_id,
            reports: 0,
            jumps: 0,
            last_drift_ms: 0.0,
            last_smoothed_ms: None,
            max_abs_smoothed_ms: 0.0,
            last_boost: 0,
            last_latency_ms: None,
            last_received: Utc::now(),
        }
    }

    fn record(&mut self, report: &DriftReport) {
        self.reports += 1;
        if report.jumped {
            self.jumps += 1;
        }
        self.last_drift_ms = report.drift_ms;
        self.last_smoothed_ms = report.smoothed_drift_ms;
        if let Some(smoothed) = report.smoothed_drift_ms {
            self.max_abs_smoothed_ms = self.max_abs_smoothed_ms.max(smoothed.abs());
        }
        self.last_boost = report.boost;
        if report.latency_ms.is_some() {
            self.last_latency_ms = report.latency_ms;
        }
        self.last_received = Utc::now();
    }
}

/// Receiving end of the diagnostics channel
///
/// Runs as a background task: logs every drift report, keeps per-follower
/// statistics and acknowledges each report to its sender.
pub struct DiagnosticsCollector {
    sender: mpsc::Sender<ReportEnvelope>,
    stats: Arc<Mutex<HashMap<ParticipantId, FollowerStats>>>,
    task: JoinHandle<()>,
}

impl DiagnosticsCollector {
    /// Spawn the collector task with a report queue of `queue` entries
    pub fn spawn(queue: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<ReportEnvelope>(queue.max(1));
        let stats = Arc::new(Mutex::new(HashMap::new()));
        let task = tokio::spawn(Self::run(receiver, stats.clone()));
        Self { sender, stats, task }
    }

    /// Queue followers send their reports to
    pub fn sender(&self) -> mpsc::Sender<ReportEnvelope> {
        self.sender.clone()
    }

    /// Statistics of every follower that reported, sorted by id
    pub async fn stats(&self) -> Vec<FollowerStats> {
        let stats = self.stats.lock().await;
        let mut all: Vec<FollowerStats> = stats.values().cloned().collect();
        all.sort_by(|a, b| a.follower_id.as_str().cmp(b.follower_id.as_str()));
        all
    }

    pub async fn follower_stats(&self, follower_id: &ParticipantId) -> Option<FollowerStats> {
        self.stats.lock().await.get(follower_id).cloned()
    }

    /// Stop the collector task
    pub fn shutdown(self) {
        self.task.abort();
    }

    async fn run(
        mut receiver: mpsc::Receiver<ReportEnvelope>,
        stats: Arc<Mutex<HashMap<ParticipantId, FollowerStats>>>,
    ) {
        while let Some(envelope) = receiver.recv().await {
            let ReportEnvelope { report, reply_to } = envelope;
            log_report(&report);

            stats
                .lock()
                .await
                .entry(report.follower_id.clone())
                .or_insert_with(|| FollowerStats::new(report.follower_id.clone()))
                .record(&report);

            if let Err(e) = reply_to.try_send(ReportAck { seq: report.seq }) {
                debug!("Could not ack report {} of {}: {}", report.seq, report.follower_id, e);
            }
        }
    }
}

fn log_report(report: &DriftReport) {
    if report.jumped {
        warn!(
            follower = %report.follower_id,
            expected = report.expected_position,
            actual = report.actual_position,
            drift_ms = report.drift_ms,
            "Follower jumped to resync"
        );
    } else {
        info!(
            follower = %report.follower_id,
            drift_ms = (report.drift_ms * 10.0).round() / 10.0,
            smoothed_ms = ?report.smoothed_drift_ms.map(|s| (s * 10.0).round() / 10.0),
            boost = report.boost,
            rate = report.rate,
            latency_ms = ?report.latency_ms,
            "Drift report"
        );
    }
    match report.to_json() {
        Ok(json) => debug!(target: "lockstep::diagnostics::wire", "{}", json),
        Err(e) => debug!("Could not encode drift report: {}", e),
    }
}
