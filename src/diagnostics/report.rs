use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::core::ParticipantId;
use crate::error::Result;

/// Drift measurement sent by a follower after each correction pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftReport {
    pub follower_id: ParticipantId,
    /// Per-follower report counter, echoed in the ack
    pub seq: u64,
    pub expected_position: f64,
    pub session_time: i64,
    pub actual_position: f64,
    pub rate: f64,
    pub drift_ms: f64,
    pub smoothed_drift_ms: Option<f64>,
    pub jumped: bool,
    /// Current rate boost (percent)
    pub boost: i8,
    /// Round trip of the previous report, if it was acknowledged
    pub latency_ms: Option<i64>,
}

impl DriftReport {
    /// Wire form of the report
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Acknowledgment of a received report (collector → reporting follower)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportAck {
    pub seq: u64,
}

/// A report together with the route its ack goes back on
#[derive(Debug)]
pub struct ReportEnvelope {
    pub report: DriftReport,
    pub reply_to: mpsc::Sender<ReportAck>,
}
