use tokio::sync::mpsc;
use tracing::debug;

use crate::core::{DriftSample, ParticipantId, RateBoost};
use crate::diagnostics::report::{DriftReport, ReportAck, ReportEnvelope};

/// Follower side of the diagnostics channel
///
/// Sends one report per correction pass and estimates the round trip to the
/// collector: the delay between sending a report and receiving its ack is
/// attached to the next report.
pub struct DiagnosticsReporter {
    follower_id: ParticipantId,
    sink: Option<mpsc::Sender<ReportEnvelope>>,
    reply_to: mpsc::Sender<ReportAck>,
    next_seq: u64,
    /// Report awaiting its ack: (seq, session time sent)
    in_flight: Option<(u64, i64)>,
    latency_ms: Option<i64>,
}

impl DiagnosticsReporter {
    pub fn new(
        follower_id: ParticipantId,
        sink: Option<mpsc::Sender<ReportEnvelope>>,
        reply_to: mpsc::Sender<ReportAck>,
    ) -> Self {
        Self {
            follower_id,
            sink,
            reply_to,
            next_seq: 1,
            in_flight: None,
            latency_ms: None,
        }
    }

    /// Build the report for a correction pass, consuming the pending latency
    pub fn build(&mut self, now_ms: i64, sample: &DriftSample, rate: f64, boost: RateBoost, jumped: bool) -> DriftReport {
        let seq = self.next_seq;
        self.next_seq += 1;
        DriftReport {
            follower_id: self.follower_id.clone(),
            seq,
            expected_position: sample.expected_position_sec,
            session_time: now_ms,
            actual_position: sample.actual_position_sec,
            rate,
            drift_ms: sample.diff_ms,
            smoothed_drift_ms: sample.smoothed_diff_ms,
            jumped,
            boost: boost.percent(),
            latency_ms: self.latency_ms.take(),
        }
    }

    /// Queue a report for the collector without waiting
    ///
    /// Returns false when there is no collector or its queue is full.
    pub fn send(&mut self, report: DriftReport, now_ms: i64) -> bool {
        let Some(sink) = &self.sink else {
            return false;
        };
        let seq = report.seq;
        let envelope = ReportEnvelope {
            report,
            reply_to: self.reply_to.clone(),
        };
        match sink.try_send(envelope) {
            Ok(()) => {
                self.in_flight = Some((seq, now_ms));
                true
            }
            Err(e) => {
                debug!("Dropping drift report {} of {}: {}", seq, self.follower_id, e);
                false
            }
        }
    }

    /// Record the ack of a sent report
    pub fn on_ack(&mut self, ack: ReportAck, now_ms: i64) {
        match self.in_flight {
            Some((seq, sent_ms)) if seq == ack.seq => {
                self.latency_ms = Some((now_ms - sent_ms).max(0));
                self.in_flight = None;
            }
            _ => debug!("Ignoring stale ack {} for {}", ack.seq, self.follower_id),
        }
    }

    /// Latency waiting to be attached to the next report
    #[cfg(test)]
    fn pending_latency_ms(&self) -> Option<i64> {
        self.latency_ms
    }
}
