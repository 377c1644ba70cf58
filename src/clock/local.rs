use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::SessionClock;

/// Session clock for participants sharing one process
///
/// All clones of a session share the epoch `Instant`; each participant adds
/// its own estimation offset, which the replication layer may refine while
/// the session runs. Returned values never go backwards, even when the offset
/// is corrected downwards.
#[derive(Clone)]
pub struct LocalSessionClock {
    /// Epoch of the session
    epoch: Arc<Instant>,
    /// Estimation error of this participant (ms)
    offset_ms: Arc<AtomicI64>,
    /// Highest value handed out so far
    last_ms: Arc<AtomicI64>,
}

impl LocalSessionClock {
    /// New session clock starting now
    pub fn new() -> Self {
        Self::with_epoch(Instant::now())
    }

    pub fn with_epoch(epoch: Instant) -> Self {
        Self {
            epoch: Arc::new(epoch),
            offset_ms: Arc::new(AtomicI64::new(0)),
            last_ms: Arc::new(AtomicI64::new(i64::MIN)),
        }
    }

    /// Another participant's view of the same session time, off by `offset_ms`
    pub fn participant(&self, offset_ms: i64) -> Self {
        Self {
            epoch: Arc::clone(&self.epoch),
            offset_ms: Arc::new(AtomicI64::new(offset_ms)),
            last_ms: Arc::new(AtomicI64::new(i64::MIN)),
        }
    }

    /// Replace the estimation offset (ms)
    pub fn set_offset_ms(&self, offset_ms: i64) {
        self.offset_ms.store(offset_ms, Ordering::Relaxed);
    }

    pub fn offset_ms(&self) -> i64 {
        self.offset_ms.load(Ordering::Relaxed)
    }
}

impl Default for LocalSessionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionClock for LocalSessionClock {
    fn now_ms(&self) -> i64 {
        let raw = self.epoch.elapsed().as_millis() as i64 + self.offset_ms.load(Ordering::Relaxed);
        let previous = self.last_ms.fetch_max(raw, Ordering::AcqRel);
        raw.max(previous)
    }
}

impl std::fmt::Debug for LocalSessionClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSessionClock")
            .field("elapsed", &self.epoch.elapsed())
            .field("offset_ms", &self.offset_ms())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participants_share_epoch() {
        let session = LocalSessionClock::new();
        let ahead = session.participant(250);

        let base = session.now_ms();
        let other = ahead.now_ms();
        assert!(other - base >= 250);
        assert!(other - base < 1_250);
    }

    #[test]
    fn test_monotonic_after_offset_correction() {
        let clock = LocalSessionClock::new();
        clock.set_offset_ms(5_000);
        let before = clock.now_ms();

        clock.set_offset_ms(0);
        let after = clock.now_ms();
        assert!(after >= before);
    }
}
