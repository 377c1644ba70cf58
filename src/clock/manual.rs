use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use super::SessionClock;

/// Clock that only moves when told to
///
/// Used to feed synthetic session time into followers and simulated devices.
/// Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: Arc::new(AtomicI64::new(start_ms)),
        }
    }

    /// Move forward by `delta_ms`; negative deltas are ignored
    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms.max(0), Ordering::SeqCst);
    }

    /// Jump to `now_ms` if it is not in the past
    pub fn set(&self, now_ms: i64) {
        self.now_ms.fetch_max(now_ms, Ordering::SeqCst);
    }
}

impl SessionClock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_never_goes_back() {
        let clock = ManualClock::new(1_000);
        clock.advance(500);
        assert_eq!(clock.now_ms(), 1_500);

        clock.set(1_200);
        assert_eq!(clock.now_ms(), 1_500);

        clock.advance(-100);
        assert_eq!(clock.now_ms(), 1_500);

        let shared = clock.clone();
        shared.set(2_000);
        assert_eq!(clock.now_ms(), 2_000);
    }
}
