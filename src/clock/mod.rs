//! Shared session time as seen by one participant.
//!
//! The estimate is owned by the replication layer; the engine only reads it
//! through [`SessionClock`], so corrector logic can be driven by synthetic
//! values in tests.

pub mod local;
pub mod manual;

pub use local::LocalSessionClock;
pub use manual::ManualClock;

/// Estimate of shared session time in milliseconds
///
/// Implementations must be monotonic non-decreasing and cheap enough to call
/// on every correction tick. Values from different participants are
/// comparable within a small bounded error.
pub trait SessionClock: Send + Sync {
    fn now_ms(&self) -> i64;
}
