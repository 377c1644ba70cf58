pub mod conductor;
pub mod corrector;
pub mod follower;
pub mod store;

pub use conductor::Conductor;
pub use corrector::{expected_position, Correction, DriftCorrector, PassOutcome};
pub use follower::{Follower, FollowerControl};
pub use store::PlaybackStateStore;
