pub mod command;
pub mod drift;
pub mod state;

pub use command::{apply, Command, LogEntry, StoreEvent};
pub use drift::{DriftSample, JumpRecord, RateBoost};
pub use state::{AssetRef, ParticipantId, PlayState, PlaybackState};
