use thiserror::Error;

/// Result type for synchronization operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors raised by the replication layer, followers and devices
#[derive(Debug, Error)]
pub enum SyncError {
    /// A participant other than the conductor tried to write playback state
    #[error("participant '{author}' is not the conductor of this session")]
    NotConductor { author: String },

    /// A replicated entry arrived with a sequence number past the next expected one
    #[error("replication gap: expected seq {expected}, got {got}")]
    SequenceGap { expected: u64, got: u64 },

    /// Media could not be loaded for an asset
    #[error("failed to load asset '{asset}': {reason}")]
    LoadFailed { asset: String, reason: String },

    /// The session or a follower task is gone
    #[error("session closed")]
    SessionClosed,

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
