//! Distributed playback synchronization.
//!
//! One conductor writes the session's playback state through an ordered
//! command log; every follower replays the log into its own replica and
//! keeps a local media device aligned to shared session time.

pub mod clock;
pub mod config;
pub mod core;
pub mod diagnostics;
pub mod error;
pub mod hardware;
pub mod playback;
pub mod replication;

pub use error::{Result, SyncError};
