use crate::core::{Command, LogEntry, ParticipantId, PlaybackState};
use crate::error::{Result, SyncError};
use crate::playback::PlaybackStateStore;
use std::collections::VecDeque;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

/// What the ordered feed delivers to every participant
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Next command of the log
    Entry(LogEntry),
    /// Periodic heartbeat
    StatusTick,
}

/// How a lagging participant gets back in sync
#[derive(Debug, Clone, PartialEq)]
pub enum CatchUp {
    /// The missed entries, in order
    Entries(Vec<LogEntry>),
    /// Missed entries were evicted; restore from this snapshot
    Snapshot { seq: u64, state: PlaybackState },
}

struct LogState {
    /// Authoritative replica
    store: PlaybackStateStore,
    /// Most recent entries, for catching up
    recent: VecDeque<LogEntry>,
}

/// Single-writer command log of a session
///
/// Only the conductor may append. Every accepted command gets the next
/// sequence number, is applied to the authoritative replica and is broadcast
/// to all participants while the log is locked, so the feed order is the
/// sequence order.
pub struct CommandLog {
    conductor: ParticipantId,
    capacity: usize,
    inner: Mutex<LogState>,
    feed: broadcast::Sender<Delivery>,
}

impl CommandLog {
    /// Create a log writable by `conductor`, retaining `capacity` recent entries
    pub fn new(conductor: ParticipantId, capacity: usize) -> Self {
        let (feed, _) = broadcast::channel(capacity.max(16));
        Self {
            conductor,
            capacity,
            inner: Mutex::new(LogState {
                store: PlaybackStateStore::new(),
                recent: VecDeque::with_capacity(capacity),
            }),
            feed,
        }
    }

    pub fn conductor(&self) -> &ParticipantId {
        &self.conductor
    }

    /// Append a command, returning its sequence number
    pub async fn submit(&self, author: &ParticipantId, command: Command) -> Result<u64> {
        if author != &self.conductor {
            warn!("Rejecting command from non-conductor {}: {:?}", author, command);
            return Err(SyncError::NotConductor {
                author: author.to_string(),
            });
        }

        let mut inner = self.inner.lock().await;
        let entry = LogEntry {
            seq: inner.store.last_seq() + 1,
            command,
        };
        inner.store.apply_entry(&entry)?;

        if inner.recent.len() >= self.capacity {
            inner.recent.pop_front();
        }
        if self.capacity > 0 {
            inner.recent.push_back(entry.clone());
        }

        let seq = entry.seq;
        debug!("Log entry {}: {:?}", seq, entry.command);
        // no subscribers is fine, late joiners start from a snapshot
        let _ = self.feed.send(Delivery::Entry(entry));
        Ok(seq)
    }

    /// Snapshot the state and subscribe to the feed atomically
    ///
    /// Every entry after the returned sequence number arrives on the receiver.
    pub async fn join(&self) -> (u64, PlaybackState, broadcast::Receiver<Delivery>) {
        let inner = self.inner.lock().await;
        let receiver = self.feed.subscribe();
        (inner.store.last_seq(), inner.store.state().clone(), receiver)
    }

    /// Current authoritative state and its sequence number
    pub async fn snapshot(&self) -> (u64, PlaybackState) {
        let inner = self.inner.lock().await;
        (inner.store.last_seq(), inner.store.state().clone())
    }

    /// Entries after `after_seq`, or a snapshot if some were already evicted
    pub async fn catch_up(&self, after_seq: u64) -> CatchUp {
        let inner = self.inner.lock().await;
        let last_seq = inner.store.last_seq();
        if after_seq >= last_seq {
            return CatchUp::Entries(Vec::new());
        }
        match inner.recent.front() {
            Some(first) if first.seq <= after_seq + 1 => CatchUp::Entries(
                inner.recent.iter().filter(|e| e.seq > after_seq).cloned().collect(),
            ),
            _ => CatchUp::Snapshot {
                seq: last_seq,
                state: inner.store.state().clone(),
            },
        }
    }

    /// Broadcast a status tick
    pub fn status_tick(&self) {
        let _ = self.feed.send(Delivery::StatusTick);
    }
}
