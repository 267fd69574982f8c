//! Shared relay state
//!
//! One instance is created at startup and handed to every task by `Arc`.
//! The ingest task is the only writer of the registry and the dispatcher the
//! only writer of the published snapshot; the HTTP handlers only read.

use std::time::Duration;

use motion_common::{PublishedSnapshot, TagRegistry};
use tokio::sync::{broadcast, RwLock};

/// Buffered snapshots per push subscriber before it starts lagging
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Shared state accessible by all tasks
pub struct SharedState {
    /// Every tag seen since startup
    pub registry: TagRegistry,

    /// What subscribers were last told
    pub snapshot: RwLock<PublishedSnapshot>,

    /// Full snapshots for push subscribers
    pub event_tx: broadcast::Sender<PublishedSnapshot>,
}

impl SharedState {
    pub fn new(still_threshold: Duration) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            registry: TagRegistry::new(still_threshold),
            snapshot: RwLock::new(PublishedSnapshot::new()),
            event_tx,
        }
    }

    /// Send a snapshot to every push subscriber
    pub fn broadcast_snapshot(&self, snapshot: PublishedSnapshot) {
        // No receivers is OK
        let _ = self.event_tx.send(snapshot);
    }

    /// Subscribe to snapshot updates
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedSnapshot> {
        self.event_tx.subscribe()
    }

    /// Copy of the published snapshot
    pub async fn current_snapshot(&self) -> PublishedSnapshot {
        self.snapshot.read().await.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.event_tx.receiver_count()
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(motion_common::tag::DEFAULT_STILL_THRESHOLD)
    }
}
