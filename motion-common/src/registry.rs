//! Registry of known tags
//!
//! Single owner of every [`TagState`]. Tags are created on first sighting and
//! never removed. All access goes through one `RwLock`, so creating a tag and
//! reading the full set can not interleave.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use tracing::info;

use crate::message::MotionFlags;
use crate::tag::{TagState, DEFAULT_STILL_THRESHOLD};

/// Thread-safe tag store
#[derive(Debug)]
pub struct TagRegistry {
    tags: RwLock<HashMap<String, TagState>>,
    still_threshold: Duration,
}

impl TagRegistry {
    /// Create an empty registry; new tags use `still_threshold`
    pub fn new(still_threshold: Duration) -> Self {
        Self {
            tags: RwLock::new(HashMap::new()),
            still_threshold,
        }
    }

    pub fn still_threshold(&self) -> Duration {
        self.still_threshold
    }

    /// Current state of `id`, creating it first if unseen
    pub fn get_or_create(&self, id: &str) -> TagState {
        self.get_or_create_at(id, Instant::now())
    }

    pub fn get_or_create_at(&self, id: &str, now: Instant) -> TagState {
        let mut tags = self.write();
        tags.entry(id.to_string())
            .or_insert_with(|| TagState::new(id, self.still_threshold, now))
            .clone()
    }

    /// Current state of `id`, if known
    pub fn get(&self, id: &str) -> Option<TagState> {
        self.read().get(id).cloned()
    }

    /// Route a raw flag to `id`, creating the tag on first sighting
    ///
    /// Returns true when the raw flag changed.
    pub fn update(&self, id: &str, raw_flag: bool, now: Instant) -> bool {
        let mut tags = self.write();
        let tag = tags
            .entry(id.to_string())
            .or_insert_with(|| TagState::new(id, self.still_threshold, now));

        let changed = tag.update_at(raw_flag, now);
        if changed {
            info!("{} => {}", id, u8::from(raw_flag));
        }
        changed
    }

    /// Apply every flag from one decoded document; returns the number of raw changes
    pub fn apply(&self, flags: &MotionFlags, now: Instant) -> usize {
        flags
            .iter()
            .filter(|&(id, &flag)| self.update(id, flag, now))
            .count()
    }

    /// Copy of every tag
    pub fn all(&self) -> Vec<TagState> {
        self.read().values().cloned().collect()
    }

    /// Debounced state of every tag, taken under one lock
    pub fn sample(&self, now: Instant) -> Vec<(String, bool)> {
        self.read()
            .values()
            .map(|tag| (tag.id().to_string(), tag.is_moving_at(now)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panic while holding the lock leaves the map itself intact, so keep serving it.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, TagState>> {
        self.tags.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, TagState>> {
        self.tags.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_STILL_THRESHOLD)
    }
}
