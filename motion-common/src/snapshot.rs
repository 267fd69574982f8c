//! Published tag states
//!
//! What consumers were last told about each tag. New push subscribers get the
//! whole snapshot; the UDP sink only gets [`TagChange`]s.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last published state of one tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagStatus {
    /// Debounced motion state
    pub moving: bool,
    /// When this state was first published
    pub changed_at: DateTime<Utc>,
}

/// One debounced state change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagChange {
    pub id: String,
    pub moving: bool,
}

impl TagChange {
    /// Datagram payload: `<id>,<1|0>\n`
    pub fn to_line(&self) -> String {
        format!("{},{}\n", self.id, u8::from(self.moving))
    }
}

/// Tag id → last published status, ordered by id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublishedSnapshot {
    tags: BTreeMap<String, TagStatus>,
}

impl PublishedSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&TagStatus> {
        self.tags.get(id)
    }

    /// Record the debounced state of `id`
    ///
    /// Returns the change when the tag is new or its state differs from what
    /// was last published; otherwise leaves the snapshot untouched.
    pub fn record(&mut self, id: &str, moving: bool, at: DateTime<Utc>) -> Option<TagChange> {
        if self.tags.get(id).map(|status| status.moving) == Some(moving) {
            return None;
        }

        self.tags.insert(id.to_string(), TagStatus { moving, changed_at: at });
        Some(TagChange {
            id: id.to_string(),
            moving,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TagStatus)> {
        self.tags.iter()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}
