//! Per-tag motion debounce
//!
//! Raw motion flags flicker. A tag is reported as moving while its latest
//! transition is to "moving", and for a grace window (the still threshold)
//! after it last went still.

use std::time::{Duration, Instant};

/// Default grace window after motion stops
pub const DEFAULT_STILL_THRESHOLD: Duration = Duration::from_secs(4);

/// Debounce state for one tag
#[derive(Debug, Clone)]
pub struct TagState {
    id: String,
    last_raw_flag: bool,
    moved_at: Instant,
    stilled_at: Instant,
    has_moved: bool,
    still_threshold: Duration,
}

impl TagState {
    /// New tag first seen at `now`; starts still with both transitions stamped `now`
    pub fn new(id: impl Into<String>, still_threshold: Duration, now: Instant) -> Self {
        Self {
            id: id.into(),
            last_raw_flag: false,
            moved_at: now,
            stilled_at: now,
            has_moved: false,
            still_threshold,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn last_raw_flag(&self) -> bool {
        self.last_raw_flag
    }

    pub fn last_transition_to_moving(&self) -> Instant {
        self.moved_at
    }

    pub fn last_transition_to_still(&self) -> Instant {
        self.stilled_at
    }

    pub fn still_threshold(&self) -> Duration {
        self.still_threshold
    }

    /// Apply a raw flag now
    pub fn update(&mut self, raw_flag: bool) -> bool {
        self.update_at(raw_flag, Instant::now())
    }

    /// Apply a raw flag observed at `now`
    ///
    /// Repeats of the current flag are ignored. Returns true when the flag
    /// changed and a transition was stamped.
    pub fn update_at(&mut self, raw_flag: bool, now: Instant) -> bool {
        if raw_flag == self.last_raw_flag {
            return false;
        }

        self.last_raw_flag = raw_flag;
        if raw_flag {
            self.moved_at = now;
            self.has_moved = true;
        } else {
            self.stilled_at = now;
        }
        true
    }

    /// Debounced state now
    pub fn is_moving(&self) -> bool {
        self.is_moving_at(Instant::now())
    }

    /// Debounced state at `now`
    pub fn is_moving_at(&self, now: Instant) -> bool {
        // Equal stamps only happen when both flags land on the same instant;
        // the flag applied last decides.
        if self.moved_at > self.stilled_at || (self.last_raw_flag && self.moved_at == self.stilled_at) {
            return true;
        }

        // Never moved: nothing to hold over.
        if !self.has_moved {
            return false;
        }

        now.saturating_duration_since(self.stilled_at) < self.still_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag_at(now: Instant) -> TagState {
        TagState::new("AA:BB", DEFAULT_STILL_THRESHOLD, now)
    }

    #[test]
    fn test_new_tag_is_still() {
        let t0 = Instant::now();
        let tag = tag_at(t0);
        assert!(!tag.is_moving_at(t0));
        assert!(!tag.is_moving_at(t0 + Duration::from_millis(1)));
        assert!(!tag.is_moving_at(t0 + Duration::from_secs(60)));
        assert_eq!(tag.last_transition_to_moving(), tag.last_transition_to_still());
    }

    #[test]
    fn test_moving_as_soon_as_flag_applied() {
        let t0 = Instant::now();
        let mut tag = tag_at(t0);
        let t1 = t0 + Duration::from_millis(250);
        assert!(tag.update_at(true, t1));
        assert!(tag.is_moving_at(t1));
    }

    #[test]
    fn test_moving_flag_at_creation_instant() {
        let t0 = Instant::now();
        let mut tag = tag_at(t0);
        tag.update_at(true, t0);
        assert!(tag.is_moving_at(t0));
    }

    #[test]
    fn test_repeated_flag_is_idempotent() {
        let t0 = Instant::now();
        let mut tag = tag_at(t0);
        let t1 = t0 + Duration::from_secs(1);
        assert!(tag.update_at(true, t1));
        assert!(!tag.update_at(true, t1 + Duration::from_secs(1)));
        assert_eq!(tag.last_transition_to_moving(), t1);

        let t3 = t0 + Duration::from_secs(3);
        assert!(tag.update_at(false, t3));
        assert!(!tag.update_at(false, t3 + Duration::from_secs(1)));
        assert_eq!(tag.last_transition_to_still(), t3);
    }

    #[test]
    fn test_still_false_at_creation_is_noop() {
        let t0 = Instant::now();
        let mut tag = tag_at(t0);
        assert!(!tag.update_at(false, t0 + Duration::from_secs(1)));
        assert_eq!(tag.last_transition_to_still(), t0);
    }

    #[test]
    fn test_grace_window_after_stop() {
        let t0 = Instant::now();
        let mut tag = tag_at(t0);
        tag.update_at(true, t0 + Duration::from_secs(1));
        let stop = t0 + Duration::from_secs(2);
        tag.update_at(false, stop);

        assert!(tag.is_moving_at(stop));
        assert!(tag.is_moving_at(stop + Duration::from_millis(3999)));
        assert!(!tag.is_moving_at(stop + DEFAULT_STILL_THRESHOLD));
        assert!(!tag.is_moving_at(stop + Duration::from_secs(10)));
    }

    #[test]
    fn test_flicker_keeps_tag_moving() {
        let t0 = Instant::now();
        let mut tag = tag_at(t0);
        for i in 0..10u64 {
            let t = t0 + Duration::from_secs(i);
            tag.update_at(i % 2 == 0, t);
            assert!(tag.is_moving_at(t + Duration::from_millis(500)));
        }
    }

    #[test]
    fn test_never_stopping_tag_stays_moving() {
        let t0 = Instant::now();
        let mut tag = tag_at(t0);
        tag.update_at(true, t0 + Duration::from_secs(1));
        assert!(tag.is_moving_at(t0 + Duration::from_secs(3600)));
    }

    #[test]
    fn test_custom_threshold() {
        let t0 = Instant::now();
        let mut tag = TagState::new("CC:DD", Duration::from_millis(500), t0);
        tag.update_at(true, t0 + Duration::from_secs(1));
        let stop = t0 + Duration::from_secs(2);
        tag.update_at(false, stop);
        assert!(tag.is_moving_at(stop + Duration::from_millis(499)));
        assert!(!tag.is_moving_at(stop + Duration::from_millis(500)));
    }

    #[test]
    fn test_clock_before_stop_counts_as_within_window() {
        let t0 = Instant::now();
        let mut tag = tag_at(t0);
        tag.update_at(true, t0 + Duration::from_secs(1));
        tag.update_at(false, t0 + Duration::from_secs(2));
        assert!(tag.is_moving_at(t0));
    }
}
