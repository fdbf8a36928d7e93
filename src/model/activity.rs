//! Per-document activity state used by the idle detector.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::model::stop::StopRange;

/// Identifies one focus session of a document.
///
/// A new token is issued every time the document is focused; a scheduled
/// poll only acts while the token it captured is still current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PollToken(pub u64);

impl PollToken {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug)]
pub struct Activity {
    last_activity: Instant,
    token: PollToken,
    /// Caret offset placed by "navigate to stop"; the next idle check that
    /// finds the caret there consumes it instead of recording a stop
    navigation_skip: Option<usize>,
}

impl Activity {
    pub fn new(now: Instant) -> Self {
        Self {
            last_activity: now,
            token: PollToken::next(),
            navigation_skip: None,
        }
    }

    /// Record user activity (selection change or mutation)
    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    /// Move the activity timestamp `by` into the future so idle checks stay
    /// quiet until the user acts again
    pub fn postpone(&mut self, now: Instant, by: Duration) {
        self.last_activity = now.checked_add(by).unwrap_or(now);
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Whether nothing happened for at least `threshold`
    pub fn is_idle(&self, now: Instant, threshold: Duration) -> bool {
        now.checked_duration_since(self.last_activity)
            .is_some_and(|idle| idle >= threshold)
    }

    pub fn token(&self) -> PollToken {
        self.token
    }

    /// Start a new focus session, invalidating polls from the previous one
    pub fn renew_token(&mut self) -> PollToken {
        self.token = PollToken::next();
        self.token
    }

    pub fn arm_navigation_skip(&mut self, offset: usize) {
        self.navigation_skip = Some(offset);
    }

    /// Consume the navigation skip if the first selection is a caret sitting
    /// exactly on it
    pub fn take_navigation_skip(&mut self, selections: &[StopRange]) -> bool {
        match (self.navigation_skip, selections.first()) {
            (Some(offset), Some(first)) if first.is_caret() && first.start == offset => {
                self.navigation_skip = None;
                true
            }
            _ => false,
        }
    }
}
