//! Idle detection: turning a resting caret or selection into a stop.

use crate::host::DocumentId;
use crate::model::activity::PollToken;

use super::AutoStops;

/// Whether a polling chain should keep going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// The token is stale, the document lost focus or was closed
    Finished,
}

/// Result of a single idle check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleOutcome {
    Untracked,
    /// An edit holds the document lock; this tick is skipped
    Contended,
    /// The user was active within the idle threshold
    Active,
    NoSelection,
    /// The caret rests where "navigate to stop" put it
    NavigationSkip,
    Recorded { added: usize, evicted: usize },
}

impl AutoStops {
    /// One scheduler tick for a polling chain started with `token`
    pub fn tick(&self, doc: DocumentId, token: PollToken) -> TickOutcome {
        let Some(context) = self.context(doc) else {
            return TickOutcome::Finished;
        };
        if context.token() != token {
            tracing::trace!("{doc}: stale poll token {token:?}");
            return TickOutcome::Finished;
        }
        if !self.host.is_focused(doc) {
            tracing::trace!("{doc}: lost focus, polling ends");
            return TickOutcome::Finished;
        }

        self.check_idle(doc);
        TickOutcome::Continue
    }

    /// Record the current selections as stops if the document has been idle
    /// long enough.
    ///
    /// Never blocks: if an edit is being processed the check is skipped.
    pub fn check_idle(&self, doc: DocumentId) -> IdleOutcome {
        let Some(context) = self.context(doc) else {
            return IdleOutcome::Untracked;
        };
        let Some(mut state) = context.try_lock_state() else {
            tracing::trace!("{doc}: document busy, skipping idle check");
            return IdleOutcome::Contended;
        };

        let now = self.time.now();
        if !context.activity().is_idle(now, self.config.idle_threshold()) {
            return IdleOutcome::Active;
        }

        let selections = self.host.read_selections(doc);
        let mut activity = context.activity();
        if selections.is_empty() {
            return IdleOutcome::NoSelection;
        }
        if activity.take_navigation_skip(&selections) {
            activity.postpone(now, self.config.idle_push());
            tracing::trace!("{doc}: caret rests on a visited stop");
            return IdleOutcome::NavigationSkip;
        }

        let created_at = self.time.unix_seconds();
        let added = selections
            .iter()
            .filter(|&&region| state.stops.add(region, created_at))
            .count();
        activity.postpone(now, self.config.idle_push());
        drop(activity);

        let evicted = state.stops.evict_oldest_while_over_capacity();
        for stop in &evicted {
            tracing::debug!("{doc}: evicted stop {}", stop.region);
        }
        if added > 0 || !evicted.is_empty() {
            tracing::debug!("{doc}: recorded {added} stops, {} tracked", state.stops.len());
            self.persist(doc, &state.stops);
        }

        IdleOutcome::Recorded {
            added,
            evicted: evicted.len(),
        }
    }
}
