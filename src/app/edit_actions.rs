//! Keeping stops anchored across document mutations.

use crate::host::DocumentId;
use crate::model::diff::{decompose, diff_budget, locate_change, DiffError};
use crate::model::remap::remap;

use super::{AutoStops, DocumentState};

/// What a mutation callback did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// The document has never been focused (or is gone); nothing tracked
    Untracked,
    /// The text matches the last snapshot; stops were not touched
    Unchanged,
    /// Stops were remapped through `hunks` hunks
    Remapped { hunks: usize },
}

impl AutoStops {
    /// The document's text changed.
    ///
    /// Diffs the new text against the last snapshot and moves every stop
    /// accordingly. The stop store is updated all at once or not at all: on a
    /// [`DiffError`] the stops keep their previous positions, the user is
    /// notified and the error is returned. The snapshot only advances once
    /// the stops have been remapped, so it always matches their coordinates.
    pub fn on_modified(&self, doc: DocumentId) -> Result<EditOutcome, DiffError> {
        let Some(context) = self.context(doc) else {
            return Ok(EditOutcome::Untracked);
        };

        let mut state = context.lock_state();
        context
            .activity()
            .postpone(self.time.now(), self.config.idle_push());

        let Some(new_snapshot) = self.host.read_text(doc) else {
            drop(state);
            context.activity().touch(self.time.now());
            return Ok(EditOutcome::Untracked);
        };

        if new_snapshot == state.snapshot {
            drop(state);
            context.activity().touch(self.time.now());
            tracing::trace!("{doc}: modification without net text change");
            return Ok(EditOutcome::Unchanged);
        }

        let result = self.remap_stops(doc, &mut state, &new_snapshot);
        if result.is_ok() {
            state.snapshot = new_snapshot;
        }
        drop(state);

        context.activity().touch(self.time.now());

        match result {
            Ok(hunks) => Ok(EditOutcome::Remapped { hunks }),
            Err(e) => {
                tracing::warn!("{doc}: stops left in place, {e}");
                self.host.notify(
                    doc,
                    &format!("Auto stops could not follow this edit: {e}"),
                );
                Err(e)
            }
        }
    }

    /// Diff the snapshot against `new_text` and commit the remapped stops.
    /// Returns the number of hunks.
    fn remap_stops(
        &self,
        doc: DocumentId,
        state: &mut DocumentState,
        new_text: &str,
    ) -> Result<usize, DiffError> {
        let old: Vec<char> = state.snapshot.chars().collect();
        let new: Vec<char> = new_text.chars().collect();

        let region = locate_change(&old, &new);
        let budget = diff_budget(region.len(), &self.config.diff);
        let hunks = decompose(&old[region.old_range()], &new[region.new_range()], budget)?;

        if state.stops.is_empty() {
            return Ok(hunks.len());
        }

        let before = state.stops.ranges();
        let after = remap(&before, &hunks, region.start);
        if after != before {
            tracing::debug!(
                "{doc}: remapped {} stops through {} hunks at {}",
                after.len(),
                hunks.len(),
                region.start
            );
            state.stops.replace_ranges(after);
            self.persist(doc, &state.stops);
        }

        Ok(hunks.len())
    }
}
