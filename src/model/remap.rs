//! Shifting stop positions across an edit.
//!
//! Given the hunks of a mutation, every offset is classified against them:
//!
//! - before the first hunk: untouched
//! - strictly inside hunk `i`'s old range: moved by `i`'s start delta, kept
//!   inside the replacement text
//! - at or after the end of hunk `i`, before the start of hunk `i + 1`: moved
//!   by `i`'s end delta
//!
//! Since hunks are absolute, the end delta of the last hunk an offset has
//! passed already contains the length change of every earlier hunk. An
//! offset sitting exactly on a hunk start belongs to the gap before it; an
//! offset sitting exactly on a pure insertion point moves past the inserted
//! text.

use crate::model::diff::Hunk;
use crate::model::stop::StopRange;

/// Map every stop through the hunks of one edit.
///
/// `hunks` are relative to the changed region, which begins at
/// `region_start` in both the old and the new text.
pub fn remap(stops: &[StopRange], hunks: &[Hunk], region_start: usize) -> Vec<StopRange> {
    let hunks: Vec<Hunk> = hunks.iter().map(|h| h.offset_by(region_start)).collect();

    stops
        .iter()
        .map(|stop| StopRange::new(map_offset(stop.start, &hunks), map_offset(stop.end, &hunks)))
        .collect()
}

/// Map one offset through absolute, ordered hunks
pub fn map_offset(offset: usize, hunks: &[Hunk]) -> usize {
    let mut owner: Option<&Hunk> = None;

    for hunk in hunks {
        if hunk.before.start < offset && offset < hunk.before.end {
            if hunk.is_length_neutral() {
                return offset;
            }
            let shifted = offset.saturating_add_signed(hunk.delta_start());
            return shifted.min(hunk.after.end);
        }
        if offset >= hunk.before.end {
            owner = Some(hunk);
            continue;
        }
        break;
    }

    match owner {
        Some(hunk) if hunk.delta_end() != 0 => offset.saturating_add_signed(hunk.delta_end()),
        _ => offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::diff::{decompose, locate_change};
    use proptest::prelude::*;
    use std::time::Duration;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    /// Diff two texts and remap `stops` the way the edit handler does
    fn remap_text(old: &str, new: &str, stops: &[StopRange]) -> Vec<StopRange> {
        let old = chars(old);
        let new = chars(new);
        let region = locate_change(&old, &new);
        let hunks = decompose(
            &old[region.old_range()],
            &new[region.new_range()],
            Duration::from_secs(3),
        )
        .unwrap();
        remap(stops, &hunks, region.start)
    }

    #[test]
    fn test_insert_before_caret_moves_it() {
        let stops = remap_text("abcdef", "abXYcdef", &[StopRange::caret(3)]);
        assert_eq!(stops, vec![StopRange::caret(5)]);
    }

    #[test]
    fn test_newline_insert_moves_end_of_document_caret() {
        let stops = remap_text("line1\nline2", "line1\n\nline2", &[StopRange::caret(11)]);
        assert_eq!(stops, vec![StopRange::caret(12)]);
    }

    #[test]
    fn test_stops_before_edit_are_untouched() {
        let stops = remap_text(
            "0123456789",
            "01234XX56789",
            &[StopRange::caret(0), StopRange::new(1, 4), StopRange::caret(7)],
        );
        assert_eq!(
            stops,
            vec![StopRange::caret(0), StopRange::new(1, 4), StopRange::caret(9)]
        );
    }

    #[test]
    fn test_caret_at_insertion_point_moves_past_inserted_text() {
        let stops = remap_text("abcdef", "abXYcdef", &[StopRange::caret(2)]);
        assert_eq!(stops, vec![StopRange::caret(4)]);
    }

    #[test]
    fn test_caret_at_start_of_replaced_text_stays() {
        // "cd" replaced by "XYZ": offset 2 sits on the hunk start
        let stops = remap_text("abcdef", "abXYZef", &[StopRange::caret(2)]);
        assert_eq!(stops, vec![StopRange::caret(2)]);
    }

    #[test]
    fn test_caret_at_end_of_replaced_text_follows_end_delta() {
        let stops = remap_text("abcdef", "abXYZef", &[StopRange::caret(4)]);
        assert_eq!(stops, vec![StopRange::caret(5)]);
    }

    #[test]
    fn test_caret_inside_deleted_text_collapses_to_deletion_point() {
        let stops = remap_text("abcdef", "abf", &[StopRange::caret(3), StopRange::caret(4)]);
        assert_eq!(stops, vec![StopRange::caret(2), StopRange::caret(2)]);
    }

    #[test]
    fn test_offset_inside_shrinking_replacement_is_clamped() {
        // Two chars inserted at 1, then 6..12 replaced by two chars
        let hunks = [Hunk::new(1..1, 1..3), Hunk::new(6..12, 8..10)];

        assert_eq!(map_offset(7, &hunks), 9);
        // Shifting by the start delta alone would land on 13, past the
        // replacement and into the text after it
        assert_eq!(map_offset(11, &hunks), 10);
        assert_eq!(map_offset(12, &hunks), 10);
        assert_eq!(
            remap(&[StopRange::new(7, 11)], &hunks, 0),
            vec![StopRange::new(9, 10)]
        );
    }

    #[test]
    fn test_selection_spanning_an_insertion_grows() {
        let stops = remap_text("abcdef", "abcXXdef", &[StopRange::new(1, 5)]);
        assert_eq!(stops, vec![StopRange::new(1, 7)]);
    }

    #[test]
    fn test_gap_between_hunks_uses_earlier_end_delta() {
        // Hunk 1 grows by one ("b" -> "BB"), hunk 2 deletes "f"
        let hunks = vec![Hunk::new(1..2, 1..3), Hunk::new(5..6, 6..6)];
        assert_eq!(map_offset(0, &hunks), 0);
        assert_eq!(map_offset(1, &hunks), 1);
        assert_eq!(map_offset(2, &hunks), 3);
        assert_eq!(map_offset(4, &hunks), 5);
        // Start of the second hunk belongs to the gap before it
        assert_eq!(map_offset(5, &hunks), 6);
        // Past the deletion: net change is zero
        assert_eq!(map_offset(6, &hunks), 6);
        assert_eq!(map_offset(7, &hunks), 7);
    }

    #[test]
    fn test_multi_hunk_edit_through_diff() {
        let stops = remap_text(
            "abcdefg",
            "aBBcdeg",
            &[StopRange::caret(3), StopRange::caret(7)],
        );
        // "d" (3) shifts by +1; end of document nets out to zero
        assert_eq!(stops, vec![StopRange::caret(4), StopRange::caret(7)]);
    }

    #[test]
    fn test_length_neutral_hunk_leaves_offsets_alone() {
        let hunks = vec![Hunk::new(2..5, 2..5)];
        assert_eq!(map_offset(3, &hunks), 3);
        assert_eq!(map_offset(9, &hunks), 9);
    }

    #[test]
    fn test_region_start_translates_local_hunks() {
        let hunks = vec![Hunk::new(0..0, 0..3)];
        let stops = remap(&[StopRange::caret(10), StopRange::caret(20)], &hunks, 15);
        assert_eq!(stops, vec![StopRange::caret(10), StopRange::caret(23)]);
    }

    proptest! {
        #[test]
        fn prop_stops_outside_changed_region_shift_by_length_change(
            text in "[a-c\n]{0,20}",
            at in 0usize..=20,
            removed in 0usize..=5,
            inserted in "[a-c\n]{0,5}",
            stop in 0usize..=20,
        ) {
            let old = chars(&text);
            let at = at.min(old.len());
            let end = (at + removed).min(old.len());
            let stop = stop.min(old.len());

            let mut new = old[..at].to_vec();
            new.extend(inserted.chars());
            new.extend_from_slice(&old[end..]);

            let region = locate_change(&old, &new);
            let old_text: String = old.iter().collect();
            let new_text: String = new.iter().collect();
            let mapped = remap_text(&old_text, &new_text, &[StopRange::caret(stop)])[0];

            if stop < region.start {
                prop_assert_eq!(mapped, StopRange::caret(stop));
            }
            if stop >= region.old_end {
                let shifted = stop + new.len() - old.len();
                prop_assert_eq!(mapped, StopRange::caret(shifted));
            }
            prop_assert!(mapped.end <= new.len());
        }

        #[test]
        fn prop_unambiguous_insertion_shifts_stops_at_or_after_it(
            text in "[a-c\n]{0,20}",
            at in 0usize..=20,
            inserted in 1usize..=5,
            stop in 0usize..=20,
        ) {
            let old = chars(&text);
            let at = at.min(old.len());
            let stop = stop.min(old.len());

            let mut new = old[..at].to_vec();
            new.extend(std::iter::repeat('X').take(inserted));
            new.extend_from_slice(&old[at..]);

            let old_text: String = old.iter().collect();
            let new_text: String = new.iter().collect();
            let mapped = remap_text(&old_text, &new_text, &[StopRange::caret(stop)])[0];

            let expected = if stop < at { stop } else { stop + inserted };
            prop_assert_eq!(mapped, StopRange::caret(expected));
        }
    }
}
