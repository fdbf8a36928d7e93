//! Character-level change detection between two snapshots of a document.
//!
//! Two steps:
//! 1. [`locate_change`] trims the common prefix and suffix, isolating the one
//!    contiguous region that differs.
//! 2. [`decompose`] splits that region into hunks by repeatedly carving out
//!    the longest common substring (matching blocks) and reporting the gaps
//!    between them. The search is bounded by a deadline so pathological
//!    inputs fail with [`DiffError::Timeout`] instead of stalling the editor.
//!
//! All offsets are character (Unicode scalar) offsets, not bytes.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::time::{Duration, Instant};

use crate::config::DiffConfig;

/// The single region where two texts differ, after trimming the common
/// prefix and suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangedRegion {
    /// Length of the common prefix; the region starts here in both texts
    pub start: usize,
    /// End of the region in the old text
    pub old_end: usize,
    /// End of the region in the new text
    pub new_end: usize,
}

impl ChangedRegion {
    pub fn old_range(&self) -> Range<usize> {
        self.start..self.old_end
    }

    pub fn new_range(&self) -> Range<usize> {
        self.start..self.new_end
    }

    /// Size used to scale the decomposition budget
    pub fn len(&self) -> usize {
        (self.old_end - self.start).max(self.new_end - self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.old_end == self.start && self.new_end == self.start
    }
}

/// Find the region where `old` and `new` differ.
///
/// When the common prefix and suffix overlap (an edit next to a run of
/// identical characters, e.g. a newline inserted beside another newline),
/// the suffix is shortened just enough that both ranges stay well formed.
pub fn locate_change(old: &[char], new: &[char]) -> ChangedRegion {
    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let mut suffix = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let shortest = old.len().min(new.len());
    if prefix + suffix > shortest {
        suffix -= prefix + suffix - shortest;
    }

    ChangedRegion {
        start: prefix,
        old_end: old.len() - suffix,
        new_end: new.len() - suffix,
    }
}

/// One contiguous region of the old text and its replacement in the new text.
///
/// Either side may be empty (pure insertion or pure deletion).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub before: Range<usize>,
    pub after: Range<usize>,
}

impl Hunk {
    pub fn new(before: Range<usize>, after: Range<usize>) -> Self {
        Self { before, after }
    }

    /// Shift applied to offsets anchored at the start of the hunk
    pub fn delta_start(&self) -> isize {
        self.after.start as isize - self.before.start as isize
    }

    /// Shift applied to offsets at or past the end of the hunk
    pub fn delta_end(&self) -> isize {
        self.after.end as isize - self.before.end as isize
    }

    /// True when the hunk moves nothing (an equal-length replacement at an
    /// unshifted position)
    pub fn is_length_neutral(&self) -> bool {
        self.delta_start() == 0 && self.delta_end() == 0
    }

    /// Translate both sides by `offset`
    pub fn offset_by(&self, offset: usize) -> Self {
        Self {
            before: self.before.start + offset..self.before.end + offset,
            after: self.after.start + offset..self.after.end + offset,
        }
    }
}

/// Errors raised while diffing a mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffError {
    /// The hunk search exceeded its budget
    Timeout { region_len: usize, budget: Duration },
    /// The before/after change lists did not pair up one to one
    UnexpectedShape { before: usize, after: usize },
}

impl fmt::Display for DiffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffError::Timeout { region_len, budget } => write!(
                f,
                "diff timed out after {:.1}s on a {region_len}-character change",
                budget.as_secs_f64()
            ),
            DiffError::UnexpectedShape { before, after } => write!(
                f,
                "unexpected diff shape: {before} removed ranges vs {after} inserted ranges"
            ),
        }
    }
}

impl std::error::Error for DiffError {}

/// Time allowed to decompose a changed region of `region_len` characters
pub fn diff_budget(region_len: usize, config: &DiffConfig) -> Duration {
    let extra = region_len as u64 / config.chars_per_budget_sec.max(1);
    Duration::from_secs(config.base_budget_secs.saturating_add(extra))
}

/// Split an isolated changed region into ordered hunks.
///
/// `old` and `new` are the changed slices returned by [`locate_change`];
/// the hunks are expressed relative to the start of those slices.
pub fn decompose(old: &[char], new: &[char], budget: Duration) -> Result<Vec<Hunk>, DiffError> {
    if old.is_empty() && new.is_empty() {
        return Ok(Vec::new());
    }
    if old.is_empty() || new.is_empty() {
        return Ok(vec![Hunk::new(0..old.len(), 0..new.len())]);
    }

    let matcher = Matcher::new(old, new, budget);
    let blocks = matcher.matching_blocks()?;
    let (removed, inserted) = change_lists(&blocks, old.len(), new.len());
    pair_changes(removed, inserted)
}

/// Zip the "before" and "after" change lists into hunks.
///
/// The lists must have the same length; anything else means the matcher
/// produced an inconsistent decomposition.
pub fn pair_changes(
    removed: Vec<Range<usize>>,
    inserted: Vec<Range<usize>>,
) -> Result<Vec<Hunk>, DiffError> {
    if removed.len() != inserted.len() {
        return Err(DiffError::UnexpectedShape {
            before: removed.len(),
            after: inserted.len(),
        });
    }
    Ok(removed
        .into_iter()
        .zip(inserted)
        .map(|(before, after)| Hunk::new(before, after))
        .collect())
}

/// A run of `len` identical characters at `old` in the old text and `new`
/// in the new text
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Block {
    old: usize,
    new: usize,
    len: usize,
}

/// Gaps between consecutive matching blocks, as parallel lists
fn change_lists(
    blocks: &[Block],
    old_len: usize,
    new_len: usize,
) -> (Vec<Range<usize>>, Vec<Range<usize>>) {
    let mut removed = Vec::new();
    let mut inserted = Vec::new();
    let (mut old_pos, mut new_pos) = (0, 0);

    let sentinel = Block {
        old: old_len,
        new: new_len,
        len: 0,
    };
    for block in blocks.iter().chain(std::iter::once(&sentinel)) {
        if old_pos < block.old || new_pos < block.new {
            removed.push(old_pos..block.old);
            inserted.push(new_pos..block.new);
        }
        old_pos = block.old + block.len;
        new_pos = block.new + block.len;
    }

    (removed, inserted)
}

/// Units of matcher work (row steps and candidate positions) between two
/// deadline checks
const DEADLINE_STRIDE: usize = 4096;

struct Matcher<'a> {
    old: &'a [char],
    new: &'a [char],
    /// Positions of every character in `new`, ascending
    positions: HashMap<char, Vec<usize>>,
    deadline: Option<Instant>,
    budget: Duration,
}

impl<'a> Matcher<'a> {
    fn new(old: &'a [char], new: &'a [char], budget: Duration) -> Self {
        let mut positions: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, c) in new.iter().enumerate() {
            positions.entry(*c).or_default().push(j);
        }
        Self {
            old,
            new,
            positions,
            deadline: Instant::now().checked_add(budget),
            budget,
        }
    }

    fn check_deadline(&self) -> Result<(), DiffError> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(DiffError::Timeout {
                region_len: self.old.len().max(self.new.len()),
                budget: self.budget,
            }),
            _ => Ok(()),
        }
    }

    /// Count one unit of work, checking the deadline once per stride
    fn charge(&self, work: &mut usize) -> Result<(), DiffError> {
        *work += 1;
        if *work < DEADLINE_STRIDE {
            return Ok(());
        }
        *work = 0;
        self.check_deadline()
    }

    /// All matching blocks, ordered by position
    fn matching_blocks(&self) -> Result<Vec<Block>, DiffError> {
        let mut blocks = Vec::new();
        let mut pending = vec![(0, self.old.len(), 0, self.new.len())];

        while let Some((old_lo, old_hi, new_lo, new_hi)) = pending.pop() {
            let block = self.longest_match(old_lo, old_hi, new_lo, new_hi)?;
            if block.len == 0 {
                continue;
            }
            if old_lo < block.old && new_lo < block.new {
                pending.push((old_lo, block.old, new_lo, block.new));
            }
            if block.old + block.len < old_hi && block.new + block.len < new_hi {
                pending.push((block.old + block.len, old_hi, block.new + block.len, new_hi));
            }
            blocks.push(block);
        }

        blocks.sort_unstable();
        Ok(blocks)
    }

    /// Longest common substring of `old[old_lo..old_hi]` and
    /// `new[new_lo..new_hi]`; the earliest one wins ties.
    fn longest_match(
        &self,
        old_lo: usize,
        old_hi: usize,
        new_lo: usize,
        new_hi: usize,
    ) -> Result<Block, DiffError> {
        self.check_deadline()?;

        let mut best = Block {
            old: old_lo,
            new: new_lo,
            len: 0,
        };
        // run_ends[j] = length of the match ending at new[j] for the previous
        // row; both maps are reused across rows
        let mut run_ends: HashMap<usize, usize> = HashMap::new();
        let mut next: HashMap<usize, usize> = HashMap::new();
        let mut work = 0usize;

        for i in old_lo..old_hi {
            next.clear();
            let positions = self.positions.get(&self.old[i]).map_or(&[][..], Vec::as_slice);
            let from = positions.partition_point(|&j| j < new_lo);
            for &j in positions[from..].iter().take_while(|&&j| j < new_hi) {
                let len = j
                    .checked_sub(1)
                    .and_then(|prev| run_ends.get(&prev))
                    .copied()
                    .unwrap_or(0)
                    + 1;
                next.insert(j, len);
                if len > best.len {
                    best = Block {
                        old: i + 1 - len,
                        new: j + 1 - len,
                        len,
                    };
                }

                self.charge(&mut work)?;
            }
            std::mem::swap(&mut run_ends, &mut next);

            self.charge(&mut work)?;
        }

        Ok(best)
    }
}
