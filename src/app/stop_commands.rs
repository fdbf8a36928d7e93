//! User-facing stop commands: listing, visiting, removing and clearing.

use std::fmt;

use crate::host::DocumentId;
use crate::model::stop::{StopRange, StopStore, STOPS_KEY};

use super::AutoStops;

/// One row of the stop list
#[derive(Debug, Clone, PartialEq)]
pub struct StopListEntry {
    pub region: StopRange,
    /// Creation time in seconds since the Unix epoch, if known
    pub created_at: Option<f64>,
    /// 1-based line of the stop's start
    pub line: usize,
    /// Trimmed text of that line, `<blank line>` when empty
    pub line_text: String,
    /// Age label such as `0:01:05.25 ago`
    pub ago: String,
}

impl fmt::Display for StopListEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>16}  {:<15} line {:<5} {}",
            self.ago,
            self.region.to_string(),
            self.line,
            self.line_text
        )
    }
}

/// Age label for a stop created at `created_at`, seen at `now`
pub fn format_ago(created_at: Option<f64>, now: f64) -> String {
    let Some(created_at) = created_at else {
        return "{unknown} ago".to_string();
    };
    let delta = (now - created_at).max(0.0);
    let whole = delta as u64;
    let (hours, rest) = (whole / 3600, whole % 3600);
    let (minutes, seconds) = (rest / 60, rest % 60);
    let hundredths = (delta.fract() * 100.0) as u64;
    format!("{hours}:{minutes:02}:{seconds:02}.{hundredths:02} ago")
}

/// Char offsets of line starts, for mapping stops to line numbers
struct LineIndex<'a> {
    starts: Vec<usize>,
    lines: Vec<&'a str>,
}

impl<'a> LineIndex<'a> {
    fn new(text: &'a str) -> Self {
        let lines: Vec<&str> = text.split('\n').collect();
        let mut starts = Vec::with_capacity(lines.len());
        let mut offset = 0;
        for line in &lines {
            starts.push(offset);
            offset += line.chars().count() + 1;
        }
        Self { starts, lines }
    }

    /// 0-based line containing char `offset`
    fn line_of(&self, offset: usize) -> usize {
        self.starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1)
    }

    fn text(&self, line: usize) -> &'a str {
        self.lines.get(line).map_or("", |l| l.trim())
    }
}

impl AutoStops {
    /// Stops of `doc`, newest first.
    ///
    /// Untracked documents are listed from their persisted records.
    pub fn list_stops(&self, doc: DocumentId) -> Vec<StopListEntry> {
        let stops = match self.context(doc) {
            Some(context) => context.lock_state().stops.clone(),
            None => self.persisted_stops(doc),
        };
        if stops.is_empty() {
            self.host.notify(doc, "No auto-stops recorded yet.");
            return Vec::new();
        }

        let text = self.host.read_text(doc).unwrap_or_default();
        let index = LineIndex::new(&text);
        let now = self.time.unix_seconds();

        stops
            .newest_first()
            .map(|stop| {
                let line = index.line_of(stop.region.start);
                let line_text = match index.text(line) {
                    "" => "<blank line>".to_string(),
                    text => text.to_string(),
                };
                StopListEntry {
                    region: stop.region,
                    created_at: stop.created_at,
                    line: line + 1,
                    line_text,
                    ago: format_ago(stop.created_at, now),
                }
            })
            .collect()
    }

    /// Forget one stop. Returns false if it was not tracked.
    pub fn remove_stop(&self, doc: DocumentId, region: StopRange) -> bool {
        let removed = match self.context(doc) {
            Some(context) => {
                let mut state = context.lock_state();
                let removed = state.stops.remove(region);
                if removed {
                    self.persist(doc, &state.stops);
                }
                removed
            }
            None => {
                let mut stops = self.persisted_stops(doc);
                let removed = stops.remove(region);
                if removed {
                    self.persist(doc, &stops);
                }
                removed
            }
        };
        if removed {
            tracing::debug!("{doc}: removed stop {region}");
        }
        removed
    }

    /// Forget every stop of `doc`, including the persisted records
    pub fn clear_stops(&self, doc: DocumentId) {
        match self.context(doc) {
            Some(context) => {
                let mut state = context.lock_state();
                state.stops.clear();
                self.host.erase_persisted(doc, STOPS_KEY);
            }
            None => self.host.erase_persisted(doc, STOPS_KEY),
        }
        self.host.notify(doc, "Erased all auto-stops records.");
    }

    /// Put a caret at the start of `region`.
    ///
    /// The next idle check that finds the caret still there records nothing,
    /// so visiting a stop does not spawn a new one.
    pub fn navigate_to_stop(&self, doc: DocumentId, region: StopRange) {
        self.host.set_selections(doc, &[StopRange::caret(region.start)]);
        if let Some(context) = self.context(doc) {
            let mut activity = context.activity();
            activity.arm_navigation_skip(region.start);
            activity.touch(self.time.now());
        }
    }

    /// Select the whole of `region`, leaving the list
    pub fn select_stop(&self, doc: DocumentId, region: StopRange) {
        self.host.set_selections(doc, &[region]);
        if let Some(context) = self.context(doc) {
            context.activity().touch(self.time.now());
        }
    }

    fn persisted_stops(&self, doc: DocumentId) -> StopStore {
        let persisted = self.host.get_persisted(doc, STOPS_KEY);
        StopStore::from_persisted(persisted.as_ref(), self.config.max_stops)
    }
}
