//! Scripted editing sessions.
//!
//! A replay script is a JSON list of editor events (focus, select, edit,
//! wait, ...) that [`Replay`] feeds to an [`AutoStops`] engine backed by a
//! [`MemoryHost`] and a [`ManualTimeSource`]. Waiting advances the manual
//! clock one poll interval at a time and drives the focused document's
//! polling chain synchronously, so a replay is deterministic.
//!
//! ```json
//! {
//!   "start_unix": 1700000000.0,
//!   "steps": [
//!     { "op": "open", "doc": 1, "text": "hello world" },
//!     { "op": "focus", "doc": 1 },
//!     { "op": "select", "doc": 1, "ranges": [[5, 5]] },
//!     { "op": "wait", "secs": 2.5 },
//!     { "op": "insert", "doc": 1, "at": 0, "text": ">> " }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::app::{AutoStops, StopListEntry, TickOutcome};
use crate::config::Config;
use crate::host::{DocumentId, MemoryHost};
use crate::model::activity::PollToken;
use crate::model::stop::StopRange;
use crate::services::time_source::ManualTimeSource;

/// One scripted editor event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Open { doc: DocumentId, text: String },
    Focus { doc: DocumentId },
    /// Replace the selections; `[a, b]` pairs, carets as `[n, n]`
    Select { doc: DocumentId, ranges: Vec<StopRange> },
    Insert { doc: DocumentId, at: usize, text: String },
    Delete { doc: DocumentId, start: usize, end: usize },
    SetText { doc: DocumentId, text: String },
    Wait { secs: f64 },
    Close { doc: DocumentId },
    Remove { doc: DocumentId, region: StopRange },
    Clear { doc: DocumentId },
    Navigate { doc: DocumentId, region: StopRange },
    /// Snapshot the stop list into the report
    List { doc: DocumentId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    /// Wall-clock start of the session; the real clock when absent
    #[serde(default)]
    pub start_unix: Option<f64>,
    pub steps: Vec<Step>,
}

impl Script {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ReplayError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ReplayError::IoError(e.to_string()))?;
        serde_json::from_str(&contents).map_err(|e| ReplayError::ParseError(e.to_string()))
    }
}

/// Replay script error types
#[derive(Debug)]
pub enum ReplayError {
    IoError(String),
    ParseError(String),
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayError::IoError(msg) => write!(f, "IO error: {msg}"),
            ReplayError::ParseError(msg) => write!(f, "Parse error: {msg}"),
        }
    }
}

impl std::error::Error for ReplayError {}

/// Stop list of one document at some point of the replay
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub doc: DocumentId,
    /// Seconds since the replay started
    pub at: f64,
    pub entries: Vec<StopListEntry>,
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} at {:.2}s: {} stops",
            self.doc,
            self.at,
            self.entries.len()
        )?;
        for entry in &self.entries {
            writeln!(f, "  {entry}")?;
        }
        Ok(())
    }
}

/// Outcome of a replay
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReplayReport {
    /// Listings requested by `list` steps, in order
    pub listings: Vec<Listing>,
    /// Final stop list of every document still open
    pub documents: Vec<Listing>,
    /// Status messages shown to the user
    pub notifications: Vec<(DocumentId, String)>,
    /// Edits whose stops could not be remapped
    pub failed_edits: usize,
}

impl fmt::Display for ReplayReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for listing in &self.listings {
            write!(f, "{listing}")?;
        }
        if !self.listings.is_empty() {
            writeln!(f)?;
        }
        writeln!(f, "Final state:")?;
        for listing in &self.documents {
            write!(f, "{listing}")?;
        }
        if !self.notifications.is_empty() {
            writeln!(f, "Notifications:")?;
            for (doc, message) in &self.notifications {
                writeln!(f, "  {doc}: {message}")?;
            }
        }
        if self.failed_edits > 0 {
            writeln!(f, "{} edits left stops unmapped", self.failed_edits)?;
        }
        Ok(())
    }
}

/// Drives an engine through a script
pub struct Replay {
    host: Arc<MemoryHost>,
    time: Arc<ManualTimeSource>,
    engine: AutoStops,
    poll_interval: Duration,
    /// Focused document and its polling session
    session: Option<(DocumentId, PollToken)>,
    open: BTreeSet<DocumentId>,
    report: ReplayReport,
}

impl Replay {
    pub fn new(config: Config, start_unix: Option<f64>) -> Self {
        let host = MemoryHost::shared();
        let time = Arc::new(match start_unix {
            Some(start) => ManualTimeSource::starting_at(start),
            None => ManualTimeSource::new(),
        });
        let poll_interval = config.poll_interval();
        let engine = AutoStops::new(host.clone(), config, time.clone());

        Self {
            host,
            time,
            engine,
            poll_interval,
            session: None,
            open: BTreeSet::new(),
            report: ReplayReport::default(),
        }
    }

    pub fn host(&self) -> &Arc<MemoryHost> {
        &self.host
    }

    pub fn engine(&self) -> &AutoStops {
        &self.engine
    }

    /// Run every step, then report
    pub fn run(mut self, steps: &[Step]) -> ReplayReport {
        for step in steps {
            self.apply(step);
        }
        self.finish()
    }

    pub fn apply(&mut self, step: &Step) {
        tracing::trace!("Replay step {step:?}");
        match step {
            Step::Open { doc, text } => {
                self.host.open(*doc, text);
                self.open.insert(*doc);
            }
            Step::Focus { doc } => {
                self.host.focus(*doc);
                let token = self.engine.on_activated(*doc);
                self.session = Some((*doc, token));
            }
            Step::Select { doc, ranges } => {
                self.host.select(*doc, ranges);
                self.engine.on_selection_modified(*doc);
            }
            Step::Insert { doc, at, text } => {
                self.host.insert(*doc, *at, text);
                self.modified(*doc);
            }
            Step::Delete { doc, start, end } => {
                self.host.delete(*doc, *start, *end);
                self.modified(*doc);
            }
            Step::SetText { doc, text } => {
                self.host.set_text(*doc, text);
                self.modified(*doc);
            }
            Step::Wait { secs } => {
                let total = Duration::try_from_secs_f64(*secs).unwrap_or_else(|e| {
                    tracing::warn!("Ignoring wait of {secs}s: {e}");
                    Duration::ZERO
                });
                self.wait(total);
            }
            Step::Close { doc } => {
                self.engine.on_close(*doc);
                self.host.close(*doc);
                self.open.remove(doc);
                if self.session.is_some_and(|(focused, _)| focused == *doc) {
                    self.session = None;
                }
            }
            Step::Remove { doc, region } => {
                self.engine.remove_stop(*doc, *region);
            }
            Step::Clear { doc } => self.engine.clear_stops(*doc),
            Step::Navigate { doc, region } => self.engine.navigate_to_stop(*doc, *region),
            Step::List { doc } => {
                let listing = self.listing(*doc);
                self.report.listings.push(listing);
            }
        }
    }

    fn modified(&mut self, doc: DocumentId) {
        if self.engine.on_modified(doc).is_err() {
            self.report.failed_edits += 1;
        }
    }

    /// Advance the clock, ticking the focused document once per poll interval
    fn wait(&mut self, total: Duration) {
        let mut remaining = total;
        while remaining >= self.poll_interval {
            self.time.advance(self.poll_interval);
            remaining -= self.poll_interval;

            if let Some((doc, token)) = self.session {
                if self.engine.tick(doc, token) == TickOutcome::Finished {
                    self.session = None;
                }
            }
        }
        self.time.advance(remaining);
    }

    fn listing(&self, doc: DocumentId) -> Listing {
        Listing {
            doc,
            at: self.time.elapsed().as_secs_f64(),
            entries: self.engine.list_stops(doc),
        }
    }

    pub fn finish(mut self) -> ReplayReport {
        self.report.notifications = self.host.notifications();
        self.report.documents = self
            .open
            .iter()
            .map(|&doc| self.listing(doc))
            .collect();
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DOC: DocumentId = DocumentId(1);

    fn steps(value: serde_json::Value) -> Vec<Step> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_script() {
        let script: Script = serde_json::from_value(json!({
            "steps": [
                {"op": "open", "doc": 1, "text": "abc"},
                {"op": "select", "doc": 1, "ranges": [[2, 0]]},
                {"op": "set_text", "doc": 1, "text": "abcd"},
                {"op": "wait", "secs": 1.5}
            ]
        }))
        .unwrap();

        assert_eq!(script.start_unix, None);
        assert_eq!(
            script.steps[1],
            Step::Select {
                doc: DOC,
                ranges: vec![StopRange::new(0, 2)]
            }
        );
        assert_eq!(script.steps[3], Step::Wait { secs: 1.5 });
    }

    #[test]
    fn test_unknown_op_is_rejected() {
        let result: Result<Vec<Step>, _> =
            serde_json::from_value(json!([{"op": "teleport", "doc": 1}]));
        assert!(result.is_err());
    }

    #[test]
    fn test_wait_records_idle_caret_then_edit_moves_it() {
        let report = Replay::new(Config::default(), Some(1000.0)).run(&steps(json!([
            {"op": "open", "doc": 1, "text": "abcdef"},
            {"op": "focus", "doc": 1},
            {"op": "select", "doc": 1, "ranges": [[3, 3]]},
            {"op": "wait", "secs": 2.5},
            {"op": "insert", "doc": 1, "at": 2, "text": "XY"}
        ])));

        assert_eq!(report.documents.len(), 1);
        let entries = &report.documents[0].entries;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].region, StopRange::caret(5));
        assert_eq!(entries[0].line_text, "abXYcdef");
        assert_eq!(report.failed_edits, 0);
    }

    #[test]
    fn test_short_wait_records_nothing() {
        let report = Replay::new(Config::default(), Some(1000.0)).run(&steps(json!([
            {"op": "open", "doc": 1, "text": "abcdef"},
            {"op": "focus", "doc": 1},
            {"op": "select", "doc": 1, "ranges": [[3, 3]]},
            {"op": "wait", "secs": 1.5},
            {"op": "list", "doc": 1}
        ])));

        assert!(report.listings[0].entries.is_empty());
    }

    #[test]
    fn test_list_steps_snapshot_progress() {
        let report = Replay::new(Config::default(), Some(1000.0)).run(&steps(json!([
            {"op": "open", "doc": 1, "text": "one\ntwo\nthree"},
            {"op": "focus", "doc": 1},
            {"op": "select", "doc": 1, "ranges": [[1, 1]]},
            {"op": "wait", "secs": 3},
            {"op": "list", "doc": 1},
            {"op": "select", "doc": 1, "ranges": [[8, 13]]},
            {"op": "wait", "secs": 3},
            {"op": "list", "doc": 1}
        ])));

        assert_eq!(report.listings.len(), 2);
        assert_eq!(report.listings[0].entries.len(), 1);
        let latest = &report.listings[1].entries;
        assert_eq!(latest[0].region, StopRange::new(8, 13));
        assert_eq!(latest[0].line, 3);
        assert_eq!(latest[1].line, 1);
        assert_eq!(report.listings[1].at, 6.0);
    }

    #[test]
    fn test_unfocused_document_is_not_polled() {
        let report = Replay::new(Config::default(), Some(1000.0)).run(&steps(json!([
            {"op": "open", "doc": 1, "text": "abcdef"},
            {"op": "open", "doc": 2, "text": "ghijkl"},
            {"op": "focus", "doc": 1},
            {"op": "focus", "doc": 2},
            {"op": "select", "doc": 1, "ranges": [[3, 3]]},
            {"op": "wait", "secs": 5}
        ])));

        let doc1 = report.documents.iter().find(|l| l.doc == DOC).unwrap();
        assert!(doc1.entries.is_empty());
        let doc2 = report.documents.iter().find(|l| l.doc == DocumentId(2)).unwrap();
        assert_eq!(doc2.entries.len(), 1);
        assert_eq!(doc2.entries[0].region, StopRange::caret(0));
    }

    #[test]
    fn test_closed_document_leaves_the_report() {
        let report = Replay::new(Config::default(), Some(1000.0)).run(&steps(json!([
            {"op": "open", "doc": 1, "text": "abcdef"},
            {"op": "focus", "doc": 1},
            {"op": "wait", "secs": 3},
            {"op": "close", "doc": 1},
            {"op": "wait", "secs": 3}
        ])));

        assert!(report.documents.is_empty());
    }

    #[test]
    fn test_failed_edits_are_counted() {
        let mut config = Config::default();
        config.diff.base_budget_secs = 0;

        let report = Replay::new(config, Some(1000.0)).run(&steps(json!([
            {"op": "open", "doc": 1, "text": "abcdefgh"},
            {"op": "focus", "doc": 1},
            {"op": "set_text", "doc": 1, "text": "aXcdefYZh"}
        ])));

        assert_eq!(report.failed_edits, 1);
        assert!(report.to_string().contains("1 edits left stops unmapped"));
    }

    #[test]
    fn test_clear_step_notifies() {
        let report = Replay::new(Config::default(), Some(1000.0)).run(&steps(json!([
            {"op": "open", "doc": 1, "text": "abcdef"},
            {"op": "focus", "doc": 1},
            {"op": "wait", "secs": 3},
            {"op": "clear", "doc": 1},
            {"op": "list", "doc": 1}
        ])));

        assert!(report.listings[0].entries.is_empty());
        assert!(report
            .notifications
            .iter()
            .any(|(_, m)| m == "Erased all auto-stops records."));
    }
}
