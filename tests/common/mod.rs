pub mod tracing;

use autostops::services::time_source::ManualTimeSource;
use autostops::{AutoStops, Config, DocumentId, MemoryHost, StopRange};
use std::sync::Arc;
use std::time::Duration;

/// An engine wired to an in-memory host and a hand-driven clock
pub struct Session {
    pub host: Arc<MemoryHost>,
    pub time: Arc<ManualTimeSource>,
    pub engine: Arc<AutoStops>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        tracing::init_tracing_from_env();
        let host = MemoryHost::shared();
        let time = Arc::new(ManualTimeSource::starting_at(1_700_000_000.0));
        let engine = Arc::new(AutoStops::new(host.clone(), config, time.clone()));
        Self { host, time, engine }
    }

    /// Open and focus `doc`
    pub fn open(&self, doc: DocumentId, text: &str) {
        self.host.open(doc, text);
        self.host.focus(doc);
        self.engine.on_activated(doc);
    }

    /// Move the selection, then stay idle for `idle`
    pub fn rest(&self, doc: DocumentId, selections: &[StopRange], idle: Duration) {
        self.host.select(doc, selections);
        self.engine.on_selection_modified(doc);
        self.time.advance(idle);
        self.engine.check_idle(doc);
    }

    pub fn stops(&self, doc: DocumentId) -> Vec<StopRange> {
        match self.engine.context(doc) {
            Some(context) => {
                let state = context.lock_state();
                state.stops.ranges()
            }
            None => Vec::new(),
        }
    }
}
