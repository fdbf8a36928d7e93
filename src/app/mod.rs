//! The stop engine and its per-document lifecycle.
//!
//! [`AutoStops`] owns one [`DocumentContext`] per focused-at-least-once
//! document. Contexts are created on focus and destroyed on close. Host
//! callbacks are split across files by concern:
//!
//! - `edit_actions`: document mutations (diff + remap)
//! - `idle_actions`: polling ticks and idle checks
//! - `stop_commands`: list / remove / clear / navigate

mod edit_actions;
mod idle_actions;
mod stop_commands;

pub use edit_actions::EditOutcome;
pub use idle_actions::{IdleOutcome, TickOutcome};
pub use stop_commands::StopListEntry;

use std::collections::HashMap;
use std::sync::{Arc, LockResult, Mutex, MutexGuard, TryLockError};
use std::time::Instant;

use crate::config::Config;
use crate::host::{DocumentId, SharedHost};
use crate::model::activity::{Activity, PollToken};
use crate::model::stop::{StopStore, STOPS_KEY};
use crate::services::poller::{self, PollerHandle};
use crate::services::time_source::SharedTimeSource;

/// State guarded by the document lock: everything an edit or an idle check
/// reads and rewrites together
#[derive(Debug)]
pub struct DocumentState {
    pub stops: StopStore,
    /// Document text as of the last processed mutation; the diff baseline
    pub snapshot: String,
}

/// Everything the engine tracks for one document
#[derive(Debug)]
pub struct DocumentContext {
    id: DocumentId,
    state: Mutex<DocumentState>,
    /// Kept apart from `state` so selection changes never wait on a remap.
    /// Lock order: `state` before `activity`.
    activity: Mutex<Activity>,
    poller: Mutex<Option<PollerHandle>>,
}

fn recover<'a, T>(result: LockResult<MutexGuard<'a, T>>) -> MutexGuard<'a, T> {
    result.unwrap_or_else(|poisoned| {
        tracing::warn!("Recovering from a poisoned document lock");
        poisoned.into_inner()
    })
}

impl DocumentContext {
    fn new(id: DocumentId, state: DocumentState, now: Instant) -> Self {
        Self {
            id,
            state: Mutex::new(state),
            activity: Mutex::new(Activity::new(now)),
            poller: Mutex::new(None),
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// Blocking acquisition, used by mutations which must never be dropped
    pub fn lock_state(&self) -> MutexGuard<'_, DocumentState> {
        recover(self.state.lock())
    }

    /// Non-blocking acquisition, used by idle checks which rather skip a tick
    pub fn try_lock_state(&self) -> Option<MutexGuard<'_, DocumentState>> {
        match self.state.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => {
                tracing::warn!("Recovering from a poisoned document lock");
                Some(poisoned.into_inner())
            }
            Err(TryLockError::WouldBlock) => None,
        }
    }

    pub fn activity(&self) -> MutexGuard<'_, Activity> {
        recover(self.activity.lock())
    }

    pub fn token(&self) -> PollToken {
        self.activity().token()
    }

    fn replace_poller(&self, handle: Option<PollerHandle>) {
        let previous = std::mem::replace(&mut *recover(self.poller.lock()), handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }
}

/// Tracks stops for every open document
pub struct AutoStops {
    host: SharedHost,
    config: Config,
    time: SharedTimeSource,
    documents: Mutex<HashMap<DocumentId, Arc<DocumentContext>>>,
}

impl AutoStops {
    pub fn new(host: SharedHost, config: Config, time: SharedTimeSource) -> Self {
        Self {
            host,
            config,
            time,
            documents: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn host(&self) -> &SharedHost {
        &self.host
    }

    /// Context of a tracked document
    pub fn context(&self, doc: DocumentId) -> Option<Arc<DocumentContext>> {
        recover(self.documents.lock()).get(&doc).cloned()
    }

    pub fn is_tracked(&self, doc: DocumentId) -> bool {
        recover(self.documents.lock()).contains_key(&doc)
    }

    /// The document gained focus.
    ///
    /// Creates the document's context on first focus, reloads its persisted
    /// stops, restarts the idle timer and opens a new polling session whose
    /// token is returned. Use [`start_polling`](Self::start_polling) to also
    /// spawn the periodic task.
    pub fn on_activated(&self, doc: DocumentId) -> PollToken {
        let context = self.context(doc).unwrap_or_else(|| self.track(doc));

        {
            // Persisted stops are read and installed under the document lock
            let mut state = context.lock_state();
            let persisted = self.host.get_persisted(doc, STOPS_KEY);
            state.stops = StopStore::from_persisted(persisted.as_ref(), self.config.max_stops);
        }

        let mut activity = context.activity();
        activity.touch(self.time.now());
        activity.renew_token()
    }

    /// Create the context of a newly focused document
    fn track(&self, doc: DocumentId) -> Arc<DocumentContext> {
        let snapshot = self.host.read_text(doc).unwrap_or_default();
        let context = Arc::new(DocumentContext::new(
            doc,
            DocumentState {
                stops: StopStore::new(self.config.max_stops),
                snapshot,
            },
            self.time.now(),
        ));

        let mut documents = recover(self.documents.lock());
        let context = documents.entry(doc).or_insert(context);
        tracing::debug!("Tracking {doc}");
        Arc::clone(context)
    }

    /// Focus the document and spawn its polling task on the current tokio
    /// runtime. Any poller from an earlier focus session is aborted.
    pub fn start_polling(self: &Arc<Self>, doc: DocumentId) -> PollToken {
        let token = self.on_activated(doc);
        let Some(context) = self.context(doc) else {
            return token;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let handle = poller::spawn(
                    &runtime,
                    Arc::downgrade(self),
                    doc,
                    token,
                    self.config.poll_interval(),
                );
                context.replace_poller(Some(handle));
            }
            Err(e) => {
                tracing::warn!("No async runtime, idle polling disabled for {doc}: {e}");
                context.replace_poller(None);
            }
        }
        token
    }

    /// The caret or selection moved
    pub fn on_selection_modified(&self, doc: DocumentId) {
        if !self.host.is_focused(doc) {
            return;
        }
        if let Some(context) = self.context(doc) {
            context.activity().touch(self.time.now());
        }
    }

    /// The document is about to close; its context and poller go with it
    pub fn on_close(&self, doc: DocumentId) {
        let removed = recover(self.documents.lock()).remove(&doc);
        if let Some(context) = removed {
            context.replace_poller(None);
            tracing::debug!("Stopped tracking {doc}");
        }
    }

    fn persist(&self, doc: DocumentId, stops: &StopStore) {
        self.host.set_persisted(doc, STOPS_KEY, stops.to_persisted());
    }
}
