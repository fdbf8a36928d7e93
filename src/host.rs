//! The editor-side collaborator of the stop engine.
//!
//! The engine never owns document text, selections or settings storage; it
//! reaches them through the [`Host`] trait. [`MemoryHost`] is a complete
//! in-memory implementation used by the replay runner and the tests.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::model::stop::StopRange;

/// Unique identifier for an open document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub u64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Document-{}", self.0)
    }
}

/// Services the editor provides to the stop engine.
///
/// Every call is expected to be synchronous and cheap; the engine may call
/// these from any thread, including while it holds a document's lock.
pub trait Host: Send + Sync + 'static {
    /// Full text of the document, or None if it is no longer open
    fn read_text(&self, doc: DocumentId) -> Option<String>;

    /// Current carets/selections, in order
    fn read_selections(&self, doc: DocumentId) -> Vec<StopRange>;

    /// Replace the document's carets/selections
    fn set_selections(&self, doc: DocumentId, selections: &[StopRange]);

    /// Whether the document is the focused view of its window
    fn is_focused(&self, doc: DocumentId) -> bool;

    /// Read a per-document setting
    fn get_persisted(&self, doc: DocumentId, key: &str) -> Option<Value>;

    /// Write a per-document setting
    fn set_persisted(&self, doc: DocumentId, key: &str, value: Value);

    /// Delete a per-document setting
    fn erase_persisted(&self, doc: DocumentId, key: &str);

    /// Show a short, user-visible status message
    fn notify(&self, doc: DocumentId, message: &str);
}

/// Type alias for a shared host.
pub type SharedHost = Arc<dyn Host>;

#[derive(Debug, Default, Clone)]
struct MemoryDocument {
    text: String,
    selections: Vec<StopRange>,
    settings: HashMap<String, Value>,
}

#[derive(Debug, Default)]
struct MemoryHostState {
    documents: HashMap<DocumentId, MemoryDocument>,
    focused: Option<DocumentId>,
    notifications: Vec<(DocumentId, String)>,
}

/// In-memory host: documents, selections, settings and status messages.
///
/// Edits only change the stored text; callers notify the engine themselves,
/// the way an editor fires its modification callbacks.
#[derive(Debug, Default)]
pub struct MemoryHost {
    state: Mutex<MemoryHostState>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn state(&self) -> MutexGuard<'_, MemoryHostState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open a document with a caret at offset 0
    pub fn open(&self, doc: DocumentId, text: &str) {
        self.state().documents.insert(
            doc,
            MemoryDocument {
                text: text.to_string(),
                selections: vec![StopRange::caret(0)],
                settings: HashMap::new(),
            },
        );
    }

    /// Close a document; its settings are discarded with it
    pub fn close(&self, doc: DocumentId) {
        let mut state = self.state();
        state.documents.remove(&doc);
        if state.focused == Some(doc) {
            state.focused = None;
        }
    }

    pub fn focus(&self, doc: DocumentId) {
        self.state().focused = Some(doc);
    }

    pub fn blur(&self) {
        self.state().focused = None;
    }

    pub fn text(&self, doc: DocumentId) -> Option<String> {
        self.state().documents.get(&doc).map(|d| d.text.clone())
    }

    pub fn set_text(&self, doc: DocumentId, text: &str) {
        if let Some(document) = self.state().documents.get_mut(&doc) {
            document.text = text.to_string();
        }
    }

    /// Insert `text` at character offset `at` (clamped to the document end)
    pub fn insert(&self, doc: DocumentId, at: usize, text: &str) {
        if let Some(document) = self.state().documents.get_mut(&doc) {
            let byte = byte_offset(&document.text, at);
            document.text.insert_str(byte, text);
        }
    }

    /// Delete the characters in `[start, end)` (clamped to the document end)
    pub fn delete(&self, doc: DocumentId, start: usize, end: usize) {
        if let Some(document) = self.state().documents.get_mut(&doc) {
            let from = byte_offset(&document.text, start.min(end));
            let to = byte_offset(&document.text, start.max(end));
            document.text.replace_range(from..to, "");
        }
    }

    pub fn select(&self, doc: DocumentId, selections: &[StopRange]) {
        self.set_selections(doc, selections);
    }

    /// Raw persisted value, as the engine stored it
    pub fn persisted(&self, doc: DocumentId, key: &str) -> Option<Value> {
        self.get_persisted(doc, key)
    }

    pub fn notifications(&self) -> Vec<(DocumentId, String)> {
        self.state().notifications.clone()
    }
}

/// Byte index of character offset `chars` in `text`, clamped to its length
fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}

impl Host for MemoryHost {
    fn read_text(&self, doc: DocumentId) -> Option<String> {
        self.text(doc)
    }

    fn read_selections(&self, doc: DocumentId) -> Vec<StopRange> {
        self.state()
            .documents
            .get(&doc)
            .map(|d| d.selections.clone())
            .unwrap_or_default()
    }

    fn set_selections(&self, doc: DocumentId, selections: &[StopRange]) {
        if let Some(document) = self.state().documents.get_mut(&doc) {
            document.selections = selections.to_vec();
        }
    }

    fn is_focused(&self, doc: DocumentId) -> bool {
        let state = self.state();
        state.focused == Some(doc) && state.documents.contains_key(&doc)
    }

    fn get_persisted(&self, doc: DocumentId, key: &str) -> Option<Value> {
        self.state()
            .documents
            .get(&doc)
            .and_then(|d| d.settings.get(key).cloned())
    }

    fn set_persisted(&self, doc: DocumentId, key: &str, value: Value) {
        if let Some(document) = self.state().documents.get_mut(&doc) {
            document.settings.insert(key.to_string(), value);
        }
    }

    fn erase_persisted(&self, doc: DocumentId, key: &str) {
        if let Some(document) = self.state().documents.get_mut(&doc) {
            document.settings.remove(key);
        }
    }

    fn notify(&self, doc: DocumentId, message: &str) {
        tracing::info!("{doc}: {message}");
        self.state().notifications.push((doc, message.to_string()));
    }
}
