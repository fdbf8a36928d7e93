// Auto stops library - remembers where the caret rested and keeps those
// places anchored while the document is edited

pub mod app;
pub mod config;
pub mod host;
pub mod model;
pub mod replay;
pub mod services;

pub use app::{AutoStops, EditOutcome, IdleOutcome, StopListEntry, TickOutcome};
pub use config::Config;
pub use host::{DocumentId, Host, MemoryHost, SharedHost};
pub use model::stop::{Stop, StopRange, StopStore};
