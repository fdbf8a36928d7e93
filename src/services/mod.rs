//! Runtime services
//!
//! Time, background polling and logging setup.

pub mod poller;
pub mod time_source;
#[cfg(feature = "runtime")]
pub mod tracing_setup;
