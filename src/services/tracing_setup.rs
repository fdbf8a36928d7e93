//! Tracing subscriber setup
//!
//! Shared tracing configuration for the replay binary and tests.

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// Logs go to `log_file_path` when given, stderr otherwise. Filtering follows
/// `RUST_LOG`, falling back to `default_directive` (e.g. `"info"`).
pub fn init_global(log_file_path: Option<&Path>, default_directive: &str) -> io::Result<()> {
    let writer = match log_file_path {
        Some(path) => BoxMakeWriter::new(Arc::new(File::create(path)?)),
        None => BoxMakeWriter::new(io::stderr),
    };

    build_subscriber(writer, default_directive)
        .try_init()
        .map_err(io::Error::other)
}

/// Build a subscriber writing formatted events to `writer`.
///
/// This is the core subscriber configuration shared between production and tests.
pub fn build_subscriber(
    writer: BoxMakeWriter,
    default_directive: &str,
) -> impl tracing::Subscriber + Send + Sync {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let fmt_layer = fmt::layer().with_writer(writer).with_ansi(false);

    tracing_subscriber::registry().with(fmt_layer).with(env_filter)
}
