//! Core data model for stop tracking
//!
//! Pure data structures and algorithms; no host or runtime dependencies.

pub mod activity;
pub mod diff;
pub mod remap;
pub mod stop;
