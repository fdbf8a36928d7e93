//! Stop records and the per-document stop store.
//!
//! A stop is a remembered caret or selection. The store keeps them in
//! insertion order, refuses duplicates and evicts the oldest entries once the
//! configured capacity is exceeded.
//!
//! ## Persisted format
//!
//! The store round-trips through the host's per-document settings as a single
//! JSON list under [`STOPS_KEY`]:
//!
//! ```json
//! [{"region": [12, 12], "time": 1718000000.25}, {"region": [40, 52], "time": 1718000004.5}]
//! ```
//!
//! Unknown fields are ignored and a missing `time` is kept as absent, so
//! records written by newer versions still load.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Settings key the stop list is persisted under
pub const STOPS_KEY: &str = "stops";

/// A caret (`start == end`) or selection, in character offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "[usize; 2]", into = "[usize; 2]")]
pub struct StopRange {
    pub start: usize,
    pub end: usize,
}

impl StopRange {
    /// Create a range, swapping the endpoints if they are reversed
    pub fn new(a: usize, b: usize) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn caret(position: usize) -> Self {
        Self::new(position, position)
    }

    pub fn is_caret(&self) -> bool {
        self.start == self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.is_caret()
    }
}

impl From<[usize; 2]> for StopRange {
    fn from([a, b]: [usize; 2]) -> Self {
        Self::new(a, b)
    }
}

impl From<StopRange> for [usize; 2] {
    fn from(range: StopRange) -> Self {
        [range.start, range.end]
    }
}

impl fmt::Display for StopRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.start, self.end)
    }
}

/// A single recorded stop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub region: StopRange,

    /// Unix timestamp (seconds) when the stop was recorded
    #[serde(rename = "time", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<f64>,
}

impl Stop {
    pub fn new(region: StopRange, created_at: f64) -> Self {
        Self {
            region,
            created_at: Some(created_at),
        }
    }
}

/// Ordered, capacity-bounded collection of stops for one document
#[derive(Debug, Clone, PartialEq)]
pub struct StopStore {
    /// Oldest first
    stops: Vec<Stop>,

    max_stops: usize,
}

impl StopStore {
    pub fn new(max_stops: usize) -> Self {
        Self {
            stops: Vec::new(),
            max_stops,
        }
    }

    /// Build a store from previously persisted records.
    ///
    /// Records that cannot be decoded are dropped; duplicates keep their
    /// first occurrence. The result is trimmed to `max_stops`.
    pub fn from_persisted(value: Option<&Value>, max_stops: usize) -> Self {
        let mut store = Self::new(max_stops);

        let Some(Value::Array(records)) = value else {
            if let Some(other) = value {
                tracing::debug!("Ignoring persisted stops that are not a list: {other}");
            }
            return store;
        };

        for record in records {
            match Stop::deserialize(record) {
                Ok(stop) => {
                    if !store.contains(stop.region) {
                        store.stops.push(stop);
                    }
                }
                Err(e) => tracing::debug!("Dropping unreadable stop record {record}: {e}"),
            }
        }

        store.evict_oldest_while_over_capacity();
        store
    }

    /// Encode the store in its persisted form
    pub fn to_persisted(&self) -> Value {
        serde_json::to_value(&self.stops).unwrap_or_else(|e| {
            tracing::warn!("Failed to encode stops: {e}");
            Value::Array(Vec::new())
        })
    }

    /// Track a new stop.
    ///
    /// Returns false, and leaves the store untouched, if an equal range is
    /// already tracked. Capacity is enforced separately by
    /// [`evict_oldest_while_over_capacity`](Self::evict_oldest_while_over_capacity).
    pub fn add(&mut self, region: StopRange, created_at: f64) -> bool {
        if self.contains(region) {
            return false;
        }
        self.stops.push(Stop::new(region, created_at));
        true
    }

    pub fn contains(&self, region: StopRange) -> bool {
        self.stops.iter().any(|stop| stop.region == region)
    }

    /// Remove the stop at `region`. Returns whether one was removed.
    pub fn remove(&mut self, region: StopRange) -> bool {
        let before = self.stops.len();
        self.stops.retain(|stop| stop.region != region);
        self.stops.len() != before
    }

    pub fn clear(&mut self) {
        self.stops.clear();
    }

    /// Drop the oldest stops until the store fits its capacity.
    /// Returns the evicted stops, oldest first.
    pub fn evict_oldest_while_over_capacity(&mut self) -> Vec<Stop> {
        let excess = self.stops.len().saturating_sub(self.max_stops);
        self.stops.drain(..excess).collect()
    }

    /// Stops in insertion order (oldest first)
    pub fn list(&self) -> &[Stop] {
        &self.stops
    }

    pub fn newest_first(&self) -> impl Iterator<Item = &Stop> {
        self.stops.iter().rev()
    }

    pub fn ranges(&self) -> Vec<StopRange> {
        self.stops.iter().map(|stop| stop.region).collect()
    }

    /// Move every stop to a new range in one step.
    ///
    /// `ranges` must line up with [`ranges`](Self::ranges). Stops that end up
    /// on the same coordinates are merged into the oldest one.
    pub fn replace_ranges(&mut self, ranges: Vec<StopRange>) {
        debug_assert_eq!(ranges.len(), self.stops.len());

        let mut merged: Vec<Stop> = Vec::with_capacity(self.stops.len());
        for (stop, region) in self.stops.drain(..).zip(ranges) {
            if merged.iter().any(|kept| kept.region == region) {
                tracing::debug!("Stop merged into an older stop at {region}");
                continue;
            }
            merged.push(Stop { region, ..stop });
        }
        self.stops = merged;
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    pub fn max_stops(&self) -> usize {
        self.max_stops
    }
}
