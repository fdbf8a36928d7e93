//! Time source abstraction.
//!
//! Idle detection compares monotonic instants, while stop records carry a
//! wall-clock timestamp. Both come from a `TimeSource` so that tests and the
//! replay runner can drive time by hand instead of sleeping.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Abstraction over time-related operations.
pub trait TimeSource: Send + Sync + std::fmt::Debug {
    /// Get the current instant for measuring elapsed time.
    fn now(&self) -> Instant;

    /// Sleep for the specified duration.
    ///
    /// Manual time sources advance their logical clock instead.
    fn sleep(&self, duration: Duration);

    /// Wall-clock time as fractional seconds since the Unix epoch.
    ///
    /// Stored in stop records as their creation time.
    fn unix_seconds(&self) -> f64;

    /// Calculate elapsed time since an earlier instant.
    fn elapsed_since(&self, earlier: Instant) -> Duration {
        self.now().saturating_duration_since(earlier)
    }
}

/// Type alias for shared time source.
pub type SharedTimeSource = Arc<dyn TimeSource>;

/// Production implementation using actual system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTimeSource;

impl RealTimeSource {
    pub fn new() -> Self {
        Self
    }

    pub fn shared() -> SharedTimeSource {
        Arc::new(Self)
    }
}

impl TimeSource for RealTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn unix_seconds(&self) -> f64 {
        Utc::now().timestamp_micros() as f64 / 1_000_000.0
    }
}

/// Manually driven clock.
///
/// - `now()` returns a logical instant based on an internal counter
/// - `sleep()` advances logical time (no actual sleeping)
/// - `unix_seconds()` is the wall-clock time at creation plus logical time
///
/// # Example
///
/// ```
/// use autostops::services::time_source::{ManualTimeSource, TimeSource};
/// use std::time::Duration;
///
/// let time = ManualTimeSource::new();
/// let start = time.now();
///
/// time.sleep(Duration::from_secs(5));
///
/// assert!(time.elapsed_since(start) >= Duration::from_secs(5));
/// ```
#[derive(Debug)]
pub struct ManualTimeSource {
    /// Logical time in nanoseconds since creation.
    logical_nanos: AtomicU64,
    /// Real instant at creation, used for Instant arithmetic.
    base_instant: Instant,
    /// Wall-clock seconds at creation.
    base_unix: f64,
}

impl Default for ManualTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualTimeSource {
    /// Create a new ManualTimeSource with logical time starting at zero.
    pub fn new() -> Self {
        Self::starting_at(RealTimeSource.unix_seconds())
    }

    /// Create a clock whose wall-clock reading starts at `base_unix`.
    pub fn starting_at(base_unix: f64) -> Self {
        Self {
            logical_nanos: AtomicU64::new(0),
            base_instant: Instant::now(),
            base_unix,
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Advance logical time by the given duration.
    pub fn advance(&self, duration: Duration) {
        self.logical_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Get the logical elapsed time since creation.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.logical_nanos.load(Ordering::SeqCst))
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Instant {
        self.base_instant + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }

    fn unix_seconds(&self) -> f64 {
        self.base_unix + self.elapsed().as_secs_f64()
    }
}
