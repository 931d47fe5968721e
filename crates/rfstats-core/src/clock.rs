//! Time sources for the simulation engine.
//!
//! The generator and the mode scheduler never call `Instant::now()` directly.
//! Both read time through a shared [`Clock`] so tests can drive the state
//! machines with a [`MockClock`] instead of sleeping.
//!
//! Each component reads the clock on its own; two reads within one tick are
//! not guaranteed to return the same instant.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeZone, Utc};

/// Trait for clock source implementations.
pub trait Clock: Send + Sync {
    /// Monotonic time in nanoseconds since an arbitrary epoch.
    fn now_ns(&self) -> u64;

    /// Wall-clock time in UTC, used to stamp emitted records.
    fn wall_clock(&self) -> DateTime<Utc>;

    /// Nanoseconds elapsed since `since_ns` (saturating at zero).
    fn elapsed_since(&self, since_ns: u64) -> Duration {
        Duration::from_nanos(self.now_ns().saturating_sub(since_ns))
    }
}

/// System clock backed by `std::time::Instant` and `Utc::now()`.
#[derive(Debug)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ns(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mock clock for testing - allows manual time advancement.
///
/// Wall-clock readings are `base + current_ns`, so records stamped from a
/// mock clock are deterministic too.
#[derive(Debug)]
pub struct MockClock {
    current_ns: AtomicU64,
    base: DateTime<Utc>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::with_base(Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_default())
    }

    /// Mock clock whose wall time starts at `base`.
    pub fn with_base(base: DateTime<Utc>) -> Self {
        Self {
            current_ns: AtomicU64::new(0),
            base,
        }
    }

    /// Advance time by the specified duration.
    pub fn advance(&self, duration: Duration) {
        self.current_ns
            .fetch_add(duration.as_nanos() as u64, AtomicOrdering::SeqCst);
    }

    /// Advance time by a (possibly fractional) number of seconds.
    pub fn advance_secs(&self, secs: f64) {
        self.advance(Duration::from_secs_f64(secs));
    }

    /// Set time to a specific value.
    pub fn set_time_ns(&self, ns: u64) {
        self.current_ns.store(ns, AtomicOrdering::SeqCst);
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now_ns(&self) -> u64 {
        self.current_ns.load(AtomicOrdering::SeqCst)
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        let ns = self.now_ns();
        self.base + chrono::Duration::nanoseconds(ns as i64)
    }
}
