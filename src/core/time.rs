//! Time utilities.
//!
//! All expiry decisions read time through a [`Clock`], so tests can drive
//! expiry deterministically with a [`ManualClock`] while the server uses the
//! [`SystemClock`]. Instants are absolute milliseconds since the Unix epoch,
//! which is also how they are written into snapshots.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// An absolute instant in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// Milliseconds since 1970-01-01T00:00:00Z.
    pub ms: u64,
}

impl Timestamp {
    /// Create a timestamp with the given millisecond value.
    pub const fn from_millis(ms: u64) -> Self {
        Self { ms }
    }

    /// The Unix epoch.
    pub const fn zero() -> Self {
        Self { ms: 0 }
    }

    /// Add milliseconds, saturating at `u64::MAX`.
    pub const fn add_ms(self, ms: u64) -> Self {
        Self {
            ms: self.ms.saturating_add(ms),
        }
    }

    /// Add whole seconds, saturating at `u64::MAX`.
    pub const fn add_secs(self, secs: u64) -> Self {
        self.add_ms(secs.saturating_mul(1000))
    }

    /// Check if this instant is at or after the given deadline.
    pub const fn is_at_or_after(self, deadline: Timestamp) -> bool {
        self.ms >= deadline.ms
    }

    /// Milliseconds until a deadline.
    ///
    /// Returns 0 if the deadline has already passed.
    pub fn ms_until(self, deadline: Timestamp) -> u64 {
        deadline.ms.saturating_sub(self.ms)
    }

    /// Render as RFC 3339 for logs and CLI output.
    pub fn to_rfc3339(self) -> String {
        let ms = i64::try_from(self.ms).unwrap_or(i64::MAX);
        chrono::DateTime::from_timestamp_millis(ms)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| format!("{}ms", self.ms))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Timestamp({}ms)", self.ms)
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time source.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Timestamp::from_millis(ms)
    }
}

/// Manually advanced time source.
#[derive(Debug, Default)]
pub struct ManualClock {
    ms: AtomicU64,
}

impl ManualClock {
    /// Create a clock frozen at the given instant.
    pub fn new(start: Timestamp) -> Self {
        Self {
            ms: AtomicU64::new(start.ms),
        }
    }

    /// Move the clock forward by the given milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.ms.fetch_add(ms, Ordering::AcqRel);
    }

    /// Move the clock forward by the given seconds.
    pub fn advance_secs(&self, secs: u64) {
        self.advance_ms(secs.saturating_mul(1000));
    }

    /// Jump to an absolute instant.
    pub fn set(&self, at: Timestamp) {
        self.ms.store(at.ms, Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.ms.load(Ordering::Acquire))
    }
}
