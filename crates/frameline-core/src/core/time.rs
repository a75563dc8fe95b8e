// crates/frameline-core/src/core/time.rs
// ============================================================================
// Module: Frameline Time Model
// Description: Canonical timestamp representation and injected clock sources.
// Purpose: Keep scheduling decisions deterministic and replayable under test.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Frameline engines never read wall-clock time directly. A [`Clock`] is
//! injected by the host; production wiring uses [`SystemClock`], tests use
//! [`ManualClock`] to drive FIFO ordering and stuck-task thresholds
//! deterministically.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Canonical timestamp in unix epoch milliseconds.
///
/// # Invariants
/// - Values are explicitly provided by callers or clocks; monotonicity is a
///   clock responsibility, not a type guarantee.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns the timestamp moved backwards by `millis`, saturating at the
    /// epoch boundary representation.
    #[must_use]
    pub const fn saturating_sub_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_sub(millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Clock Sources
// ============================================================================

/// Injected time source for scheduler engines.
pub trait Clock: Send + Sync {
    /// Returns the current timestamp.
    fn now(&self) -> Timestamp;
}

/// Wall-clock source backed by [`SystemTime`].
///
/// # Invariants
/// - A system clock before the unix epoch reads as the epoch itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX));
        Timestamp::from_unix_millis(millis)
    }
}

/// Manually advanced clock for deterministic tests.
///
/// # Invariants
/// - `now` never moves backwards; `advance_millis` is the only mutation.
#[derive(Debug, Default)]
pub struct ManualClock {
    /// Current reading in unix epoch milliseconds.
    millis: AtomicI64,
}

impl ManualClock {
    /// Creates a manual clock starting at the provided reading.
    #[must_use]
    pub const fn starting_at(timestamp: Timestamp) -> Self {
        Self {
            millis: AtomicI64::new(timestamp.as_unix_millis()),
        }
    }

    /// Advances the clock by the provided number of milliseconds.
    pub fn advance_millis(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_unix_millis(self.millis.load(Ordering::SeqCst))
    }
}
