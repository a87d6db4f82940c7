//! Clocks - Simulated and System Time
//!
//! TigerStyle: Every timestamp the substrate records comes from a [`Clock`].
//! Production uses [`SystemClock`]; simulation uses [`SimClock`], which only
//! moves when a test moves it.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::constants::{DST_TIME_ADVANCE_MS_MAX, TIME_MS_PER_SEC};

/// Source of millisecond timestamps.
pub trait Clock: Send + Sync + Debug {
    /// Current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

/// A simulated clock for deterministic testing.
///
/// TigerStyle:
/// - Time only moves forward
/// - Clones share the same time
/// - No reliance on system time
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    current_ms: Arc<AtomicU64>,
}

impl SimClock {
    /// Create a clock at time zero.
    ///
    /// ```
    /// use strata_memory::dst::SimClock;
    /// assert_eq!(SimClock::new().now_ms(), 0);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::at_ms(0)
    }

    /// Create a clock at the given millisecond timestamp.
    #[must_use]
    pub fn at_ms(start_ms: u64) -> Self {
        Self {
            current_ms: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Current time in milliseconds.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.current_ms.load(Ordering::SeqCst)
    }

    /// Current time in whole seconds.
    #[must_use]
    pub fn now_secs(&self) -> u64 {
        self.now_ms() / TIME_MS_PER_SEC
    }

    /// Current time as a `DateTime<Utc>`.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        let ms = i64::try_from(self.now_ms()).unwrap_or(i64::MAX);
        DateTime::from_timestamp_millis(ms).unwrap_or_default()
    }

    /// Advance time by `ms` and return the new time.
    ///
    /// # Panics
    /// Panics if `ms` exceeds `DST_TIME_ADVANCE_MS_MAX`.
    pub fn advance_ms(&self, ms: u64) -> u64 {
        assert!(
            ms <= DST_TIME_ADVANCE_MS_MAX,
            "advance_ms({ms}) exceeds max ({DST_TIME_ADVANCE_MS_MAX})"
        );

        let previous = self.current_ms.fetch_add(ms, Ordering::SeqCst);
        previous.saturating_add(ms)
    }

    /// Jump to an absolute time.
    ///
    /// # Panics
    /// Panics if `ms` is earlier than the current time.
    pub fn set_ms(&self, ms: u64) {
        let current = self.now_ms();
        assert!(ms >= current, "cannot set time backwards: {ms} < {current}");
        self.current_ms.store(ms, Ordering::SeqCst);
    }

    /// Milliseconds elapsed since `since`.
    #[must_use]
    pub fn elapsed_since(&self, since: u64) -> u64 {
        self.now_ms().saturating_sub(since)
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        SimClock::now_ms(self)
    }
}
