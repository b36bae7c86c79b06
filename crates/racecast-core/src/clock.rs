//! Monotonic millisecond clock used for every card and banner deadline.
//!
//! All deadlines are absolute millisecond values on a monotonic timeline
//! owned by a [`Clock`]. Durations are wall-clock deltas, never frame or
//! poll counts, so a late poll advances state by the time that actually
//! elapsed.
//!
//! [`MonotonicClock`] is backed by [`tokio::time::Instant`], which follows
//! tokio's paused test time. [`ManualClock`] is advanced explicitly by tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::time::Instant;

/// A source of monotonic milliseconds.
pub trait Clock: Send + Sync {
    /// Milliseconds elapsed since the clock's origin.
    fn now_ms(&self) -> u64;
}

/// Production clock measuring time since construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same timeline, so a test can hand one clone to the
/// session and keep another to advance time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock at `start_ms`.
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Move the clock forward by `ms`, saturating at `u64::MAX`.
    pub fn advance(&self, ms: u64) {
        let _ = self
            .now
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_add(ms))
            });
    }

    /// Jump to an absolute time. Moving backwards is ignored.
    pub fn set(&self, ms: u64) {
        self.now.fetch_max(ms, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::Acquire)
    }
}

/// Milliseconds left until `deadline`, zero once it has passed.
pub const fn remaining_ms(deadline: u64, now: u64) -> u64 {
    deadline.saturating_sub(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_and_shares_timeline() {
        let clock = ManualClock::new(100);
        let handle = clock.clone();
        assert_eq!(clock.now_ms(), 100);

        handle.advance(250);
        assert_eq!(clock.now_ms(), 350);
    }

    #[test]
    fn manual_clock_never_goes_backwards() {
        let clock = ManualClock::new(1_000);
        clock.set(500);
        assert_eq!(clock.now_ms(), 1_000);
        clock.set(2_000);
        assert_eq!(clock.now_ms(), 2_000);
    }

    #[test]
    fn manual_clock_saturates() {
        let clock = ManualClock::new(u64::MAX);
        clock.advance(10);
        assert_eq!(clock.now_ms(), u64::MAX);
    }

    #[test]
    fn remaining_is_zero_after_deadline() {
        assert_eq!(remaining_ms(5_000, 4_000), 1_000);
        assert_eq!(remaining_ms(5_000, 6_000), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn monotonic_clock_follows_paused_tokio_time() {
        let clock = MonotonicClock::new();
        assert_eq!(clock.now_ms(), 0);
        tokio::time::advance(std::time::Duration::from_millis(1_500)).await;
        assert_eq!(clock.now_ms(), 1_500);
    }
}
