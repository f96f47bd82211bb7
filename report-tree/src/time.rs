// Copyright (c) The report-tree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Clocks used to timestamp node starts and ends.
//!
//! Reports need both a wall-clock timestamp and an elapsed time. [`MonotonicClock`] combines a
//! `DateTime` captured once (realtime clock) with an `Instant` (monotonic clock), so that
//! timestamps it hands out never go backwards even if the system time is adjusted mid-run.

use chrono::{DateTime, FixedOffset, Local, TimeDelta};
use parking_lot::Mutex;
use std::{fmt, time::Instant};

/// A source of timestamps.
pub trait Clock: fmt::Debug + Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<FixedOffset>;
}

/// A clock anchored to the wall-clock time at creation and advanced by a monotonic clock.
#[derive(Clone, Debug)]
pub struct MonotonicClock {
    anchor: DateTime<FixedOffset>,
    instant: Instant,
}

impl MonotonicClock {
    /// Creates a new clock anchored at the current local time.
    pub fn new() -> Self {
        Self {
            // These two syscalls will happen imperceptibly close to each other, which is good
            // enough for our purposes.
            anchor: Local::now().fixed_offset(),
            instant: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> DateTime<FixedOffset> {
        let elapsed = TimeDelta::from_std(self.instant.elapsed()).unwrap_or(TimeDelta::MAX);
        self.anchor
            .checked_add_signed(elapsed)
            .unwrap_or(self.anchor)
    }
}

/// A clock that only moves when told to.
///
/// Used when replaying recorded events, where every event carries the time it originally
/// happened at.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    /// Creates a new clock reading `now`.
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Sets the current time.
    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock() = now;
    }

    /// Moves the current time forward (or backward, for a negative delta).
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock();
        if let Some(next) = now.checked_add_signed(delta) {
            *now = next;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn monotonic_clock_moves_forward() {
        let clock = MonotonicClock::new();
        let first = clock.now();
        std::thread::sleep(Duration::from_millis(20));
        let second = clock.now();
        assert!(
            second - first >= TimeDelta::milliseconds(20),
            "second ({second}) is at least 20ms after first ({first})"
        );
    }

    #[test]
    fn manual_clock() {
        let start = DateTime::parse_from_rfc3339("2025-03-01T12:00:00+01:00").unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(TimeDelta::milliseconds(1500));
        assert_eq!(clock.now() - start, TimeDelta::milliseconds(1500));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
