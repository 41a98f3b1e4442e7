// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::convert::TryFrom;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A source of time for everything that rotates, steps, or decays.
pub trait Clock: Send + Sync {
    /// Milliseconds since the unix epoch.
    fn wall_time(&self) -> u64;

    /// Nanoseconds since an unspecified but fixed origin. Only differences
    /// between two readings are meaningful.
    fn monotonic_time(&self) -> u64;
}

/// The clock backed by the operating system.
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn wall_time(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| saturating_millis(d))
            .unwrap_or(0)
    }

    fn monotonic_time(&self) -> u64 {
        saturating_nanos(self.origin.elapsed())
    }
}

/// A clock which only moves when told to. Wall time and monotonic time
/// advance together, starting from zero.
#[derive(Default, Debug)]
pub struct MockClock {
    nanos: AtomicU64,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward, returning the new monotonic time.
    pub fn add(&self, duration: Duration) -> u64 {
        let nanos = saturating_nanos(duration);
        self.nanos.fetch_add(nanos, Ordering::SeqCst) + nanos
    }

    pub fn add_millis(&self, millis: u64) -> u64 {
        self.add(Duration::from_millis(millis))
    }
}

impl Clock for MockClock {
    fn wall_time(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst) / 1_000_000
    }

    fn monotonic_time(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }
}

pub(crate) fn saturating_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

pub(crate) fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_clock() {
        let clock = MockClock::new();
        assert_eq!(clock.wall_time(), 0);
        clock.add_millis(1500);
        assert_eq!(clock.wall_time(), 1500);
        assert_eq!(clock.monotonic_time(), 1_500_000_000);
        clock.add(Duration::from_nanos(999_999));
        assert_eq!(clock.wall_time(), 1500);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::default();
        let a = clock.monotonic_time();
        let b = clock.monotonic_time();
        assert!(b >= a);
        assert!(clock.wall_time() > 0);
    }
}
