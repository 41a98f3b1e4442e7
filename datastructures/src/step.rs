// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::atomic::AtomicF64;
use crate::clock::{saturating_millis, Clock};
use crate::counter::Counter;
use crate::error::ConfigError;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Atomic storage a `StepValue` accumulates into.
pub trait Accumulator: Default + Send + Sync {
    type Value: Copy + Default;

    fn add(&self, value: Self::Value);
    fn load(&self) -> Self::Value;
    fn store(&self, value: Self::Value);
    /// Reset to zero, returning what was accumulated.
    fn take(&self) -> Self::Value;
}

impl Accumulator for Counter {
    type Value = u64;

    fn add(&self, value: u64) {
        self.incr(value);
    }

    fn load(&self) -> u64 {
        self.get()
    }

    fn store(&self, value: u64) {
        self.set(value);
    }

    fn take(&self) -> u64 {
        self.swap(0)
    }
}

impl Accumulator for AtomicF64 {
    type Value = f64;

    fn add(&self, value: f64) {
        self.fetch_add(value, Ordering::Relaxed);
    }

    fn load(&self) -> f64 {
        AtomicF64::load(self, Ordering::Relaxed)
    }

    fn store(&self, value: f64) {
        AtomicF64::store(self, value, Ordering::Relaxed);
    }

    fn take(&self) -> f64 {
        self.swap(0.0, Ordering::AcqRel)
    }
}

/// Accumulates a value per fixed step of wall clock time.
///
/// Steps are aligned to multiples of the step length since the epoch. Once
/// the clock crosses into a new step, whatever was accumulated in the step
/// just completed becomes the value reported by `poll`. If more than one
/// boundary was crossed with no activity, the previous step saw nothing and
/// `poll` reports zero.
pub struct StepValue<A: Accumulator> {
    clock: Arc<dyn Clock>,
    step: u64,
    last_position: AtomicU64,
    current: A,
    previous: A,
}

pub type StepCounter = StepValue<Counter>;
pub type StepDouble = StepValue<AtomicF64>;

impl<A: Accumulator> StepValue<A> {
    pub fn new(clock: Arc<dyn Clock>, step: Duration) -> Result<Self, ConfigError> {
        let step_millis = saturating_millis(step);
        if step_millis == 0 {
            return Err(ConfigError::Step(step));
        }
        let position = clock.wall_time() / step_millis;
        Ok(Self {
            clock,
            step: step_millis,
            last_position: AtomicU64::new(position),
            current: A::default(),
            previous: A::default(),
        })
    }

    fn roll(&self) {
        let position = self.clock.wall_time() / self.step;
        let last = self.last_position.load(Ordering::Acquire);
        if position <= last {
            return;
        }
        if self
            .last_position
            .compare_exchange(last, position, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let value = self.current.take();
            if position == last + 1 {
                self.previous.store(value);
            } else {
                self.previous.store(A::Value::default());
            }
        }
    }

    /// Add to the step in progress.
    pub fn add(&self, value: A::Value) {
        self.roll();
        self.current.add(value);
    }

    /// The value accumulated over the last completed step.
    pub fn poll(&self) -> A::Value {
        self.roll();
        self.previous.load()
    }

    /// The partial value of the step in progress.
    pub fn current(&self) -> A::Value {
        self.roll();
        self.current.load()
    }

    /// Step length in milliseconds.
    pub fn step_millis(&self) -> u64 {
        self.step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use std::thread;

    #[test]
    fn counts_per_step() {
        let clock = Arc::new(MockClock::new());
        let step = StepCounter::new(clock.clone(), Duration::from_secs(1)).expect("valid step");

        step.add(3);
        step.add(4);
        assert_eq!(step.poll(), 0);
        assert_eq!(step.current(), 7);

        clock.add_millis(1_000);
        assert_eq!(step.poll(), 7);
        assert_eq!(step.poll(), 7);
        step.add(1);

        clock.add_millis(1_000);
        assert_eq!(step.poll(), 1);

        clock.add_millis(1_000);
        assert_eq!(step.poll(), 0);
    }

    #[test]
    fn idle_steps_report_zero() {
        let clock = Arc::new(MockClock::new());
        let step = StepDouble::new(clock.clone(), Duration::from_secs(1)).expect("valid step");

        step.add(1.5);
        clock.add_millis(2_500);
        assert_eq!(step.poll(), 0.0);
        assert_eq!(step.current(), 0.0);
    }

    #[test]
    fn aligned_to_step() {
        let clock = Arc::new(MockClock::new());
        clock.add_millis(900);
        let step = StepCounter::new(clock.clone(), Duration::from_secs(1)).expect("valid step");
        step.add(2);
        clock.add_millis(100);
        assert_eq!(step.poll(), 2);
    }

    #[test]
    fn invalid_step() {
        let clock: Arc<dyn Clock> = Arc::new(MockClock::new());
        assert!(StepCounter::new(clock, Duration::from_micros(10)).is_err());
    }

    #[test]
    fn threaded_access() {
        let clock = Arc::new(MockClock::new());
        let step = Arc::new(
            StepCounter::new(clock.clone(), Duration::from_secs(60)).expect("valid step"),
        );

        let mut threads = Vec::new();
        for _ in 0..4 {
            let step = step.clone();
            threads.push(thread::spawn(move || {
                for _ in 0..100_000 {
                    step.add(1);
                }
            }));
        }

        for thread in threads {
            thread.join().expect("Failed to join child thread");
        }

        clock.add(Duration::from_secs(60));
        assert_eq!(step.poll(), 400_000);
    }
}
