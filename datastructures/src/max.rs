// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::atomic::AtomicF64;
use crate::clock::{saturating_millis, Clock};
use crate::error::ConfigError;

use parking_lot::{RwLock, RwLockWriteGuard};

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

struct Slots {
    values: Vec<AtomicF64>,
    current: usize,
    last_rotation: u64,
}

impl Slots {
    fn stale(&self, now: u64, width: u64) -> usize {
        let steps = now.saturating_sub(self.last_rotation) / width;
        steps.min(self.values.len() as u64) as usize
    }

    fn rotate(&mut self, now: u64, width: u64) {
        let steps = now.saturating_sub(self.last_rotation) / width;
        if steps == 0 {
            return;
        }
        let n = self.values.len();
        for _ in 0..steps.min(n as u64) {
            self.values[self.current].store(0.0, Ordering::Relaxed);
            self.current = (self.current + 1) % n;
        }
        self.last_rotation += steps * width;
    }
}

/// The maximum sample seen within a decaying time window.
///
/// Every sample is recorded into each of `buffer_length` slots, and every
/// `expiry / buffer_length` the slot being reported is reset and reporting
/// moves on to the next one. A sample is therefore reported for at least
/// `expiry - expiry / buffer_length` and at most `expiry`.
pub struct TimeWindowMax {
    clock: Arc<dyn Clock>,
    width: u64,
    slots: RwLock<Slots>,
}

impl TimeWindowMax {
    pub fn new(
        clock: Arc<dyn Clock>,
        expiry: Duration,
        buffer_length: usize,
    ) -> Result<Self, ConfigError> {
        if buffer_length == 0 {
            return Err(ConfigError::BufferLength(buffer_length));
        }
        let width = saturating_millis(expiry) / buffer_length as u64;
        if width == 0 {
            return Err(ConfigError::PhaseWidth {
                expiry,
                buffer_length,
            });
        }
        let slots = Slots {
            values: (0..buffer_length).map(|_| AtomicF64::default()).collect(),
            current: 0,
            last_rotation: clock.wall_time(),
        };
        Ok(Self {
            clock,
            width,
            slots: RwLock::new(slots),
        })
    }

    /// Record a sample. Non-finite values are dropped.
    pub fn record(&self, value: f64) {
        if !value.is_finite() {
            return;
        }
        let now = self.clock.wall_time();
        let mut slots = self.slots.read();
        if now.saturating_sub(slots.last_rotation) >= self.width {
            drop(slots);
            let mut writer = self.slots.write();
            writer.rotate(now, self.width);
            slots = RwLockWriteGuard::downgrade(writer);
        }
        for slot in &slots.values {
            slot.fetch_max(value, Ordering::Relaxed);
        }
    }

    /// The largest sample still inside the window, or zero.
    pub fn poll(&self) -> f64 {
        let now = self.clock.wall_time();
        let slots = self.slots.read();
        let stale = slots.stale(now, self.width);
        let n = slots.values.len();
        if stale >= n {
            0.0
        } else {
            slots.values[(slots.current + stale) % n].load(Ordering::Relaxed)
        }
    }
}
