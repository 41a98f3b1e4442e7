// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
/// A simple atomic counter which can be shared across threads with many writers
pub struct Counter {
    inner: AtomicU64,
}

impl Counter {
    /// Clear the counter by reseting the value to zero
    pub fn clear(&self) {
        self.set(0);
    }

    /// Return the count stored in the counter
    pub fn get(&self) -> u64 {
        self.inner.load(Ordering::Relaxed)
    }

    /// Increment the counter by count, wrapping on overflow
    pub fn incr(&self, count: u64) {
        self.inner.fetch_add(count, Ordering::Relaxed);
    }

    pub fn set(&self, value: u64) {
        self.inner.store(value, Ordering::SeqCst);
    }

    /// Replace the value, returning what was stored before
    pub fn swap(&self, value: u64) -> u64 {
        self.inner.swap(value, Ordering::AcqRel)
    }
}

impl std::fmt::Debug for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get())
    }
}
