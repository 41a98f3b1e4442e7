// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::atomic::{AtomicU64, Ordering};

/// A double precision floating point type which can be safely shared between
/// threads. The value is stored as its bit pattern in an `AtomicU64`.
pub struct AtomicF64 {
    inner: AtomicU64,
}

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self {
            inner: AtomicU64::new(value.to_bits()),
        }
    }

    pub fn load(&self, order: Ordering) -> f64 {
        f64::from_bits(self.inner.load(order))
    }

    pub fn store(&self, value: f64, order: Ordering) {
        self.inner.store(value.to_bits(), order);
    }

    pub fn swap(&self, value: f64, order: Ordering) -> f64 {
        f64::from_bits(self.inner.swap(value.to_bits(), order))
    }

    /// Add to the current value, returning the previous value.
    pub fn fetch_add(&self, value: f64, order: Ordering) -> f64 {
        let mut current = self.inner.load(Ordering::Relaxed);
        loop {
            let new = (f64::from_bits(current) + value).to_bits();
            match self
                .inner
                .compare_exchange_weak(current, new, order, Ordering::Relaxed)
            {
                Ok(previous) => return f64::from_bits(previous),
                Err(actual) => current = actual,
            }
        }
    }

    /// Store the maximum of the current value and `value`, returning the
    /// previous value.
    pub fn fetch_max(&self, value: f64, order: Ordering) -> f64 {
        let mut current = self.inner.load(Ordering::Relaxed);
        loop {
            let previous = f64::from_bits(current);
            if previous >= value {
                return previous;
            }
            match self
                .inner
                .compare_exchange_weak(current, value.to_bits(), order, Ordering::Relaxed)
            {
                Ok(_) => return previous,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for AtomicF64 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl std::fmt::Debug for AtomicF64 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn add_and_max() {
        let value = AtomicF64::new(1.5);
        assert_eq!(value.fetch_add(2.0, Ordering::Relaxed), 1.5);
        assert_eq!(value.load(Ordering::Relaxed), 3.5);
        assert_eq!(value.fetch_max(2.0, Ordering::Relaxed), 3.5);
        assert_eq!(value.load(Ordering::Relaxed), 3.5);
        value.fetch_max(10.0, Ordering::Relaxed);
        assert_eq!(value.load(Ordering::Relaxed), 10.0);
        assert_eq!(value.swap(0.0, Ordering::Relaxed), 10.0);
    }

    #[test]
    fn threaded_access() {
        let value = Arc::new(AtomicF64::default());

        let mut threads = Vec::new();
        for _ in 0..2 {
            let value = value.clone();
            threads.push(thread::spawn(move || {
                for _ in 0..100_000 {
                    value.fetch_add(1.0, Ordering::Relaxed);
                }
            }));
        }

        for thread in threads {
            thread.join().expect("Failed to join child thread");
        }
        assert_eq!(value.load(Ordering::Relaxed), 200_000.0);
    }
}
