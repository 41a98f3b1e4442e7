// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Random choices for driving synthetic load: which meters an iteration
//! touches and how many.

use rand::Rng;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum SelectionError {
    #[error("requested count {count} is bigger than the number of available options ({options})")]
    CountExceedsOptions { count: usize, options: usize },
    #[error("minimum ({minimum}) must not exceed maximum ({maximum})")]
    Range { minimum: usize, maximum: usize },
    #[error("mode {mode} is outside of [{minimum}, {maximum}]")]
    Mode {
        mode: usize,
        minimum: usize,
        maximum: usize,
    },
}

/// A fixed size set of bits.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BitSet {
    words: Vec<u64>,
    len: usize,
}

impl BitSet {
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; (len + 63) / 64],
            len,
        }
    }

    /// Number of bits, set or not.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bits outside the set are ignored.
    pub fn set(&mut self, bit: usize) {
        if bit < self.len {
            self.words[bit / 64] |= 1u64 << (bit % 64);
        }
    }

    pub fn get(&self, bit: usize) -> bool {
        bit < self.len && self.words[bit / 64] & (1u64 << (bit % 64)) != 0
    }

    /// Number of bits set.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Indices of the bits set, ascending.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(move |bit| self.get(*bit))
    }
}

/// Pick `count` distinct indices out of `0..options`, every subset of that
/// size being equally likely.
pub fn selection<R: Rng + ?Sized>(
    count: usize,
    options: usize,
    rng: &mut R,
) -> Result<BitSet, SelectionError> {
    if count > options {
        return Err(SelectionError::CountExceedsOptions { count, options });
    }
    let mut set = BitSet::new(options);
    if count == options {
        for bit in 0..options {
            set.set(bit);
        }
        return Ok(set);
    }
    // Floyd's algorithm
    for j in (options - count)..options {
        let candidate = rng.gen_range(0..=j);
        if set.get(candidate) {
            set.set(j);
        } else {
            set.set(candidate);
        }
    }
    Ok(set)
}

/// A selection of between `minimum` and `maximum` indices, inclusive.
pub fn selection_between<R: Rng + ?Sized>(
    minimum: usize,
    maximum: usize,
    options: usize,
    rng: &mut R,
) -> Result<BitSet, SelectionError> {
    if minimum > maximum {
        return Err(SelectionError::Range { minimum, maximum });
    }
    let count = rng.gen_range(minimum..=maximum);
    selection(count, options, rng)
}

/// A selection of any size, including empty and everything.
pub fn selection_any<R: Rng + ?Sized>(options: usize, rng: &mut R) -> BitSet {
    let count = rng.gen_range(0..=options);
    // count never exceeds options
    selection(count, options, rng).unwrap_or_else(|_| BitSet::new(options))
}

/// Returns `mode` with the given probability, and otherwise any other value
/// of `[minimum, maximum]` with equal likelihood.
pub fn mode_uniform_sample<R: Rng + ?Sized>(
    minimum: usize,
    maximum: usize,
    mode: usize,
    probability: f64,
    rng: &mut R,
) -> Result<usize, SelectionError> {
    if mode < minimum || mode > maximum {
        return Err(SelectionError::Mode {
            mode,
            minimum,
            maximum,
        });
    }
    if minimum == maximum || rng.gen::<f64>() < probability {
        return Ok(mode);
    }
    // one fewer choice than the range holds, skipping over the mode
    let value = rng.gen_range(minimum..maximum);
    if value >= mode {
        Ok(value + 1)
    } else {
        Ok(value)
    }
}
