// Volley - A buffered, shardable Statsd client for Rust!
//
// Copyright 2015-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Decides whether a stat sent with a sample rate below `1.0` is kept.
///
/// Clients only consult the sampler for rates strictly between `0.0` and
/// `1.0`. Implementations must be safe to share between threads.
pub trait Sampler: Send + Sync {
    /// Return `true` with probability `rate`.
    fn sample(&self, rate: f64) -> bool;
}

fn clamped(rate: f64) -> Option<bool> {
    if rate >= 1.0 {
        Some(true)
    } else if rate <= 0.0 || rate.is_nan() {
        Some(false)
    } else {
        None
    }
}

/// Default sampler drawing from the thread-local random number generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngSampler;

impl Sampler for ThreadRngSampler {
    fn sample(&self, rate: f64) -> bool {
        match clamped(rate) {
            Some(keep) => keep,
            None => rand::thread_rng().gen_bool(rate),
        }
    }
}

/// Sampler drawing from a single seeded generator, for reproducible
/// sampling decisions in tests.
///
/// The generator sits behind a mutex, so this sampler serializes callers.
pub struct SeededSampler<R = StdRng> {
    rng: Mutex<R>,
}

impl SeededSampler<StdRng> {
    pub fn seed_from_u64(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }
}

impl<R> SeededSampler<R>
where
    R: Rng + Send,
{
    pub fn from_rng(rng: R) -> Self {
        SeededSampler { rng: Mutex::new(rng) }
    }
}

impl<R> fmt::Debug for SeededSampler<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeededSampler").finish_non_exhaustive()
    }
}

impl<R> Sampler for SeededSampler<R>
where
    R: Rng + Send,
{
    fn sample(&self, rate: f64) -> bool {
        match clamped(rate) {
            Some(keep) => keep,
            None => self
                .rng
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .gen_bool(rate),
        }
    }
}
