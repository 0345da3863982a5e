// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Seeded sampling origin for range-valued parameters.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Stateful `xoroshiro128+` pseudo-random number generator.
///
/// * Not cryptographically secure; it only drives parameter sampling.
/// * Matching seeds yield identical sequences across supported platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prng {
    state: [u64; 2],
}

impl Prng {
    /// Constructs a PRNG from two 64-bit seeds.
    pub fn from_seed(seed0: u64, seed1: u64) -> Self {
        let mut state = [seed0, seed1];
        if state[0] == 0 && state[1] == 0 {
            state[0] = 0x9e37_79b9_7f4a_7c15;
        }
        Self { state }
    }

    /// Constructs a PRNG from a single 64-bit seed via SplitMix64 expansion.
    pub fn from_seed_u64(seed: u64) -> Self {
        fn splitmix64(state: &mut u64) -> u64 {
            *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
            let mut z = *state;
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
            z ^ (z >> 31)
        }

        let mut sm_state = seed;
        Self::from_seed(splitmix64(&mut sm_state), splitmix64(&mut sm_state))
    }

    /// Next raw 64-bit output.
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(55) ^ s1 ^ (s1 << 14);
        self.state[1] = s1.rotate_left(36);

        result
    }

    /// Uniform index in `[0, len)` by rejection sampling (no modulo bias).
    ///
    /// Returns `None` for an empty domain.
    pub fn choose_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let span = len as u64;
        if span == 1 {
            return Some(0);
        }
        let value = if span.is_power_of_two() {
            self.next_u64() & (span - 1)
        } else {
            let bound = u64::MAX - u64::MAX % span;
            loop {
                let candidate = self.next_u64();
                if candidate < bound {
                    break candidate % span;
                }
            }
        };
        usize::try_from(value).ok()
    }

    /// Picks one element of `items` uniformly.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        self.choose_index(items.len()).and_then(|i| items.get(i))
    }
}

/// Where parameter samples come from.
///
/// - [`Sampler::Seed`]: every resolution starts a fresh generator from the
///   seed, so independent branches are reproducible without sharing state.
/// - [`Sampler::Shared`]: one generator advanced by every draw, in call order.
///   Reproducible for a sequential pipeline; concurrent resolutions serialize
///   on the generator's lock, so their interleaving decides the draws.
#[derive(Clone)]
pub enum Sampler {
    /// Fresh generator per resolution.
    Seed(u64),
    /// Shared, sequentially advanced generator.
    Shared(Arc<Mutex<Prng>>),
}

impl Sampler {
    /// Shared generator seeded with `seed`.
    pub fn shared(seed: u64) -> Self {
        Self::Shared(Arc::new(Mutex::new(Prng::from_seed_u64(seed))))
    }

    /// Runs `f` against this sampler's generator for one resolution.
    pub fn with_rng<R>(&self, f: impl FnOnce(&mut Prng) -> R) -> R {
        match self {
            Self::Seed(seed) => f(&mut Prng::from_seed_u64(*seed)),
            Self::Shared(rng) => {
                let mut guard = rng.lock().unwrap_or_else(PoisonError::into_inner);
                f(&mut *guard)
            }
        }
    }
}

/// A bare seed binds a generator seeded once, so successive steps of one
/// pipeline draw successive samples.
impl From<u64> for Sampler {
    fn from(seed: u64) -> Self {
        Self::shared(seed)
    }
}

impl fmt::Debug for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seed(seed) => write!(f, "Seed({seed})"),
            Self::Shared(rng) => write!(f, "Shared({:p})", Arc::as_ptr(rng)),
        }
    }
}
