//! Deterministic random number generation.
//!
//! RULE: Nothing in the engine may call any platform RNG.
//! All randomness flows through SimRng instances derived from the
//! run seed, one stream per purpose, so adding a stream never shifts
//! the values another stream produces.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// Stable stream assignments. Append only: reordering changes every seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum RngStream {
    LeadJitter = 0,
}

impl RngStream {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LeadJitter => "lead_jitter",
        }
    }
}

pub struct SimRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl SimRng {
    pub fn new(master_seed: u64, stream: RngStream) -> Self {
        let derived_seed = master_seed ^ (stream as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self {
            name: stream.name(),
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Extra transit days in `0..=max`. Draws nothing when `max` is 0, so a
    /// run without jitter consumes no randomness.
    pub fn jitter_days(&mut self, max: u32) -> i64 {
        if max == 0 {
            return 0;
        }
        self.next_u64_below(u64::from(max) + 1) as i64
    }
}
