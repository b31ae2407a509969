//! Seedable PRNG behind every randomized decision on the line.
//!
//! Uses the SplitMix64 algorithm: fast, 8 bytes of state, and deterministic
//! across platforms, so a seeded run reproduces the same inspection outcomes.

use crate::fixed::Fixed64;

/// SplitMix64 pseudo-random number generator.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SimRng {
    state: u64,
}

impl SimRng {
    /// Create a new RNG with the given seed.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Derive an independent generator seeded from this one's next output.
    ///
    /// Used to hand every quality gate on a line its own stream from a single
    /// run seed.
    pub fn fork(&mut self) -> SimRng {
        SimRng::new(self.next_u64())
    }

    /// Returns `true` with the given probability.
    ///
    /// - probability <= 0 always returns false
    /// - probability >= 1 always returns true
    pub fn chance(&mut self, probability: Fixed64) -> bool {
        if probability <= Fixed64::ZERO {
            return false;
        }
        if probability >= Fixed64::ONE {
            return true;
        }
        // For p in (0,1) the Q32.32 bits are the fraction scaled to [0, 2^32).
        let upper = self.next_u64() >> 32;
        upper < probability.to_bits() as u64
    }

    /// Current internal state, fed into the line's state hash.
    pub fn state(&self) -> u64 {
        self.state
    }
}
