//! Deterministic Random Number Generator
//!
//! Uses Xorshift128+ algorithm for fast, high-quality, deterministic randomness.
//! Given the same seed, produces identical sequence on all platforms.

use sha2::{Sha256, Digest};

/// Domain separator for every seed derived by the simulation engine.
const SEED_DOMAIN: &[u8] = b"RACE_RESULTS_SEED_V1";

/// Deterministic PRNG using Xorshift128+ algorithm.
///
/// # Determinism Guarantee
///
/// Given the same seed, this RNG will produce the exact same sequence
/// of random numbers on any platform.
///
/// # Example
///
/// ```
/// use race_results::core::rng::DeterministicRng;
///
/// let mut rng = DeterministicRng::new(12345);
/// let value = rng.next_u64();
/// assert_eq!(value, 6233086606872742541); // Always the same!
/// ```
#[derive(Clone, Debug)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// RNG for race-wide draws (the winner's pace).
    pub fn for_race(race_key: u64) -> Self {
        Self::new(derive_race_seed(race_key))
    }

    /// RNG for one participant, keyed by registration position.
    pub fn for_participant(race_key: u64, position: u32) -> Self {
        Self::new(derive_participant_seed(race_key, position))
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Generate a random integer in range [0, max).
    #[inline]
    pub fn next_int(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        // Simple modulo - slight bias for very large max, but acceptable
        (self.next_u64() % max as u64) as u32
    }
}

/// SplitMix64 for seed initialization.
/// Produces well-distributed values from sequential seeds.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Tag prefix for the race-wide seed.
const RACE_TAG: u8 = b'R';

/// Tag prefix for participant seeds.
const PARTICIPANT_TAG: u8 = b'P';

/// Seed for race-wide draws.
pub fn derive_race_seed(race_key: u64) -> u64 {
    seed_from_parts(race_key, &[RACE_TAG])
}

/// Seed for a single participant.
///
/// Keyed only by race and registration position, so the same roster
/// always produces the same times no matter when simulation runs.
pub fn derive_participant_seed(race_key: u64, position: u32) -> u64 {
    let mut tag = [PARTICIPANT_TAG; 5];
    tag[1..].copy_from_slice(&position.to_le_bytes());
    seed_from_parts(race_key, &tag)
}

fn seed_from_parts(race_key: u64, tag: &[u8]) -> u64 {
    let mut hasher = Sha256::new();

    hasher.update(SEED_DOMAIN);
    hasher.update(race_key.to_le_bytes());
    hasher.update(tag);

    let hash = hasher.finalize();

    // Take first 8 bytes as seed
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash[..8]);
    u64::from_le_bytes(seed)
}

// =============================================================================
// TESTS
// =============================================================================
