//! Core deterministic primitives.
//!
//! Everything the simulation engine needs to reproduce a result set
//! bit-for-bit: the seeded PRNG and the result digest.

pub mod rng;
pub mod hash;

// Re-export core types
pub use rng::DeterministicRng;
pub use hash::{DigestHasher, ResultDigest};
