//! Result Set Hashing
//!
//! Deterministic SHA-256 digests of result sets, used for:
//! - Comparing result sets across requests and restarts
//! - Log lines that identify a committed result set

use sha2::{Sha256, Digest};

/// Hash output type (256 bits / 32 bytes)
pub type ResultDigest = [u8; 32];

/// Deterministic hasher for result data.
///
/// Wraps SHA-256 with fixed-width, little-endian helpers.
/// Order of updates is critical for determinism.
pub struct DigestHasher {
    hasher: Sha256,
}

impl DigestHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for a race result set.
    pub fn for_result_set() -> Self {
        Self::new(b"RACE_RESULTS_SET_V1")
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a length-prefixed UTF-8 string.
    ///
    /// The prefix keeps `("ab", "c")` and `("a", "bc")` apart.
    #[inline]
    pub fn update_str(&mut self, value: &str) {
        self.update_u64(value.len() as u64);
        self.hasher.update(value.as_bytes());
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> ResultDigest {
        self.hasher.finalize().into()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hasher_determinism() {
        let make_hash = || {
            let mut hasher = DigestHasher::for_result_set();
            hasher.update_u64(12345);
            hasher.update_u32(1);
            hasher.update_str("Alice");
            hasher.finalize()
        };

        assert_eq!(make_hash(), make_hash());
    }

    #[test]
    fn test_hash_order_matters() {
        let hash1 = {
            let mut h = DigestHasher::new(b"test");
            h.update_u32(1);
            h.update_u32(2);
            h.finalize()
        };

        let hash2 = {
            let mut h = DigestHasher::new(b"test");
            h.update_u32(2);
            h.update_u32(1);
            h.finalize()
        };

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_domain_separation() {
        let hash1 = DigestHasher::new(b"DOMAIN_A").finalize();
        let hash2 = DigestHasher::new(b"DOMAIN_B").finalize();

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_string_boundaries_are_unambiguous() {
        let hash1 = {
            let mut h = DigestHasher::new(b"test");
            h.update_str("ab");
            h.update_str("c");
            h.finalize()
        };

        let hash2 = {
            let mut h = DigestHasher::new(b"test");
            h.update_str("a");
            h.update_str("bc");
            h.finalize()
        };

        assert_ne!(hash1, hash2);
    }
}
