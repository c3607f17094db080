//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples protocol logic from the system's
//! randomness source. Production uses OS entropy; tests plug in a seeded
//! generator so puzzle targets are reproducible.
//!
//! # Invariants
//!
//! - Determinism: Given the same seed, `random_bytes()` produces the same
//!   sequence
//! - Isolation: Implementations must not share global state

/// Abstract source of randomness.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    ///
    /// # Security
    ///
    /// Production implementations MUST use OS entropy (`getrandom`). A
    /// predictable source lets a client precompute puzzle answers.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
