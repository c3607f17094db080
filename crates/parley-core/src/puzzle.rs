//! Proof-of-work puzzle.
//!
//! The server picks a secret integer below `2^m`, hashes its binary
//! representation and publishes `(m, digest)`. A client proves effort by
//! finding any integer in `[0, 2^m)` whose digest matches. Success is digest
//! equality, so any colliding candidate is an acceptable answer.
//!
//! The hash input is the ASCII binary form without prefix or leading zeros:
//! `0` hashes `"0"`, `5` hashes `"101"`.

use parley_proto::ServerMessage;
use sha2::{Digest, Sha256};

use crate::{Environment, PuzzleError};

/// Validated puzzle difficulty (bits of search space).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Difficulty(u32);

impl Difficulty {
    /// Smallest supported difficulty.
    pub const MIN: u32 = 1;
    /// Largest supported difficulty.
    pub const MAX: u32 = 32;

    /// Validate `bits`.
    pub fn new(bits: u32) -> Result<Self, PuzzleError> {
        if (Self::MIN..=Self::MAX).contains(&bits) {
            Ok(Self(bits))
        } else {
            Err(PuzzleError::InvalidDifficulty { actual: bits, min: Self::MIN, max: Self::MAX })
        }
    }

    /// Number of bits.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Size of the search space, `2^bits`.
    pub fn search_space(self) -> u64 {
        1u64 << self.0
    }
}

/// SHA-256 over the binary representation of `candidate`.
pub fn digest(candidate: u64) -> [u8; 32] {
    Sha256::digest(format!("{candidate:b}").as_bytes()).into()
}

/// A published proof-of-work challenge. Never carries the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Challenge {
    difficulty: Difficulty,
    target: [u8; 32],
}

impl Challenge {
    /// Generate a fresh challenge from a random integer in `[0, 2^m)`.
    pub fn generate<E: Environment>(difficulty: Difficulty, env: &E) -> Self {
        let secret = env.random_u64() & (difficulty.search_space() - 1);
        Self { difficulty, target: digest(secret) }
    }

    /// Rebuild a challenge from its wire form.
    pub fn from_wire(difficulty: u32, target: &str) -> Result<Self, PuzzleError> {
        let difficulty = Difficulty::new(difficulty)?;
        let bytes = hex::decode(target).map_err(|e| PuzzleError::InvalidTarget(e.to_string()))?;
        let target = <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
            PuzzleError::InvalidTarget(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self { difficulty, target })
    }

    /// Puzzle difficulty.
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Target digest as lowercase hex.
    pub fn target_hex(&self) -> String {
        hex::encode(self.target)
    }

    /// Check a candidate answer.
    pub fn verify(&self, candidate: u64) -> bool {
        candidate < self.difficulty.search_space() && digest(candidate) == self.target
    }

    /// Brute-force the puzzle.
    ///
    /// CPU-bound: up to `2^m` hashes. Callers on an async runtime must run
    /// this on a blocking thread.
    pub fn solve(&self) -> Option<u64> {
        (0..self.difficulty.search_space()).find(|&candidate| digest(candidate) == self.target)
    }

    /// Wire message announcing this challenge.
    pub fn to_message(&self) -> ServerMessage {
        ServerMessage::Challenge { difficulty: self.difficulty.bits(), target: self.target_hex() }
    }
}

impl std::fmt::Debug for Challenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Challenge")
            .field("difficulty", &self.difficulty.bits())
            .field("target", &self.target_hex())
            .finish()
    }
}
