//! Error types for registry and puzzle operations.

use thiserror::Error;

/// Expected failures of registry operations.
///
/// Each variant maps to a typed reply code; none of them close the
/// connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// `create_account` on a name that is taken.
    #[error("account already exists: {0}")]
    AlreadyExists(String),

    /// `log_in` on a name that is not registered.
    #[error("no such account: {0}")]
    NoSuchAccount(String),

    /// `log_in` to the account this connection is already bound to.
    #[error("already logged in: {0}")]
    AlreadyLoggedIn(String),

    /// Session operation on a connection bound to no account.
    #[error("not logged in")]
    NotLoggedIn,

    /// `send_message` to a name that is not registered.
    #[error("no such receiver: {0}")]
    NoSuchReceiver(String),

    /// `list_account` pattern could not be compiled.
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// Pattern as received.
        pattern: String,
        /// What was wrong with it.
        reason: String,
    },
}

/// Errors constructing puzzles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PuzzleError {
    /// Difficulty outside the supported range.
    #[error("difficulty {actual} outside {min}..={max}")]
    InvalidDifficulty {
        /// Requested difficulty.
        actual: u32,
        /// Smallest supported difficulty.
        min: u32,
        /// Largest supported difficulty.
        max: u32,
    },

    /// Target is not a hex-encoded SHA-256 digest.
    #[error("invalid target: {0}")]
    InvalidTarget(String),
}
