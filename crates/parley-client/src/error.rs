//! Client error types.

use parley_core::PuzzleError;
use parley_proto::ProtocolError;
use thiserror::Error;

/// Errors from client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Request rejected locally before it was sent.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// What was wrong with it.
        reason: String,
    },

    /// Server sent bytes that do not decode.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Server closed the connection.
    #[error("server closed the connection")]
    Disconnected,

    /// Socket failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Challenge could not be rebuilt from the wire.
    #[error("puzzle error: {0}")]
    Puzzle(#[from] PuzzleError),

    /// Solver task panicked or was cancelled.
    #[error("solver failed: {reason}")]
    Solver {
        /// Join error description.
        reason: String,
    },
}

impl ClientError {
    /// Returns true if the connection is unusable after this error.
    pub fn is_fatal(&self) -> bool {
        match self {
            // Fatal: framing lost or socket gone
            Self::Protocol(_) | Self::Disconnected | Self::Io(_) => true,

            // Transient: nothing was written, or only the local solver failed
            Self::InvalidRequest { .. } | Self::Puzzle(_) | Self::Solver { .. } => false,
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest { reason: reason.into() }
    }
}
