//! Protocol error types.

use thiserror::Error;

/// Errors produced while encoding or decoding frames.
///
/// Every variant is fatal to the connection it occurred on: once framing is
/// lost there is no way to resynchronize the byte stream.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame is truncated, declares lengths beyond the buffer, or carries
    /// invalid UTF-8.
    #[error("malformed message: {reason}")]
    MalformedMessage {
        /// Description of what was wrong.
        reason: String,
    },

    /// Opcode not valid for this direction.
    #[error("unknown opcode: {0}")]
    UnknownOpcode(u32),

    /// Peer speaks a different protocol version.
    #[error("version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Version we speak.
        expected: u32,
        /// Version the peer sent.
        actual: u32,
    },

    /// Underlying stream failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage { reason: reason.into() }
    }
}
