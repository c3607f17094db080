//! Server error types.

use parley_proto::ProtocolError;
use thiserror::Error;

/// Errors that can occur in the server.
///
/// Registry failures are not here: they become typed replies (or are logged
/// and left unanswered) and never end a connection. These variants end a
/// connection (or the server, for `Config`).
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport/network error
    #[error("transport error: {0}")]
    Transport(String),

    /// Socket read or write failed
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol error
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl ServerError {
    /// Whether the error came from the peer hanging up or resetting.
    pub fn is_disconnect(&self) -> bool {
        use std::io::ErrorKind;

        let kind = match self {
            Self::Protocol(ProtocolError::Io(err)) | Self::Io(err) => err.kind(),
            _ => return false,
        };
        matches!(
            kind,
            ErrorKind::UnexpectedEof
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
        )
    }
}
