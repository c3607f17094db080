//! Write side of a client connection.
//!
//! A connection's writer is shared: its own handler writes replies and
//! challenges, while other handlers push direct deliveries to it from inside
//! the registry lock. `StreamPeer` serialises those writers behind an async
//! mutex so frames never interleave.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parley_core::ConnectionId;
use parley_proto::ServerMessage;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};

use crate::ServerError;

/// Anything the server can push a message to.
#[async_trait]
pub trait Peer: Send + Sync {
    /// Connection this peer writes to.
    fn connection(&self) -> ConnectionId;

    /// Write one complete message.
    async fn send(&self, message: &ServerMessage) -> Result<(), ServerError>;
}

/// `Peer` over any async byte sink (the write half of a TCP stream in
/// production, an in-memory duplex in tests).
///
/// # Invariants
///
/// - Once a write fails or is dropped mid-flight (e.g. by the router's
///   delivery timeout) the peer is broken and every later `send` fails
///   without touching the stream. A partial frame is never followed by
///   another frame.
pub struct StreamPeer<W> {
    connection: ConnectionId,
    writer: Mutex<W>,
    broken: AtomicBool,
}

impl<W> StreamPeer<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Wrap `writer` for `connection`.
    pub fn new(connection: ConnectionId, writer: W) -> Self {
        Self { connection, writer: Mutex::new(writer), broken: AtomicBool::new(false) }
    }

    fn broken_error(&self) -> ServerError {
        ServerError::Transport(format!("{} is broken after a failed write", self.connection))
    }
}

#[async_trait]
impl<W> Peer for StreamPeer<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn connection(&self) -> ConnectionId {
        self.connection
    }

    async fn send(&self, message: &ServerMessage) -> Result<(), ServerError> {
        let bytes = message.to_frame().encode()?;

        let mut writer = self.writer.lock().await;
        if self.broken.load(Ordering::Acquire) {
            return Err(self.broken_error());
        }

        // Stays set if this future is dropped or the write fails
        self.broken.store(true, Ordering::Release);
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        self.broken.store(false, Ordering::Release);

        tracing::trace!(connection = %self.connection, opcode = message.opcode(), "sent frame");
        Ok(())
    }
}

impl<W> std::fmt::Debug for StreamPeer<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPeer")
            .field("connection", &self.connection)
            .field("broken", &self.broken.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parley_proto::{Direction, FrameReader, ReplyCode};

    use super::*;

    #[tokio::test]
    async fn writes_complete_frames() {
        let (client, server) = tokio::io::duplex(1024);
        let peer = StreamPeer::new(ConnectionId(1), server);

        peer.send(&ServerMessage::reply(ReplyCode::LoggedIn, "ok")).await.unwrap();
        peer.send(&ServerMessage::Delivery { text: "alice:hi\n".into() }).await.unwrap();

        let mut reader = FrameReader::new(client, Direction::ServerToClient);
        let first = ServerMessage::try_from(reader.read_next().await.unwrap().unwrap()).unwrap();
        let second = ServerMessage::try_from(reader.read_next().await.unwrap().unwrap()).unwrap();
        assert_eq!(first, ServerMessage::reply(ReplyCode::LoggedIn, "ok"));
        assert_eq!(second, ServerMessage::Delivery { text: "alice:hi\n".into() });
    }

    #[tokio::test]
    async fn cancelled_write_breaks_peer() {
        // Tiny buffer that nobody drains, so the write blocks
        let (_client, server) = tokio::io::duplex(4);
        let peer = StreamPeer::new(ConnectionId(2), server);

        let message = ServerMessage::Delivery { text: "x".repeat(64) };
        let result = tokio::time::timeout(Duration::from_millis(20), peer.send(&message)).await;
        assert!(result.is_err(), "write should time out");

        let err = peer.send(&ServerMessage::KeepAlive).await.unwrap_err();
        assert!(matches!(err, ServerError::Transport(_)));
        assert!(err.to_string().contains("broken"));
    }

    #[tokio::test]
    async fn closed_stream_breaks_peer() {
        let (client, server) = tokio::io::duplex(64);
        drop(client);
        let peer = StreamPeer::new(ConnectionId(3), server);

        let err = peer.send(&ServerMessage::KeepAlive).await.unwrap_err();
        assert!(err.is_disconnect());

        let err = peer.send(&ServerMessage::KeepAlive).await.unwrap_err();
        assert!(matches!(err, ServerError::Transport(_)));
    }
}
