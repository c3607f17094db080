//! Programmatic Parley client.
//!
//! A thin async wrapper over one TCP connection. It frames requests, checks
//! the limits the server leaves to clients (name and text length), and sorts
//! incoming traffic: replies are returned to the caller that is waiting for
//! them, while deliveries and challenges that arrive in between are buffered
//! for [`Client::next_message`].
//!
//! No prompting or menus; interactive front ends are built on top.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;

use std::{collections::VecDeque, time::Duration};

pub use error::ClientError;
use parley_core::Challenge;
use parley_proto::{
    Direction, FrameReader, MAX_NAME_LEN, MAX_TEXT_LEN, ReplyCode, Request, ServerMessage,
    validate_account_name,
};
use tokio::{
    io::AsyncWriteExt,
    net::{
        TcpStream, ToSocketAddrs,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
};

/// A server reply to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Outcome code.
    pub code: ReplyCode,
    /// Text or payload.
    pub text: String,
}

impl Reply {
    /// Whether the request succeeded.
    pub fn is_success(&self) -> bool {
        self.code.is_success()
    }
}

/// Connection to a Parley server.
pub struct Client {
    frames: FrameReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    /// Deliveries and challenges read while waiting for a reply.
    pending: VecDeque<ServerMessage>,
    challenge: Option<Challenge>,
}

impl Client {
    /// Connect to `addr`.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            frames: FrameReader::new(reader, Direction::ServerToClient),
            writer,
            pending: VecDeque::new(),
            challenge: None,
        })
    }

    /// Send `request` without waiting for anything.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` if a name or the text breaks the length limits;
    /// nothing is written in that case.
    pub async fn send(&mut self, request: &Request) -> Result<(), ClientError> {
        validate(request)?;
        let bytes = request.to_frame().encode()?;
        self.writer.write_all(&bytes).await?;
        tracing::trace!(opcode = request.opcode(), "sent request");
        Ok(())
    }

    /// Send `request` and wait for its reply.
    pub async fn request(&mut self, request: &Request) -> Result<Reply, ClientError> {
        self.send(request).await?;
        loop {
            match self.read().await? {
                ServerMessage::Reply { code, text } => return Ok(Reply { code, text }),
                ServerMessage::KeepAlive => {},
                other => self.pending.push_back(other),
            }
        }
    }

    /// Next unsolicited message (delivery or challenge), buffered ones first.
    pub async fn next_message(&mut self) -> Result<ServerMessage, ClientError> {
        if let Some(message) = self.pending.pop_front() {
            return Ok(message);
        }
        loop {
            match self.read().await? {
                ServerMessage::KeepAlive => {},
                message => return Ok(message),
            }
        }
    }

    /// Like [`next_message`](Self::next_message), giving up after `wait`.
    pub async fn next_message_within(
        &mut self,
        wait: Duration,
    ) -> Result<Option<ServerMessage>, ClientError> {
        match tokio::time::timeout(wait, self.next_message()).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Next delivered chat message, skipping challenges.
    pub async fn next_delivery(&mut self) -> Result<String, ClientError> {
        loop {
            if let ServerMessage::Delivery { text } = self.next_message().await? {
                return Ok(text);
            }
        }
    }

    /// Most recent challenge received from the server.
    pub fn challenge(&self) -> Option<&Challenge> {
        self.challenge.as_ref()
    }

    /// Brute-force the most recent challenge on a blocking thread.
    ///
    /// Returns `Ok(None)` if no challenge has arrived yet or it has no
    /// solution.
    pub async fn solve_challenge(&self) -> Result<Option<u64>, ClientError> {
        let Some(challenge) = self.challenge.clone() else {
            return Ok(None);
        };
        let answer = tokio::task::spawn_blocking(move || challenge.solve())
            .await
            .map_err(|e| ClientError::Solver { reason: e.to_string() })?;
        tracing::debug!(?answer, "solved challenge");
        Ok(answer)
    }

    /// Create an account.
    pub async fn create_account(&mut self, name: &str) -> Result<Reply, ClientError> {
        self.request(&Request::CreateAccount { name: name.to_string() }).await
    }

    /// Log in to an account.
    pub async fn log_in(&mut self, name: &str) -> Result<Reply, ClientError> {
        self.request(&Request::LogIn { name: name.to_string() }).await
    }

    /// Send `text` to `receiver`.
    pub async fn send_message(&mut self, receiver: &str, text: &str) -> Result<Reply, ClientError> {
        let request =
            Request::SendMessage { receiver: receiver.to_string(), text: text.to_string() };
        self.request(&request).await
    }

    /// Fetch and clear queued messages.
    pub async fn check_message(&mut self) -> Result<Reply, ClientError> {
        self.request(&Request::CheckMessage).await
    }

    /// Delete the logged-in account.
    pub async fn delete_account(&mut self) -> Result<Reply, ClientError> {
        self.request(&Request::DeleteAccount).await
    }

    /// List accounts matching `pattern`.
    pub async fn list_account(&mut self, pattern: &str) -> Result<Reply, ClientError> {
        self.request(&Request::ListAccount { pattern: pattern.to_string() }).await
    }

    /// Log out, keeping the connection.
    pub async fn quit(&mut self) -> Result<Reply, ClientError> {
        self.request(&Request::Quit).await
    }

    /// Send a keep-alive frame. The server does not answer it.
    pub async fn keep_alive(&mut self) -> Result<(), ClientError> {
        self.send(&Request::KeepAlive).await
    }

    /// Close the write side; the server sees a clean EOF.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.writer.shutdown().await?;
        Ok(())
    }

    async fn read(&mut self) -> Result<ServerMessage, ClientError> {
        let frame = self.frames.read_next().await?.ok_or(ClientError::Disconnected)?;
        let message = ServerMessage::try_from(frame)?;
        if let ServerMessage::Challenge { difficulty, target } = &message {
            self.challenge = Some(Challenge::from_wire(*difficulty, target)?);
            tracing::debug!(difficulty, "received challenge");
        }
        Ok(message)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("pending", &self.pending.len())
            .field("challenge", &self.challenge)
            .finish_non_exhaustive()
    }
}

fn validate(request: &Request) -> Result<(), ClientError> {
    let check_name = |name: &str| {
        if validate_account_name(name) {
            Ok(())
        } else {
            Err(ClientError::invalid(format!("account name must be 1 to {MAX_NAME_LEN} bytes")))
        }
    };

    match request {
        Request::CreateAccount { name } | Request::LogIn { name } => check_name(name),
        Request::SendMessage { receiver, text } => {
            check_name(receiver)?;
            if text.len() > MAX_TEXT_LEN {
                return Err(ClientError::invalid(format!(
                    "message is {} bytes, limit is {MAX_TEXT_LEN}",
                    text.len()
                )));
            }
            Ok(())
        },
        Request::KeepAlive
        | Request::CheckMessage
        | Request::DeleteAccount
        | Request::ListAccount { .. }
        | Request::Quit => Ok(()),
    }
}
