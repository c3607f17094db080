//! Per-connection request loop.
//!
//! ```text
//!   accept ──► send challenge ──► read frame ──► dispatch ──► reply
//!                                    ▲                          │
//!                                    └── (challenge if due) ◄───┘
//! ```
//!
//! The handler keeps no session state of its own: whether the connection is
//! logged in, and as whom, lives in the registry. It ends on clean EOF, I/O
//! failure, or any protocol error (bad version, unknown opcode, malformed
//! field). `quit` only logs out; the loop keeps running.

use std::sync::Arc;

use parley_core::{
    AdmissionConfig, AdmissionController, ConnectionId, Environment, LoginOutcome, RegistryError,
};
use parley_proto::{
    Direction, FrameReader, MAX_NAME_LEN, ReplyCode, Request, ServerMessage,
    validate_account_name,
};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{Router, ServerError, StreamPeer, router::PeerHandle};

/// Reply text for a `list_account` that could not be served.
const LIST_FAILURE: &str = "Server failed unexpectedly.";

/// Drives one client connection.
pub struct ConnectionHandler<R, E>
where
    E: Environment,
{
    connection: ConnectionId,
    frames: FrameReader<R>,
    peer: PeerHandle,
    router: Arc<Router>,
    admission: AdmissionController<E>,
}

impl<R, E> ConnectionHandler<R, E>
where
    R: AsyncRead + Unpin,
    E: Environment,
{
    /// Build a handler over the two halves of a connection.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if the admission parameters are invalid.
    pub fn new<W>(
        connection: ConnectionId,
        reader: R,
        writer: W,
        router: Arc<Router>,
        admission: AdmissionConfig,
        env: E,
    ) -> Result<Self, ServerError>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let admission = AdmissionController::new(admission, env)
            .map_err(|e| ServerError::Config(e.to_string()))?;
        Ok(Self {
            connection,
            frames: FrameReader::new(reader, Direction::ClientToServer),
            peer: Arc::new(StreamPeer::new(connection, writer)),
            router,
            admission,
        })
    }

    /// Run until the connection ends, then release any account binding.
    pub async fn run(mut self) -> Result<(), ServerError> {
        let result = self.serve().await;

        self.router.release(self.connection).await;
        match &result {
            Ok(()) => tracing::debug!(connection = %self.connection, "peer closed connection"),
            Err(e) if e.is_disconnect() => {
                tracing::debug!(connection = %self.connection, "peer dropped connection: {}", e);
            },
            Err(e) => tracing::warn!(connection = %self.connection, "closing connection: {}", e),
        }

        match result {
            Err(e) if e.is_disconnect() => Ok(()),
            other => other,
        }
    }

    async fn serve(&mut self) -> Result<(), ServerError> {
        let challenge = self.admission.issue();
        self.peer.send(&challenge.to_message()).await?;

        while let Some(frame) = self.frames.read_next().await? {
            let request = Request::try_from(frame)?;
            tracing::debug!(connection = %self.connection, opcode = request.opcode(), "request");

            // Keep-alives do not count towards the next challenge
            let counted = request != Request::KeepAlive;
            if let Some(reply) = self.dispatch(request).await {
                self.peer.send(&reply).await?;
            }

            if counted && let Some(challenge) = self.admission.record_request() {
                tracing::debug!(connection = %self.connection, "resend threshold reached");
                self.peer.send(&challenge.to_message()).await?;
            }
        }

        Ok(())
    }

    /// Reply to `request`, if it gets one.
    async fn dispatch(&self, request: Request) -> Option<ServerMessage> {
        match request {
            Request::KeepAlive => None,
            Request::CreateAccount { name } => self.create_account(&name).await,
            Request::LogIn { name } => self.log_in(&name).await,
            Request::SendMessage { receiver, text } => self.send_message(&receiver, &text).await,
            Request::CheckMessage => self.check_message().await,
            Request::DeleteAccount => self.delete_account().await,
            Request::ListAccount { pattern } => Some(self.list_account(&pattern).await),
            Request::Quit => self.quit().await,
        }
    }

    async fn create_account(&self, name: &str) -> Option<ServerMessage> {
        if !validate_account_name(name) {
            return Some(ServerMessage::reply(
                ReplyCode::AccountExists,
                format!("The account name must be 1 to {MAX_NAME_LEN} bytes long."),
            ));
        }

        let reply = match self.router.create_account(name).await {
            Ok(()) => ServerMessage::reply(
                ReplyCode::AccountCreated,
                format!("New account {name} is created successfully."),
            ),
            Err(RegistryError::AlreadyExists(_)) => ServerMessage::reply(
                ReplyCode::AccountExists,
                format!("The account {name} exists already."),
            ),
            Err(e) => return self.unexpected(&e),
        };
        Some(reply)
    }

    async fn log_in(&self, name: &str) -> Option<ServerMessage> {
        let reply = match self.router.log_in(Arc::clone(&self.peer), name).await {
            Ok(LoginOutcome::LoggedIn { .. }) => ServerMessage::reply(
                ReplyCode::LoggedIn,
                format!("Account {name} is successfully logged in"),
            ),
            Ok(LoginOutcome::TookOver { previous, .. }) => ServerMessage::reply(
                ReplyCode::TakeOver,
                format!(
                    "Account {previous} has logged in here. That account is forced to log out. \
                     You are now logged in."
                ),
            ),
            Err(RegistryError::NoSuchAccount(_)) => ServerMessage::reply(
                ReplyCode::NoSuchAccount,
                format!("Account {name} cannot be logged in. It does not exist."),
            ),
            Err(RegistryError::AlreadyLoggedIn(_)) => ServerMessage::reply(
                ReplyCode::AlreadyLoggedIn,
                format!("Account {name} has already logged in."),
            ),
            Err(e) => return self.unexpected(&e),
        };
        Some(reply)
    }

    async fn send_message(&self, receiver: &str, text: &str) -> Option<ServerMessage> {
        let reply = match self.router.send_message(self.connection, receiver, text).await {
            Ok(_) => ServerMessage::reply(
                ReplyCode::MessageSent,
                format!("New message is sent to {receiver} successfully."),
            ),
            Err(RegistryError::NotLoggedIn) => ServerMessage::reply(
                ReplyCode::SenderNotLoggedIn,
                format!(
                    "You need to log in first. You do not have an account to send message to \
                     {receiver}"
                ),
            ),
            Err(RegistryError::NoSuchReceiver(_)) => ServerMessage::reply(
                ReplyCode::NoSuchReceiver,
                format!("The recipient {receiver} does not exist."),
            ),
            Err(e) => return self.unexpected(&e),
        };
        Some(reply)
    }

    async fn check_message(&self) -> Option<ServerMessage> {
        let reply = match self.router.check_message(self.connection).await {
            Ok(queue) => ServerMessage::reply(ReplyCode::Messages, queue),
            Err(RegistryError::NotLoggedIn) => ServerMessage::reply(
                ReplyCode::CheckNotLoggedIn,
                "You need to logged in to check unread messages.",
            ),
            Err(e) => return self.unexpected(&e),
        };
        Some(reply)
    }

    async fn delete_account(&self) -> Option<ServerMessage> {
        let reply = match self.router.delete_account(self.connection).await {
            Ok(notice) => ServerMessage::reply(ReplyCode::AccountDeleted, notice),
            Err(RegistryError::NotLoggedIn) => ServerMessage::reply(
                ReplyCode::DeleteNotLoggedIn,
                "The unknown account cannot be deleted. You need to log in first.",
            ),
            Err(e) => return self.unexpected(&e),
        };
        Some(reply)
    }

    async fn list_account(&self, pattern: &str) -> ServerMessage {
        match self.router.list_account(pattern).await {
            Ok(names) => {
                let text: String = names.iter().map(|name| format!("{name}\n")).collect();
                ServerMessage::reply(ReplyCode::AccountList, text)
            },
            Err(e) => {
                tracing::warn!(connection = %self.connection, "list_account failed: {}", e);
                ServerMessage::reply(ReplyCode::ListFailed, LIST_FAILURE)
            },
        }
    }

    async fn quit(&self) -> Option<ServerMessage> {
        let reply = match self.router.quit(self.connection).await {
            Ok(name) => ServerMessage::reply(
                ReplyCode::LoggedOut,
                format!("You: {name} has logged out successfully."),
            ),
            Err(RegistryError::NotLoggedIn) => ServerMessage::reply(
                ReplyCode::QuitNotLoggedIn,
                "You need to log in first to log out.",
            ),
            Err(e) => return self.unexpected(&e),
        };
        Some(reply)
    }

    /// Registry failure with no reply code of its own: logged, left unanswered.
    fn unexpected(&self, err: &RegistryError) -> Option<ServerMessage> {
        tracing::error!(connection = %self.connection, "request failed: {}", err);
        None
    }
}
