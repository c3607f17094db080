//! Message router: the single lock around the account registry.
//!
//! Every account operation takes the registry lock for its full duration.
//! `send_message` to an online receiver also performs the direct write while
//! the lock is held, so concurrent operations observe a delivery as atomic.
//! The write is bounded by `delivery_timeout`; a receiver that cannot take
//! the frame in time is logged out and the message is queued instead.
//!
//! Lock order is registry, then peer writer. Handlers never hold their own
//! writer while waiting for the registry.

use std::{sync::Arc, time::Duration};

use parley_core::{ConnectionId, LoginOutcome, Registry, RegistryError, Route};
use parley_proto::ServerMessage;
use tokio::sync::Mutex;

use crate::Peer;

/// Shared handle to a connection's writer.
pub type PeerHandle = Arc<dyn Peer>;

/// How a successful `send_message` reached its receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Written to the receiver's connection.
    Delivered,
    /// Stored in the receiver's queue (offline, or the write failed).
    Queued,
}

/// Serialises all registry access.
pub struct Router {
    registry: Mutex<Registry<PeerHandle>>,
    delivery_timeout: Duration,
}

impl Router {
    /// Create a router over an empty registry.
    pub fn new(delivery_timeout: Duration) -> Self {
        Self { registry: Mutex::new(Registry::new()), delivery_timeout }
    }

    /// Register a new account.
    pub async fn create_account(&self, name: &str) -> Result<(), RegistryError> {
        self.registry.lock().await.create_account(name)?;
        tracing::info!(account = name, "account created");
        Ok(())
    }

    /// Bind `peer`'s connection to `name`.
    pub async fn log_in(
        &self,
        peer: PeerHandle,
        name: &str,
    ) -> Result<LoginOutcome, RegistryError> {
        let connection = peer.connection();
        let outcome = self.registry.lock().await.log_in(connection, peer, name)?;

        match &outcome {
            LoginOutcome::LoggedIn { displaced } => {
                tracing::info!(account = name, %connection, ?displaced, "logged in");
            },
            LoginOutcome::TookOver { previous, displaced } => {
                tracing::info!(
                    account = name,
                    %connection,
                    %previous,
                    ?displaced,
                    "switched account"
                );
            },
        }
        Ok(outcome)
    }

    /// Deliver or queue `text` from the account bound to `connection`.
    pub async fn send_message(
        &self,
        connection: ConnectionId,
        receiver: &str,
        text: &str,
    ) -> Result<SendOutcome, RegistryError> {
        let mut registry = self.registry.lock().await;

        let (peer, target, message) = match registry.route(connection, receiver, text)? {
            Route::Queued => {
                tracing::debug!(%connection, receiver, "queued for offline receiver");
                return Ok(SendOutcome::Queued);
            },
            Route::Deliver { peer, connection: target, message } => (peer, target, message),
        };

        let push = ServerMessage::Delivery { text: message.clone() };
        match tokio::time::timeout(self.delivery_timeout, peer.send(&push)).await {
            Ok(Ok(())) => {
                tracing::debug!(%connection, receiver, %target, "delivered");
                return Ok(SendOutcome::Delivered);
            },
            Ok(Err(e)) => {
                tracing::warn!(receiver, %target, "delivery failed, queueing: {}", e);
            },
            Err(_) => {
                tracing::warn!(
                    receiver,
                    %target,
                    timeout = ?self.delivery_timeout,
                    "delivery timed out, queueing"
                );
            },
        }

        registry.delivery_failed(receiver, target, message);
        Ok(SendOutcome::Queued)
    }

    /// Drain the caller's queue.
    pub async fn check_message(&self, connection: ConnectionId) -> Result<String, RegistryError> {
        self.registry.lock().await.check_message(connection)
    }

    /// Delete the caller's account, returning the notice plus its queue.
    pub async fn delete_account(&self, connection: ConnectionId) -> Result<String, RegistryError> {
        let mut registry = self.registry.lock().await;
        let name = registry.account_of(connection).map(str::to_string);
        let notice = registry.delete_account(connection)?;
        tracing::info!(
            account = name.as_deref().unwrap_or_default(),
            %connection,
            "account deleted"
        );
        Ok(notice)
    }

    /// Names matching `pattern`.
    pub async fn list_account(&self, pattern: &str) -> Result<Vec<String>, RegistryError> {
        self.registry.lock().await.list_account(pattern)
    }

    /// Log out the caller.
    pub async fn quit(&self, connection: ConnectionId) -> Result<String, RegistryError> {
        let name = self.registry.lock().await.quit(connection)?;
        tracing::info!(account = %name, %connection, "logged out");
        Ok(name)
    }

    /// Drop the binding of a connection that is going away.
    pub async fn release(&self, connection: ConnectionId) -> Option<String> {
        let name = self.registry.lock().await.release(connection);
        if let Some(name) = &name {
            tracing::info!(account = %name, %connection, "released on disconnect");
        }
        name
    }

    /// Account bound to `connection`.
    pub async fn account_of(&self, connection: ConnectionId) -> Option<String> {
        self.registry.lock().await.account_of(connection).map(str::to_string)
    }

    /// Connection bound to `name`.
    pub async fn connection_of(&self, name: &str) -> Option<ConnectionId> {
        self.registry.lock().await.connection_of(name)
    }
}
