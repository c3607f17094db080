//! Account Registry
//!
//! The table of all accounts, their offline queues, and which connection (if
//! any) is logged in to each.
//!
//! ## Design
//!
//! - Bidirectional index: `name → Account` plus `ConnectionId → name`, always
//!   updated together, so every per-session operation resolves its caller
//!   without scanning accounts.
//! - Action-based: `route` never writes to a socket. It returns
//!   [`Route::Deliver`] and the caller performs the write, reporting failure
//!   back through [`Registry::delivery_failed`].
//! - Generic over the peer handle `P` so tests can bind plain values.
//!
//! The registry has no internal locking; the server wraps it in one mutex
//! and holds it for the whole of every operation, delivery included.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::{Pattern, RegistryError};

/// Identifies one accepted connection for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Binding<P> {
    connection: ConnectionId,
    peer: P,
}

#[derive(Debug)]
struct Account<P> {
    binding: Option<Binding<P>>,
    queue: VecDeque<String>,
}

impl<P> Account<P> {
    fn new() -> Self {
        Self { binding: None, queue: VecDeque::new() }
    }

    fn drain_queue(&mut self) -> String {
        self.queue.drain(..).collect()
    }
}

/// Result of a successful `log_in`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The connection was not logged in before.
    LoggedIn {
        /// Another connection that was bound to the target account and has
        /// silently lost it.
        displaced: Option<ConnectionId>,
    },
    /// The connection was logged in to `previous`, which is now logged out.
    TookOver {
        /// Account the connection was bound to before.
        previous: String,
        /// Another connection that was bound to the target account.
        displaced: Option<ConnectionId>,
    },
}

/// What the caller must do to complete a `send_message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route<P> {
    /// Receiver is online: push `message` to `peer` now.
    Deliver {
        /// Handle to write to.
        peer: P,
        /// Connection the receiver is bound to.
        connection: ConnectionId,
        /// Formatted `"<sender>:<text>\n"`.
        message: String,
    },
    /// Receiver is offline; the message is already queued.
    Queued,
}

/// In-memory account table.
#[derive(Debug)]
pub struct Registry<P> {
    accounts: BTreeMap<String, Account<P>>,
    sessions: HashMap<ConnectionId, String>,
}

impl<P> Default for Registry<P> {
    fn default() -> Self {
        Self { accounts: BTreeMap::new(), sessions: HashMap::new() }
    }
}

impl<P> Registry<P>
where
    P: Clone,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accounts.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether there are no accounts.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.accounts.contains_key(name)
    }

    /// Account the connection is logged in to.
    pub fn account_of(&self, connection: ConnectionId) -> Option<&str> {
        self.sessions.get(&connection).map(String::as_str)
    }

    /// Connection logged in to `name`.
    pub fn connection_of(&self, name: &str) -> Option<ConnectionId> {
        self.accounts.get(name)?.binding.as_ref().map(|b| b.connection)
    }

    /// Number of messages waiting for `name`.
    pub fn queued(&self, name: &str) -> Option<usize> {
        self.accounts.get(name).map(|a| a.queue.len())
    }

    /// Register a new account with an empty queue and no connection.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::AlreadyExists` if the name is taken.
    pub fn create_account(&mut self, name: &str) -> Result<(), RegistryError> {
        if self.accounts.contains_key(name) {
            return Err(RegistryError::AlreadyExists(name.to_string()));
        }
        self.accounts.insert(name.to_string(), Account::new());
        Ok(())
    }

    /// Bind `connection` to account `name`.
    ///
    /// If the connection is bound to a different account, that account is
    /// logged out first. If another connection is bound to `name`, it loses
    /// the binding without being told.
    ///
    /// # Errors
    ///
    /// - `NoSuchAccount` if `name` is not registered
    /// - `AlreadyLoggedIn` if `connection` is already bound to `name`
    pub fn log_in(
        &mut self,
        connection: ConnectionId,
        peer: P,
        name: &str,
    ) -> Result<LoginOutcome, RegistryError> {
        if !self.accounts.contains_key(name) {
            return Err(RegistryError::NoSuchAccount(name.to_string()));
        }

        let previous = match self.sessions.get(&connection).cloned() {
            Some(current) if current == name => {
                return Err(RegistryError::AlreadyLoggedIn(name.to_string()));
            },
            Some(_) => self.unbind_connection(connection),
            None => None,
        };

        let account = self
            .accounts
            .get_mut(name)
            .ok_or_else(|| RegistryError::NoSuchAccount(name.to_string()))?;
        let displaced = account
            .binding
            .replace(Binding { connection, peer })
            .map(|old| old.connection)
            .filter(|old| *old != connection);
        if let Some(old) = displaced {
            self.sessions.remove(&old);
            tracing::debug!(account = name, %old, %connection, "binding taken over");
        }
        self.sessions.insert(connection, name.to_string());

        Ok(match previous {
            Some(previous) => LoginOutcome::TookOver { previous, displaced },
            None => LoginOutcome::LoggedIn { displaced },
        })
    }

    /// Resolve a `send_message` from `connection` to `receiver`.
    ///
    /// Offline receivers get the message queued immediately. Online receivers
    /// yield [`Route::Deliver`]; the caller writes it and calls
    /// [`delivery_failed`](Self::delivery_failed) if the write does not
    /// succeed.
    ///
    /// # Errors
    ///
    /// - `NotLoggedIn` if `connection` is not bound to an account
    /// - `NoSuchReceiver` if `receiver` is not registered
    pub fn route(
        &mut self,
        connection: ConnectionId,
        receiver: &str,
        text: &str,
    ) -> Result<Route<P>, RegistryError> {
        let sender = self.sessions.get(&connection).ok_or(RegistryError::NotLoggedIn)?;
        let message = format!("{sender}:{text}\n");

        let account = self
            .accounts
            .get_mut(receiver)
            .ok_or_else(|| RegistryError::NoSuchReceiver(receiver.to_string()))?;

        match &account.binding {
            Some(binding) => Ok(Route::Deliver {
                peer: binding.peer.clone(),
                connection: binding.connection,
                message,
            }),
            None => {
                account.queue.push_back(message);
                Ok(Route::Queued)
            },
        }
    }

    /// Fall back after a failed direct delivery: queue the message and, if
    /// the receiver is still bound to the dead connection, log it out.
    pub fn delivery_failed(&mut self, receiver: &str, connection: ConnectionId, message: String) {
        let Some(account) = self.accounts.get_mut(receiver) else {
            tracing::warn!(receiver, "receiver vanished before delivery fallback");
            return;
        };
        account.queue.push_back(message);
        if account.binding.as_ref().is_some_and(|b| b.connection == connection) {
            self.unbind_connection(connection);
        }
    }

    /// Drain and return the queue of the account bound to `connection`.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotLoggedIn` if the connection is unbound.
    pub fn check_message(&mut self, connection: ConnectionId) -> Result<String, RegistryError> {
        let name = self.sessions.get(&connection).ok_or(RegistryError::NotLoggedIn)?;
        let account = self.accounts.get_mut(name).ok_or(RegistryError::NotLoggedIn)?;
        Ok(account.drain_queue())
    }

    /// Remove the account bound to `connection`, returning a notice followed
    /// by every message still queued for it.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotLoggedIn` if the connection is unbound.
    pub fn delete_account(&mut self, connection: ConnectionId) -> Result<String, RegistryError> {
        let name = self.sessions.remove(&connection).ok_or(RegistryError::NotLoggedIn)?;
        let mut account = self.accounts.remove(&name).ok_or(RegistryError::NotLoggedIn)?;
        Ok(format!(
            "The account {name} is permanently deleted. You have the following unread messages:\n{}",
            account.drain_queue()
        ))
    }

    /// Names matching `pattern` (see [`Pattern::for_listing`]), sorted.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidPattern` if the pattern does not
    /// compile.
    pub fn list_account(&self, pattern: &str) -> Result<Vec<String>, RegistryError> {
        let pattern = Pattern::for_listing(pattern)?;
        Ok(self.accounts.keys().filter(|name| pattern.matches(name)).cloned().collect())
    }

    /// Log out the account bound to `connection`, returning its name.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotLoggedIn` if the connection is unbound.
    pub fn quit(&mut self, connection: ConnectionId) -> Result<String, RegistryError> {
        self.unbind_connection(connection).ok_or(RegistryError::NotLoggedIn)
    }

    /// Drop whatever binding `connection` holds, used when the connection
    /// goes away.
    pub fn release(&mut self, connection: ConnectionId) -> Option<String> {
        self.unbind_connection(connection)
    }

    /// Whether both directions of the index agree.
    pub fn is_consistent(&self) -> bool {
        let forward = self.sessions.iter().all(|(connection, name)| {
            self.accounts
                .get(name)
                .and_then(|a| a.binding.as_ref())
                .is_some_and(|b| b.connection == *connection)
        });
        let backward = self.accounts.iter().all(|(name, account)| match &account.binding {
            Some(b) => self.sessions.get(&b.connection) == Some(name),
            None => true,
        });
        forward && backward
    }

    fn unbind_connection(&mut self, connection: ConnectionId) -> Option<String> {
        let name = self.sessions.remove(&connection)?;
        if let Some(account) = self.accounts.get_mut(&name) {
            account.binding = None;
        }
        Some(name)
    }
}
