//! Parley chat server.
//!
//! This crate provides the server runtime using:
//! - Tokio for async TCP and tasks
//! - OS entropy for puzzle secrets
//!
//! ## Architecture
//!
//! ```text
//! parley-server
//!   ├─ Server             (listener, one task per connection)
//!   ├─ ConnectionHandler  (request loop + admission control)
//!   ├─ Router             (registry lock + direct delivery)
//!   ├─ StreamPeer         (shared, serialised connection writer)
//!   └─ SystemEnv          (production Environment impl)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod handler;
mod peer;
mod router;
mod system_env;

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

pub use error::ServerError;
pub use handler::ConnectionHandler;
use parley_core::{AdmissionConfig, ConnectionId, Difficulty};
pub use peer::{Peer, StreamPeer};
pub use router::{PeerHandle, Router, SendOutcome};
pub use system_env::SystemEnv;
use tokio::net::{TcpListener, TcpStream};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (e.g., "0.0.0.0:8080")
    pub bind_address: String,
    /// Puzzle difficulty and resend threshold
    pub admission: AdmissionConfig,
    /// Upper bound on a direct delivery write
    pub delivery_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            admission: AdmissionConfig::default(),
            delivery_timeout: Duration::from_millis(2000),
        }
    }
}

impl ServerConfig {
    /// Check the configuration before binding.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if the difficulty is outside
    /// `1..=32` or the delivery timeout is zero.
    pub fn validate(&self) -> Result<(), ServerError> {
        Difficulty::new(self.admission.difficulty)
            .map_err(|e| ServerError::Config(e.to_string()))?;
        if self.delivery_timeout.is_zero() {
            return Err(ServerError::Config("delivery timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Parley server.
///
/// Owns the listener and the shared router; every accepted connection runs
/// its own [`ConnectionHandler`] task.
pub struct Server {
    listener: TcpListener,
    router: Arc<Router>,
    admission: AdmissionConfig,
    env: SystemEnv,
    next_connection: AtomicU64,
}

impl Server {
    /// Validate the configuration and bind the listener.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The configuration is invalid
    /// - Binding to the address fails
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;
        let listener = TcpListener::bind(&config.bind_address).await.map_err(|e| {
            ServerError::Transport(format!("failed to bind {}: {}", config.bind_address, e))
        })?;

        Ok(Self {
            listener,
            router: Arc::new(Router::new(config.delivery_timeout)),
            admission: config.admission,
            env: SystemEnv::new(),
            next_connection: AtomicU64::new(1),
        })
    }

    /// Run the server, accepting connections until the task is dropped.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.local_addr()?);

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => self.spawn_connection(stream, addr),
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                },
            }
        }
    }

    /// Get the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared router, for inspecting registry state.
    pub fn router(&self) -> Arc<Router> {
        Arc::clone(&self.router)
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let connection = ConnectionId(self.next_connection.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%connection, %addr, "accepted connection");

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%connection, "set_nodelay failed: {}", e);
        }

        let (reader, writer) = stream.into_split();
        let handler = match ConnectionHandler::new(
            connection,
            reader,
            writer,
            Arc::clone(&self.router),
            self.admission,
            self.env,
        ) {
            Ok(handler) => handler,
            Err(e) => {
                tracing::error!(%connection, "failed to start handler: {}", e);
                return;
            },
        };

        tokio::spawn(async move {
            if let Err(e) = handler.run().await {
                tracing::debug!(%connection, "Connection error: {}", e);
            }
        });
    }
}
