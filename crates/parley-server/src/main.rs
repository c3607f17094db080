//! Parley server binary.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default port 8080
//! parley-server
//!
//! # Cheaper puzzles, more requests between challenges
//! parley-server --bind 127.0.0.1:9000 --difficulty 12 --max-resend 10
//! ```

use std::time::Duration;

use clap::Parser;
use parley_core::AdmissionConfig;
use parley_server::{Server, ServerConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Parley chat server
#[derive(Parser, Debug)]
#[command(name = "parley-server")]
#[command(about = "Parley account and messaging server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    bind: String,

    /// Proof-of-work difficulty in bits (1-32)
    #[arg(short, long, default_value = "16")]
    difficulty: u32,

    /// Requests allowed before a fresh challenge is sent
    #[arg(long, default_value = "3")]
    max_resend: u32,

    /// Upper bound on a direct delivery write, in milliseconds
    #[arg(long, default_value = "2000")]
    delivery_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Parley server starting");
    tracing::info!("Binding to {}", args.bind);

    let config = ServerConfig {
        bind_address: args.bind,
        admission: AdmissionConfig { difficulty: args.difficulty, max_resend: args.max_resend },
        delivery_timeout: Duration::from_millis(args.delivery_timeout_ms),
    };

    let server = Server::bind(config).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
