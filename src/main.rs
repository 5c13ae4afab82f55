//! pool-echo: a TCP echo server with bounded concurrency
//!
//! Every byte a client sends is echoed back until the client closes its
//! write side.
//!
//! Features:
//! - Fixed pool of long-lived workers, one connection each at a time
//! - Bounded FIFO dispatch queue; a full queue stalls the accept loop
//! - Thread-based or tokio-based execution backend
//! - Configuration via CLI arguments or TOML file

mod config;
mod echo;
mod runtime;
mod server;

use config::Config;
use server::Server;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        queue_size = config.queue_size,
        workers = config.workers,
        backlog = config.backlog,
        io_timeout_secs = config.io_timeout_secs,
        runtime = ?config.runtime,
        "Starting pool-echo server"
    );

    let server = match Server::bind(config) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "Failed to bind listener");
            return Err(e.into());
        }
    };

    server.run()?;
    Ok(())
}
