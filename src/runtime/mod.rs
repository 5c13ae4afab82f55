//! Listener and worker pool runtimes.
//!
//! Two backends implement the same admission model:
//! - `threads`: blocking accept loop, one OS thread per worker,
//!   `DispatchQueue` between them
//! - `tasks`: tokio accept loop and worker tasks, bounded mpsc between them
//!
//! Both share:
//! - `Connection`: the handle that moves from listener to worker
//! - `PoolStats`: counters for logs and tests
//! - `bind_listener`: socket setup with an explicit OS backlog

mod connection;
mod queue;
mod stats;
pub mod tasks;
pub mod threads;

pub use connection::Connection;
pub use queue::DispatchQueue;
pub use stats::PoolStats;

use crate::config::Config;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};

/// Create the listening socket.
///
/// Sets `SO_REUSEADDR` and listens with the configured backlog, which holds
/// connection attempts while the accept loop is blocked on a full queue.
pub fn bind_listener(config: &Config) -> io::Result<TcpListener> {
    let addr = resolve(&config.listen_addr())?;

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(i32::try_from(config.backlog).unwrap_or(i32::MAX))?;

    Ok(socket.into())
}

fn resolve(listen: &str) -> io::Result<SocketAddr> {
    listen.to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("no address found for {listen}"),
        )
    })
}
