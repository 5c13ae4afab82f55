//! Tokio-based worker pool.
//!
//! Same admission model as the thread backend, expressed with tasks: the
//! dispatch queue is a bounded `mpsc` channel, `send` suspends the accept
//! loop while the channel is full, and the workers share the receiver
//! behind a fair `tokio::sync::Mutex` so each item reaches exactly one of
//! them in arrival order.

mod pool;

use crate::config::Config;
use crate::runtime::PoolStats;
use std::net::TcpListener;
use std::sync::Arc;

/// Build a multi-thread tokio runtime and run the pool on it.
pub fn run(listener: TcpListener, config: &Config, stats: Arc<PoolStats>) -> std::io::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("pool-echo-rt")
        .build()?;

    runtime.block_on(pool::serve(listener, config.clone(), stats))
}
