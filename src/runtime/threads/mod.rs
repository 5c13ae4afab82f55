//! Thread-based worker pool.
//!
//! The accept loop runs on the calling thread and blocks on
//! [`DispatchQueue::push`](crate::runtime::DispatchQueue::push) when the
//! queue is full. Workers are named OS threads blocked on `pop`.

mod pool;

use crate::config::Config;
use crate::runtime::PoolStats;
use std::net::TcpListener;
use std::sync::Arc;

/// Run the listener and worker pool on OS threads. Does not return unless
/// spawning a worker fails.
pub fn run(listener: TcpListener, config: &Config, stats: Arc<PoolStats>) -> std::io::Result<()> {
    pool::run(listener, config, stats)
}
