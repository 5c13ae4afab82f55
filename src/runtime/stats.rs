//! Process-local counters for the listener and the worker pool.
//!
//! Used for log lines and capacity tuning. Not exported anywhere.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Shared counters updated by the listener and every worker.
#[derive(Debug, Default)]
pub struct PoolStats {
    next_conn_id: AtomicU64,
    accepted: AtomicU64,
    servicing: AtomicUsize,
    closed: AtomicU64,
    bytes_echoed: AtomicU64,
    accept_errors: AtomicU64,
    echo_errors: AtomicU64,
}

/// Point-in-time copy of [`PoolStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub accepted: u64,
    pub servicing: usize,
    pub closed: u64,
    pub bytes_echoed: u64,
    pub accept_errors: u64,
    pub echo_errors: u64,
}

impl PoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted connection and return its id.
    pub fn connection_accepted(&self) -> u64 {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.next_conn_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn accept_failed(&self) {
        self.accept_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn servicing_started(&self) {
        self.servicing.fetch_add(1, Ordering::SeqCst);
    }

    /// Record the end of a connection, whatever way the echo loop ended.
    pub fn connection_closed(&self, bytes: u64, failed: bool) {
        self.bytes_echoed.fetch_add(bytes, Ordering::Relaxed);
        if failed {
            self.echo_errors.fetch_add(1, Ordering::Relaxed);
        }
        self.closed.fetch_add(1, Ordering::SeqCst);
        self.servicing.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn servicing(&self) -> usize {
        self.servicing.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            servicing: self.servicing.load(Ordering::SeqCst),
            closed: self.closed.load(Ordering::SeqCst),
            bytes_echoed: self.bytes_echoed.load(Ordering::Relaxed),
            accept_errors: self.accept_errors.load(Ordering::Relaxed),
            echo_errors: self.echo_errors.load(Ordering::Relaxed),
        }
    }
}
